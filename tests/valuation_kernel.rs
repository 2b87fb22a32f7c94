//! End-to-end behaviour of the graph executor and the Monte Carlo engine.

use approx::assert_abs_diff_eq;
use prism_valuation_core::montecarlo::{graph_evaluator, scalar_inputs, MonteCarloConfigBuilder};
use prism_valuation_core::{
    CalculationGraph, CorrelationGroup, DistributionSpec, Formula, Ledger, MonteCarloConfig, MonteCarloEngine,
    MonteCarloError, PsdRepairPolicy, TracedValue, Value,
};
use rstest::rstest;
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;

fn dcf_graph() -> CalculationGraph {
    let mut g = CalculationGraph::new("dcf");
    g.add_node(
        "enterprise_value",
        &["fcf", "wacc", "terminal_growth"],
        Formula::scalar("gordon_growth", |x| x[0] * (1.0 + x[2]) / (x[1] - x[2])),
    )
    .unwrap();
    g.add_node("equity_value", &["enterprise_value", "net_debt"], Formula::scalar("ev_bridge", |x| x[0] - x[1]))
        .unwrap();
    g.add_node("intrinsic_value", &["equity_value", "shares"], Formula::scalar("per_share", |x| x[0] / x[1]))
        .unwrap();
    g
}

fn dcf_inputs() -> Ledger {
    Ledger::new()
        .with("fcf", 120.0)
        .with("wacc", 0.09)
        .with("terminal_growth", 0.02)
        .with("net_debt", 300.0)
        .with("shares", 50.0)
}

fn engine(builder: MonteCarloConfigBuilder) -> MonteCarloEngine {
    MonteCarloEngine::new(builder.build().unwrap())
}

fn vars(specs: &[(&str, DistributionSpec)]) -> BTreeMap<String, DistributionSpec> {
    specs.iter().map(|(n, s)| (n.to_string(), *s)).collect()
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let cov: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let vx: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
    let vy: f64 = y.iter().map(|b| (b - my).powi(2)).sum();
    cov / (vx * vy).sqrt()
}

fn inconsistent_triple() -> CorrelationGroup {
    CorrelationGroup::new(
        ["a", "b", "c"],
        vec![vec![1.0, 0.9, 0.9], vec![0.9, 1.0, -0.9], vec![0.9, -0.9, 1.0]],
    )
}

fn sum_abc(inputs: &BTreeMap<String, f64>) -> Result<f64, Infallible> {
    Ok(inputs["a"] + inputs["b"] + inputs["c"])
}

// --- Calculation graph ---

#[test]
fn test_dcf_graph_computes_every_node() {
    let out = dcf_graph().calculate(&dcf_inputs(), false).unwrap();
    assert_abs_diff_eq!(out.scalar("enterprise_value").unwrap(), 120.0 * 1.02 / 0.07, epsilon = 1e-9);
    assert_abs_diff_eq!(out.scalar("intrinsic_value").unwrap(), (120.0 * 1.02 / 0.07 - 300.0) / 50.0, epsilon = 1e-9);
    assert_eq!(out.len(), 8);
}

#[test]
fn test_lineage_reaches_exactly_the_supplied_leaves() {
    let g = dcf_graph();
    let traced: Ledger = g
        .get_inputs()
        .into_iter()
        .map(|name| {
            let v = dcf_inputs().scalar(&name).unwrap();
            let field = TracedValue::source_fact(name.clone(), Value::Scalar(v), format!("filing:{}", name), "FY2024");
            (name, field)
        })
        .collect();

    let out = g.calculate(&traced, false).unwrap();
    let price = out.traced("intrinsic_value").expect("output should be traced");
    let leaves: BTreeSet<&str> = price.lineage_leaves().into_iter().map(|f| f.name()).collect();
    let expected: BTreeSet<&str> = ["fcf", "net_debt", "shares", "terminal_growth", "wacc"].into_iter().collect();
    assert_eq!(leaves, expected);

    for leaf in price.lineage_leaves() {
        let supplied = traced.traced(leaf.name()).unwrap();
        assert!(std::ptr::eq(leaf, &**supplied));
    }
}

#[test]
fn test_untraced_leaves_give_untraced_outputs() {
    let out = dcf_graph().calculate(&dcf_inputs(), false).unwrap();
    assert!(out.iter().all(|(_, entry)| !entry.is_traced()));
}

#[test]
fn test_missing_leaf_fails_only_its_dependents() {
    let g = dcf_graph();
    let mut partial = Ledger::new();
    for (name, entry) in dcf_inputs() {
        if name != "shares" {
            partial.insert(name, entry);
        }
    }
    assert!(g.calculate(&partial, false).is_err());
    let out = g.calculate_targets(&partial, &["equity_value"], false).unwrap();
    assert!(out.scalar("equity_value").is_some());
}

// --- Monte Carlo ---

#[test]
fn test_single_normal_identity() {
    let eng = engine(MonteCarloConfig::builder().iterations(5_000).min_iterations(5_000).seed(42));
    let result = eng
        .run(&BTreeMap::new(), &vars(&[("x", DistributionSpec::normal(100.0, 10.0))]), |i| Ok::<_, Infallible>(i["x"]), &[])
        .unwrap();
    assert_abs_diff_eq!(result.summary.mean, 100.0, epsilon = 1.0);
    assert_abs_diff_eq!(result.summary.median, 100.0, epsilon = 1.0);
    assert_eq!(result.diagnostics.executed_iterations, 5_000);
}

#[test]
fn test_correlated_pair_reproduces_rho() {
    let eng = engine(MonteCarloConfig::builder().iterations(20_000).seed(7));
    let dists = vars(&[("x", DistributionSpec::normal(0.0, 1.0)), ("y", DistributionSpec::normal(10.0, 2.0))]);
    let samples = eng.sample(&dists, &[CorrelationGroup::pair("x", "y", 0.9)]).unwrap();
    assert_eq!(samples.iterations(), 20_000);
    let rho = pearson(samples.column("x").unwrap(), samples.column("y").unwrap());
    assert_abs_diff_eq!(rho, 0.9, epsilon = 0.05);
}

#[test]
fn test_non_psd_group_under_error_policy() {
    let eng = engine(MonteCarloConfig::builder().psd_repair_policy(PsdRepairPolicy::Error).seed(1));
    let dists = vars(&[
        ("a", DistributionSpec::normal(0.0, 1.0)),
        ("b", DistributionSpec::normal(0.0, 1.0)),
        ("c", DistributionSpec::normal(0.0, 1.0)),
    ]);
    let err = eng.run(&BTreeMap::new(), &dists, sum_abc, &[inconsistent_triple()]).unwrap_err();
    assert!(matches!(err, MonteCarloError::NotPositiveSemiDefinite { min_eigenvalue } if min_eigenvalue < 0.0));
}

#[rstest]
#[case(PsdRepairPolicy::Clip)]
#[case(PsdRepairPolicy::Higham)]
fn test_non_psd_group_is_repaired(#[case] policy: PsdRepairPolicy) {
    let eng = engine(MonteCarloConfig::builder().iterations(2_000).psd_repair_policy(policy).seed(1));
    let dists = vars(&[
        ("a", DistributionSpec::normal(0.0, 1.0)),
        ("b", DistributionSpec::normal(0.0, 1.0)),
        ("c", DistributionSpec::normal(0.0, 1.0)),
    ]);
    let d = eng.run(&BTreeMap::new(), &dists, sum_abc, &[inconsistent_triple()]).unwrap().diagnostics;
    assert!(d.psd_repaired);
    assert_eq!(d.psd_repair_method, Some(policy));
    assert_eq!(d.psd_repair_clip_used, policy == PsdRepairPolicy::Clip);
    assert_eq!(d.psd_repair_higham_used, policy == PsdRepairPolicy::Higham);
    assert!(d.psd_min_eigenvalue_before.unwrap() < 0.0);
    assert!(d.psd_min_eigenvalue_after.unwrap() >= -1e-10);
}

#[rstest]
#[case(PsdRepairPolicy::Error)]
#[case(PsdRepairPolicy::Clip)]
#[case(PsdRepairPolicy::Higham)]
fn test_psd_group_is_never_repaired(#[case] policy: PsdRepairPolicy) {
    let eng = engine(MonteCarloConfig::builder().iterations(500).psd_repair_policy(policy).seed(3));
    let dists = vars(&[("x", DistributionSpec::normal(0.0, 1.0)), ("y", DistributionSpec::normal(0.0, 1.0))]);
    let d = eng
        .run(&BTreeMap::new(), &dists, |i| Ok::<_, Infallible>(i["x"] - i["y"]), &[CorrelationGroup::pair("x", "y", 0.4)])
        .unwrap()
        .diagnostics;
    assert!(!d.psd_repaired);
    assert_eq!(d.psd_repair_method, None);
    assert_eq!(d.higham_iterations, 0);
}

#[test]
fn test_fixed_seed_is_deterministic() {
    let config = || MonteCarloConfig::builder().iterations(4_000).seed(2024);
    let dists = vars(&[("x", DistributionSpec::triangular(0.0, 1.0, 4.0)), ("y", DistributionSpec::normal(5.0, 2.0))]);
    let groups = [CorrelationGroup::pair("x", "y", -0.3)];
    let eval = |i: &BTreeMap<String, f64>| Ok::<_, Infallible>(i["x"] * i["y"]);

    let first = engine(config()).run(&BTreeMap::new(), &dists, eval, &groups).unwrap();
    let second = engine(config()).run(&BTreeMap::new(), &dists, eval, &groups).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_early_stop_property() {
    let eng = engine(MonteCarloConfig::builder().iterations(10_000).seed(11));
    let dists = vars(&[("x", DistributionSpec::normal(50.0, 1.0))]);
    let d = eng
        .run(&BTreeMap::new(), &dists, |i| Ok::<_, Infallible>(i["x"]), &[])
        .unwrap()
        .diagnostics;
    if d.stopped_early {
        assert!(d.executed_iterations < d.configured_iterations);
        assert!(d.converged && d.sufficient_window);
    } else {
        assert_eq!(d.executed_iterations, d.configured_iterations);
    }
    assert!(d.executed_iterations >= 1_000);
}

#[test]
fn test_dcf_simulation_through_graph() {
    let g = dcf_graph();
    let fixed = dcf_inputs();
    let dists = vars(&[
        ("wacc", DistributionSpec::triangular(0.08, 0.09, 0.11)),
        ("terminal_growth", DistributionSpec::normal(0.02, 0.005).with_bounds(Some(0.0), Some(0.04))),
    ]);
    let eng = engine(MonteCarloConfig::builder().iterations(3_000).seed(5));
    let result = eng
        .run(
            &scalar_inputs(&fixed),
            &dists,
            graph_evaluator(&g, &fixed, "intrinsic_value"),
            &[CorrelationGroup::pair("terminal_growth", "wacc", 0.3)],
        )
        .unwrap();

    let s = &result.summary;
    assert!(s.min.is_finite() && s.max.is_finite());
    assert!(s.p5 <= s.median && s.median <= s.p95);
    assert!(s.min > 0.0);
    assert!(result.diagnostics.executed_iterations <= 3_000);
}

#[test]
fn test_graph_errors_surface_as_evaluation_failures() {
    let g = dcf_graph();
    let fixed = Ledger::new().with("fcf", 120.0).with("net_debt", 0.0).with("shares", 1.0);
    let dists = vars(&[("wacc", DistributionSpec::uniform(0.05, 0.10))]);
    let eng = engine(MonteCarloConfig::builder().iterations(100).seed(5).parallel(false));
    let err = eng
        .run(&BTreeMap::new(), &dists, graph_evaluator(&g, &fixed, "intrinsic_value"), &[])
        .unwrap_err();
    match err {
        MonteCarloError::Evaluation { iteration, message } => {
            assert_eq!(iteration, 0);
            assert!(message.contains("terminal_growth"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_settings_from_json_drive_a_run() {
    let config = MonteCarloConfig::from_json(r#"{ "iterations": 600, "seed": 9, "psd_repair_policy": "higham" }"#)
        .unwrap();
    let eng = MonteCarloEngine::new(config);
    let dists = vars(&[("x", DistributionSpec::uniform(1.0, 2.0))]);
    let result = eng.run(&BTreeMap::new(), &dists, |i| Ok::<_, Infallible>(i["x"]), &[]).unwrap();
    assert_eq!(result.diagnostics.configured_iterations, 600);
    assert!(result.summary.min >= 1.0 && result.summary.max < 2.0);
    let json = result.to_json().unwrap();
    assert!(json.contains("\"executed_iterations\": 600"));
}
