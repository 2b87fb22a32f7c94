//! Summary statistics and the windowed-median convergence check.

use serde::Serialize;

/// Guards the relative median change against a zero denominator.
const MEDIAN_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
    pub p5: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

impl SummaryStatistics {
    /// Statistics over `outcomes`; all fields are NaN when it is empty.
    pub fn from_outcomes(outcomes: &[f64]) -> Self {
        if outcomes.is_empty() {
            return Self {
                mean: f64::NAN,
                median: f64::NAN,
                std: f64::NAN,
                p5: f64::NAN,
                p25: f64::NAN,
                p75: f64::NAN,
                p95: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        let n = outcomes.len() as f64;
        let mean = outcomes.iter().sum::<f64>() / n;
        let var = outcomes.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let sorted = sorted_copy(outcomes);
        Self {
            mean,
            median: percentile(&sorted, 50.0),
            std: var.sqrt(),
            p5: percentile(&sorted, 5.0),
            p25: percentile(&sorted, 25.0),
            p75: percentile(&sorted, 75.0),
            p95: percentile(&sorted, 95.0),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Percentile `q` (0..=100) of already sorted data, linearly interpolated
/// between closest ranks.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

pub fn median(values: &[f64]) -> f64 {
    percentile(&sorted_copy(values), 50.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConvergenceCheck {
    pub converged: bool,
    /// Whether two full windows were available.
    pub sufficient_window: bool,
    /// Relative change between the two windows' medians; 0 when the window is insufficient.
    pub median_delta: f64,
    pub effective_window: usize,
}

/// Compares the median of the latest `w` outcomes against the `w` before them,
/// with `w = min(window, max(window_min, n / 3))`.
pub fn check_convergence(outcomes: &[f64], window: usize, window_min: usize, tolerance: f64) -> ConvergenceCheck {
    let n = outcomes.len();
    let effective_window = window.min(window_min.max(n / 3));
    if n < 2 * effective_window {
        return ConvergenceCheck { converged: false, sufficient_window: false, median_delta: 0.0, effective_window };
    }

    let later = median(&outcomes[n - effective_window..]);
    let earlier = median(&outcomes[n - 2 * effective_window..n - effective_window]);
    let delta = (later - earlier).abs() / earlier.abs().max(MEDIAN_FLOOR);

    ConvergenceCheck {
        converged: delta <= tolerance,
        sufficient_window: true,
        median_delta: delta,
        effective_window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(25.0, 2.0)]
    #[case(50.0, 3.0)]
    #[case(90.0, 4.6)]
    #[case(100.0, 5.0)]
    fn test_percentile_interpolates(#[case] q: f64, #[case] expected: f64) {
        assert_abs_diff_eq!(percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], q), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_summary_statistics() {
        let s = SummaryStatistics::from_outcomes(&[4.0, 1.0, 3.0, 2.0]);
        assert_abs_diff_eq!(s.mean, 2.5);
        assert_abs_diff_eq!(s.median, 2.5);
        assert_abs_diff_eq!(s.std, 1.25f64.sqrt(), epsilon = 1e-12);
        assert_eq!((s.min, s.max), (1.0, 4.0));
        assert!(s.p5 <= s.p25 && s.p25 <= s.median && s.median <= s.p75 && s.p75 <= s.p95);
    }

    #[test]
    fn test_constant_outcomes_converge_immediately() {
        let outcomes = vec![42.0; 1_000];
        let check = check_convergence(&outcomes, 500, 50, 1e-3);
        assert!(check.converged && check.sufficient_window);
        assert_eq!(check.median_delta, 0.0);
        assert_eq!(check.effective_window, 333);
    }

    #[test]
    fn test_short_history_is_insufficient() {
        let check = check_convergence(&[1.0; 60], 500, 50, 1e-3);
        assert_eq!(check.effective_window, 50);
        assert!(!check.sufficient_window && !check.converged);
        assert_eq!(check.median_delta, 0.0);
    }

    #[test]
    fn test_shifted_windows_do_not_converge() {
        let mut outcomes = vec![1.0; 150];
        outcomes.extend(vec![2.0; 50]);
        let check = check_convergence(&outcomes, 100, 10, 1e-3);
        assert_eq!(check.effective_window, 66);
        assert!(check.sufficient_window);
        assert!(!check.converged);
        assert_eq!(check.median_delta, 1.0);
    }

    #[test]
    fn test_zero_median_uses_floor() {
        let check = check_convergence(&[0.0; 300], 100, 10, 1e-3);
        assert!(check.converged);
    }
}
