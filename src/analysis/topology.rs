use crate::store::{NodeId, Registry};

/// Depth-first topological order over every registered node: each dependency
/// precedes the nodes that consume it.
///
/// On failure the error holds the nodes on the detected cycle, in dependency
/// order, with the first node repeated at the end.
///
/// Uses DFS rather than Kahn's algorithm so a deep chain A->B->C lands as
/// [A, B, C]; nodes are visited in registration order, so the result is stable.
pub fn sort(registry: &Registry) -> Result<Vec<NodeId>, Vec<NodeId>> {
    order_from(registry, (0..registry.count()).map(NodeId::new))
}

/// Topological order restricted to the upstream closure of `roots`.
pub fn order_from(
    registry: &Registry,
    roots: impl IntoIterator<Item = NodeId>,
) -> Result<Vec<NodeId>, Vec<NodeId>> {
    let count = registry.count();
    let mut order = Vec::with_capacity(count);
    let mut state = vec![VisitState::None; count];
    let mut path = Vec::new();

    for root in roots {
        if state[root.index()] == VisitState::None {
            visit(root, registry, &mut state, &mut path, &mut order)?;
        }
    }

    Ok(order)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // on the current DFS path
    Visited,
}

fn visit(
    node: NodeId,
    registry: &Registry,
    state: &mut [VisitState],
    path: &mut Vec<NodeId>,
    order: &mut Vec<NodeId>,
) -> Result<(), Vec<NodeId>> {
    let idx = node.index();

    match state[idx] {
        VisitState::Visited => return Ok(()),
        VisitState::Visiting => {
            // `path` holds the DFS stack; the cycle is its tail starting at `node`.
            let start = path.iter().position(|&n| n == node).unwrap_or(0);
            let mut cycle: Vec<NodeId> = path[start..].to_vec();
            cycle.push(node);
            // The stack runs consumer -> dependency; report it dependency-first.
            cycle.reverse();
            return Err(cycle);
        }
        VisitState::None => state[idx] = VisitState::Visiting,
    }

    path.push(node);
    for &parent in registry.get_parents(node) {
        visit(parent, registry, state, path, order)?;
    }
    path.pop();

    state[idx] = VisitState::Visited;
    order.push(node);
    Ok(())
}

/// Nodes with no incoming dependency edges, in registration order.
pub fn inputs(registry: &Registry) -> Vec<NodeId> {
    (0..registry.count())
        .map(NodeId::new)
        .filter(|&id| registry.in_degree(id) == 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (Registry, [NodeId; 4]) {
        // A feeds B and C; D consumes both
        let mut reg = Registry::new();
        let a = reg.ensure_node("A");
        let b = reg.ensure_node("B");
        let c = reg.ensure_node("C");
        let d = reg.ensure_node("D");
        reg.set_parents(b, &[a]);
        reg.set_parents(c, &[a]);
        reg.set_parents(d, &[b, c]);
        (reg, [a, b, c, d])
    }

    #[test]
    fn test_dependencies_precede_consumers() {
        let (reg, [a, b, c, d]) = diamond();
        let order = sort(&reg).unwrap();

        let pos = |id: NodeId| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_cycle_detection_reports_path() {
        let mut reg = Registry::new();
        let a = reg.ensure_node("A");
        let b = reg.ensure_node("B");
        reg.set_parents(a, &[b]);
        reg.set_parents(b, &[a]);

        let cycle = sort(&reg).unwrap_err();
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&a) && cycle.contains(&b));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut reg = Registry::new();
        let a = reg.ensure_node("A");
        reg.set_parents(a, &[a]);
        assert_eq!(sort(&reg).unwrap_err(), vec![a, a]);
    }

    #[test]
    fn test_order_from_limits_to_upstream_closure() {
        let (mut reg, [a, b, _c, _d]) = diamond();
        let lonely = reg.ensure_node("E");
        let order = order_from(&reg, [b]).unwrap();
        assert_eq!(order, vec![a, b]);
        assert!(!order.contains(&lonely));
    }

    #[test]
    fn test_inputs_are_zero_in_degree() {
        let (mut reg, [a, ..]) = diamond();
        let e = reg.ensure_node("E");
        assert_eq!(inputs(&reg), vec![a, e]);
    }
}
