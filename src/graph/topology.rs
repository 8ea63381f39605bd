//! Graph ordering primitives.
//!
//! Pure functions shared by the requirement validator and the cascade rule
//! table: a deterministic Kahn ordering over indexed nodes, and three-color
//! depth-first cycle extraction.

use std::collections::{BTreeMap, BTreeSet};

/// Result of a Kahn topological ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KahnOrder {
    /// Nodes in dependency order.
    pub ordered: Vec<usize>,

    /// Nodes that never reached in-degree zero, ascending. Non-empty exactly
    /// when the graph has a cycle; includes nodes downstream of a cycle.
    pub blocked: Vec<usize>,
}

impl KahnOrder {
    pub fn is_complete(&self) -> bool {
        self.blocked.is_empty()
    }
}

/// Orders nodes `0..node_count` so that for every edge `(from, to)`, `from`
/// comes before `to`.
///
/// Among nodes that are ready at the same time, the smallest index goes first.
/// Callers index nodes by first appearance, so ties fall back to the order the
/// nodes were given in.
pub fn kahn_order(node_count: usize, edges: &[(usize, usize)]) -> KahnOrder {
    let mut in_degree = vec![0usize; node_count];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(from, to) in edges {
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..node_count).filter(|&n| in_degree[n] == 0).collect();
    let mut ordered = Vec::with_capacity(node_count);

    while let Some(node) = ready.pop_first() {
        ordered.push(node);
        for &next in &successors[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    let blocked = (0..node_count).filter(|&n| in_degree[n] > 0).collect();
    KahnOrder { ordered, blocked }
}

/// Finds one cycle in a directed graph.
///
/// `roots` fixes the order in which unvisited nodes are explored, so the
/// reported cycle is deterministic. Edges to nodes missing from `successors`
/// are ignored. Returns the cycle as a path starting at the node first
/// re-entered; the closing edge back to that node is implied.
///
/// Uses depth-first search with three-color marking:
/// - White (unvisited): not yet processed
/// - Gray (in progress): on the current DFS path
/// - Black (finished): fully explored
///
/// A back edge to a gray node indicates a cycle.
pub fn find_cycle<N>(roots: &[N], successors: &BTreeMap<N, Vec<N>>) -> Option<Vec<N>>
where
    N: Clone + Ord,
{
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    fn dfs<N: Clone + Ord>(
        node: &N,
        successors: &BTreeMap<N, Vec<N>>,
        colors: &mut BTreeMap<N, Color>,
        path: &mut Vec<N>,
    ) -> Option<Vec<N>> {
        colors.insert(node.clone(), Color::Gray);
        path.push(node.clone());

        for next in successors.get(node).into_iter().flatten() {
            match colors.get(next) {
                Some(Color::Gray) => {
                    if let Some(pos) = path.iter().position(|p| p == next) {
                        return Some(path[pos..].to_vec());
                    }
                }
                Some(Color::White) => {
                    if let Some(cycle) = dfs(next, successors, colors, path) {
                        return Some(cycle);
                    }
                }
                Some(Color::Black) | None => {}
            }
        }

        path.pop();
        colors.insert(node.clone(), Color::Black);
        None
    }

    let mut colors: BTreeMap<N, Color> =
        successors.keys().map(|n| (n.clone(), Color::White)).collect();

    for root in roots {
        if colors.get(root) == Some(&Color::White) {
            let mut path = Vec::new();
            if let Some(cycle) = dfs(root, successors, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod kahn {
        use super::*;

        #[test]
        fn chain_is_ordered() {
            let order = kahn_order(3, &[(2, 1), (1, 0)]);
            assert_eq!(order.ordered, vec![2, 1, 0]);
            assert!(order.is_complete());
        }

        #[test]
        fn ties_break_by_index() {
            // 0 and 2 are both roots; 1 depends on 2.
            let order = kahn_order(3, &[(2, 1)]);
            assert_eq!(order.ordered, vec![0, 2, 1]);
        }

        #[test]
        fn cycle_leaves_blocked_nodes() {
            // 0 <-> 1, and 2 depends on 1.
            let order = kahn_order(4, &[(0, 1), (1, 0), (1, 2)]);
            assert_eq!(order.ordered, vec![3]);
            assert_eq!(order.blocked, vec![0, 1, 2]);
        }

        #[test]
        fn self_loop_is_blocked() {
            let order = kahn_order(2, &[(1, 1)]);
            assert_eq!(order.ordered, vec![0]);
            assert_eq!(order.blocked, vec![1]);
        }

        #[test]
        fn duplicate_edges_are_harmless() {
            let order = kahn_order(2, &[(0, 1), (0, 1)]);
            assert_eq!(order.ordered, vec![0, 1]);
        }
    }

    mod cycles {
        use super::*;

        fn graph(edges: &[(&'static str, &'static str)]) -> BTreeMap<&'static str, Vec<&'static str>> {
            let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for &(from, to) in edges {
                map.entry(from).or_default().push(to);
                map.entry(to).or_default();
            }
            map
        }

        #[test]
        fn two_cycle_is_found() {
            let g = graph(&[("a", "b"), ("b", "a")]);
            assert_eq!(find_cycle(&["a", "b"], &g), Some(vec!["a", "b"]));
        }

        #[test]
        fn root_order_decides_starting_point() {
            let g = graph(&[("a", "b"), ("b", "a")]);
            assert_eq!(find_cycle(&["b", "a"], &g), Some(vec!["b", "a"]));
        }

        #[test]
        fn self_loop_is_a_cycle_of_one() {
            let g = graph(&[("a", "a")]);
            assert_eq!(find_cycle(&["a"], &g), Some(vec!["a"]));
        }

        #[test]
        fn tail_leading_into_cycle_is_trimmed() {
            let g = graph(&[("x", "a"), ("a", "b"), ("b", "c"), ("c", "a")]);
            assert_eq!(find_cycle(&["x"], &g), Some(vec!["a", "b", "c"]));
        }

        #[test]
        fn diamond_has_no_cycle() {
            let g = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
            assert_eq!(find_cycle(&["a", "b", "c", "d"], &g), None);
        }
    }

    proptest! {
        #[test]
        fn forward_edges_always_order_completely(
            n in 1usize..12,
            raw_edges in prop::collection::vec((0usize..12, 0usize..12), 0..30),
        ) {
            // Only edges from a lower to a higher index: always acyclic.
            let edges: Vec<(usize, usize)> = raw_edges
                .into_iter()
                .map(|(a, b)| (a % n, b % n))
                .filter(|(a, b)| a < b)
                .collect();

            let order = kahn_order(n, &edges);
            prop_assert!(order.is_complete());
            prop_assert_eq!(order.ordered.len(), n);

            let position = |node: usize| order.ordered.iter().position(|&x| x == node);
            for (from, to) in &edges {
                prop_assert!(position(*from) < position(*to));
            }
        }

        #[test]
        fn ring_always_has_cycle(size in 2usize..8) {
            let mut g: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for i in 0..size {
                g.insert(i, vec![(i + 1) % size]);
            }
            let roots: Vec<usize> = (0..size).collect();

            let cycle = find_cycle(&roots, &g);
            prop_assert_eq!(cycle.map(|c| c.len()), Some(size));
        }
    }
}
