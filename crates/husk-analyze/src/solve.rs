//! Liveness fixed-point solver: resolves the dependency graph's monotone
//! edges into a concrete `FlowNode -> Live` map.
//!
//! The dependency graph is, in general, cyclic (recursive functions, mutual
//! recursion across module bindings), so it's solved one strongly
//! connected component at a time, in reverse topological order over the
//! condensation — acyclic structure is resolved in a single pass per node,
//! and only genuine cycles pay for repeated iteration.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::depgraph::{DepGraph, FlowNode};
use crate::liveness::Live;

/// Bound on in-SCC iteration rounds before accepting the current
/// approximation. `Live` has finite height per program (bounded by nesting
/// depth of constructors appearing in the source), so this only guards
/// against pathological cycles, not ordinary recursion depth.
const MAX_SCC_ROUNDS: usize = 5;

/// `FlowNode -> Live`, the solved liveness map.
#[derive(Debug, Default)]
pub struct LivenessMap {
    values: HashMap<FlowNode, Live>,
}

impl LivenessMap {
    /// Unobserved flow nodes default to `Bot`: no incoming edges means no
    /// demand ever reached them.
    pub fn get(&self, n: FlowNode) -> Live {
        self.values.get(&n).cloned().unwrap_or(Live::Bot)
    }
}

pub fn solve(graph: &DepGraph) -> LivenessMap {
    let mut map = LivenessMap::default();
    map.values.insert(FlowNode::Top, Live::Top);

    // petgraph's `tarjan_scc` returns components in reverse topological
    // order of the condensation (a component appears before any component
    // it has an edge *into*); reversing gives us "source components
    // first," which is what a graph whose edges read as "source's demand
    // flows into target" needs.
    let sccs = petgraph::algo::tarjan_scc(&graph.graph);
    for scc in sccs.into_iter().rev() {
        if scc.len() == 1 && !has_self_loop(graph, scc[0]) {
            let n = scc[0];
            let node = graph.graph[n];
            if node == FlowNode::Top {
                continue;
            }
            let live = incoming_join(graph, &map, n);
            map.values.insert(node, live);
            continue;
        }

        for round in 0..MAX_SCC_ROUNDS {
            let mut changed = false;
            for &n in &scc {
                let node = graph.graph[n];
                if node == FlowNode::Top {
                    continue;
                }
                let live = incoming_join(graph, &map, n);
                let prev = map.values.get(&node).cloned().unwrap_or(Live::Bot);
                if live != prev {
                    map.values.insert(node, live);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            if round == MAX_SCC_ROUNDS - 1 {
                tracing::debug!(scc_size = scc.len(), "liveness SCC did not stabilize within round bound");
            }
        }
    }

    map
}

fn has_self_loop(graph: &DepGraph, n: NodeIndex) -> bool {
    graph.graph.edges_directed(n, Direction::Outgoing).any(|e| e.target() == n)
}

fn incoming_join(graph: &DepGraph, map: &LivenessMap, n: NodeIndex) -> Live {
    let mut acc = Live::Bot;
    for edge in graph.graph.edges_directed(n, Direction::Incoming) {
        let source_live = map.get(graph.graph[edge.source()]);
        acc = acc.join(&edge.weight().apply(&source_live));
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depgraph::Transformer;
    use husk_core::Label;
    use std::collections::HashMap as Map;

    fn build(edges: &[(FlowNode, FlowNode, Transformer)]) -> DepGraph {
        let mut graph = petgraph::graph::DiGraph::new();
        let mut index = Map::new();
        let mut get = |g: &mut petgraph::graph::DiGraph<FlowNode, Transformer>, idx: &mut Map<FlowNode, NodeIndex>, n: FlowNode| {
            *idx.entry(n).or_insert_with(|| g.add_node(n))
        };
        for (src, dst, t) in edges {
            let s = get(&mut graph, &mut index, *src);
            let d = get(&mut graph, &mut index, *dst);
            graph.add_edge(s, d, t.clone());
        }
        let top = get(&mut graph, &mut index, FlowNode::Top);
        DepGraph { graph, index, top }
    }

    #[test]
    fn acyclic_chain_propagates_demand() {
        let a = FlowNode::Expr(Label(0));
        let b = FlowNode::Expr(Label(1));
        let graph = build(&[(FlowNode::Top, a, Transformer::Const(Box::new(Live::Top))), (a, b, Transformer::Identity)]);
        let map = solve(&graph);
        assert_eq!(map.get(a), Live::Top);
        assert_eq!(map.get(b), Live::Top);
    }

    #[test]
    fn unreached_node_stays_bot() {
        let a = FlowNode::Expr(Label(0));
        let graph = build(&[(a, FlowNode::Expr(Label(1)), Transformer::Identity)]);
        let map = solve(&graph);
        assert_eq!(map.get(a), Live::Bot);
    }

    #[test]
    fn self_recursive_cycle_reaches_fixed_point() {
        let a = FlowNode::Expr(Label(0));
        let graph = build(&[
            (FlowNode::Top, a, Transformer::Const(Box::new(Live::Top))),
            (a, a, Transformer::Identity),
        ]);
        let map = solve(&graph);
        assert_eq!(map.get(a), Live::Top);
    }
}
