//! Dead-code elimination.

use std::collections::HashSet;

use petgraph::visit::{Dfs, Reversed};

use super::TRACING_TARGET;
use crate::graph::Graph;

/// Outcome of the dead-code pass.
#[derive(Debug, Default)]
pub(super) struct Pruned {
    pub nodes: usize,
    pub connections: usize,
}

/// Drops every node that no output node depends on.
///
/// Reachability is computed on the reversed graph starting from all output
/// nodes. Input nodes are retained regardless, as they are part of the
/// declared interface even when unwired.
pub(super) fn eliminate_dead_code(graph: &mut Graph) -> Pruned {
    let reversed = Reversed(graph.inner());
    let mut dfs = Dfs::empty(reversed);
    let mut reachable = HashSet::new();

    for index in graph.indices() {
        if !graph.inner()[index].is_output() {
            continue;
        }
        dfs.move_to(index);
        while let Some(visited) = dfs.next(reversed) {
            reachable.insert(visited);
        }
    }

    let dead: Vec<_> = graph
        .indices()
        .filter(|index| !reachable.contains(index) && !graph.inner()[*index].is_input())
        .collect();

    let edges_before = graph.edge_count();
    for &index in &dead {
        if let Some(node) = graph.remove_node(index) {
            tracing::trace!(target: TRACING_TARGET, node = %node.id(), "Pruned unreachable node");
        }
    }

    Pruned {
        nodes: dead.len(),
        connections: edges_before - graph.edge_count(),
    }
}
