//! Topological scheduling of graph nodes.
//!
//! Nodes are ordered with Kahn's algorithm. The ready queue is seeded and fed
//! in declaration order, so the same graph always yields the same schedule;
//! progress reporting and port-key collisions depend on it.

use std::collections::VecDeque;

use petgraph::stable_graph::NodeIndex;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};

/// Tracing target for scheduling.
pub const TRACING_TARGET: &str = "nodeflow_runtime::scheduler";

/// A topological node order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    order: Vec<NodeId>,
}

impl Schedule {
    /// Returns the scheduled node ids.
    pub fn iter(&self) -> std::slice::Iter<'_, NodeId> {
        self.order.iter()
    }

    /// Returns the number of scheduled nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether nothing was scheduled.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the position of a node in the schedule.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|n| n.as_str() == id)
    }

    /// Returns the schedule as a slice.
    pub fn as_slice(&self) -> &[NodeId] {
        &self.order
    }
}

impl IntoIterator for Schedule {
    type IntoIter = std::vec::IntoIter<NodeId>;
    type Item = NodeId;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type IntoIter = std::slice::Iter<'a, NodeId>;
    type Item = &'a NodeId;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

/// Orders the nodes of a graph so that every source precedes its targets.
///
/// A node's in-degree is the number of its wired slots. Fails with
/// [`Error::Cycle`] listing the nodes that could not be ordered.
pub fn schedule(graph: &Graph) -> Result<Schedule> {
    let inner = graph.inner();
    let indices: Vec<NodeIndex> = graph.indices().collect();
    let bound = indices.iter().map(|i| i.index() + 1).max().unwrap_or(0);

    let mut in_degree = vec![0usize; bound];
    for &index in &indices {
        in_degree[index.index()] = graph.incoming(index).len();
    }

    let mut queue: VecDeque<NodeIndex> = indices
        .iter()
        .copied()
        .filter(|i| in_degree[i.index()] == 0)
        .collect();

    let mut scheduled = vec![false; bound];
    let mut order = Vec::with_capacity(indices.len());

    while let Some(index) = queue.pop_front() {
        scheduled[index.index()] = true;
        order.push(inner[index].id().clone());

        for (target, _) in graph.outgoing(index) {
            let degree = &mut in_degree[target.index()];
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                queue.push_back(target);
            }
        }
    }

    if order.len() < indices.len() {
        let nodes: Vec<NodeId> = indices
            .iter()
            .filter(|i| !scheduled[i.index()])
            .map(|&i| inner[i].id().clone())
            .collect();

        tracing::debug!(
            target: TRACING_TARGET,
            scheduled = order.len(),
            unscheduled = nodes.len(),
            "Cycle detected"
        );
        return Err(Error::Cycle { nodes });
    }

    tracing::trace!(target: TRACING_TARGET, nodes = order.len(), "Graph scheduled");
    Ok(Schedule { order })
}
