//! Graph rewriting passes.
//!
//! The optimizer runs two passes, strictly in this order:
//!
//! 1. **Variable elision**: variable nodes sharing a label are replaced by
//!    direct wires from the writer's sources to the readers' targets.
//! 2. **Dead-code elimination**: nodes with no path to an output node are
//!    dropped. Input nodes are always kept.
//!
//! Both passes are idempotent, so running the optimizer on its own output
//! leaves the graph unchanged.

mod dead_code;
mod variable;

use serde::Serialize;

use crate::error::Result;
use crate::graph::Graph;

/// Tracing target for optimizer passes.
pub const TRACING_TARGET: &str = "nodeflow_runtime::optimizer";

/// What an optimizer run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizationReport {
    /// Variable nodes removed.
    pub variables_removed: usize,
    /// Direct wires synthesized by variable elision.
    pub edges_synthesized: usize,
    /// Synthesized wires that displaced another source in the same slot.
    pub slots_collapsed: usize,
    /// Nodes removed as unreachable from any output.
    pub nodes_pruned: usize,
    /// Connections removed together with pruned nodes.
    pub connections_pruned: usize,
}

impl OptimizationReport {
    /// Returns whether the run left the graph untouched.
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }
}

/// Runs the rewriting passes over a validated graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimizer;

impl Optimizer {
    /// Creates a new optimizer.
    pub fn new() -> Self {
        Self
    }

    /// Optimizes a graph.
    pub fn run(&self, graph: Graph) -> Result<Graph> {
        self.run_with_report(graph).map(|(graph, _)| graph)
    }

    /// Optimizes a graph and reports what changed.
    pub fn run_with_report(&self, mut graph: Graph) -> Result<(Graph, OptimizationReport)> {
        let elision = variable::elide_variables(&mut graph)?;
        let pruned = dead_code::eliminate_dead_code(&mut graph);

        let report = OptimizationReport {
            variables_removed: elision.variables_removed,
            edges_synthesized: elision.edges_synthesized,
            slots_collapsed: elision.slots_collapsed,
            nodes_pruned: pruned.nodes,
            connections_pruned: pruned.connections,
        };

        tracing::debug!(
            target: TRACING_TARGET,
            variables_removed = report.variables_removed,
            edges_synthesized = report.edges_synthesized,
            slots_collapsed = report.slots_collapsed,
            nodes_pruned = report.nodes_pruned,
            connections_pruned = report.connections_pruned,
            "Graph optimized"
        );

        Ok((graph, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{GraphDefinition, NodeDefinition};

    fn graph_with_alias_and_dead_branch() -> Graph {
        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::input("x", "x"))
            .add_node(NodeDefinition::input("unused", "unused"))
            .add_node(NodeDefinition::variable("w", "v", true))
            .add_node(NodeDefinition::variable("r", "v", false))
            .add_node(NodeDefinition::compute("neg", "negate"))
            .add_node(NodeDefinition::compute("dead", "negate"))
            .add_node(NodeDefinition::output("out", "out"))
            .connect("x", "w", "value")
            .connect("r", "neg", "value")
            .connect("x", "dead", "value")
            .connect("neg", "out", "value");
        Graph::from_definition(def).unwrap()
    }

    #[test]
    fn test_optimizer_report() {
        let (graph, report) = Optimizer::new()
            .run_with_report(graph_with_alias_and_dead_branch())
            .unwrap();

        assert_eq!(report.variables_removed, 2);
        assert_eq!(report.edges_synthesized, 1);
        assert_eq!(report.slots_collapsed, 0);
        assert_eq!(report.nodes_pruned, 1);
        assert_eq!(report.connections_pruned, 1);

        assert!(!graph.contains_node("dead"));
        assert!(graph.contains_node("unused"));
        assert_eq!(graph.inputs_of("neg").get("value").map(|p| p.node.as_str()), Some("x"));
    }

    #[test]
    fn test_optimizer_is_idempotent() {
        let optimizer = Optimizer::new();
        let once = optimizer.run(graph_with_alias_and_dead_branch()).unwrap();
        let (twice, report) = optimizer.run_with_report(once.clone()).unwrap();

        assert!(report.is_unchanged());
        let ids = |g: &Graph| g.nodes().map(|n| n.id().clone()).collect::<Vec<_>>();
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(once.connections(), twice.connections());
    }
}
