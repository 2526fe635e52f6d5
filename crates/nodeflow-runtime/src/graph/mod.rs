//! Graph model: validated nodes, ports and wires.
//!
//! This module provides the intermediate representation the optimizer,
//! scheduler and compiler work on:
//! - [`Graph`]: validated nodes and wires with derived adjacency
//! - [`Node`]: a parsed node with its [`NodeKind`] and declared ports
//! - [`NodeId`]: identifier of a node within one graph
//! - [`PortRef`]: a `(node, port)` pair naming one node output
//! - [`Connection`]: a wire from a source port to a target slot

mod graph;
mod id;
mod node;
mod port;

pub use graph::{Connection, Graph};
pub use id::NodeId;
pub use node::{Node, NodeKind};
pub use port::{DEFAULT_PORT, PortRef};

/// Tracing target for graph construction.
pub(crate) const TRACING_TARGET: &str = "nodeflow_runtime::graph";
