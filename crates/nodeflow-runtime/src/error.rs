//! Runtime error types.

use nodeflow_core::BoxedError;
use strum::{AsRefStr, IntoStaticStr};
use thiserror::Error;

use crate::graph::{NodeId, PortRef};

/// Result type for graph compilation and execution.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors, one per failure class of the compile/execute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The graph definition is structurally invalid.
    MalformedGraph,
    /// A compute node names a uid the registry does not know.
    UnknownNodeType,
    /// The graph or its conditional subgraphs cannot be ordered.
    Cycle,
    /// The input bundle lacks a declared input.
    MissingInput,
    /// An upstream port never produced a value.
    MissingValue,
    /// A registered node function failed.
    NodeExecution,
    /// A value of the wrong variant or shape reached a structural node.
    InvalidValue,
    /// The graph definition could not be deserialized.
    Deserialization,
}

/// Errors that can occur while building, compiling or executing a graph.
#[derive(Debug, Error)]
pub enum Error {
    /// The graph definition is invalid.
    #[error("malformed graph at {subject}: {message}")]
    MalformedGraph {
        /// The offending node or connection.
        subject: String,
        /// What is wrong with it.
        message: String,
    },

    /// No function is registered for a compute node's uid.
    #[error("node {node_id} references unknown node type '{uid}'")]
    UnknownNodeType {
        /// ID of the compute node.
        node_id: NodeId,
        /// The unregistered type identifier.
        uid: String,
    },

    /// The scheduler could not order every node.
    #[error("cycle detected among nodes [{}]", join_ids(.nodes))]
    Cycle {
        /// Nodes left unscheduled, in declaration order.
        nodes: Vec<NodeId>,
    },

    /// A conditional subgraph re-entered its own compilation.
    #[error("subgraph '{key}' is already being compiled ({})", .stack.join(" -> "))]
    SubgraphCycle {
        /// The subgraph key that was requested again.
        key: String,
        /// Subgraph keys on the compilation stack, outermost first.
        stack: Vec<String>,
    },

    /// The input bundle has no value for a declared input.
    #[error("input bundle has no value for '{uid}'")]
    MissingInput {
        /// The input node's uid.
        uid: String,
    },

    /// A slot's source port produced no value.
    #[error("node {node_id} slot '{slot}': {}", describe_source(.port.as_ref()))]
    MissingValue {
        /// ID of the consuming node.
        node_id: NodeId,
        /// The unresolved input slot.
        slot: String,
        /// The port the slot is wired to, `None` for an unwired declared slot.
        port: Option<PortRef>,
    },

    /// A registered node function failed.
    #[error("node {node_id} ({uid}) failed: {source}")]
    NodeExecution {
        /// ID of the failed node.
        node_id: NodeId,
        /// The node's type identifier.
        uid: String,
        /// The error the function returned.
        #[source]
        source: BoxedError,
    },

    /// A value had the wrong variant or shape.
    #[error("invalid value at node {node_id}: {message}")]
    InvalidValue {
        /// ID of the node that rejected the value.
        node_id: NodeId,
        /// Error message.
        message: String,
    },

    /// The graph definition is not valid JSON for the IR shape.
    #[error("failed to deserialize graph definition: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates a malformed-graph error about `subject`.
    pub(crate) fn malformed(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedGraph {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed-graph error about a node.
    pub(crate) fn malformed_node(id: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::malformed(format!("node '{id}'"), message)
    }

    /// Creates an invalid-value error.
    pub(crate) fn invalid_value(node_id: &NodeId, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            node_id: node_id.clone(),
            message: message.into(),
        }
    }

    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedGraph { .. } => ErrorKind::MalformedGraph,
            Self::UnknownNodeType { .. } => ErrorKind::UnknownNodeType,
            Self::Cycle { .. } | Self::SubgraphCycle { .. } => ErrorKind::Cycle,
            Self::MissingInput { .. } => ErrorKind::MissingInput,
            Self::MissingValue { .. } => ErrorKind::MissingValue,
            Self::NodeExecution { .. } => ErrorKind::NodeExecution,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::Deserialization(_) => ErrorKind::Deserialization,
        }
    }

    /// Returns whether the error was raised at compile time.
    ///
    /// Execute-time errors leave the compiled program reusable.
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedGraph
                | ErrorKind::UnknownNodeType
                | ErrorKind::Cycle
                | ErrorKind::Deserialization
        )
    }
}

fn describe_source(port: Option<&PortRef>) -> String {
    match port {
        Some(port) => format!("no value for port {port}"),
        None => "slot is not connected".to_owned(),
    }
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        let err = Error::Cycle {
            nodes: vec![NodeId::from("a"), NodeId::from("b")],
        };
        assert_eq!(err.kind(), ErrorKind::Cycle);
        assert_eq!(err.kind().as_ref(), "cycle");
        assert_eq!(err.to_string(), "cycle detected among nodes [a, b]");
        assert!(err.is_compile_time());
    }

    #[test]
    fn test_subgraph_cycle_is_cycle_kind() {
        let err = Error::SubgraphCycle {
            key: "c_true".into(),
            stack: vec!["c_true".into(), "d_false".into()],
        };
        assert_eq!(err.kind(), ErrorKind::Cycle);
        assert!(err.to_string().contains("c_true -> d_false"));
    }

    #[test]
    fn test_node_execution_keeps_source() {
        let err = Error::NodeExecution {
            node_id: NodeId::from("div"),
            uid: "divide".into(),
            source: "division by zero".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NodeExecution);
        assert!(!err.is_compile_time());
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "node div (divide) failed: division by zero");
    }

    #[test]
    fn test_missing_value_messages() {
        let wired = Error::MissingValue {
            node_id: NodeId::from("cube"),
            slot: "value".into(),
            port: Some(PortRef::with_port("split", "cube")),
        };
        assert_eq!(
            wired.to_string(),
            "node cube slot 'value': no value for port split:cube"
        );

        let unwired = Error::MissingValue {
            node_id: NodeId::from("pair"),
            slot: "right".into(),
            port: None,
        };
        assert_eq!(unwired.to_string(), "node pair slot 'right': slot is not connected");
        assert_eq!(unwired.kind(), ErrorKind::MissingValue);
    }
}
