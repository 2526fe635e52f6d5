//! Port references and wire-string parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Name of the implicit port of single-output nodes.
pub const DEFAULT_PORT: &str = "default";

/// Names one output of a node.
///
/// A `None` port is the node's default output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    /// The producing node.
    pub node: NodeId,
    /// The named output port, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl PortRef {
    /// Creates a reference to a node's default port.
    pub fn new(node: impl Into<NodeId>) -> Self {
        Self {
            node: node.into(),
            port: None,
        }
    }

    /// Creates a reference to a named port.
    pub fn with_port(node: impl Into<NodeId>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: Some(port.into()),
        }
    }

    /// Splits a wire string.
    ///
    /// `"node"` names the default port and `"node:port"` a named one; only the
    /// first `:` separates the two.
    pub fn parse(wire: &str) -> Self {
        match wire.split_once(':') {
            Some((node, port)) => Self::with_port(node, port),
            None => Self::new(wire),
        }
    }

    /// Returns the key this port's value is stored under at execution time.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port {
            Some(port) => write!(f, "{}:{}", self.node, port),
            None => write!(f, "{}", self.node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_node() {
        let port = PortRef::parse("add");
        assert_eq!(port.node.as_str(), "add");
        assert_eq!(port.port, None);
        assert_eq!(port.key(), "add");
    }

    #[test]
    fn test_parse_named_port() {
        let port = PortRef::parse("split:double");
        assert_eq!(port, PortRef::with_port("split", "double"));
        assert_eq!(port.key(), "split:double");
    }

    #[test]
    fn test_parse_splits_on_first_colon() {
        let port = PortRef::parse("a:b:c");
        assert_eq!(port.node.as_str(), "a");
        assert_eq!(port.port.as_deref(), Some("b:c"));
    }
}
