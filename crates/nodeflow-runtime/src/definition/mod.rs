//! Graph definition types.
//!
//! This module contains the serializable IR an authoring tool produces:
//!
//! ```json
//! { "nodes": [{ "id": "a", "uid": "a", "type": "in" }],
//!   "connections": [{ "source": "a", "target": "add", "targetInput": "x" }] }
//! ```
//!
//! Definitions are validated when they are turned into a
//! [`Graph`](crate::graph::Graph).

mod connection;
mod node;

use serde::{Deserialize, Serialize};

pub use connection::{ConnectionDefinition, ConnectionDefinitionBuilder};
pub use node::{NodeDefinition, NodeDefinitionBuilder};

use crate::error::Result;

/// Serializable graph definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    /// Node descriptors in declaration order.
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    /// Connection descriptors in declaration order.
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,
}

impl GraphDefinition {
    /// Creates an empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a definition from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the definition to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Appends a node descriptor.
    pub fn add_node(&mut self, node: NodeDefinition) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Appends a connection from `source` into `slot` of `target`.
    pub fn connect(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        slot: impl Into<String>,
    ) -> &mut Self {
        self.connections
            .push(ConnectionDefinition::new(source, target, slot));
        self
    }

    /// Appends a connection descriptor.
    pub fn add_connection(&mut self, connection: ConnectionDefinition) -> &mut Self {
        self.connections.push(connection);
        self
    }
}
