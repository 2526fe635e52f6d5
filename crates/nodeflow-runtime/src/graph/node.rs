//! Parsed nodes and node kinds.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::NodeId;
use crate::definition::NodeDefinition;
use crate::error::{Error, Result};

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Reads one value from the input bundle.
    #[strum(serialize = "in")]
    Input,
    /// Writes one value into the output bundle.
    #[strum(serialize = "out")]
    Output,
    /// Invokes a registered node function.
    #[strum(serialize = "compute")]
    Compute,
    /// Merges two compiled subgraphs under a boolean mask.
    #[strum(serialize = "if")]
    Conditional,
    /// Authoring-time alias, removed by the optimizer.
    #[strum(serialize = "variable")]
    Variable,
}

impl NodeKind {
    /// Maps a wire `type` string to a kind.
    ///
    /// Reserved strings select structural kinds; any other non-empty string
    /// is a compute node dispatched through its uid.
    pub fn from_type(node_type: &str) -> Option<Self> {
        if node_type.is_empty() {
            return None;
        }
        Some(Self::from_str(node_type).unwrap_or(Self::Compute))
    }
}

/// Subgraph references of a conditional node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Branches {
    on_true: Option<String>,
    on_false: Option<String>,
}

/// Alias settings of a variable node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Alias {
    label: Option<String>,
    is_input: bool,
}

/// A validated node.
///
/// This is what registered node functions receive as their node descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    uid: Option<String>,
    kind: NodeKind,
    data: serde_json::Value,
    outputs: Vec<String>,
    inputs: Option<Vec<String>>,
    branches: Branches,
    alias: Alias,
}

impl Node {
    /// Parses and validates a raw node descriptor.
    pub(crate) fn from_definition(def: NodeDefinition) -> Result<Self> {
        let NodeDefinition {
            id,
            uid,
            node_type,
            data,
        } = def;

        if id.is_empty() {
            return Err(Error::malformed("node ''", "node id must not be empty"));
        }

        let kind = NodeKind::from_type(&node_type)
            .ok_or_else(|| Error::malformed_node(&id, "node type is missing"))?;

        let uid = match kind {
            NodeKind::Compute => Some(uid.ok_or_else(|| {
                Error::malformed_node(&id, format!("'{node_type}' node requires a uid"))
            })?),
            NodeKind::Input | NodeKind::Output => Some(uid.unwrap_or_else(|| id.clone())),
            NodeKind::Conditional | NodeKind::Variable => uid,
        };

        let outputs = string_list(&data, "outputs", &id)?.unwrap_or_default();
        let inputs = string_list(&data, "inputs", &id)?;

        let branches = match kind {
            NodeKind::Conditional => Branches {
                on_true: string_field(&data, "true_branch", &id)?,
                on_false: string_field(&data, "false_branch", &id)?,
            },
            _ => Branches::default(),
        };

        let alias = match kind {
            NodeKind::Variable => Alias {
                label: string_field(&data, "label", &id)?,
                is_input: bool_field(&data, "is_input", &id)?.unwrap_or(false),
            },
            _ => Alias::default(),
        };

        Ok(Self {
            id: NodeId::new(id),
            uid,
            kind,
            data,
            outputs,
            inputs,
            branches,
            alias,
        })
    }

    /// Returns the node ID.
    #[inline]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Returns the type identifier, absent for structural kinds.
    #[inline]
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    /// Returns the node kind.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns the opaque metadata.
    #[inline]
    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Returns the declared output ports, empty for single-output nodes.
    #[inline]
    pub fn output_ports(&self) -> &[String] {
        &self.outputs
    }

    /// Returns the declared input slots, if the node declares any.
    #[inline]
    pub fn input_slots(&self) -> Option<&[String]> {
        self.inputs.as_deref()
    }

    /// Returns whether `slot` may be the target of a connection.
    pub fn accepts_slot(&self, slot: &str) -> bool {
        match self.kind {
            NodeKind::Input => false,
            _ => self
                .inputs
                .as_ref()
                .is_none_or(|slots| slots.iter().any(|s| s == slot)),
        }
    }

    /// Returns the key a single, unnamed result is registered under.
    ///
    /// This is the first declared output port, or the bare node id.
    pub fn result_key(&self) -> String {
        match self.outputs.first() {
            Some(port) => format!("{}:{}", self.id, port),
            None => self.id.to_string(),
        }
    }

    /// Returns the explicit true-branch subgraph key of a conditional node.
    pub fn true_branch(&self) -> Option<&str> {
        self.branches.on_true.as_deref()
    }

    /// Returns the explicit false-branch subgraph key of a conditional node.
    pub fn false_branch(&self) -> Option<&str> {
        self.branches.on_false.as_deref()
    }

    /// Returns the alias label of a variable node.
    pub fn variable_label(&self) -> Option<&str> {
        self.alias.label.as_deref()
    }

    /// Returns whether a variable node is its group's writer.
    pub fn is_variable_writer(&self) -> bool {
        self.alias.is_input
    }

    /// Returns whether this is an input node.
    pub const fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input)
    }

    /// Returns whether this is an output node.
    pub const fn is_output(&self) -> bool {
        matches!(self.kind, NodeKind::Output)
    }

    /// Returns whether this is a variable node.
    pub const fn is_variable(&self) -> bool {
        matches!(self.kind, NodeKind::Variable)
    }

    /// Returns whether this is a conditional node.
    pub const fn is_conditional(&self) -> bool {
        matches!(self.kind, NodeKind::Conditional)
    }
}

fn string_field(data: &serde_json::Value, key: &str, id: &str) -> Result<Option<String>> {
    match data.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::malformed_node(
            id,
            format!("data.{key} must be a string, got {other}"),
        )),
    }
}

fn bool_field(data: &serde_json::Value, key: &str, id: &str) -> Result<Option<bool>> {
    match data.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(Error::malformed_node(
            id,
            format!("data.{key} must be a boolean, got {other}"),
        )),
    }
}

fn string_list(data: &serde_json::Value, key: &str, id: &str) -> Result<Option<Vec<String>>> {
    let Some(value) = data.get(key) else {
        return Ok(None);
    };

    let malformed = || Error::malformed_node(id, format!("data.{key} must be a list of strings"));
    let items = value.as_array().ok_or_else(malformed)?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_owned).ok_or_else(malformed))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}
