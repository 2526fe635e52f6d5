//! Node descriptors as authored.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A raw node descriptor.
///
/// The `type` string selects the node kind: `in`, `out`, `if`, `variable`,
/// and `compute` or any other non-empty string for compute nodes dispatched
/// through `uid`. Everything else a node needs lives in the opaque `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    name = "NodeDefinitionBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct NodeDefinition {
    /// Identifier, unique within the graph.
    pub id: String,
    /// Type identifier keying the node function registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub uid: Option<String>,
    /// Node type string.
    #[serde(rename = "type", default)]
    pub node_type: String,
    /// Opaque metadata: declared ports, variable labels, branch references.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    #[builder(default)]
    pub data: serde_json::Value,
}

impl NodeDefinitionBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.id.as_deref().is_none_or(str::is_empty) {
            return Err("id is required".into());
        }
        if self.node_type.as_deref().is_none_or(str::is_empty) {
            return Err("node_type is required".into());
        }
        Ok(())
    }
}

impl NodeDefinition {
    /// Creates a node descriptor with the given id and type string.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uid: None,
            node_type: node_type.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Returns a builder for creating a node descriptor.
    pub fn builder() -> NodeDefinitionBuilder {
        NodeDefinitionBuilder::default()
    }

    /// Creates an input node reading `uid` from the input bundle.
    pub fn input(id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::new(id, "in").with_uid(uid)
    }

    /// Creates an output node writing `uid` into the output bundle.
    pub fn output(id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::new(id, "out").with_uid(uid)
    }

    /// Creates a compute node dispatched to the function registered as `uid`.
    pub fn compute(id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::new(id, "compute").with_uid(uid)
    }

    /// Creates a conditional node using the conventional branch keys.
    pub fn conditional(id: impl Into<String>) -> Self {
        Self::new(id, "if")
    }

    /// Creates a variable alias node; `is_input` marks the writer.
    pub fn variable(id: impl Into<String>, label: impl Into<String>, is_input: bool) -> Self {
        Self::new(id, "variable").with_data(json!({
            "label": label.into(),
            "is_input": is_input,
        }))
    }

    /// Sets the type identifier.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Replaces the metadata.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Sets one metadata field, turning `data` into an object if needed.
    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        if !self.data.is_object() {
            self.data = json!({});
        }
        if let Some(map) = self.data.as_object_mut() {
            map.insert(key.to_owned(), value);
        }
        self
    }

    /// Declares the node's output ports.
    pub fn with_outputs<I, S>(self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ports: Vec<String> = ports.into_iter().map(Into::into).collect();
        self.with_field("outputs", json!(ports))
    }

    /// Declares the node's input slots.
    pub fn with_inputs<I, S>(self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots: Vec<String> = slots.into_iter().map(Into::into).collect();
        self.with_field("inputs", json!(slots))
    }

    /// Sets the subgraph keys a conditional node branches to.
    pub fn with_branches(self, on_true: impl Into<String>, on_false: impl Into<String>) -> Self {
        self.with_field("true_branch", json!(on_true.into()))
            .with_field("false_branch", json!(on_false.into()))
    }
}
