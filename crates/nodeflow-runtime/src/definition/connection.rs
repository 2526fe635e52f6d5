//! Connection descriptors as authored.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// A raw connection descriptor.
///
/// `source` and `target` hold `"<node_id>"` or `"<node_id>:<port>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Builder)]
#[builder(
    name = "ConnectionDefinitionBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDefinition {
    /// Source wire string.
    pub source: String,
    /// Target wire string.
    pub target: String,
    /// Input slot on the target node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub target_input: Option<String>,
    /// Output port on the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub source_output: Option<String>,
}

impl ConnectionDefinitionBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.source.is_none() {
            return Err("source is required".into());
        }
        if self.target.is_none() {
            return Err("target is required".into());
        }
        Ok(())
    }
}

impl ConnectionDefinition {
    /// Creates a connection from `source` into `slot` of `target`.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        slot: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            target_input: Some(slot.into()),
            source_output: None,
        }
    }

    /// Returns a builder for creating a connection descriptor.
    pub fn builder() -> ConnectionDefinitionBuilder {
        ConnectionDefinitionBuilder::default()
    }

    /// Sets the source output port.
    pub fn with_source_output(mut self, port: impl Into<String>) -> Self {
        self.source_output = Some(port.into());
        self
    }

    /// Returns a short `source -> target` description for diagnostics.
    pub fn describe(&self) -> String {
        format!("connection '{}' -> '{}'", self.source, self.target)
    }
}
