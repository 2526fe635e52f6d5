//! Compiler configuration.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for graph compilation and conditional lowering.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(
    pattern = "owned",
    setter(into, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
#[serde(default)]
pub struct CompilerConfig {
    /// Suffix appended to a conditional node's id to find its true branch.
    #[builder(default = "\"_true\".to_owned()")]
    pub true_suffix: String,

    /// Suffix appended to a conditional node's id to find its false branch.
    #[builder(default = "\"_false\".to_owned()")]
    pub false_suffix: String,

    /// Fill for true-branch elements where the mask is unset.
    #[builder(default = "f64::NAN")]
    #[serde(with = "nan_as_null")]
    pub no_data: f64,

    /// Fill for false-branch elements where the mask is set.
    #[builder(default = "0.0")]
    pub false_fill: f64,

    /// Maximum nesting depth of conditional subgraphs.
    #[builder(default = "32")]
    pub max_subgraph_depth: usize,
}

impl CompilerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_subgraph_depth == Some(0) {
            return Err("max_subgraph_depth must be at least 1".into());
        }
        let true_suffix = self.true_suffix.as_deref().unwrap_or("_true");
        let false_suffix = self.false_suffix.as_deref().unwrap_or("_false");
        if true_suffix == false_suffix {
            return Err("true_suffix and false_suffix must differ".into());
        }
        Ok(())
    }
}

impl CompilerConfig {
    /// Returns a builder for creating a configuration.
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::default()
    }

    /// Returns the conventional true-branch key for a conditional node.
    pub fn true_branch_key(&self, node_id: &str) -> String {
        format!("{node_id}{}", self.true_suffix)
    }

    /// Returns the conventional false-branch key for a conditional node.
    pub fn false_branch_key(&self, node_id: &str) -> String {
        format!("{node_id}{}", self.false_suffix)
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            true_suffix: "_true".to_owned(),
            false_suffix: "_false".to_owned(),
            no_data: f64::NAN,
            false_fill: 0.0,
            max_subgraph_depth: 32,
        }
    }
}

/// JSON has no NaN, so the sentinel travels as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
