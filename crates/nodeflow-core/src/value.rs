//! Values carried along graph wires.

use std::collections::BTreeMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::tensor::{Mask, Tensor};

/// A value produced by a node or supplied as a graph input.
///
/// Scalars and plain sequences are accepted at the graph boundary and are
/// coerced into [`Tensor`]s by input nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum Value {
    /// A single number.
    Scalar(f64),
    /// A flat list of numbers.
    Sequence(Vec<f64>),
    /// A shaped numeric tensor.
    Tensor(Tensor),
    /// A shaped boolean mask.
    Mask(Mask),
    /// Named values, as produced by multi-slot output nodes.
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the variant name, for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Sequence(_) => "sequence",
            Value::Tensor(_) => "tensor",
            Value::Mask(_) => "mask",
            Value::Record(_) => "record",
        }
    }

    /// Returns the value as a tensor if it is numeric.
    pub fn to_tensor(&self) -> Option<Tensor> {
        match self {
            Value::Scalar(x) => Some(Tensor::scalar(*x)),
            Value::Sequence(xs) => Some(Tensor::from_vec(xs.clone())),
            Value::Tensor(t) => Some(t.clone()),
            Value::Mask(_) | Value::Record(_) => None,
        }
    }

    /// Converts scalars and sequences into tensors, leaving other values as-is.
    pub fn into_tensor_value(self) -> Value {
        match self {
            Value::Scalar(x) => Value::Tensor(Tensor::scalar(x)),
            Value::Sequence(xs) => Value::Tensor(Tensor::from_vec(xs)),
            other => other,
        }
    }

    /// Returns the tensor, if this is one.
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the mask, if this is one.
    pub fn as_mask(&self) -> Option<&Mask> {
        match self {
            Value::Mask(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the record, if this is one.
    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Mask(Mask::scalar(value))
    }
}

impl From<Vec<bool>> for Value {
    fn from(data: Vec<bool>) -> Self {
        Value::Mask(Mask::from_vec(data))
    }
}
