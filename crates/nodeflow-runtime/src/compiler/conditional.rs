//! Conditional branch lowering.
//!
//! A conditional node owns two compiled subgraphs. At execution time the
//! `cond` mask decides, per element, which branch result is kept:
//!
//! - the true branch runs when any element is set, with every numeric port
//!   value blanked (`no_data`) where the mask is unset;
//! - the false branch runs when any element is unset, with every numeric port
//!   value filled (`false_fill`) where the mask is set;
//! - a branch that did not run contributes zeros shaped like the mask.

use std::collections::HashMap;
use std::sync::Arc;

use nodeflow_core::{Mask, ShapeError, Tensor, Value};

use super::{CompilerConfig, TRACING_TARGET};
use super::operation::SlotBinding;
use crate::error::{Error, Result};
use crate::graph::{Graph, Node};
use crate::program::{Bundle, CompiledProgram, Frame};

/// Graphs referenced by conditional nodes, keyed by subgraph name.
#[derive(Debug, Clone, Default)]
pub struct Subgraphs {
    graphs: HashMap<String, Graph>,
}

impl Subgraphs {
    /// Creates an empty subgraph supply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subgraph, replacing any previous one under the same key.
    pub fn insert(&mut self, key: impl Into<String>, graph: Graph) -> &mut Self {
        self.graphs.insert(key.into(), graph);
        self
    }

    /// Returns the subgraph stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Graph> {
        self.graphs.get(key)
    }

    /// Returns whether a subgraph is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.graphs.contains_key(key)
    }

    /// Returns the number of subgraphs.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Returns whether no subgraph is supplied.
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Graph)> for Subgraphs {
    fn from_iter<I: IntoIterator<Item = (K, Graph)>>(iter: I) -> Self {
        Self {
            graphs: iter.into_iter().map(|(k, g)| (k.into(), g)).collect(),
        }
    }
}

/// A lowered conditional node.
pub(crate) struct ConditionalOp {
    pub cond: SlotBinding,
    /// Wired slots besides `cond`, forwarded to both branches.
    pub extra: Vec<SlotBinding>,
    pub on_true: Arc<CompiledProgram>,
    pub on_false: Arc<CompiledProgram>,
    pub no_data: f64,
    pub false_fill: f64,
}

impl ConditionalOp {
    pub fn execute(&self, node: &Node, frame: &mut Frame<'_>) -> Result<()> {
        let mask = match self.cond.resolve(node.id(), &frame.values)? {
            Value::Mask(mask) => mask,
            other => {
                return Err(Error::invalid_value(
                    node.id(),
                    format!("'cond' must be a mask, got {}", other.type_name()),
                ));
            }
        };

        let mut bundle: Bundle = frame
            .values
            .iter()
            .map(|(key, value)| (key.to_owned(), value.clone()))
            .collect();
        for slot in &self.extra {
            bundle.insert(slot.slot.clone(), slot.resolve(node.id(), &frame.values)?);
        }

        let on_true = if mask.any() {
            let inputs = masked(&bundle, &mask.not(), self.no_data);
            Some(run_branch(node, &self.on_true, &inputs)?)
        } else {
            None
        };

        let on_false = if mask.all() {
            None
        } else {
            let inputs = masked(&bundle, &mask, self.false_fill);
            Some(run_branch(node, &self.on_false, &inputs)?)
        };

        tracing::trace!(
            target: TRACING_TARGET,
            node = %node.id(),
            true_branch = on_true.is_some(),
            false_branch = on_false.is_some(),
            "Conditional evaluated"
        );

        let shape_error = |err: ShapeError| Error::invalid_value(node.id(), err.to_string());
        let branch_or_zeros = |result: Option<Tensor>| match result {
            Some(tensor) => Ok(tensor),
            None => Tensor::zeros(mask.shape()).map_err(shape_error),
        };
        let merged = Tensor::select(
            &mask,
            &branch_or_zeros(on_true)?,
            &branch_or_zeros(on_false)?,
        )
        .map_err(shape_error)?;

        frame.values.insert(node.result_key(), Value::Tensor(merged));
        Ok(())
    }
}

/// Copies a bundle, filling numeric values with `fill` where `mask` is set.
///
/// Masks, records and values whose shape does not broadcast against the mask
/// pass through as-is.
fn masked(bundle: &Bundle, mask: &Mask, fill: f64) -> Bundle {
    bundle
        .iter()
        .map(|(key, value)| {
            let value = value
                .to_tensor()
                .and_then(|tensor| tensor.fill_where(mask, fill).ok())
                .map_or_else(|| value.clone(), Value::Tensor);
            (key.clone(), value)
        })
        .collect()
}

fn run_branch(node: &Node, program: &CompiledProgram, inputs: &Bundle) -> Result<Tensor> {
    let mut outputs = program.execute(inputs)?;
    let value = program
        .output_uids()
        .first()
        .and_then(|uid| outputs.remove(uid))
        .ok_or_else(|| Error::invalid_value(node.id(), "branch produced no output"))?;

    value.to_tensor().ok_or_else(|| {
        Error::invalid_value(
            node.id(),
            format!("branch result must be numeric, got {}", value.type_name()),
        )
    })
}

/// Returns the subgraph keys a conditional node refers to.
///
/// Keys named in the node's data win over the suffix convention.
pub(crate) fn branch_keys(node: &Node, config: &CompilerConfig) -> (String, String) {
    let on_true = node
        .true_branch()
        .map_or_else(|| config.true_branch_key(node.id()), str::to_owned);
    let on_false = node
        .false_branch()
        .map_or_else(|| config.false_branch_key(node.id()), str::to_owned);
    (on_true, on_false)
}
