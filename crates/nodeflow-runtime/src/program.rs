//! Executable programs.

use std::collections::HashMap;
use std::fmt;

use nodeflow_core::Value;

use crate::compiler::{Operation, PortValues, ProgressFn};
use crate::error::Result;
use crate::graph::NodeId;

/// Tracing target for program execution.
pub const TRACING_TARGET: &str = "nodeflow_runtime::program";

/// Values keyed by input or output uid.
pub type Bundle = HashMap<String, Value>;

/// State of one execution.
pub(crate) struct Frame<'a> {
    /// The caller's input bundle.
    pub inputs: &'a Bundle,
    /// Port values produced so far.
    pub values: PortValues,
    /// Values written by output nodes.
    pub outputs: Bundle,
}

/// A compiled graph, ready to run.
///
/// Programs are immutable. Each [`execute`](Self::execute) call allocates its
/// own port values, so one program can run any number of times, including
/// from several threads at once.
pub struct CompiledProgram {
    operations: Vec<Operation>,
    input_uids: Vec<String>,
    output_uids: Vec<String>,
    progress: Option<ProgressFn>,
}

impl CompiledProgram {
    pub(crate) fn new(
        operations: Vec<Operation>,
        input_uids: Vec<String>,
        output_uids: Vec<String>,
    ) -> Self {
        Self {
            operations,
            input_uids,
            output_uids,
            progress: None,
        }
    }

    pub(crate) fn with_progress(mut self, progress: Option<ProgressFn>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the uids the input bundle is expected to provide.
    pub fn input_uids(&self) -> &[String] {
        &self.input_uids
    }

    /// Returns the uids present in the output bundle.
    pub fn output_uids(&self) -> &[String] {
        &self.output_uids
    }

    /// Returns the number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns whether the program has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the node ids in execution order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.operations.iter().map(Operation::node_id)
    }

    /// Runs the program against an input bundle.
    ///
    /// Either every operation succeeds and the full output bundle is returned,
    /// or the first failure is returned and the partial results are dropped.
    pub fn execute(&self, inputs: &Bundle) -> Result<Bundle> {
        let mut frame = Frame {
            inputs,
            values: PortValues::new(),
            outputs: Bundle::with_capacity(self.output_uids.len()),
        };

        let total = self.operations.len();
        for (index, operation) in self.operations.iter().enumerate() {
            if let Some(progress) = &self.progress {
                progress((index + 1) as f64 / total as f64, operation.node_id());
            }

            tracing::trace!(
                target: TRACING_TARGET,
                node = %operation.node_id(),
                step = index + 1,
                total,
                "Executing operation"
            );
            operation.execute(&mut frame)?;
        }

        Ok(frame.outputs)
    }
}

impl fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("operations", &self.node_ids().collect::<Vec<_>>())
            .field("input_uids", &self.input_uids)
            .field("output_uids", &self.output_uids)
            .finish_non_exhaustive()
    }
}
