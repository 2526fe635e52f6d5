//! Compiled operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use nodeflow_core::Value;

use super::conditional::ConditionalOp;
use super::port::PortValues;
use crate::error::{Error, Result};
use crate::graph::{Graph, Node, NodeId, PortRef};
use crate::program::Frame;
use crate::registry::{NodeFunction, NodeInputs, NodeOutput};

/// An input slot and the port that feeds it.
#[derive(Debug, Clone)]
pub(crate) struct SlotBinding {
    pub slot: String,
    /// `None` for a declared slot nothing is wired into.
    pub source: Option<PortRef>,
    /// Output ports declared by the source node.
    pub declared: Vec<String>,
}

impl SlotBinding {
    /// Binds the slots of a node, ordered by slot name.
    ///
    /// Every wired slot is bound. A node that declares its input slots also
    /// gets an unsourced binding for each declared slot left unwired, which
    /// fails to resolve at execution time.
    pub fn bind_all(graph: &Graph, node: &Node) -> Vec<Self> {
        let wired = graph.inputs_of(node.id());
        let declared_slots = node.input_slots().unwrap_or_default();

        let mut bindings: Vec<Self> = declared_slots
            .iter()
            .filter(|slot| !wired.contains_key(slot.as_str()))
            .map(|slot| Self {
                slot: slot.clone(),
                source: None,
                declared: Vec::new(),
            })
            .collect();

        bindings.extend(wired.into_iter().map(|(slot, source)| {
            let declared = graph
                .node(&source.node)
                .map(|n| n.output_ports().to_vec())
                .unwrap_or_default();
            Self {
                slot,
                source: Some(source),
                declared,
            }
        }));

        bindings.sort_by(|a, b| a.slot.cmp(&b.slot));
        bindings
    }

    /// Looks up the slot's value among the values produced so far.
    pub fn resolve(&self, node_id: &NodeId, values: &PortValues) -> Result<Value> {
        self.source
            .as_ref()
            .and_then(|source| values.resolve(source, &self.declared))
            .cloned()
            .ok_or_else(|| Error::MissingValue {
                node_id: node_id.clone(),
                slot: self.slot.clone(),
                port: self.source.clone(),
            })
    }
}

/// What one scheduled node does at execution time.
pub(crate) enum OperationKind {
    Input {
        uid: String,
        key: String,
    },
    Output {
        uid: String,
        slots: Vec<SlotBinding>,
    },
    Compute {
        uid: String,
        function: Arc<dyn NodeFunction>,
        slots: Vec<SlotBinding>,
    },
    Conditional(ConditionalOp),
}

/// One compiled node.
pub(crate) struct Operation {
    node: Node,
    kind: OperationKind,
}

impl Operation {
    pub fn new(node: Node, kind: OperationKind) -> Self {
        Self { node, kind }
    }

    /// Returns the id of the node this operation was lowered from.
    pub fn node_id(&self) -> &NodeId {
        self.node.id()
    }

    /// Runs the operation, writing its results into the frame.
    pub fn execute(&self, frame: &mut Frame<'_>) -> Result<()> {
        let node = &self.node;
        match &self.kind {
            OperationKind::Input { uid, key } => {
                let value = frame
                    .inputs
                    .get(uid)
                    .cloned()
                    .ok_or_else(|| Error::MissingInput { uid: uid.clone() })?;
                frame.values.insert(key.clone(), value.into_tensor_value());
            }

            OperationKind::Output { uid, slots } => {
                let value = match slots.as_slice() {
                    [slot] => slot.resolve(node.id(), &frame.values)?,
                    slots => {
                        let record = slots
                            .iter()
                            .map(|slot| {
                                let value = slot.resolve(node.id(), &frame.values)?;
                                Ok((slot.slot.clone(), value))
                            })
                            .collect::<Result<BTreeMap<_, _>>>()?;
                        Value::Record(record)
                    }
                };
                frame.outputs.insert(uid.clone(), value);
            }

            OperationKind::Compute {
                uid,
                function,
                slots,
            } => {
                let inputs = slots
                    .iter()
                    .map(|slot| {
                        let value = slot.resolve(node.id(), &frame.values)?;
                        Ok((slot.slot.clone(), value))
                    })
                    .collect::<Result<NodeInputs>>()?;

                let output = function
                    .invoke(node, &inputs, &frame.values)
                    .map_err(|source| Error::NodeExecution {
                        node_id: node.id().clone(),
                        uid: uid.clone(),
                        source,
                    })?;

                match output {
                    NodeOutput::Value(value) => frame.values.insert(node.result_key(), value),
                    NodeOutput::Ports(ports) => {
                        for (port, value) in ports {
                            frame.values.insert(format!("{}:{port}", node.id()), value);
                        }
                    }
                }
            }

            OperationKind::Conditional(op) => op.execute(node, frame)?,
        }
        Ok(())
    }
}
