//! Node function registry.
//!
//! Compute nodes carry no arithmetic of their own. Their `uid` names a
//! [`NodeFunction`] registered here, which the compiler binds once per node at
//! compile time.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use derive_more::From;
use nodeflow_core::{BoxedError, Tensor, Value};

use crate::compiler::PortValues;
use crate::error::{Error, Result};
use crate::graph::Node;

/// Resolved input slots handed to a node function.
pub type NodeInputs = BTreeMap<String, Value>;

/// What a node function returns.
#[derive(Debug, Clone, PartialEq, From)]
pub enum NodeOutput {
    /// A single value, registered under the node's first declared port.
    Value(Value),
    /// Named values, each registered as `{node_id}:{name}`.
    Ports(BTreeMap<String, Value>),
}

impl From<Tensor> for NodeOutput {
    fn from(tensor: Tensor) -> Self {
        Self::Value(Value::Tensor(tensor))
    }
}

impl From<f64> for NodeOutput {
    fn from(value: f64) -> Self {
        Self::Value(Value::Scalar(value))
    }
}

/// A computation bound to a node type.
///
/// Implementations must be safe to call from several executions at once.
pub trait NodeFunction: Send + Sync {
    /// Computes the node's result.
    ///
    /// `context` holds every port value produced so far in this execution.
    fn invoke(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        context: &PortValues,
    ) -> Result<NodeOutput, BoxedError>;
}

impl<F> NodeFunction for F
where
    F: Fn(&Node, &NodeInputs, &PortValues) -> Result<NodeOutput, BoxedError> + Send + Sync,
{
    fn invoke(
        &self,
        node: &Node,
        inputs: &NodeInputs,
        context: &PortValues,
    ) -> Result<NodeOutput, BoxedError> {
        self(node, inputs, context)
    }
}

/// Maps node type identifiers to their functions.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    functions: HashMap<String, Arc<dyn NodeFunction>>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure under `uid`, replacing any previous entry.
    pub fn register<F>(&mut self, uid: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&Node, &NodeInputs, &PortValues) -> Result<NodeOutput, BoxedError>
            + Send
            + Sync
            + 'static,
    {
        self.register_function(uid, Arc::new(function))
    }

    /// Registers a shared function under `uid`, replacing any previous entry.
    pub fn register_function(
        &mut self,
        uid: impl Into<String>,
        function: Arc<dyn NodeFunction>,
    ) -> &mut Self {
        self.functions.insert(uid.into(), function);
        self
    }

    /// Returns whether a function is registered under `uid`.
    pub fn contains(&self, uid: &str) -> bool {
        self.functions.contains_key(uid)
    }

    /// Returns the function registered under `uid`.
    pub fn get(&self, uid: &str) -> Option<Arc<dyn NodeFunction>> {
        self.functions.get(uid).cloned()
    }

    /// Returns the function a compute node dispatches to.
    pub(crate) fn resolve(&self, node: &Node) -> Result<Arc<dyn NodeFunction>> {
        let uid = node.uid().unwrap_or_default();
        self.get(uid).ok_or_else(|| Error::UnknownNodeType {
            node_id: node.id().clone(),
            uid: uid.to_owned(),
        })
    }

    /// Returns the number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns whether no function is registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut uids: Vec<_> = self.functions.keys().collect();
        uids.sort();
        f.debug_struct("NodeRegistry").field("uids", &uids).finish()
    }
}
