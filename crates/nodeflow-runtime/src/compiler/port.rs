//! Per-execution port value store.

use std::collections::HashMap;

use nodeflow_core::Value;

use super::TRACING_TARGET;
use crate::graph::{DEFAULT_PORT, PortRef};

/// Values produced so far during one execution, keyed by port.
///
/// Keys are `"{node}"` for a node's unnamed result and `"{node}:{port}"` for
/// named ports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortValues {
    values: HashMap<String, Value>,
}

impl PortValues {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under an exact key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all stored values in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Stores a value, replacing any earlier value under the same key.
    pub(crate) fn insert(&mut self, key: String, value: Value) {
        if self.values.contains_key(&key) {
            tracing::warn!(target: TRACING_TARGET, key = %key, "Port value overwritten");
        }
        self.values.insert(key, value);
    }

    /// Finds the value a slot wired to `port` receives.
    ///
    /// `declared` lists the output ports the producing node declares. Lookup
    /// tries, in order: the exact key, the bare node key for the `"default"`
    /// port, an entry of a record stored under the bare node key, and for an
    /// unnamed port the single stored value among the producer's ports.
    pub fn resolve(&self, port: &PortRef, declared: &[String]) -> Option<&Value> {
        if let Some(value) = self.values.get(&port.key()) {
            return Some(value);
        }

        let node = port.node.as_str();
        match port.port.as_deref() {
            Some(DEFAULT_PORT) => self.values.get(node),
            Some(name) => match self.values.get(node) {
                Some(Value::Record(record)) => record.get(name),
                _ => None,
            },
            None => self.unique_port_value(node, declared),
        }
    }

    fn unique_port_value(&self, node: &str, declared: &[String]) -> Option<&Value> {
        let prefix = format!("{node}:");
        let mut found = self.values.iter().filter(|(key, _)| {
            key.strip_prefix(&prefix).is_some_and(|port| {
                declared.is_empty() || declared.iter().any(|name| name == port)
            })
        });

        match (found.next(), found.next()) {
            (Some((_, value)), None) => Some(value),
            _ => None,
        }
    }
}
