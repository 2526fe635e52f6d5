//! Validated graph representation.

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};

use super::{Node, NodeId, PortRef, TRACING_TARGET};
use crate::definition::{ConnectionDefinition, GraphDefinition, NodeDefinition};
use crate::error::{Error, Result};
use crate::scheduler::{self, Schedule};

/// Edge weight: which source port feeds which target slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Wire {
    /// Named source port, `None` for the default output.
    pub source_port: Option<String>,
    /// Input slot on the target node.
    pub target_slot: String,
    /// Insertion counter, stable across edge removals.
    pub order: usize,
}

/// A connection between a source port and a target slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Connection {
    /// The producing port.
    pub source: PortRef,
    /// The consuming node.
    pub target: NodeId,
    /// The input slot on the consuming node.
    pub slot: String,
}

/// A validated node graph.
///
/// Internally uses petgraph's `StableDiGraph` so that optimizer passes can
/// remove nodes and wires without invalidating the remaining indices. Node
/// indices follow declaration order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// The underlying directed graph.
    graph: StableDiGraph<Node, Wire>,
    /// Mapping from node id to petgraph's node index.
    node_indices: HashMap<NodeId, NodeIndex>,
    /// Next wire insertion counter.
    next_order: usize,
}

impl Graph {
    /// Builds a graph from raw node and connection descriptors.
    pub fn build<N, C>(nodes: N, connections: C) -> Result<Self>
    where
        N: IntoIterator<Item = NodeDefinition>,
        C: IntoIterator<Item = ConnectionDefinition>,
    {
        let mut graph = Self::default();

        for def in nodes {
            let node = Node::from_definition(def)?;
            if graph.node_indices.contains_key(node.id()) {
                return Err(Error::malformed_node(node.id(), "duplicate node id"));
            }
            let id = node.id().clone();
            let index = graph.graph.add_node(node);
            graph.node_indices.insert(id, index);
        }

        for def in connections {
            graph.add_connection(&def)?;
        }

        for node in graph.nodes().filter(|n| n.is_conditional()) {
            if !graph.has_slot(node.id(), "cond") {
                return Err(Error::malformed_node(
                    node.id(),
                    "conditional node requires a 'cond' connection",
                ));
            }
        }

        tracing::debug!(
            target: TRACING_TARGET,
            nodes = graph.node_count(),
            connections = graph.edge_count(),
            "Graph built"
        );

        Ok(graph)
    }

    /// Builds a graph from a parsed graph definition.
    pub fn from_definition(def: GraphDefinition) -> Result<Self> {
        Self::build(def.nodes, def.connections)
    }

    /// Parses and builds a graph from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_definition(GraphDefinition::from_json(json)?)
    }

    fn add_connection(&mut self, def: &ConnectionDefinition) -> Result<()> {
        let subject = def.describe();

        let mut source = PortRef::parse(&def.source);
        if source.port.is_none() {
            source.port = def.source_output.clone();
        }

        let target = PortRef::parse(&def.target);
        let slot = def
            .target_input
            .clone()
            .or(target.port)
            .ok_or_else(|| Error::malformed(&subject, "connection has no target slot"))?;

        let target_index = self.index_of(&target.node).ok_or_else(|| {
            Error::malformed(&subject, format!("target node '{}' does not exist", target.node))
        })?;
        let target_node = &self.graph[target_index];
        if target_node.is_input() {
            return Err(Error::malformed(&subject, "input nodes accept no connections"));
        }
        if !target_node.accepts_slot(&slot) {
            return Err(Error::malformed(
                &subject,
                format!("slot '{slot}' is not declared on node '{}'", target.node),
            ));
        }

        let Some(source_index) = self.index_of(&source.node) else {
            tracing::warn!(
                target: TRACING_TARGET,
                source = %source,
                target = %target.node,
                "Dropping connection from unknown source node"
            );
            return Ok(());
        };
        if self.graph[source_index].is_output() {
            return Err(Error::malformed(
                &subject,
                "output nodes have no outgoing connections",
            ));
        }

        self.add_wire(source_index, target_index, source.port, slot);
        Ok(())
    }

    /// Wires a source port into a target slot.
    ///
    /// A slot holds one source; a previous wire into the same slot is replaced
    /// and its source returned. Replacing a wire that came from a variable
    /// node is the normal elision rewrite and is not reported.
    pub(crate) fn add_wire(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        source_port: Option<String>,
        target_slot: String,
    ) -> Option<NodeIndex> {
        let existing = self
            .graph
            .edges_directed(target, Direction::Incoming)
            .find(|edge| edge.weight().target_slot == target_slot)
            .map(|edge| (edge.id(), edge.source()));

        if let Some((edge, previous)) = existing {
            if !self.graph[previous].is_variable() {
                tracing::warn!(
                    target: TRACING_TARGET,
                    node = %self.graph[target].id(),
                    slot = %target_slot,
                    "Slot already wired, replacing previous source"
                );
            }
            self.graph.remove_edge(edge);
        }

        let wire = Wire {
            source_port,
            target_slot,
            order: self.next_order,
        };
        self.next_order += 1;
        self.graph.add_edge(source, target, wire);
        existing.map(|(_, previous)| previous)
    }

    /// Removes a node and every wire touching it.
    pub(crate) fn remove_node(&mut self, index: NodeIndex) -> Option<Node> {
        let node = self.graph.remove_node(index)?;
        self.node_indices.remove(node.id());
        Some(node)
    }

    /// Returns the wires entering a node as `(source, wire)`, in insertion order.
    pub(crate) fn incoming(&self, index: NodeIndex) -> Vec<(NodeIndex, Wire)> {
        self.wires(index, Direction::Incoming)
    }

    /// Returns the wires leaving a node as `(target, wire)`, in insertion order.
    pub(crate) fn outgoing(&self, index: NodeIndex) -> Vec<(NodeIndex, Wire)> {
        self.wires(index, Direction::Outgoing)
    }

    fn wires(&self, index: NodeIndex, direction: Direction) -> Vec<(NodeIndex, Wire)> {
        let mut wires: Vec<_> = self
            .graph
            .edges_directed(index, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (other, edge.weight().clone())
            })
            .collect();
        wires.sort_by_key(|(_, wire)| wire.order);
        wires
    }

    /// Returns the underlying petgraph graph.
    pub(crate) fn inner(&self) -> &StableDiGraph<Node, Wire> {
        &self.graph
    }

    /// Returns the index of a node.
    pub(crate) fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_indices.get(id).copied()
    }

    /// Returns the node indices in declaration order.
    pub(crate) fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Checks the invariants the compiler relies on.
    ///
    /// Holds after optimization: no variable node survives, every conditional
    /// has its mask wired, and every output node has a source.
    pub(crate) fn validate_lowered(&self) -> Result<()> {
        for node in self.nodes() {
            if node.is_variable() {
                return Err(Error::malformed_node(
                    node.id(),
                    "variable node was not eliminated",
                ));
            }
            if node.is_conditional() && !self.has_slot(node.id(), "cond") {
                return Err(Error::malformed_node(
                    node.id(),
                    "conditional node requires a 'cond' connection",
                ));
            }
            if node.is_output() && self.inputs_of(node.id()).is_empty() {
                return Err(Error::malformed_node(
                    node.id(),
                    "output node has no connected slot",
                ));
            }
        }
        Ok(())
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of connections.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns whether a node exists.
    pub fn contains_node(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Returns a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        let index = self.index_of(id)?;
        self.graph.node_weight(index)
    }

    /// Returns all nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns all connections in insertion order.
    pub fn connections(&self) -> Vec<Connection> {
        let mut edges: Vec<_> = self.graph.edge_references().collect();
        edges.sort_by_key(|edge| edge.weight().order);
        edges
            .into_iter()
            .map(|edge| {
                let wire = edge.weight();
                Connection {
                    source: PortRef {
                        node: self.graph[edge.source()].id().clone(),
                        port: wire.source_port.clone(),
                    },
                    target: self.graph[edge.target()].id().clone(),
                    slot: wire.target_slot.clone(),
                }
            })
            .collect()
    }

    /// Returns the source port of every wired slot of a node.
    pub fn inputs_of(&self, id: &str) -> BTreeMap<String, PortRef> {
        let Some(index) = self.index_of(id) else {
            return BTreeMap::new();
        };

        self.incoming(index)
            .into_iter()
            .map(|(source, wire)| {
                let port = PortRef {
                    node: self.graph[source].id().clone(),
                    port: wire.source_port,
                };
                (wire.target_slot, port)
            })
            .collect()
    }

    /// Returns the consumers of every used output port of a node.
    ///
    /// Unnamed ports are reported as `"default"`.
    pub fn outputs_of(&self, id: &str) -> BTreeMap<String, Vec<NodeId>> {
        let mut outputs: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        let Some(index) = self.index_of(id) else {
            return outputs;
        };

        for (target, wire) in self.outgoing(index) {
            let port = wire
                .source_port
                .unwrap_or_else(|| super::DEFAULT_PORT.to_owned());
            let target = self.graph[target].id().clone();
            let targets = outputs.entry(port).or_default();
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        outputs
    }

    fn has_slot(&self, id: &str, slot: &str) -> bool {
        self.index_of(id).is_some_and(|index| {
            self.graph
                .edges_directed(index, Direction::Incoming)
                .any(|edge| edge.weight().target_slot == slot)
        })
    }

    /// Returns the uids of the input nodes, in declaration order.
    pub fn input_uids(&self) -> Vec<String> {
        self.nodes()
            .filter(|n| n.is_input())
            .filter_map(|n| n.uid().map(str::to_owned))
            .collect()
    }

    /// Returns the uids of the output nodes, in declaration order.
    pub fn output_uids(&self) -> Vec<String> {
        self.nodes()
            .filter(|n| n.is_output())
            .filter_map(|n| n.uid().map(str::to_owned))
            .collect()
    }

    /// Orders the nodes topologically.
    pub fn schedule(&self) -> Result<Schedule> {
        scheduler::schedule(self)
    }

    /// Returns the nodes in schedule order.
    pub fn iter(&self) -> Result<impl Iterator<Item = &Node> + '_> {
        let schedule = self.schedule()?;
        Ok(schedule.into_iter().filter_map(move |id| self.node(&id)))
    }
}
