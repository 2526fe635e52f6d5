//! Variable elision.

use std::collections::HashMap;

use petgraph::stable_graph::NodeIndex;

use super::TRACING_TARGET;
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Outcome of the variable elision pass.
#[derive(Debug, Default)]
pub(super) struct Elision {
    pub variables_removed: usize,
    pub edges_synthesized: usize,
    /// Synthesized wires that displaced another non-variable source.
    pub slots_collapsed: usize,
}

/// Variable nodes sharing one label.
#[derive(Debug, Default)]
struct Group {
    writers: Vec<NodeIndex>,
    readers: Vec<NodeIndex>,
}

/// Replaces every variable group with direct wires.
///
/// Each wire feeding the writer is combined with each wire leaving a reader,
/// producing `writer source port -> reader target slot`. Afterwards every
/// variable node is removed, whether or not its group produced wires.
pub(super) fn elide_variables(graph: &mut Graph) -> Result<Elision> {
    let mut labels: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();
    let mut variables = Vec::new();

    for index in graph.indices() {
        let node = &graph.inner()[index];
        if !node.is_variable() {
            continue;
        }
        variables.push(index);

        let Some(label) = node.variable_label() else {
            tracing::warn!(
                target: TRACING_TARGET,
                node = %node.id(),
                "Variable node has no label, removing it"
            );
            continue;
        };

        let group = groups.entry(label.to_owned()).or_insert_with(|| {
            labels.push(label.to_owned());
            Group::default()
        });
        if node.is_variable_writer() {
            group.writers.push(index);
        } else {
            group.readers.push(index);
        }
    }

    let mut elision = Elision::default();

    for label in &labels {
        let Some(group) = groups.get(label) else {
            continue;
        };

        let writer = match group.writers.as_slice() {
            [writer] => *writer,
            [] => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    label = %label,
                    readers = group.readers.len(),
                    "Variable has no writer, dropping group"
                );
                continue;
            }
            writers => {
                return Err(Error::malformed(
                    format!("variable '{label}'"),
                    format!("expected exactly one writer, found {}", writers.len()),
                ));
            }
        };

        if group.readers.is_empty() {
            tracing::warn!(
                target: TRACING_TARGET,
                label = %label,
                "Variable has no readers, dropping group"
            );
            continue;
        }

        let sources = graph.incoming(writer);
        let targets: Vec<_> = group
            .readers
            .iter()
            .flat_map(|&reader| graph.outgoing(reader))
            .collect();

        for (source, source_wire) in &sources {
            for (target, target_wire) in &targets {
                let replaced = graph.add_wire(
                    *source,
                    *target,
                    source_wire.source_port.clone(),
                    target_wire.target_slot.clone(),
                );
                if replaced.is_some_and(|previous| !graph.inner()[previous].is_variable()) {
                    elision.slots_collapsed += 1;
                }
                elision.edges_synthesized += 1;
            }
        }

        tracing::trace!(
            target: TRACING_TARGET,
            label = %label,
            sources = sources.len(),
            targets = targets.len(),
            "Variable elided"
        );
    }

    for index in variables {
        if graph.remove_node(index).is_some() {
            elision.variables_removed += 1;
        }
    }

    Ok(elision)
}
