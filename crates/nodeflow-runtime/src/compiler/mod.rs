//! Graph compiler.
//!
//! The compiler takes a validated [`Graph`] and a [`NodeRegistry`] and produces
//! a [`CompiledProgram`] that can be executed any number of times.
//!
//! # Compilation Process
//!
//! 1. **Optimization**: variable elision and dead-code elimination
//! 2. **Validation**: check the invariants the lowered graph must hold
//! 3. **Scheduling**: order the nodes topologically
//! 4. **Lowering**: bind each node to an operation, compiling conditional
//!    subgraphs recursively

mod conditional;
mod config;
mod operation;
mod port;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use self::conditional::Subgraphs;
pub use self::config::{CompilerConfig, CompilerConfigBuilder, CompilerConfigBuilderError};
pub use self::port::PortValues;
use self::conditional::{ConditionalOp, branch_keys};
pub(crate) use self::operation::Operation;
use self::operation::{OperationKind, SlotBinding};
use crate::error::{Error, Result};
use crate::graph::{Graph, Node, NodeId, NodeKind};
use crate::optimizer::Optimizer;
use crate::program::CompiledProgram;
use crate::registry::NodeRegistry;

/// Tracing target for compilation.
pub const TRACING_TARGET: &str = "nodeflow_runtime::compiler";

/// Progress callback: fraction of operations started and the current node.
pub type ProgressFn = Arc<dyn Fn(f64, &NodeId) + Send + Sync>;

/// Lowers graphs into executable programs.
#[derive(Clone)]
pub struct Compiler {
    registry: Arc<NodeRegistry>,
    config: CompilerConfig,
    progress: Option<ProgressFn>,
}

impl Compiler {
    /// Creates a compiler bound to a node function registry.
    pub fn new(registry: impl Into<Arc<NodeRegistry>>) -> Self {
        Self {
            registry: registry.into(),
            config: CompilerConfig::default(),
            progress: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a callback invoked before each operation of compiled programs.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(f64, &NodeId) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Returns the node function registry.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Compiles a graph that has no conditional nodes.
    pub fn compile(&self, graph: &Graph) -> Result<CompiledProgram> {
        self.compile_with_subgraphs(graph, &Subgraphs::new())
    }

    /// Compiles a graph, resolving conditional branches from `subgraphs`.
    pub fn compile_with_subgraphs(
        &self,
        graph: &Graph,
        subgraphs: &Subgraphs,
    ) -> Result<CompiledProgram> {
        let mut session = Session {
            compiler: self,
            subgraphs,
            stack: Vec::new(),
            cache: HashMap::new(),
        };
        let program = session.lower(graph)?;

        tracing::info!(
            target: TRACING_TARGET,
            operations = program.len(),
            inputs = ?program.input_uids(),
            outputs = ?program.output_uids(),
            subgraphs = session.cache.len(),
            "Graph compiled"
        );

        Ok(program.with_progress(self.progress.clone()))
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// State of one top-level compilation.
struct Session<'a> {
    compiler: &'a Compiler,
    subgraphs: &'a Subgraphs,
    /// Subgraph keys currently being compiled, outermost first.
    stack: Vec<String>,
    /// Finished branch programs, shared between conditional nodes.
    cache: HashMap<String, Arc<CompiledProgram>>,
}

impl Session<'_> {
    fn lower(&mut self, graph: &Graph) -> Result<CompiledProgram> {
        let graph = Optimizer::new().run(graph.clone())?;
        graph.validate_lowered()?;
        let schedule = graph.schedule()?;

        let mut operations = Vec::with_capacity(schedule.len());
        for id in &schedule {
            let node = graph
                .node(id)
                .ok_or_else(|| Error::malformed_node(id, "scheduled node is missing"))?;
            operations.push(self.lower_node(&graph, node)?);
        }

        Ok(CompiledProgram::new(
            operations,
            graph.input_uids(),
            graph.output_uids(),
        ))
    }

    fn lower_node(&mut self, graph: &Graph, node: &Node) -> Result<Operation> {
        let uid = || node.uid().unwrap_or_else(|| node.id().as_str()).to_owned();

        let kind = match node.kind() {
            NodeKind::Input => OperationKind::Input {
                uid: uid(),
                key: node.result_key(),
            },
            NodeKind::Output => OperationKind::Output {
                uid: uid(),
                slots: SlotBinding::bind_all(graph, node),
            },
            NodeKind::Compute => OperationKind::Compute {
                uid: uid(),
                function: self.compiler.registry.resolve(node)?,
                slots: SlotBinding::bind_all(graph, node),
            },
            NodeKind::Conditional => {
                OperationKind::Conditional(self.lower_conditional(graph, node)?)
            }
            NodeKind::Variable => {
                return Err(Error::malformed_node(
                    node.id(),
                    "variable node reached the compiler",
                ));
            }
        };

        Ok(Operation::new(node.clone(), kind))
    }

    fn lower_conditional(&mut self, graph: &Graph, node: &Node) -> Result<ConditionalOp> {
        let (mut cond, mut extra) = (None, Vec::new());
        for binding in SlotBinding::bind_all(graph, node) {
            if binding.slot == "cond" {
                cond = Some(binding);
            } else {
                extra.push(binding);
            }
        }
        let cond = cond.ok_or_else(|| {
            Error::malformed_node(node.id(), "conditional node requires a 'cond' connection")
        })?;

        let config = &self.compiler.config;
        let (true_key, false_key) = branch_keys(node, config);
        let (no_data, false_fill) = (config.no_data, config.false_fill);

        Ok(ConditionalOp {
            cond,
            extra,
            on_true: self.subprogram(&true_key)?,
            on_false: self.subprogram(&false_key)?,
            no_data,
            false_fill,
        })
    }

    fn subprogram(&mut self, key: &str) -> Result<Arc<CompiledProgram>> {
        if let Some(program) = self.cache.get(key) {
            return Ok(Arc::clone(program));
        }

        if self.stack.iter().any(|k| k == key) {
            return Err(Error::SubgraphCycle {
                key: key.to_owned(),
                stack: self.stack.clone(),
            });
        }

        let subject = format!("subgraph '{key}'");
        let depth = self.compiler.config.max_subgraph_depth;
        if self.stack.len() >= depth {
            return Err(Error::malformed(
                subject,
                format!("conditional nesting exceeds {depth} levels"),
            ));
        }

        let subgraphs = self.subgraphs;
        let graph = subgraphs
            .get(key)
            .ok_or_else(|| Error::malformed(&subject, "subgraph was not supplied"))?;

        self.stack.push(key.to_owned());
        let lowered = self.lower(graph);
        self.stack.pop();
        let program = lowered?;

        if program.output_uids().len() != 1 {
            return Err(Error::malformed(
                subject,
                format!(
                    "expected exactly one output node, found {}",
                    program.output_uids().len()
                ),
            ));
        }

        tracing::debug!(
            target: TRACING_TARGET,
            subgraph = %key,
            operations = program.len(),
            depth = self.stack.len() + 1,
            "Subgraph compiled"
        );

        let program = Arc::new(program);
        self.cache.insert(key.to_owned(), Arc::clone(&program));
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use nodeflow_core::{Mask, Tensor, Value};

    use super::*;
    use crate::ErrorKind;
    use crate::definition::{GraphDefinition, NodeDefinition};
    use crate::program::Bundle;
    use crate::registry::NodeInputs;

    fn tensor(inputs: &NodeInputs, slot: &str) -> Tensor {
        inputs
            .get(slot)
            .and_then(Value::to_tensor)
            .unwrap_or_else(|| Tensor::scalar(0.0))
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry
            .register("add", |_, inputs, _| {
                Ok(tensor(inputs, "a").zip_with(&tensor(inputs, "b"), |x, y| x + y)?.into())
            })
            .register("negate", |_, inputs, _| {
                Ok(tensor(inputs, "value").map(|x| -x).into())
            })
            .register("const", |node, _, _| {
                let value = node.data()["value"].as_f64().unwrap_or_default();
                Ok(Tensor::from_vec(vec![value; 2]).into())
            })
            .register("positive", |_, inputs, _| {
                let x = tensor(inputs, "x");
                let signs = x.data().iter().map(|v| *v > 0.0).collect();
                let mask = Mask::new(x.shape().to_vec(), signs)?;
                Ok(Value::Mask(mask).into())
            });
        registry
    }

    fn sum_graph() -> Graph {
        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::input("a", "a"))
            .add_node(NodeDefinition::input("b", "b"))
            .add_node(NodeDefinition::compute("add", "add"))
            .add_node(NodeDefinition::output("result", "result"))
            .connect("a", "add", "a")
            .connect("b", "add", "b")
            .connect("add", "result", "value");
        Graph::from_definition(def).unwrap()
    }

    fn bundle(entries: &[(&str, Value)]) -> Bundle {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    fn constant_branch(value: f64) -> Graph {
        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::compute("k", "const").with_field("value", value.into()))
            .add_node(NodeDefinition::output("out", "out"))
            .connect("k", "out", "value");
        Graph::from_definition(def).unwrap()
    }

    fn masked_graph() -> Graph {
        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::input("m", "m"))
            .add_node(NodeDefinition::conditional("c"))
            .add_node(NodeDefinition::output("result", "result"))
            .connect("m", "c", "cond")
            .connect("c", "result", "value");
        Graph::from_definition(def).unwrap()
    }

    #[test]
    fn test_unknown_node_type_fails_at_compile_time() {
        let err = Compiler::new(NodeRegistry::new())
            .compile(&sum_graph())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownNodeType);
    }

    #[test]
    fn test_dead_compute_node_needs_no_function() {
        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::input("a", "a"))
            .add_node(NodeDefinition::compute("orphan", "not_registered"))
            .add_node(NodeDefinition::output("result", "result"))
            .connect("a", "orphan", "value")
            .connect("a", "result", "value");
        let graph = Graph::from_definition(def).unwrap();

        let program = Compiler::new(registry()).compile(&graph).unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_output_without_source_is_malformed() {
        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::input("a", "a"))
            .add_node(NodeDefinition::output("result", "result"));
        let graph = Graph::from_definition(def).unwrap();

        let err = Compiler::new(registry()).compile(&graph).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedGraph);
    }

    #[test]
    fn test_cycle_fails_at_compile_time() {
        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::compute("p", "add"))
            .add_node(NodeDefinition::compute("q", "add"))
            .add_node(NodeDefinition::output("out", "out"))
            .connect("q", "p", "a")
            .connect("p", "q", "a")
            .connect("q", "out", "value");
        let graph = Graph::from_definition(def).unwrap();

        let err = Compiler::new(registry()).compile(&graph).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
    }

    #[test]
    fn test_conditional_merge() {
        let subgraphs: Subgraphs = [
            ("c_true", constant_branch(5.0)),
            ("c_false", constant_branch(9.0)),
        ]
        .into_iter()
        .collect();

        let program = Compiler::new(registry())
            .compile_with_subgraphs(&masked_graph(), &subgraphs)
            .unwrap();
        let outputs = program
            .execute(&bundle(&[("m", Value::from(vec![true, false]))]))
            .unwrap();

        assert_eq!(
            outputs["result"],
            Value::Tensor(Tensor::from_vec(vec![5.0, 9.0]))
        );
    }

    #[test]
    fn test_conditional_skips_branch_outside_mask() {
        let subgraphs: Subgraphs = [
            ("c_true", constant_branch(5.0)),
            ("c_false", constant_branch(9.0)),
        ]
        .into_iter()
        .collect();
        let program = Compiler::new(registry())
            .compile_with_subgraphs(&masked_graph(), &subgraphs)
            .unwrap();

        let outputs = program
            .execute(&bundle(&[("m", Value::from(vec![true, true]))]))
            .unwrap();
        assert_eq!(
            outputs["result"],
            Value::Tensor(Tensor::from_vec(vec![5.0, 5.0]))
        );
    }

    #[test]
    fn test_conditional_branches_see_masked_inputs() {
        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::input("x", "x"))
            .add_node(NodeDefinition::compute("pos", "positive"))
            .add_node(NodeDefinition::conditional("abs").with_branches("keep", "flip"))
            .add_node(NodeDefinition::output("result", "result"))
            .connect("x", "pos", "x")
            .connect("pos", "abs", "cond")
            .connect("x", "abs", "value")
            .connect("abs", "result", "value");
        let graph = Graph::from_definition(def).unwrap();

        let mut keep = GraphDefinition::new();
        keep.add_node(NodeDefinition::input("value", "value"))
            .add_node(NodeDefinition::output("out", "out"))
            .connect("value", "out", "value");

        let mut flip = GraphDefinition::new();
        flip.add_node(NodeDefinition::input("x", "x"))
            .add_node(NodeDefinition::compute("neg", "negate"))
            .add_node(NodeDefinition::output("out", "out"))
            .connect("x", "neg", "value")
            .connect("neg", "out", "value");

        let mut subgraphs = Subgraphs::new();
        subgraphs
            .insert("keep", Graph::from_definition(keep).unwrap())
            .insert("flip", Graph::from_definition(flip).unwrap());

        let program = Compiler::new(registry())
            .compile_with_subgraphs(&graph, &subgraphs)
            .unwrap();
        let x = Value::Sequence(vec![-2.0, 3.0, -4.0]);
        let outputs = program.execute(&bundle(&[("x", x)])).unwrap();

        assert_eq!(
            outputs["result"],
            Value::Tensor(Tensor::from_vec(vec![2.0, 3.0, 4.0]))
        );
    }

    #[test]
    fn test_branch_inputs_carry_fill_values() {
        let seen_true = Arc::new(Mutex::new(Vec::new()));
        let seen_false = Arc::new(Mutex::new(Vec::new()));

        let mut registry = registry();
        for (uid, seen) in [("record_true", &seen_true), ("record_false", &seen_false)] {
            let seen = Arc::clone(seen);
            registry.register(uid, move |_, inputs, _| {
                let x = tensor(inputs, "x");
                seen.lock().unwrap().push(x.data().to_vec());
                Ok(x.into())
            });
        }

        let branch = |uid: &str| {
            let mut def = GraphDefinition::new();
            def.add_node(NodeDefinition::input("x", "x"))
                .add_node(NodeDefinition::compute("rec", uid))
                .add_node(NodeDefinition::output("out", "out"))
                .connect("x", "rec", "x")
                .connect("rec", "out", "value");
            Graph::from_definition(def).unwrap()
        };
        let subgraphs: Subgraphs = [
            ("c_true", branch("record_true")),
            ("c_false", branch("record_false")),
        ]
        .into_iter()
        .collect();

        let mut def = GraphDefinition::new();
        def.add_node(NodeDefinition::input("x", "x"))
            .add_node(NodeDefinition::compute("pos", "positive"))
            .add_node(NodeDefinition::conditional("c"))
            .add_node(NodeDefinition::output("result", "result"))
            .connect("x", "pos", "x")
            .connect("pos", "c", "cond")
            .connect("c", "result", "value");
        let graph = Graph::from_definition(def).unwrap();

        let config = CompilerConfig::builder()
            .with_false_fill(-7.0)
            .build()
            .unwrap();
        let program = Compiler::new(registry)
            .with_config(config)
            .compile_with_subgraphs(&graph, &subgraphs)
            .unwrap();

        let x = Value::from(vec![-1.0, 3.0, -2.0]);
        let outputs = program.execute(&bundle(&[("x", x)])).unwrap();
        assert_eq!(
            outputs["result"],
            Value::Tensor(Tensor::from_vec(vec![-1.0, 3.0, -2.0]))
        );

        let seen_true = seen_true.lock().unwrap();
        assert_eq!(seen_true.len(), 1);
        let on_true = &seen_true[0];
        assert!(on_true[0].is_nan());
        assert_eq!(on_true[1], 3.0);
        assert!(on_true[2].is_nan());

        assert_eq!(*seen_false.lock().unwrap(), vec![vec![-1.0, -7.0, -2.0]]);
    }

    #[test]
    fn test_non_mask_cond_is_invalid() {
        let subgraphs: Subgraphs = [
            ("c_true", constant_branch(5.0)),
            ("c_false", constant_branch(9.0)),
        ]
        .into_iter()
        .collect();
        let program = Compiler::new(registry())
            .compile_with_subgraphs(&masked_graph(), &subgraphs)
            .unwrap();

        let err = program
            .execute(&bundle(&[("m", Value::from(vec![1.0, 0.0]))]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_missing_subgraph_is_malformed() {
        let err = Compiler::new(registry())
            .compile(&masked_graph())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedGraph);
        assert!(err.to_string().contains("subgraph 'c_true'"));
    }

    #[test]
    fn test_self_referencing_subgraph_is_a_cycle() {
        let mut inner = GraphDefinition::new();
        inner
            .add_node(NodeDefinition::input("m", "m"))
            .add_node(NodeDefinition::conditional("c").with_branches("loop", "leaf"))
            .add_node(NodeDefinition::output("out", "out"))
            .connect("m", "c", "cond")
            .connect("c", "out", "value");
        let inner = Graph::from_definition(inner).unwrap();

        let mut subgraphs = Subgraphs::new();
        subgraphs
            .insert("c_true", inner.clone())
            .insert("c_false", constant_branch(0.0))
            .insert("loop", inner)
            .insert("leaf", constant_branch(1.0));

        let err = Compiler::new(registry())
            .compile_with_subgraphs(&masked_graph(), &subgraphs)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
        match err {
            Error::SubgraphCycle { key, stack } => {
                assert_eq!(key, "loop");
                assert_eq!(stack, vec!["c_true".to_owned(), "loop".to_owned()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let mut nested = GraphDefinition::new();
        nested
            .add_node(NodeDefinition::input("m", "m"))
            .add_node(NodeDefinition::conditional("c").with_branches("leaf", "leaf"))
            .add_node(NodeDefinition::output("out", "out"))
            .connect("m", "c", "cond")
            .connect("c", "out", "value");

        let mut subgraphs = Subgraphs::new();
        subgraphs
            .insert("c_true", Graph::from_definition(nested).unwrap())
            .insert("c_false", constant_branch(0.0))
            .insert("leaf", constant_branch(1.0));

        let config = CompilerConfig::builder()
            .with_max_subgraph_depth(1usize)
            .build()
            .unwrap();
        let err = Compiler::new(registry())
            .with_config(config)
            .compile_with_subgraphs(&masked_graph(), &subgraphs)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedGraph);

        let program = Compiler::new(registry())
            .compile_with_subgraphs(&masked_graph(), &subgraphs)
            .unwrap();
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn test_branch_needs_single_output() {
        let mut two = GraphDefinition::new();
        two.add_node(NodeDefinition::compute("k", "const"))
            .add_node(NodeDefinition::output("o1", "o1"))
            .add_node(NodeDefinition::output("o2", "o2"))
            .connect("k", "o1", "value")
            .connect("k", "o2", "value");

        let subgraphs: Subgraphs = [
            ("c_true", Graph::from_definition(two).unwrap()),
            ("c_false", constant_branch(9.0)),
        ]
        .into_iter()
        .collect();

        let err = Compiler::new(registry())
            .compile_with_subgraphs(&masked_graph(), &subgraphs)
            .unwrap_err();
        assert!(err.to_string().contains("exactly one output node"));
    }

    #[test]
    fn test_custom_branch_suffixes() {
        let subgraphs: Subgraphs = [
            ("c.then", constant_branch(1.0)),
            ("c.else", constant_branch(2.0)),
        ]
        .into_iter()
        .collect();
        let config = CompilerConfig::builder()
            .with_true_suffix(".then")
            .with_false_suffix(".else")
            .build()
            .unwrap();

        let program = Compiler::new(registry())
            .with_config(config)
            .compile_with_subgraphs(&masked_graph(), &subgraphs)
            .unwrap();
        let outputs = program
            .execute(&bundle(&[("m", Value::from(vec![false, true]))]))
            .unwrap();
        assert_eq!(
            outputs["result"],
            Value::Tensor(Tensor::from_vec(vec![2.0, 1.0]))
        );
    }
}
