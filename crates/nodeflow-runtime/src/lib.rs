#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod compiler;
pub mod definition;
mod error;
pub mod graph;
pub mod optimizer;
mod program;
mod registry;
pub mod scheduler;

#[doc(hidden)]
pub mod prelude;

pub use compiler::{Compiler, CompilerConfig, PortValues, ProgressFn, Subgraphs};
pub use error::{Error, ErrorKind, Result};
pub use program::{Bundle, CompiledProgram};
pub use registry::{NodeFunction, NodeInputs, NodeOutput, NodeRegistry};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "nodeflow_runtime";
