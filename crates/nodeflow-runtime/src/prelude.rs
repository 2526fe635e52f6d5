//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types for ergonomic imports:
//!
//! ```rust
//! use nodeflow_runtime::prelude::*;
//! ```

pub use nodeflow_core::{BoxedError, Mask, Tensor, Value};

pub use crate::compiler::{Compiler, CompilerConfig, PortValues, Subgraphs};
pub use crate::definition::{ConnectionDefinition, GraphDefinition, NodeDefinition};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::graph::{Graph, Node, NodeId, NodeKind, PortRef};
pub use crate::optimizer::{OptimizationReport, Optimizer};
pub use crate::program::{Bundle, CompiledProgram};
pub use crate::registry::{NodeFunction, NodeInputs, NodeOutput, NodeRegistry};
pub use crate::scheduler::Schedule;
