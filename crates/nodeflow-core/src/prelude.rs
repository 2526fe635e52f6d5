//! Prelude module for convenient imports.
//!
//! ```rust
//! use nodeflow_core::prelude::*;
//! ```

pub use crate::error::{BoxedError, ShapeError};
pub use crate::tensor::{Mask, Tensor};
pub use crate::value::Value;
