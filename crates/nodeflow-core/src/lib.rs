#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
pub mod tensor;
mod value;

#[doc(hidden)]
pub mod prelude;

pub use error::{BoxedError, ShapeError};
pub use tensor::{Mask, Tensor};
pub use value::Value;
