//! Dense numeric tensors.
//!
//! This module provides the numeric representation that flows between nodes:
//! - [`Tensor`]: row-major `f64` storage with an explicit shape
//! - [`Mask`]: boolean storage with an explicit shape
//! - [`broadcast_shapes`]: the broadcasting rule used by element-wise operations

mod mask;
mod shape;

use serde::{Deserialize, Serialize};

pub use mask::Mask;
pub use shape::{broadcast_shapes, element_count};

use self::shape::source_index;
use crate::error::ShapeError;

/// A dense tensor of `f64` values.
///
/// A tensor with an empty shape is a scalar holding exactly one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorRepr", into = "TensorRepr")]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    /// Creates a tensor, checking that `data` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, ShapeError> {
        let expected = element_count(&shape)?;
        if expected != data.len() {
            return Err(ShapeError::LengthMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Creates a scalar tensor.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Creates a one-dimensional tensor.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Creates a tensor of the given shape with every element set to `value`.
    pub fn full(shape: &[usize], value: f64) -> Result<Self, ShapeError> {
        Ok(Self {
            shape: shape.to_vec(),
            data: vec![value; element_count(shape)?],
        })
    }

    /// Creates a zero-filled tensor of the given shape.
    pub fn zeros(shape: &[usize]) -> Result<Self, ShapeError> {
        Self::full(shape, 0.0)
    }

    /// Returns the shape.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the elements in row-major order.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Consumes the tensor and returns its elements.
    #[inline]
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the tensor holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns whether this is a scalar (rank zero) tensor.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Applies `f` to every element.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Combines two tensors element-wise after broadcasting them together.
    pub fn zip_with(
        &self,
        other: &Tensor,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, ShapeError> {
        let shape = broadcast_shapes(&self.shape, &other.shape)?;
        let data = (0..element_count(&shape)?)
            .map(|i| {
                let a = self.data[source_index(i, &shape, &self.shape)];
                let b = other.data[source_index(i, &shape, &other.shape)];
                f(a, b)
            })
            .collect();
        Ok(Self { shape, data })
    }

    /// Replaces every element where `mask` is set with `fill`.
    ///
    /// The result takes the broadcast shape of the tensor and the mask.
    pub fn fill_where(&self, mask: &Mask, fill: f64) -> Result<Self, ShapeError> {
        let shape = broadcast_shapes(&self.shape, mask.shape())?;
        let data = (0..element_count(&shape)?)
            .map(|i| {
                if mask.data()[source_index(i, &shape, mask.shape())] {
                    fill
                } else {
                    self.data[source_index(i, &shape, &self.shape)]
                }
            })
            .collect();
        Ok(Self { shape, data })
    }

    /// Picks `on_true` where `mask` is set and `on_false` elsewhere.
    ///
    /// All three operands are broadcast to a common shape.
    pub fn select(mask: &Mask, on_true: &Tensor, on_false: &Tensor) -> Result<Self, ShapeError> {
        let values = broadcast_shapes(&on_true.shape, &on_false.shape)?;
        let shape = broadcast_shapes(mask.shape(), &values)?;
        let data = (0..element_count(&shape)?)
            .map(|i| {
                if mask.data()[source_index(i, &shape, mask.shape())] {
                    on_true.data[source_index(i, &shape, &on_true.shape)]
                } else {
                    on_false.data[source_index(i, &shape, &on_false.shape)]
                }
            })
            .collect();
        Ok(Self { shape, data })
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl From<Vec<f64>> for Tensor {
    fn from(data: Vec<f64>) -> Self {
        Self::from_vec(data)
    }
}

/// Wire form of a tensor, validated on the way in.
#[derive(Serialize, Deserialize)]
struct TensorRepr {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<TensorRepr> for Tensor {
    type Error = ShapeError;

    fn try_from(repr: TensorRepr) -> Result<Self, Self::Error> {
        Self::new(repr.shape, repr.data)
    }
}

impl From<Tensor> for TensorRepr {
    fn from(tensor: Tensor) -> Self {
        Self {
            shape: tensor.shape,
            data: tensor.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_new_checks_length() {
        assert!(Tensor::new(vec![2, 2], vec![1.0; 4]).is_ok());
        assert!(Tensor::new(vec![2, 2], vec![1.0; 5]).is_err());
    }

    #[test]
    fn test_zip_with_broadcasts_scalar() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0]);
        let b = Tensor::scalar(5.0);
        let sum = a.zip_with(&b, |x, y| x + y).unwrap();
        assert_eq!(sum.shape(), &[3]);
        assert_eq!(sum.data(), &[6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_zip_with_incompatible_shapes() {
        let a = Tensor::from_vec(vec![1.0, 2.0]);
        let b = Tensor::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(a.zip_with(&b, |x, y| x * y).is_err());
    }

    #[test]
    fn test_select_merges_branches() {
        let mask = Mask::from_vec(vec![true, false]);
        let on_true = Tensor::from_vec(vec![5.0, 5.0]);
        let on_false = Tensor::from_vec(vec![9.0, 9.0]);
        let merged = Tensor::select(&mask, &on_true, &on_false).unwrap();
        assert_eq!(merged.data(), &[5.0, 9.0]);
    }

    #[test]
    fn test_select_broadcasts_scalar_branches() {
        let mask = Mask::new(vec![2, 2], vec![true, false, false, true]).unwrap();
        let merged = Tensor::select(&mask, &Tensor::scalar(1.0), &Tensor::scalar(0.0)).unwrap();
        assert_eq!(merged.shape(), &[2, 2]);
        assert_eq!(merged.data(), &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_fill_where() {
        let tensor = Tensor::from_vec(vec![1.0, 2.0, 3.0]);
        let mask = Mask::from_vec(vec![false, true, false]);
        let filled = tensor.fill_where(&mask, 0.0).unwrap();
        assert_eq!(filled.data(), &[1.0, 0.0, 3.0]);

        let no_data = tensor.fill_where(&mask, f64::NAN).unwrap();
        assert!(no_data.data()[1].is_nan());
        assert_eq!(no_data.data()[0], 1.0);
    }

    #[test]
    fn test_fill_where_stretches_scalar_tensor() {
        let filled = Tensor::scalar(4.0)
            .fill_where(&Mask::from_vec(vec![true, false]), -1.0)
            .unwrap();
        assert_eq!(filled.data(), &[-1.0, 4.0]);
    }

    #[test]
    fn test_full_and_zeros() {
        let tensor = Tensor::full(&[2, 2], 1.5).unwrap();
        assert_eq!(tensor.data(), &[1.5; 4]);
        assert_eq!(Tensor::zeros(&[]).unwrap(), Tensor::scalar(0.0));
        assert!(Tensor::zeros(&[usize::MAX, 2]).is_err());
    }

    #[test]
    fn test_overflowing_shape_is_rejected() {
        let json = r#"{"shape":[4294967296,4294967296,4294967296],"data":[]}"#;
        assert!(serde_json::from_str::<Tensor>(json).is_err());

        let err = Tensor::new(vec![usize::MAX, usize::MAX], Vec::new()).unwrap_err();
        assert!(matches!(err, ShapeError::TooLarge { .. }));
    }

    #[test]
    fn test_tensor_serialization() {
        let tensor = Tensor::new(vec![2, 1], vec![1.5, -2.0]).unwrap();
        let json = serde_json::to_string(&tensor).unwrap();
        assert_eq!(json, r#"{"shape":[2,1],"data":[1.5,-2.0]}"#);
        let back: Tensor = serde_json::from_str(&json).unwrap();
        assert_eq!(tensor, back);
    }
}
