//! Boolean masks.

use serde::{Deserialize, Serialize};

use super::shape::element_count;
use crate::error::ShapeError;

/// An element-wise boolean mask with an explicit shape.
///
/// Conditional nodes use masks to pick, per element, between the result of
/// their true branch and the result of their false branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MaskRepr", into = "MaskRepr")]
pub struct Mask {
    shape: Vec<usize>,
    data: Vec<bool>,
}

impl Mask {
    /// Creates a mask, checking that `data` fills `shape` exactly.
    pub fn new(shape: Vec<usize>, data: Vec<bool>) -> Result<Self, ShapeError> {
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

    /// Creates a one-dimensional mask.
    pub fn from_vec(data: Vec<bool>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Creates a scalar mask.
    pub fn scalar(value: bool) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Returns the shape.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the elements in row-major order.
    #[inline]
    pub fn data(&self) -> &[bool] {
        &self.data
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the mask holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns whether any element is set.
    pub fn any(&self) -> bool {
        self.data.iter().any(|&set| set)
    }

    /// Returns whether every element is set.
    pub fn all(&self) -> bool {
        self.data.iter().all(|&set| set)
    }

    /// Returns the element-wise negation.
    pub fn not(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&set| !set).collect(),
        }
    }
}

impl From<Vec<bool>> for Mask {
    fn from(data: Vec<bool>) -> Self {
        Self::from_vec(data)
    }
}

impl From<bool> for Mask {
    fn from(value: bool) -> Self {
        Self::scalar(value)
    }
}

/// Wire form of a mask, validated on the way in.
#[derive(Serialize, Deserialize)]
struct MaskRepr {
    shape: Vec<usize>,
    data: Vec<bool>,
}

impl TryFrom<MaskRepr> for Mask {
    type Error = ShapeError;

    fn try_from(repr: MaskRepr) -> Result<Self, Self::Error> {
        Self::new(repr.shape, repr.data)
    }
}

impl From<Mask> for MaskRepr {
    fn from(mask: Mask) -> Self {
        Self {
            shape: mask.shape,
            data: mask.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_rejects_length_mismatch() {
        let err = Mask::new(vec![2, 2], vec![true; 3]).unwrap_err();
        assert!(matches!(
            err,
            ShapeError::LengthMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_mask_any_all() {
        let mask = Mask::from_vec(vec![true, false]);
        assert!(mask.any());
        assert!(!mask.all());
        assert!(mask.not().any());
        assert_eq!(mask.not().data(), &[false, true]);

        let empty = Mask::from_vec(Vec::new());
        assert!(!empty.any());
        assert!(empty.all());
    }

    #[test]
    fn test_mask_serialization() {
        let mask = Mask::from_vec(vec![true, false, true]);
        let json = serde_json::to_string(&mask).unwrap();
        let back: Mask = serde_json::from_str(&json).unwrap();
        assert_eq!(mask, back);

        let bad = r#"{"shape":[2],"data":[true]}"#;
        assert!(serde_json::from_str::<Mask>(bad).is_err());

        let huge = r#"{"shape":[18446744073709551615,2],"data":[]}"#;
        assert!(serde_json::from_str::<Mask>(huge).is_err());
    }
}
