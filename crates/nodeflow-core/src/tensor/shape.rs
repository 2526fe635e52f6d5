//! Broadcasting rules shared by tensors and masks.

use crate::error::ShapeError;

/// Returns the number of elements a shape holds.
///
/// The empty shape is a scalar and holds one element. Fails when the count
/// overflows `usize`.
pub fn element_count(shape: &[usize]) -> Result<usize, ShapeError> {
    shape
        .iter()
        .try_fold(1usize, |count, &dim| count.checked_mul(dim))
        .ok_or_else(|| ShapeError::TooLarge {
            shape: shape.to_vec(),
        })
}

/// Computes the shape two operands broadcast to.
///
/// Shapes are aligned on their trailing axis. Missing leading axes count as
/// size one, and a size-one axis stretches to the other operand's size.
pub fn broadcast_shapes(left: &[usize], right: &[usize]) -> Result<Vec<usize>, ShapeError> {
    let rank = left.len().max(right.len());
    let mut shape = Vec::with_capacity(rank);

    for axis in 0..rank {
        let l = axis.checked_sub(rank - left.len()).map_or(1, |i| left[i]);
        let r = axis.checked_sub(rank - right.len()).map_or(1, |i| right[i]);

        let dim = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => {
                return Err(ShapeError::Incompatible {
                    left: left.to_vec(),
                    right: right.to_vec(),
                });
            }
        };
        shape.push(dim);
    }

    Ok(shape)
}

/// Maps a flat index into a broadcast result back onto a source operand.
///
/// `source` must be broadcast-compatible with `target`.
pub(crate) fn source_index(mut flat: usize, target: &[usize], source: &[usize]) -> usize {
    let offset = target.len() - source.len();
    let mut index = 0;
    let mut stride = 1;

    for axis in (0..target.len()).rev() {
        let dim = target[axis];
        let coord = flat % dim;
        flat /= dim;

        if axis >= offset {
            let source_dim = source[axis - offset];
            if source_dim != 1 {
                index += coord * stride;
            }
            stride *= source_dim;
        }
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count_of_scalar() {
        assert_eq!(element_count(&[]), Ok(1));
        assert_eq!(element_count(&[2, 3]), Ok(6));
        assert_eq!(element_count(&[4, 0]), Ok(0));
    }

    #[test]
    fn test_element_count_overflow() {
        let err = element_count(&[usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, ShapeError::TooLarge { .. }));
    }

    #[test]
    fn test_broadcast_equal_shapes() {
        assert_eq!(broadcast_shapes(&[2, 3], &[2, 3]).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_broadcast_scalar_and_leading_axes() {
        assert_eq!(broadcast_shapes(&[], &[3]).unwrap(), vec![3]);
        assert_eq!(broadcast_shapes(&[2, 1], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shapes(&[4, 1, 2], &[3, 1]).unwrap(), vec![4, 3, 2]);
    }

    #[test]
    fn test_broadcast_incompatible() {
        let err = broadcast_shapes(&[2], &[3]).unwrap_err();
        assert!(matches!(err, ShapeError::Incompatible { .. }));
    }

    #[test]
    fn test_source_index_stretches_unit_axes() {
        // A [2, 1] column broadcast over [2, 3] repeats each row value.
        let target = [2, 3];
        let column = [2, 1];
        let picked: Vec<usize> = (0..6).map(|i| source_index(i, &target, &column)).collect();
        assert_eq!(picked, vec![0, 0, 0, 1, 1, 1]);

        // A [3] row broadcast over [2, 3] repeats the whole row.
        let row = [3];
        let picked: Vec<usize> = (0..6).map(|i| source_index(i, &target, &row)).collect();
        assert_eq!(picked, vec![0, 1, 2, 0, 1, 2]);
    }
}
