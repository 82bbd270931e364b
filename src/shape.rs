//! Shape arithmetic: element counts, strides, broadcasting.

use crate::error::{Error, Result};

/// Total number of elements in a shape. Empty shape is a scalar with one
/// element; any zero extent gives zero.
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major element strides for a dense layout.
pub fn contiguous_strides(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![1isize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1] as isize;
    }
    strides
}

/// Every extent must round-trip through a 32-bit signed int.
pub fn check_shape(shape: &[usize]) -> Result<()> {
    for &dim in shape {
        if dim > i32::MAX as usize {
            return Err(Error::value(
                "Shape dimension falls outside supported `int` range.",
            ));
        }
    }
    Ok(())
}

/// Combined shape of two operands under right-aligned broadcasting.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0usize; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = if da == db || db == 1 {
            da
        } else if da == 1 {
            db
        } else {
            return Err(Error::value(format!(
                "Shapes {a:?} and {b:?} cannot be broadcast."
            )));
        };
    }
    Ok(out)
}

/// Whether `from` can broadcast to exactly `to`.
pub fn broadcastable_to(from: &[usize], to: &[usize]) -> bool {
    if from.len() > to.len() {
        return false;
    }
    let offset = to.len() - from.len();
    from.iter()
        .zip(&to[offset..])
        .all(|(&f, &t)| f == t || f == 1)
}

/// Decompose a flat row-major index into per-axis coordinates.
pub fn unravel(flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut coords = vec![0usize; shape.len()];
    let mut rem = flat;
    for i in (0..shape.len()).rev() {
        coords[i] = rem % shape[i];
        rem /= shape[i];
    }
    coords
}

/// Element offset for coordinates under the given strides.
pub fn stride_offset(coords: &[usize], strides: &[isize]) -> isize {
    coords
        .iter()
        .zip(strides)
        .map(|(&c, &s)| c as isize * s)
        .sum()
}

/// Wrap a possibly-negative axis index and bounds-check it.
pub fn normalize_index(index: i64, axis: usize, size: usize) -> Result<usize> {
    let wrapped = if index < 0 { index + size as i64 } else { index };
    if wrapped < 0 || wrapped >= size as i64 {
        return Err(Error::Index { index, axis, size });
    }
    Ok(wrapped as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numel() {
        assert_eq!(numel(&[]), 1);
        assert_eq!(numel(&[2, 3, 4]), 24);
        assert_eq!(numel(&[2, 0, 4]), 0);
    }

    #[test]
    fn test_contiguous_strides() {
        assert_eq!(contiguous_strides(&[]), Vec::<isize>::new());
        assert_eq!(contiguous_strides(&[5]), vec![1]);
        assert_eq!(contiguous_strides(&[2, 3, 4]), vec![12, 4, 1]);
    }

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[2, 3], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shapes(&[2, 1], &[1, 4]).unwrap(), vec![2, 4]);
        assert_eq!(broadcast_shapes(&[], &[2, 2]).unwrap(), vec![2, 2]);
        assert!(broadcast_shapes(&[2, 3], &[4]).is_err());
    }

    #[test]
    fn test_broadcastable_to() {
        assert!(broadcastable_to(&[3], &[2, 3]));
        assert!(broadcastable_to(&[1, 3], &[2, 3]));
        assert!(!broadcastable_to(&[2], &[2, 3]));
        assert!(!broadcastable_to(&[2, 3], &[3]));
    }

    #[test]
    fn test_unravel() {
        assert_eq!(unravel(0, &[2, 3]), vec![0, 0]);
        assert_eq!(unravel(5, &[2, 3]), vec![1, 2]);
        assert_eq!(unravel(7, &[2, 2, 2]), vec![1, 1, 1]);
    }

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(2, 0, 5).unwrap(), 2);
        assert_eq!(normalize_index(-1, 0, 5).unwrap(), 4);
        assert!(normalize_index(5, 0, 5).is_err());
        assert!(normalize_index(-6, 0, 5).is_err());
    }

    #[test]
    fn test_shape_dim_range() {
        assert!(check_shape(&[2, 3]).is_ok());
        assert!(check_shape(&[i32::MAX as usize + 1]).is_err());
    }
}
