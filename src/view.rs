//! Zero-copy exchange with external strided-memory consumers.
//!
//! A [`StridedView`] is the crate's analogue of a buffer-protocol view: a
//! format code, an item size, byte strides and a keep-alive handle on the
//! underlying allocation. Exporting never copies, so a broadcast array
//! exports zero strides; importing wraps the external allocation in a
//! foreign buffer that keeps it alive for the array's lifetime.

use std::sync::Arc;

use crate::array::{Array, View};
use crate::buffer::Buffer;
use crate::dtype::Dtype;
use crate::error::{Error, Result};
use crate::shape::numel;

/// Struct-module format code for a dtype. Bfloat16 has none.
pub fn format_code(dtype: Dtype) -> Option<&'static str> {
    match dtype {
        Dtype::Bool => Some("?"),
        Dtype::Uint8 => Some("B"),
        Dtype::Int8 => Some("b"),
        Dtype::Uint16 => Some("H"),
        Dtype::Int16 => Some("h"),
        Dtype::Uint32 => Some("I"),
        Dtype::Int32 => Some("i"),
        Dtype::Uint64 => Some("Q"),
        Dtype::Int64 => Some("q"),
        Dtype::Float16 => Some("e"),
        Dtype::Float32 => Some("f"),
        Dtype::Complex64 => Some("Zf"),
        Dtype::Bfloat16 => None,
    }
}

/// Inverse of [`format_code`].
pub fn format_dtype(format: &str) -> Option<Dtype> {
    match format {
        "?" => Some(Dtype::Bool),
        "B" => Some(Dtype::Uint8),
        "b" => Some(Dtype::Int8),
        "H" => Some(Dtype::Uint16),
        "h" => Some(Dtype::Int16),
        "I" => Some(Dtype::Uint32),
        "i" => Some(Dtype::Int32),
        "Q" => Some(Dtype::Uint64),
        "q" => Some(Dtype::Int64),
        "e" => Some(Dtype::Float16),
        "f" => Some(Dtype::Float32),
        "Zf" => Some(Dtype::Complex64),
        _ => None,
    }
}

enum Backing {
    /// Export path: clone of the engine buffer.
    Engine(Buffer),
    /// Import path: external allocation held alive.
    External(Arc<[u8]>),
}

/// A strided window over little-endian memory.
pub struct StridedView {
    format: &'static str,
    item_size: usize,
    shape: Vec<usize>,
    /// Per-axis strides in bytes; zero for broadcast axes.
    strides: Vec<isize>,
    /// Byte offset of the first element within the backing bytes.
    offset: usize,
    backing: Backing,
}

impl StridedView {
    /// Wrap external memory. `strides` in bytes; `None` means dense
    /// row-major. Every addressable element must fall inside `data`.
    pub fn from_external(
        format: &str,
        shape: Vec<usize>,
        strides: Option<Vec<isize>>,
        data: Arc<[u8]>,
        offset: usize,
    ) -> Result<StridedView> {
        let dtype = format_dtype(format)
            .ok_or_else(|| Error::type_error(format!("Unknown buffer format '{format}'.")))?;
        let item_size = dtype.size();
        let strides = match strides {
            Some(s) => {
                if s.len() != shape.len() {
                    return Err(Error::value(
                        "Stride count does not match the view rank.",
                    ));
                }
                s
            }
            None => crate::shape::contiguous_strides(&shape)
                .into_iter()
                .map(|s| s * item_size as isize)
                .collect(),
        };
        for s in &strides {
            if s % item_size as isize != 0 {
                return Err(Error::value(
                    "Byte strides must be multiples of the item size.",
                ));
            }
        }
        // Bounds of the furthest reachable byte in either direction.
        let mut lo = offset as isize;
        let mut hi = offset as isize;
        if numel(&shape) > 0 {
            for (dim, stride) in shape.iter().zip(&strides) {
                let span = (*dim as isize - 1) * stride;
                if span < 0 {
                    lo += span;
                } else {
                    hi += span;
                }
            }
            hi += item_size as isize;
        }
        if lo < 0 || hi as usize > data.len() {
            return Err(Error::value(
                "Strided view reaches outside the provided bytes.",
            ));
        }
        let format = format_code(dtype).unwrap_or("?");
        Ok(StridedView {
            format,
            item_size,
            shape,
            strides,
            offset,
            backing: Backing::External(data),
        })
    }

    pub fn format(&self) -> &'static str {
        self.format
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte strides.
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn dtype(&self) -> Dtype {
        match format_dtype(self.format) {
            Some(d) => d,
            None => Dtype::Bool,
        }
    }

    /// The backing bytes, starting at the allocation, not the offset.
    pub fn bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Engine(buffer) => buffer.as_bytes(),
            Backing::External(data) => data,
        }
    }

    pub fn byte_offset(&self) -> usize {
        self.offset
    }
}

impl Array {
    /// Export the materialized array as a strided view without copying.
    /// Fails for bfloat16, which no standard format code covers.
    pub fn to_strided_view(&self) -> Result<StridedView> {
        let dtype = self.dtype();
        let format = format_code(dtype).ok_or_else(|| {
            Error::type_error(format!(
                "{dtype} arrays cannot be exported; no format code covers item size {}.",
                dtype.size()
            ))
        })?;
        self.eval()?;
        let view = self
            .view()
            .ok_or_else(|| Error::runtime("Evaluation left node without data."))?;
        let item_size = dtype.size();
        let strides: Vec<isize> = view
            .strides
            .iter()
            .map(|s| s * item_size as isize)
            .collect();
        Ok(StridedView {
            format,
            item_size,
            shape: self.shape(),
            strides,
            offset: view.offset as usize * item_size,
            backing: Backing::Engine(view.buffer),
        })
    }

    /// Import a strided view without copying. The view's allocation stays
    /// alive for as long as the array (or anything derived from its
    /// storage) does.
    pub fn from_strided_view(view: &StridedView) -> Result<Array> {
        let dtype = format_dtype(view.format)
            .ok_or_else(|| Error::type_error(format!("Unknown buffer format '{}'.", view.format)))?;
        crate::shape::check_shape(&view.shape)?;
        let item = view.item_size as isize;
        let buffer = match &view.backing {
            Backing::Engine(buffer) => buffer.clone(),
            Backing::External(data) => Buffer::foreign(dtype, Arc::clone(data)),
        };
        let strides: Vec<isize> = view.strides.iter().map(|s| s / item).collect();
        Ok(Array::from_view(
            View {
                buffer,
                strides,
                offset: view.offset as isize / item,
            },
            view.shape.clone(),
            dtype,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_export_contiguous_f32() {
        init();
        let a = Array::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let view = a.to_strided_view().unwrap();
        assert_eq!(view.format(), "f");
        assert_eq!(view.item_size(), 4);
        assert_eq!(view.shape(), &[2, 2]);
        assert_eq!(view.strides(), &[8, 4]);
        assert_eq!(view.byte_offset(), 0);
    }

    #[test]
    fn test_export_broadcast_has_zero_stride() {
        init();
        let a = Array::from_slice(&[1.0f32, 2.0], &[2]).unwrap();
        let b = a.broadcast_to(&[3, 2]).unwrap();
        let view = b.to_strided_view().unwrap();
        assert_eq!(view.strides(), &[0, 4]);
        assert_eq!(view.shape(), &[3, 2]);
    }

    #[test]
    fn test_bfloat16_export_fails() {
        init();
        let a = Array::zeros(&[2], Dtype::Bfloat16).unwrap();
        match a.to_strided_view() {
            Err(Error::Type(msg)) => {
                assert!(msg.contains("item size 2"), "{msg}");
            }
            other => panic!("expected type error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_format_codes() {
        init();
        assert_eq!(format_code(Dtype::Bool), Some("?"));
        assert_eq!(format_code(Dtype::Int64), Some("q"));
        assert_eq!(format_code(Dtype::Float16), Some("e"));
        assert_eq!(format_code(Dtype::Complex64), Some("Zf"));
        assert_eq!(format_code(Dtype::Bfloat16), None);
        for d in crate::dtype::ALL_DTYPES {
            if let Some(code) = format_code(d) {
                assert_eq!(format_dtype(code), Some(d));
            }
        }
    }

    #[test]
    fn test_import_external_zero_copy() {
        init();
        let mut raw = Vec::new();
        for v in [10i32, 20, 30, 40] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let data: Arc<[u8]> = raw.into();
        let view =
            StridedView::from_external("i", vec![2, 2], None, Arc::clone(&data), 0).unwrap();
        let a = Array::from_strided_view(&view).unwrap();
        assert_eq!(a.dtype(), Dtype::Int32);
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_import_negative_strides() {
        init();
        let mut raw = Vec::new();
        for v in [1i32, 2, 3] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let data: Arc<[u8]> = raw.into();
        // Reversed: first element at byte 8, stride -4.
        let view =
            StridedView::from_external("i", vec![3], Some(vec![-4]), data, 8).unwrap();
        let a = Array::from_strided_view(&view).unwrap();
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_import_bounds_checked() {
        init();
        let data: Arc<[u8]> = vec![0u8; 8].into();
        assert!(StridedView::from_external("i", vec![3], None, Arc::clone(&data), 0).is_err());
        assert!(StridedView::from_external("i", vec![2], None, Arc::clone(&data), 4).is_err());
        assert!(StridedView::from_external("i", vec![2], None, data, 0).is_ok());
    }

    #[test]
    fn test_import_rejects_misaligned_strides() {
        init();
        let data: Arc<[u8]> = vec![0u8; 16].into();
        assert!(StridedView::from_external("i", vec![2], Some(vec![6]), data, 0).is_err());
    }

    #[test]
    fn test_export_outlives_source_array() {
        init();
        let a = Array::from_slice(&[7i32, 8, 9], &[3]).unwrap();
        let view = a.to_strided_view().unwrap();
        drop(a);
        // The view holds its own reference; the data survives the handle.
        let bytes = view.bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(
            crate::buffer::read_scalar(bytes, Dtype::Int32, 1),
            crate::dtype::ScalarValue::Int(8)
        );
        let b = Array::from_strided_view(&view).unwrap();
        assert_eq!(b.to_vec::<i32>().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_export_import_shares_storage() {
        init();
        let a = Array::from_slice(&[5i32, 6], &[2]).unwrap();
        let view = a.to_strided_view().unwrap();
        let b = Array::from_strided_view(&view).unwrap();
        assert_eq!(b.to_vec::<i32>().unwrap(), vec![5, 6]);
    }
}
