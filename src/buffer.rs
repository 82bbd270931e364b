//! Dense element storage with copy-on-write sharing.
//!
//! A [`Buffer`] owns a flat little-endian byte region for one dtype. Clones
//! share the region; the first write through a shared handle copies it.
//! Owned allocations are tracked in module-level counters so callers can
//! observe active and peak usage.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use half::{bf16, f16};

use crate::dtype::{Dtype, ScalarValue};
use crate::error::{Error, Result};

static ACTIVE_MEMORY: AtomicUsize = AtomicUsize::new(0);
static PEAK_MEMORY: AtomicUsize = AtomicUsize::new(0);

/// Bytes currently held by live owned buffers.
pub fn get_active_memory() -> usize {
    ACTIVE_MEMORY.load(Ordering::Relaxed)
}

/// High-water mark of active memory since the last reset.
pub fn get_peak_memory() -> usize {
    PEAK_MEMORY.load(Ordering::Relaxed)
}

/// Restart the peak counter from the current active level.
pub fn reset_peak_memory() {
    PEAK_MEMORY.store(ACTIVE_MEMORY.load(Ordering::Relaxed), Ordering::Relaxed);
}

fn track_alloc(bytes: usize) {
    let active = ACTIVE_MEMORY.fetch_add(bytes, Ordering::Relaxed) + bytes;
    PEAK_MEMORY.fetch_max(active, Ordering::Relaxed);
}

fn track_free(bytes: usize) {
    ACTIVE_MEMORY.fetch_sub(bytes, Ordering::Relaxed);
}

enum Repr {
    /// Engine-allocated storage, counted in the memory stats.
    Owned(Vec<u8>),
    /// Borrowed external storage kept alive by the Arc. Not counted.
    Foreign(Arc<[u8]>),
}

struct BufferData {
    repr: Repr,
}

impl Drop for BufferData {
    fn drop(&mut self) {
        if let Repr::Owned(bytes) = &self.repr {
            track_free(bytes.len());
        }
    }
}

/// A shared, dtype-homogeneous storage region.
#[derive(Clone)]
pub struct Buffer {
    dtype: Dtype,
    data: Arc<BufferData>,
}

impl Buffer {
    /// Zero-initialized storage for `count` elements.
    pub fn new(dtype: Dtype, count: usize) -> Buffer {
        let bytes = vec![0u8; count * dtype.size()];
        track_alloc(bytes.len());
        Buffer {
            dtype,
            data: Arc::new(BufferData {
                repr: Repr::Owned(bytes),
            }),
        }
    }

    /// Take ownership of raw little-endian bytes.
    pub fn from_bytes(dtype: Dtype, bytes: Vec<u8>) -> Buffer {
        debug_assert_eq!(bytes.len() % dtype.size(), 0);
        track_alloc(bytes.len());
        Buffer {
            dtype,
            data: Arc::new(BufferData {
                repr: Repr::Owned(bytes),
            }),
        }
    }

    /// Wrap externally owned bytes without copying. The Arc keeps the
    /// exporter's allocation alive for as long as any clone of this buffer
    /// exists.
    pub fn foreign(dtype: Dtype, bytes: Arc<[u8]>) -> Buffer {
        Buffer {
            dtype,
            data: Arc::new(BufferData {
                repr: Repr::Foreign(bytes),
            }),
        }
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.as_bytes().len() / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.data.repr {
            Repr::Owned(bytes) => bytes,
            Repr::Foreign(bytes) => bytes,
        }
    }

    /// Whether this handle shares storage with another live handle or wraps
    /// foreign memory.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
            || matches!(self.data.repr, Repr::Foreign(_))
    }

    /// Mutable byte access, copying first if the storage is shared.
    pub fn make_mut(&mut self) -> &mut [u8] {
        if self.is_shared() {
            let copy = self.as_bytes().to_vec();
            track_alloc(copy.len());
            self.data = Arc::new(BufferData {
                repr: Repr::Owned(copy),
            });
        }
        match &mut Arc::get_mut(&mut self.data)
            .unwrap_or_else(|| unreachable!("storage was just made unique"))
            .repr
        {
            Repr::Owned(bytes) => bytes,
            Repr::Foreign(_) => unreachable!("storage was just made unique"),
        }
    }

    /// Read element `index` as a host scalar.
    pub fn get(&self, index: usize) -> ScalarValue {
        read_scalar(self.as_bytes(), self.dtype, index)
    }

    /// Write element `index`, converting the scalar to this dtype.
    pub fn set(&mut self, index: usize, value: ScalarValue) {
        let dtype = self.dtype;
        write_scalar(self.make_mut(), dtype, index, value);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("dtype", &self.dtype)
            .field("len", &self.len())
            .field("shared", &self.is_shared())
            .finish()
    }
}

macro_rules! le_read {
    ($bytes:expr, $offset:expr, $ty:ty) => {{
        let size = std::mem::size_of::<$ty>();
        let mut raw = [0u8; std::mem::size_of::<$ty>()];
        raw.copy_from_slice(&$bytes[$offset..$offset + size]);
        <$ty>::from_le_bytes(raw)
    }};
}

/// Decode one element at `index` from little-endian bytes.
pub fn read_scalar(bytes: &[u8], dtype: Dtype, index: usize) -> ScalarValue {
    let off = index * dtype.size();
    match dtype {
        Dtype::Bool => ScalarValue::Bool(bytes[off] != 0),
        Dtype::Uint8 => ScalarValue::Uint(bytes[off] as u64),
        Dtype::Uint16 => ScalarValue::Uint(le_read!(bytes, off, u16) as u64),
        Dtype::Uint32 => ScalarValue::Uint(le_read!(bytes, off, u32) as u64),
        Dtype::Uint64 => ScalarValue::Uint(le_read!(bytes, off, u64)),
        Dtype::Int8 => ScalarValue::Int(bytes[off] as i8 as i64),
        Dtype::Int16 => ScalarValue::Int(le_read!(bytes, off, i16) as i64),
        Dtype::Int32 => ScalarValue::Int(le_read!(bytes, off, i32) as i64),
        Dtype::Int64 => ScalarValue::Int(le_read!(bytes, off, i64)),
        Dtype::Float16 => {
            ScalarValue::Float(f16::from_bits(le_read!(bytes, off, u16)).to_f64())
        }
        Dtype::Bfloat16 => {
            ScalarValue::Float(bf16::from_bits(le_read!(bytes, off, u16)).to_f64())
        }
        Dtype::Float32 => ScalarValue::Float(le_read!(bytes, off, f32) as f64),
        Dtype::Complex64 => ScalarValue::Complex(
            le_read!(bytes, off, f32) as f64,
            le_read!(bytes, off + 4, f32) as f64,
        ),
    }
}

/// Encode one scalar into little-endian bytes at `index`, converting to
/// `dtype` with C-style truncation for integers.
pub fn write_scalar(bytes: &mut [u8], dtype: Dtype, index: usize, value: ScalarValue) {
    let off = index * dtype.size();
    match dtype {
        Dtype::Bool => bytes[off] = value.is_truthy() as u8,
        Dtype::Uint8 => bytes[off] = as_u64(value) as u8,
        Dtype::Uint16 => {
            bytes[off..off + 2].copy_from_slice(&(as_u64(value) as u16).to_le_bytes())
        }
        Dtype::Uint32 => {
            bytes[off..off + 4].copy_from_slice(&(as_u64(value) as u32).to_le_bytes())
        }
        Dtype::Uint64 => bytes[off..off + 8].copy_from_slice(&as_u64(value).to_le_bytes()),
        Dtype::Int8 => bytes[off] = as_i64(value) as i8 as u8,
        Dtype::Int16 => {
            bytes[off..off + 2].copy_from_slice(&(as_i64(value) as i16).to_le_bytes())
        }
        Dtype::Int32 => {
            bytes[off..off + 4].copy_from_slice(&(as_i64(value) as i32).to_le_bytes())
        }
        Dtype::Int64 => bytes[off..off + 8].copy_from_slice(&as_i64(value).to_le_bytes()),
        Dtype::Float16 => bytes[off..off + 2]
            .copy_from_slice(&f16::from_f64(value.to_f64()).to_bits().to_le_bytes()),
        Dtype::Bfloat16 => bytes[off..off + 2]
            .copy_from_slice(&bf16::from_f64(value.to_f64()).to_bits().to_le_bytes()),
        Dtype::Float32 => {
            bytes[off..off + 4].copy_from_slice(&(value.to_f64() as f32).to_le_bytes())
        }
        Dtype::Complex64 => {
            let (re, im) = value.to_complex();
            bytes[off..off + 4].copy_from_slice(&(re as f32).to_le_bytes());
            bytes[off + 4..off + 8].copy_from_slice(&(im as f32).to_le_bytes());
        }
    }
}

fn as_u64(value: ScalarValue) -> u64 {
    match value {
        ScalarValue::Bool(v) => v as u64,
        ScalarValue::Int(v) => v as u64,
        ScalarValue::Uint(v) => v,
        ScalarValue::Float(v) => v as u64,
        ScalarValue::Complex(re, _) => re as u64,
    }
}

fn as_i64(value: ScalarValue) -> i64 {
    match value {
        ScalarValue::Bool(v) => v as i64,
        ScalarValue::Int(v) => v,
        ScalarValue::Uint(v) => v as i64,
        ScalarValue::Float(v) => v as i64,
        ScalarValue::Complex(re, _) => re as i64,
    }
}

/// Range check for host integer literals landing in an integer dtype.
pub fn check_int_range(dtype: Dtype, value: i64) -> Result<()> {
    let ok = match dtype {
        Dtype::Bool => value == 0 || value == 1,
        Dtype::Uint8 => (0..=u8::MAX as i64).contains(&value),
        Dtype::Uint16 => (0..=u16::MAX as i64).contains(&value),
        Dtype::Uint32 => (0..=u32::MAX as i64).contains(&value),
        Dtype::Uint64 => value >= 0,
        Dtype::Int8 => (i8::MIN as i64..=i8::MAX as i64).contains(&value),
        Dtype::Int16 => (i16::MIN as i64..=i16::MAX as i64).contains(&value),
        Dtype::Int32 => (i32::MIN as i64..=i32::MAX as i64).contains(&value),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::value(format!(
            "Integer value {value} is out of range for {dtype}."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_dtypes() {
        for &(dtype, value) in &[
            (Dtype::Bool, ScalarValue::Bool(true)),
            (Dtype::Uint8, ScalarValue::Uint(200)),
            (Dtype::Uint16, ScalarValue::Uint(60_000)),
            (Dtype::Uint32, ScalarValue::Uint(4_000_000_000)),
            (Dtype::Uint64, ScalarValue::Uint(u64::MAX)),
            (Dtype::Int8, ScalarValue::Int(-100)),
            (Dtype::Int16, ScalarValue::Int(-30_000)),
            (Dtype::Int32, ScalarValue::Int(-2_000_000_000)),
            (Dtype::Int64, ScalarValue::Int(i64::MIN)),
            (Dtype::Float32, ScalarValue::Float(1.5)),
            (Dtype::Complex64, ScalarValue::Complex(1.0, -2.0)),
        ] {
            let mut buf = Buffer::new(dtype, 3);
            buf.set(1, value);
            assert_eq!(buf.get(1), value, "{dtype}");
        }
    }

    #[test]
    fn test_half_precision_rounding() {
        let mut buf = Buffer::new(Dtype::Float16, 1);
        buf.set(0, ScalarValue::Float(1.0));
        assert_eq!(buf.get(0), ScalarValue::Float(1.0));

        let mut buf = Buffer::new(Dtype::Bfloat16, 1);
        buf.set(0, ScalarValue::Float(2.5));
        assert_eq!(buf.get(0), ScalarValue::Float(2.5));
    }

    #[test]
    fn test_copy_on_write() {
        let mut a = Buffer::new(Dtype::Int32, 4);
        a.set(0, ScalarValue::Int(7));
        let mut b = a.clone();
        assert!(a.is_shared());
        b.set(0, ScalarValue::Int(9));
        assert_eq!(a.get(0), ScalarValue::Int(7));
        assert_eq!(b.get(0), ScalarValue::Int(9));
        assert!(!b.is_shared());
    }

    #[test]
    fn test_foreign_buffer_reads_external_bytes() {
        let bytes: Arc<[u8]> = vec![1u8, 2, 3, 4].into();
        let buf = Buffer::foreign(Dtype::Uint8, bytes);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.get(2), ScalarValue::Uint(3));
    }

    // Exact active/peak equality is asserted in tests/memory.rs, where no
    // other allocations run concurrently.
    #[test]
    fn test_peak_covers_active() {
        let _buf = Buffer::new(Dtype::Float32, 256);
        assert!(get_peak_memory() >= 1024);
    }

    #[test]
    fn test_int_range_check() {
        assert!(check_int_range(Dtype::Uint8, 255).is_ok());
        assert!(check_int_range(Dtype::Uint8, 256).is_err());
        assert!(check_int_range(Dtype::Uint8, -1).is_err());
        assert!(check_int_range(Dtype::Int8, -128).is_ok());
        assert!(check_int_range(Dtype::Int8, 128).is_err());
        assert!(check_int_range(Dtype::Uint64, -1).is_err());
        assert!(check_int_range(Dtype::Int64, i64::MIN).is_ok());
        assert!(check_int_range(Dtype::Float32, i64::MAX).is_ok());
    }
}
