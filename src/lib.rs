//! Weft: lazily evaluated multidimensional arrays.
//!
//! Arrays are handles on a computation graph. Building one records the
//! operation, shape and dtype immediately; elements are only computed when
//! something forces them, such as [`Array::eval`], scalar extraction or
//! printing. On top of the graph the crate provides:
//!
//! - **dtype**: the closed dtype set and its explicit promotion table
//! - **indexing**: full slice/ellipsis/newaxis/array index expressions,
//!   for reads, in-place writes and functional accumulation
//! - **eval**: non-recursive graph evaluation with eager source release
//! - **buffer**: copy-on-write storage with active/peak memory accounting
//! - **view**: zero-copy exchange with external strided-memory consumers
//!
//! # Example
//!
//! ```
//! use weft::prelude::*;
//!
//! let a = Array::from_slice(&[1.0f32, 2.0, 3.0], &[3])?;
//! let b = a.add(1.0)?;
//! assert_eq!(b.to_vec::<f32>()?, vec![2.0, 3.0, 4.0]);
//! # Ok::<(), weft::Error>(())
//! ```

pub mod array;
pub mod buffer;
pub mod dtype;
pub mod error;
pub mod indexing;
pub mod ops;
pub mod shape;
pub mod view;

mod eval;
mod fmt;
mod interp;

pub mod prelude;

pub use array::{Array, NestedValue, Operand};
pub use dtype::Dtype;
pub use error::{Error, Result};
pub use indexing::IndexPart;
