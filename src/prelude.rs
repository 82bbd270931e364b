//! The `weft` prelude.
//!
//! This module provides a convenient way to import the most commonly used
//! items from the `weft` library.
//!
//! # Example
//!
//! ```
//! use weft::prelude::*;
//! ```

pub use crate::array::{Array, NestedValue, Operand};
pub use crate::buffer::{get_active_memory, get_peak_memory, reset_peak_memory};
pub use crate::dtype::{Complex64, Dtype, Element, Literal, ScalarValue};
pub use crate::error::{Error, Result};
pub use crate::indexing::IndexPart;
pub use crate::view::StridedView;
