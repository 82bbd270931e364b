//! Human-readable rendering.
//!
//! `array([1, 2, 3], dtype=int32)`, with axes longer than six elements
//! truncated to their first and last three. Display forces evaluation; a
//! failure renders inside the brackets rather than panicking.

use std::fmt;

use crate::array::{Array, View};
use crate::dtype::ScalarValue;

const TRUNCATE_AT: usize = 6;
const EDGE: usize = 3;

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Err(err) = self.eval() {
            return write!(f, "array(<{err}>, dtype={})", self.dtype());
        }
        let view = match self.view() {
            Some(view) => view,
            None => return write!(f, "array(<no data>, dtype={})", self.dtype()),
        };
        let shape = self.shape();
        let mut body = String::new();
        write_axis(&mut body, &view, &shape, &mut Vec::new());
        write!(f, "array({body}, dtype={})", self.dtype())
    }
}

fn write_axis(out: &mut String, view: &View, shape: &[usize], coords: &mut Vec<usize>) {
    if coords.len() == shape.len() {
        out.push_str(&format_element(view.get(coords)));
        return;
    }
    let axis = coords.len();
    let len = shape[axis];
    out.push('[');
    if len > TRUNCATE_AT {
        for i in 0..EDGE {
            coords.push(i);
            write_axis(out, view, shape, coords);
            coords.pop();
            out.push_str(", ");
        }
        out.push_str("...");
        for i in len - EDGE..len {
            out.push_str(", ");
            coords.push(i);
            write_axis(out, view, shape, coords);
            coords.pop();
        }
    } else {
        for i in 0..len {
            if i > 0 {
                out.push_str(", ");
            }
            coords.push(i);
            write_axis(out, view, shape, coords);
            coords.pop();
        }
    }
    out.push(']');
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn format_element(value: ScalarValue) -> String {
    match value {
        ScalarValue::Bool(v) => if v { "true" } else { "false" }.to_string(),
        ScalarValue::Int(v) => format!("{v}"),
        ScalarValue::Uint(v) => format!("{v}"),
        ScalarValue::Float(v) => format_float(v),
        ScalarValue::Complex(re, im) => {
            if im < 0.0 {
                format!("{}-{}j", format_float(re), format_float(-im))
            } else {
                format!("{}+{}j", format_float(re), format_float(im))
            }
        }
    }
}
