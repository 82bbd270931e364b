//! Graph node operations and their scalar semantics.
//!
//! Every lazy node carries one [`Op`]. Result dtype rules live here next to
//! the scalar kernels the interpreter applies element by element.

use crate::dtype::{promote, Category, Dtype, ScalarValue};
use crate::indexing::IndexPlan;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    Negate,
    Abs,
    LogicalNot,
    Real,
    Imag,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
    LogicalAnd,
    LogicalOr,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// How a scatter combines an incoming value with the stored one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScatterMode {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
}

/// The operation a graph node performs on its sources.
#[derive(Clone, Debug)]
pub enum Op {
    /// Materialized leaf; no sources.
    Source,
    /// Constant fill of the node's shape.
    Full(ScalarValue),
    /// Evenly spaced values along a single axis.
    Arange { start: f64, step: f64 },
    /// Element conversion to the node's dtype.
    Cast,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Compare(CompareOp),
    /// Stretch the source to the node's shape.
    Broadcast,
    /// Same elements, new extents.
    Reshape,
    /// Axis permutation.
    Transpose(Vec<usize>),
    /// Basic and advanced index read.
    Gather(IndexPlan),
    /// Index write: sources are [target, indices.., value].
    Scatter { plan: IndexPlan, mode: ScatterMode },
    /// Join equally shaped sources along a new leading axis.
    Stack,
}

impl UnaryOp {
    pub fn result_dtype(self, dtype: Dtype) -> Dtype {
        match self {
            UnaryOp::LogicalNot => Dtype::Bool,
            UnaryOp::Abs | UnaryOp::Real | UnaryOp::Imag => {
                if dtype == Dtype::Complex64 {
                    Dtype::Float32
                } else {
                    dtype
                }
            }
            UnaryOp::Negate => dtype,
        }
    }
}

impl BinaryOp {
    /// Promoted result dtype. Division always leaves the integer domain.
    pub fn result_dtype(self, a: Dtype, b: Dtype) -> Dtype {
        match self {
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => Dtype::Bool,
            BinaryOp::Divide => {
                let p = promote(a, b);
                if p == Dtype::Complex64 || p.is_floating() {
                    p
                } else {
                    Dtype::Float32
                }
            }
            _ => promote(a, b),
        }
    }
}

/// Apply a unary op to one element. `dtype` is the source dtype.
pub fn apply_unary(op: UnaryOp, dtype: Dtype, value: ScalarValue) -> ScalarValue {
    match op {
        UnaryOp::LogicalNot => ScalarValue::Bool(!value.is_truthy()),
        UnaryOp::Negate => match value {
            ScalarValue::Bool(v) => ScalarValue::Int(-(v as i64)),
            ScalarValue::Int(v) => ScalarValue::Int(v.wrapping_neg()),
            ScalarValue::Uint(v) => ScalarValue::Uint(v.wrapping_neg()),
            ScalarValue::Float(v) => ScalarValue::Float(-v),
            ScalarValue::Complex(re, im) => ScalarValue::Complex(-re, -im),
        },
        UnaryOp::Abs => match value {
            ScalarValue::Int(v) => ScalarValue::Int(v.wrapping_abs()),
            ScalarValue::Float(v) => ScalarValue::Float(v.abs()),
            ScalarValue::Complex(re, im) => ScalarValue::Float((re * re + im * im).sqrt()),
            other => other,
        },
        UnaryOp::Real => match value {
            ScalarValue::Complex(re, _) => ScalarValue::Float(re),
            other => other,
        },
        UnaryOp::Imag => match value {
            ScalarValue::Complex(_, im) => ScalarValue::Float(im),
            _ => zero_of(dtype),
        },
    }
}

fn zero_of(dtype: Dtype) -> ScalarValue {
    match dtype.category() {
        Category::Bool => ScalarValue::Bool(false),
        Category::UnsignedInt => ScalarValue::Uint(0),
        Category::SignedInt => ScalarValue::Int(0),
        Category::Float => ScalarValue::Float(0.0),
        Category::Complex => ScalarValue::Complex(0.0, 0.0),
    }
}

/// Apply a binary op to two elements already converted to the computation
/// dtype. Integer arithmetic wraps like the stored width will anyway.
pub fn apply_binary(
    op: BinaryOp,
    dtype: Dtype,
    a: ScalarValue,
    b: ScalarValue,
) -> ScalarValue {
    match op {
        BinaryOp::LogicalAnd => return ScalarValue::Bool(a.is_truthy() && b.is_truthy()),
        BinaryOp::LogicalOr => return ScalarValue::Bool(a.is_truthy() || b.is_truthy()),
        _ => {}
    }
    match dtype.category() {
        Category::Complex => {
            let (ar, ai) = a.to_complex();
            let (br, bi) = b.to_complex();
            let (re, im) = match op {
                BinaryOp::Add => (ar + br, ai + bi),
                BinaryOp::Subtract => (ar - br, ai - bi),
                BinaryOp::Multiply => (ar * br - ai * bi, ar * bi + ai * br),
                BinaryOp::Divide => {
                    let denom = br * br + bi * bi;
                    ((ar * br + ai * bi) / denom, (ai * br - ar * bi) / denom)
                }
                // Ordering over complex compares real parts, then imaginary.
                BinaryOp::Maximum => {
                    if (ar, ai) >= (br, bi) {
                        (ar, ai)
                    } else {
                        (br, bi)
                    }
                }
                BinaryOp::Minimum => {
                    if (ar, ai) <= (br, bi) {
                        (ar, ai)
                    } else {
                        (br, bi)
                    }
                }
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!(),
            };
            ScalarValue::Complex(re, im)
        }
        Category::Float => {
            let x = a.to_f64();
            let y = b.to_f64();
            let v = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Subtract => x - y,
                BinaryOp::Multiply => x * y,
                BinaryOp::Divide => x / y,
                BinaryOp::Maximum => {
                    if x.is_nan() || y.is_nan() {
                        f64::NAN
                    } else {
                        x.max(y)
                    }
                }
                BinaryOp::Minimum => {
                    if x.is_nan() || y.is_nan() {
                        f64::NAN
                    } else {
                        x.min(y)
                    }
                }
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!(),
            };
            ScalarValue::Float(v)
        }
        Category::UnsignedInt => {
            let x = match a {
                ScalarValue::Uint(v) => v,
                other => other.to_f64() as u64,
            };
            let y = match b {
                ScalarValue::Uint(v) => v,
                other => other.to_f64() as u64,
            };
            let v = match op {
                BinaryOp::Add => x.wrapping_add(y),
                BinaryOp::Subtract => x.wrapping_sub(y),
                BinaryOp::Multiply => x.wrapping_mul(y),
                BinaryOp::Divide => unreachable!("integer divide promotes to float"),
                BinaryOp::Maximum => x.max(y),
                BinaryOp::Minimum => x.min(y),
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!(),
            };
            ScalarValue::Uint(v)
        }
        Category::SignedInt | Category::Bool => {
            let x = match a {
                ScalarValue::Int(v) => v,
                ScalarValue::Uint(v) => v as i64,
                ScalarValue::Bool(v) => v as i64,
                other => other.to_f64() as i64,
            };
            let y = match b {
                ScalarValue::Int(v) => v,
                ScalarValue::Uint(v) => v as i64,
                ScalarValue::Bool(v) => v as i64,
                other => other.to_f64() as i64,
            };
            let v = match op {
                BinaryOp::Add => x.wrapping_add(y),
                BinaryOp::Subtract => x.wrapping_sub(y),
                BinaryOp::Multiply => x.wrapping_mul(y),
                BinaryOp::Divide => unreachable!("integer divide promotes to float"),
                BinaryOp::Maximum => x.max(y),
                BinaryOp::Minimum => x.min(y),
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!(),
            };
            if dtype == Dtype::Bool {
                ScalarValue::Bool(v != 0)
            } else {
                ScalarValue::Int(v)
            }
        }
    }
}

/// Elementwise comparison over two values in the promoted dtype.
pub fn apply_compare(op: CompareOp, dtype: Dtype, a: ScalarValue, b: ScalarValue) -> bool {
    match dtype.category() {
        Category::Complex => {
            let x = a.to_complex();
            let y = b.to_complex();
            match op {
                CompareOp::Equal => x == y,
                CompareOp::NotEqual => x != y,
                CompareOp::Less => x < y,
                CompareOp::LessEqual => x <= y,
                CompareOp::Greater => x > y,
                CompareOp::GreaterEqual => x >= y,
            }
        }
        Category::UnsignedInt => {
            let x = match a {
                ScalarValue::Uint(v) => v,
                other => other.to_f64() as u64,
            };
            let y = match b {
                ScalarValue::Uint(v) => v,
                other => other.to_f64() as u64,
            };
            compare_ord(op, x, y)
        }
        Category::SignedInt | Category::Bool => {
            let x = match a {
                ScalarValue::Int(v) => v,
                ScalarValue::Bool(v) => v as i64,
                ScalarValue::Uint(v) => v as i64,
                other => other.to_f64() as i64,
            };
            let y = match b {
                ScalarValue::Int(v) => v,
                ScalarValue::Bool(v) => v as i64,
                ScalarValue::Uint(v) => v as i64,
                other => other.to_f64() as i64,
            };
            compare_ord(op, x, y)
        }
        Category::Float => {
            let x = a.to_f64();
            let y = b.to_f64();
            match op {
                CompareOp::Equal => x == y,
                CompareOp::NotEqual => x != y,
                CompareOp::Less => x < y,
                CompareOp::LessEqual => x <= y,
                CompareOp::Greater => x > y,
                CompareOp::GreaterEqual => x >= y,
            }
        }
    }
}

fn compare_ord<T: Ord>(op: CompareOp, x: T, y: T) -> bool {
    match op {
        CompareOp::Equal => x == y,
        CompareOp::NotEqual => x != y,
        CompareOp::Less => x < y,
        CompareOp::LessEqual => x <= y,
        CompareOp::Greater => x > y,
        CompareOp::GreaterEqual => x >= y,
    }
}

/// Combine a stored element with an incoming one under a scatter mode.
pub fn apply_scatter(
    mode: ScatterMode,
    dtype: Dtype,
    stored: ScalarValue,
    incoming: ScalarValue,
) -> ScalarValue {
    let op = match mode {
        ScatterMode::Assign => return incoming,
        ScatterMode::Add => BinaryOp::Add,
        ScatterMode::Subtract => BinaryOp::Subtract,
        ScatterMode::Multiply => BinaryOp::Multiply,
        ScatterMode::Divide => BinaryOp::Divide,
        ScatterMode::Maximum => BinaryOp::Maximum,
        ScatterMode::Minimum => BinaryOp::Minimum,
    };
    // Accumulating division stays in the target dtype, so run it in the
    // float domain and let the store cast back.
    if op == BinaryOp::Divide && !dtype.is_floating() && dtype != Dtype::Complex64 {
        return ScalarValue::Float(stored.to_f64() / incoming.to_f64());
    }
    apply_binary(op, dtype, stored, incoming)
}
