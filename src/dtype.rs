//! Scalar element kinds and the dtype promotion table.

use std::fmt;

use half::{bf16, f16};

/// The closed set of scalar element kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Dtype {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float16,
    Bfloat16,
    Float32,
    Complex64,
}

/// Dtype category, ordered by promotion priority.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Category {
    Bool,
    UnsignedInt,
    SignedInt,
    Float,
    Complex,
}

pub const ALL_DTYPES: [Dtype; 13] = [
    Dtype::Bool,
    Dtype::Uint8,
    Dtype::Uint16,
    Dtype::Uint32,
    Dtype::Uint64,
    Dtype::Int8,
    Dtype::Int16,
    Dtype::Int32,
    Dtype::Int64,
    Dtype::Float16,
    Dtype::Bfloat16,
    Dtype::Float32,
    Dtype::Complex64,
];

impl Dtype {
    /// Element width in bytes.
    pub fn size(self) -> usize {
        match self {
            Dtype::Bool | Dtype::Uint8 | Dtype::Int8 => 1,
            Dtype::Uint16 | Dtype::Int16 | Dtype::Float16 | Dtype::Bfloat16 => 2,
            Dtype::Uint32 | Dtype::Int32 | Dtype::Float32 => 4,
            Dtype::Uint64 | Dtype::Int64 | Dtype::Complex64 => 8,
        }
    }

    pub fn category(self) -> Category {
        match self {
            Dtype::Bool => Category::Bool,
            Dtype::Uint8 | Dtype::Uint16 | Dtype::Uint32 | Dtype::Uint64 => Category::UnsignedInt,
            Dtype::Int8 | Dtype::Int16 | Dtype::Int32 | Dtype::Int64 => Category::SignedInt,
            Dtype::Float16 | Dtype::Bfloat16 | Dtype::Float32 => Category::Float,
            Dtype::Complex64 => Category::Complex,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self.category(), Category::UnsignedInt | Category::SignedInt)
    }

    pub fn is_floating(self) -> bool {
        matches!(self.category(), Category::Float)
    }

    fn index(self) -> usize {
        ALL_DTYPES.iter().position(|&d| d == self).unwrap_or(0)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dtype::Bool => "bool",
            Dtype::Uint8 => "uint8",
            Dtype::Uint16 => "uint16",
            Dtype::Uint32 => "uint32",
            Dtype::Uint64 => "uint64",
            Dtype::Int8 => "int8",
            Dtype::Int16 => "int16",
            Dtype::Int32 => "int32",
            Dtype::Int64 => "int64",
            Dtype::Float16 => "float16",
            Dtype::Bfloat16 => "bfloat16",
            Dtype::Float32 => "float32",
            Dtype::Complex64 => "complex64",
        };
        write!(f, "{name}")
    }
}

// The full pairwise promotion table. The rank-and-width rule is only an
// approximation: half-precision kinds absorb integers (except uint64, which
// promotes to float32 so the table stays associative), float16 x bfloat16
// gives float32, and uint64 x signed gives float32 because no signed kind is
// wide enough.
mod promote_table {
    use super::Dtype::{self, *};

    #[rustfmt::skip]
    pub(super) const TABLE: [[Dtype; 13]; 13] = [
    // Bool
    [Bool, Uint8, Uint16, Uint32, Uint64, Int8, Int16, Int32, Int64, Float16, Bfloat16, Float32, Complex64],
    // Uint8
    [Uint8, Uint8, Uint16, Uint32, Uint64, Int16, Int16, Int32, Int64, Float16, Bfloat16, Float32, Complex64],
    // Uint16
    [Uint16, Uint16, Uint16, Uint32, Uint64, Int32, Int32, Int32, Int64, Float16, Bfloat16, Float32, Complex64],
    // Uint32
    [Uint32, Uint32, Uint32, Uint32, Uint64, Int64, Int64, Int64, Int64, Float16, Bfloat16, Float32, Complex64],
    // Uint64
    [Uint64, Uint64, Uint64, Uint64, Uint64, Float32, Float32, Float32, Float32, Float32, Float32, Float32, Complex64],
    // Int8
    [Int8, Int16, Int32, Int64, Float32, Int8, Int16, Int32, Int64, Float16, Bfloat16, Float32, Complex64],
    // Int16
    [Int16, Int16, Int32, Int64, Float32, Int16, Int16, Int32, Int64, Float16, Bfloat16, Float32, Complex64],
    // Int32
    [Int32, Int32, Int32, Int64, Float32, Int32, Int32, Int32, Int64, Float16, Bfloat16, Float32, Complex64],
    // Int64
    [Int64, Int64, Int64, Int64, Float32, Int64, Int64, Int64, Int64, Float16, Bfloat16, Float32, Complex64],
    // Float16
    [Float16, Float16, Float16, Float16, Float32, Float16, Float16, Float16, Float16, Float16, Float32, Float32, Complex64],
    // Bfloat16
    [Bfloat16, Bfloat16, Bfloat16, Bfloat16, Float32, Bfloat16, Bfloat16, Bfloat16, Bfloat16, Float32, Bfloat16, Float32, Complex64],
    // Float32
    [Float32, Float32, Float32, Float32, Float32, Float32, Float32, Float32, Float32, Float32, Float32, Float32, Complex64],
    // Complex64
    [Complex64, Complex64, Complex64, Complex64, Complex64, Complex64, Complex64, Complex64, Complex64, Complex64, Complex64, Complex64, Complex64],
    ];
}

/// Total promotion over two array dtypes. Commutative and associative.
pub fn promote(a: Dtype, b: Dtype) -> Dtype {
    promote_table::TABLE[a.index()][b.index()]
}

/// An un-typed host scalar.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
}

impl Literal {
    /// The dtype a bare literal takes when no array operand constrains it.
    pub fn default_dtype(self) -> Dtype {
        match self {
            Literal::Bool(_) => Dtype::Bool,
            Literal::Int(_) => Dtype::Int32,
            Literal::Float(_) => Dtype::Float32,
            Literal::Complex(..) => Dtype::Complex64,
        }
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Literal {
        Literal::Bool(v)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Literal {
        Literal::Int(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Literal {
        Literal::Int(v as i64)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Literal {
        Literal::Float(v)
    }
}

impl From<f32> for Literal {
    fn from(v: f32) -> Literal {
        Literal::Float(v as f64)
    }
}

/// Weak-scalar promotion: combine an array dtype with a host literal.
///
/// A float literal pulls integer and boolean arrays up to the default
/// floating dtype but a floating array absorbs it unchanged; an integer
/// literal never upgrades category and only fills in int32 for a boolean
/// array; complex literals always give complex64.
pub fn promote_literal(dtype: Dtype, literal: Literal) -> Dtype {
    match literal {
        Literal::Bool(_) => dtype,
        Literal::Int(_) => {
            if dtype == Dtype::Bool {
                Dtype::Int32
            } else {
                dtype
            }
        }
        Literal::Float(_) => {
            if dtype.is_floating() || dtype == Dtype::Complex64 {
                dtype
            } else {
                Dtype::Float32
            }
        }
        Literal::Complex(..) => Dtype::Complex64,
    }
}

/// A concrete element value read out of a buffer.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
}

impl ScalarValue {
    pub fn to_f64(self) -> f64 {
        match self {
            ScalarValue::Bool(v) => v as u8 as f64,
            ScalarValue::Int(v) => v as f64,
            ScalarValue::Uint(v) => v as f64,
            ScalarValue::Float(v) => v,
            ScalarValue::Complex(re, _) => re,
        }
    }

    pub fn to_complex(self) -> (f64, f64) {
        match self {
            ScalarValue::Complex(re, im) => (re, im),
            other => (other.to_f64(), 0.0),
        }
    }

    pub fn is_truthy(self) -> bool {
        match self {
            ScalarValue::Bool(v) => v,
            ScalarValue::Int(v) => v != 0,
            ScalarValue::Uint(v) => v != 0,
            ScalarValue::Float(v) => v != 0.0,
            ScalarValue::Complex(re, im) => re != 0.0 || im != 0.0,
        }
    }
}

impl From<Literal> for ScalarValue {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Bool(v) => ScalarValue::Bool(v),
            Literal::Int(v) => ScalarValue::Int(v),
            Literal::Float(v) => ScalarValue::Float(v),
            Literal::Complex(re, im) => ScalarValue::Complex(re, im),
        }
    }
}

/// A complex64 element: two f32 components.
#[derive(Clone, Copy, PartialEq, Default, Debug)]
pub struct Complex64 {
    pub re: f32,
    pub im: f32,
}

impl Complex64 {
    pub fn new(re: f32, im: f32) -> Self {
        Complex64 { re, im }
    }
}

/// Rust types usable as array elements.
pub trait Element: Copy + Default + 'static {
    const DTYPE: Dtype;

    fn to_value(self) -> ScalarValue;
    fn from_value(value: ScalarValue) -> Self;
}

macro_rules! impl_int_element {
    ($($ty:ty => $dtype:ident, $variant:ident);+ $(;)?) => {
        $(
            impl Element for $ty {
                const DTYPE: Dtype = Dtype::$dtype;

                fn to_value(self) -> ScalarValue {
                    ScalarValue::$variant(self as _)
                }

                fn from_value(value: ScalarValue) -> Self {
                    match value {
                        ScalarValue::Bool(v) => v as u8 as $ty,
                        ScalarValue::Int(v) => v as $ty,
                        ScalarValue::Uint(v) => v as $ty,
                        ScalarValue::Float(v) => v as $ty,
                        ScalarValue::Complex(re, _) => re as $ty,
                    }
                }
            }
        )+
    };
}

impl_int_element!(
    u8  => Uint8,  Uint;
    u16 => Uint16, Uint;
    u32 => Uint32, Uint;
    u64 => Uint64, Uint;
    i8  => Int8,   Int;
    i16 => Int16,  Int;
    i32 => Int32,  Int;
    i64 => Int64,  Int;
);

impl Element for bool {
    const DTYPE: Dtype = Dtype::Bool;

    fn to_value(self) -> ScalarValue {
        ScalarValue::Bool(self)
    }

    fn from_value(value: ScalarValue) -> Self {
        value.is_truthy()
    }
}

impl Element for f32 {
    const DTYPE: Dtype = Dtype::Float32;

    fn to_value(self) -> ScalarValue {
        ScalarValue::Float(self as f64)
    }

    fn from_value(value: ScalarValue) -> Self {
        value.to_f64() as f32
    }
}

impl Element for f16 {
    const DTYPE: Dtype = Dtype::Float16;

    fn to_value(self) -> ScalarValue {
        ScalarValue::Float(self.to_f64())
    }

    fn from_value(value: ScalarValue) -> Self {
        f16::from_f64(value.to_f64())
    }
}

impl Element for bf16 {
    const DTYPE: Dtype = Dtype::Bfloat16;

    fn to_value(self) -> ScalarValue {
        ScalarValue::Float(self.to_f64())
    }

    fn from_value(value: ScalarValue) -> Self {
        bf16::from_f64(value.to_f64())
    }
}

impl Element for Complex64 {
    const DTYPE: Dtype = Dtype::Complex64;

    fn to_value(self) -> ScalarValue {
        ScalarValue::Complex(self.re as f64, self.im as f64)
    }

    fn from_value(value: ScalarValue) -> Self {
        let (re, im) = value.to_complex();
        Complex64::new(re as f32, im as f32)
    }
}
