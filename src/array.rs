//! The lazy multidimensional array.
//!
//! An [`Array`] is a cheap handle on a graph node. Nodes record the
//! operation, source handles, and the eagerly computed shape and dtype;
//! element storage only appears once [`Array::eval`] materializes the node.
//! Cloning a handle aliases the node, so in-place index writes are visible
//! through every clone.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::buffer::{check_int_range, Buffer};
use crate::dtype::{promote, promote_literal, Dtype, Element, Literal, ScalarValue};
use crate::error::{Error, Result};
use crate::indexing::{IndexPart, IndexPlan};
use crate::ops::{BinaryOp, CompareOp, Op, ScatterMode, UnaryOp};
use crate::shape::{
    broadcast_shapes, check_shape, contiguous_strides, numel, stride_offset, unravel,
};

/// Materialized storage for one node: a buffer plus the strided window of it
/// this node sees. Broadcast and transposed results share the buffer with
/// adjusted strides instead of copying.
#[derive(Clone, Debug)]
pub(crate) struct View {
    pub buffer: Buffer,
    pub strides: Vec<isize>,
    pub offset: isize,
}

impl View {
    pub(crate) fn contiguous(buffer: Buffer, shape: &[usize]) -> View {
        View {
            strides: contiguous_strides(shape),
            offset: 0,
            buffer,
        }
    }

    pub(crate) fn get(&self, coords: &[usize]) -> ScalarValue {
        let idx = self.offset + stride_offset(coords, &self.strides);
        self.buffer.get(idx as usize)
    }

    pub(crate) fn is_contiguous(&self, shape: &[usize]) -> bool {
        self.offset == 0 && self.strides == contiguous_strides(shape)
    }
}

pub(crate) struct ArrayData {
    pub op: Op,
    pub src: Vec<Array>,
    pub shape: Vec<usize>,
    pub dtype: Dtype,
    pub data: Option<View>,
}

/// One value node in the graph. Composition captures nodes; handles can be
/// rebound to a different node without touching graphs built earlier.
pub(crate) type Node = Rc<RefCell<ArrayData>>;

// Unevaluated graphs can be hundred-thousand-node chains; a recursive drop
// would blow the stack, so children are drained onto a work list.
impl Drop for ArrayData {
    fn drop(&mut self) {
        let mut pending: Vec<Array> = std::mem::take(&mut self.src);
        while let Some(Array(handle)) = pending.pop() {
            if let Ok(cell) = Rc::try_unwrap(handle) {
                if let Ok(node) = Rc::try_unwrap(cell.into_inner()) {
                    let mut data = node.into_inner();
                    pending.append(&mut data.src);
                }
            }
        }
    }
}

/// Handle on a lazy array. The outer cell is the handle's identity: clones
/// share it, and in-place writes swap the node inside so every clone sees
/// the update. Graphs composed from this array capture the node itself, so
/// a later rebinding never reaches into them.
#[derive(Clone)]
pub struct Array(pub(crate) Rc<RefCell<Node>>);

/// Host values an array can be combined with: another array, a scalar, a
/// nested list, or something the engine cannot interpret at all.
#[derive(Clone, Debug)]
pub enum Operand {
    Array(Array),
    Literal(Literal),
    List(Vec<NestedValue>),
    /// A foreign object, carried only for error messages and equality
    /// degradation.
    Opaque(&'static str),
}

impl From<&Array> for Operand {
    fn from(a: &Array) -> Operand {
        Operand::Array(a.clone())
    }
}

impl From<Array> for Operand {
    fn from(a: Array) -> Operand {
        Operand::Array(a)
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Operand {
        Operand::Literal(Literal::Bool(v))
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Operand {
        Operand::Literal(Literal::Int(v))
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Operand {
        Operand::Literal(Literal::Int(v as i64))
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Operand {
        Operand::Literal(Literal::Float(v))
    }
}

impl From<f32> for Operand {
    fn from(v: f32) -> Operand {
        Operand::Literal(Literal::Float(v as f64))
    }
}

impl From<Literal> for Operand {
    fn from(v: Literal) -> Operand {
        Operand::Literal(v)
    }
}

impl From<Vec<NestedValue>> for Operand {
    fn from(v: Vec<NestedValue>) -> Operand {
        Operand::List(v)
    }
}

/// A possibly nested host value used for construction and export.
#[derive(Clone, Debug)]
pub enum NestedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Array(Array),
    List(Vec<NestedValue>),
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.node();
        let inner = node.borrow();
        f.debug_struct("Array")
            .field("shape", &inner.shape)
            .field("dtype", &inner.dtype)
            .field("evaluated", &inner.data.is_some())
            .finish()
    }
}

impl PartialEq for NestedValue {
    fn eq(&self, other: &NestedValue) -> bool {
        use NestedValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Complex(ar, ai), Complex(br, bi)) => ar == br && ai == bi,
            (List(a), List(b)) => a == b,
            _ => false,
        }
    }
}

impl Array {
    /// The value node this handle currently points at.
    pub(crate) fn node(&self) -> Node {
        self.0.borrow().clone()
    }

    fn from_data(data: ArrayData) -> Array {
        Array(Rc::new(RefCell::new(Rc::new(RefCell::new(data)))))
    }

    /// A fresh handle pinned to the current value node. Rebinding the
    /// original handle later does not move this one.
    pub(crate) fn value_handle(&self) -> Array {
        Array(Rc::new(RefCell::new(self.node())))
    }

    /// Point this handle (and every clone of it) at another array's node.
    fn rebind(&self, other: &Array) {
        *self.0.borrow_mut() = other.node();
    }

    /// New lazy node. Sources are captured by value node, so an in-place
    /// write through one of the operand handles afterwards is not observed.
    pub(crate) fn from_node(op: Op, src: Vec<Array>, shape: Vec<usize>, dtype: Dtype) -> Array {
        let src = src.iter().map(Array::value_handle).collect();
        Array::from_data(ArrayData {
            op,
            src,
            shape,
            dtype,
            data: None,
        })
    }

    pub(crate) fn from_view(view: View, shape: Vec<usize>, dtype: Dtype) -> Array {
        Array::from_data(ArrayData {
            op: Op::Source,
            src: Vec::new(),
            shape,
            dtype,
            data: Some(view),
        })
    }

    // ------------------------------------------------------------------
    // Construction

    /// Dense array from a flat slice in row-major order.
    pub fn from_slice<T: Element>(values: &[T], shape: &[usize]) -> Result<Array> {
        check_shape(shape)?;
        if numel(shape) != values.len() {
            return Err(Error::value(format!(
                "Cannot reshape {} values into shape {shape:?}.",
                values.len()
            )));
        }
        let mut buffer = Buffer::new(T::DTYPE, values.len());
        for (i, v) in values.iter().enumerate() {
            buffer.set(i, v.to_value());
        }
        Ok(Array::from_view(
            View::contiguous(buffer, shape),
            shape.to_vec(),
            T::DTYPE,
        ))
    }

    /// Rank-0 array from one host value.
    pub fn scalar(value: impl Into<Literal>) -> Array {
        let literal = value.into();
        Array::full_impl(&[], literal.into(), literal.default_dtype())
    }

    fn full_impl(shape: &[usize], value: ScalarValue, dtype: Dtype) -> Array {
        Array::from_node(Op::Full(value), Vec::new(), shape.to_vec(), dtype)
    }

    pub fn full(shape: &[usize], value: impl Into<Literal>, dtype: Option<Dtype>) -> Result<Array> {
        check_shape(shape)?;
        let literal = value.into();
        let dtype = dtype.unwrap_or_else(|| literal.default_dtype());
        if let Literal::Int(v) = literal {
            if dtype.is_integer() || dtype == Dtype::Bool {
                check_int_range(dtype, v)?;
            }
        }
        Ok(Array::full_impl(shape, literal.into(), dtype))
    }

    pub fn zeros(shape: &[usize], dtype: Dtype) -> Result<Array> {
        check_shape(shape)?;
        Ok(Array::full_impl(shape, ScalarValue::Int(0), dtype))
    }

    pub fn ones(shape: &[usize], dtype: Dtype) -> Result<Array> {
        check_shape(shape)?;
        Ok(Array::full_impl(shape, ScalarValue::Int(1), dtype))
    }

    /// Evenly spaced values over `[start, stop)`.
    pub fn arange(start: f64, stop: f64, step: f64, dtype: Dtype) -> Result<Array> {
        if step == 0.0 {
            return Err(Error::value("Arange step cannot be zero."));
        }
        let count = ((stop - start) / step).ceil().max(0.0) as usize;
        check_shape(&[count])?;
        Ok(Array::from_node(
            Op::Arange { start, step },
            Vec::new(),
            vec![count],
            dtype,
        ))
    }

    /// Integer range `[0, stop)` as int32.
    pub fn iota(stop: i64) -> Result<Array> {
        Array::arange(0.0, stop as f64, 1.0, Dtype::Int32)
    }

    /// Build from a nested host value. Nesting depth gives the rank; sibling
    /// lengths must agree at every level. An explicit dtype overrides the
    /// inferred one.
    pub fn from_nested(value: &NestedValue, dtype: Option<Dtype>) -> Result<Array> {
        let built = build_nested(value)?;
        match dtype {
            Some(d) if d != built.dtype() => built.astype(d),
            _ => Ok(built),
        }
    }

    /// Join arrays of identical shape along a new leading axis.
    pub fn stack(parts: &[Array]) -> Result<Array> {
        let first = match parts.first() {
            Some(a) => a,
            None => return Err(Error::value("Cannot stack zero arrays.")),
        };
        let item_shape = first.shape();
        let mut dtype = first.dtype();
        for part in &parts[1..] {
            if part.shape() != item_shape {
                return Err(Error::value(
                    "Initialization encountered non-uniform length.",
                ));
            }
            dtype = promote(dtype, part.dtype());
        }
        let mut shape = Vec::with_capacity(item_shape.len() + 1);
        shape.push(parts.len());
        shape.extend_from_slice(&item_shape);
        check_shape(&shape)?;
        Ok(Array::from_node(Op::Stack, parts.to_vec(), shape, dtype))
    }

    // ------------------------------------------------------------------
    // Introspection

    pub fn shape(&self) -> Vec<usize> {
        self.node().borrow().shape.clone()
    }

    pub fn ndim(&self) -> usize {
        self.node().borrow().shape.len()
    }

    pub fn size(&self) -> usize {
        numel(&self.node().borrow().shape)
    }

    pub fn dtype(&self) -> Dtype {
        self.node().borrow().dtype
    }

    pub fn itemsize(&self) -> usize {
        self.dtype().size()
    }

    /// Total bytes the materialized result occupies.
    pub fn nbytes(&self) -> usize {
        self.size() * self.dtype().size()
    }

    /// Whether two handles currently refer to the same value node.
    pub fn same_node(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.node(), &other.node())
    }

    pub(crate) fn view(&self) -> Option<View> {
        self.node().borrow().data.clone()
    }

    pub fn is_evaluated(&self) -> bool {
        self.node().borrow().data.is_some()
    }

    // ------------------------------------------------------------------
    // Evaluation and export

    /// Materialize this node (and any unevaluated ancestors).
    pub fn eval(&self) -> Result<()> {
        crate::eval::eval(self)
    }

    /// The sole element of a one-element array as a host scalar.
    pub fn item_value(&self) -> Result<ScalarValue> {
        if self.size() != 1 {
            return Err(Error::value(format!(
                "Only arrays with one element can be converted to scalars; shape is {:?}.",
                self.shape()
            )));
        }
        self.eval()?;
        let node = self.node();
        let inner = node.borrow();
        let view = inner
            .data
            .as_ref()
            .ok_or_else(|| Error::runtime("Evaluation left node without data."))?;
        let coords = vec![0usize; inner.shape.len()];
        Ok(view.get(&coords))
    }

    /// The sole element converted to a concrete Rust type.
    pub fn item<T: Element>(&self) -> Result<T> {
        Ok(T::from_value(self.item_value()?))
    }

    /// All elements in row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.eval()?;
        let node = self.node();
        let inner = node.borrow();
        let view = inner
            .data
            .as_ref()
            .ok_or_else(|| Error::runtime("Evaluation left node without data."))?;
        let n = numel(&inner.shape);
        let mut out = Vec::with_capacity(n);
        for flat in 0..n {
            let coords = unravel(flat, &inner.shape);
            out.push(T::from_value(view.get(&coords)));
        }
        Ok(out)
    }

    /// Export to a nested host value mirroring the array's rank.
    pub fn to_nested(&self) -> Result<NestedValue> {
        self.eval()?;
        let node = self.node();
        let inner = node.borrow();
        let view = inner
            .data
            .as_ref()
            .ok_or_else(|| Error::runtime("Evaluation left node without data."))?;
        fn go(view: &View, shape: &[usize], coords: &mut Vec<usize>) -> NestedValue {
            if coords.len() == shape.len() {
                return match view.get(coords) {
                    ScalarValue::Bool(v) => NestedValue::Bool(v),
                    ScalarValue::Int(v) => NestedValue::Int(v),
                    ScalarValue::Uint(v) => NestedValue::Int(v as i64),
                    ScalarValue::Float(v) => NestedValue::Float(v),
                    ScalarValue::Complex(re, im) => NestedValue::Complex(re, im),
                };
            }
            let axis = coords.len();
            let mut items = Vec::with_capacity(shape[axis]);
            for i in 0..shape[axis] {
                coords.push(i);
                items.push(go(view, shape, coords));
                coords.pop();
            }
            NestedValue::List(items)
        }
        Ok(go(view, &inner.shape, &mut Vec::new()))
    }

    // ------------------------------------------------------------------
    // Shape and dtype transforms

    pub fn astype(&self, dtype: Dtype) -> Result<Array> {
        if dtype == self.dtype() {
            return Ok(self.value_handle());
        }
        Ok(Array::from_node(
            Op::Cast,
            vec![self.clone()],
            self.shape(),
            dtype,
        ))
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Array> {
        check_shape(shape)?;
        if numel(shape) != self.size() {
            return Err(Error::value(format!(
                "Cannot reshape array of shape {:?} into {shape:?}.",
                self.shape()
            )));
        }
        Ok(Array::from_node(
            Op::Reshape,
            vec![self.clone()],
            shape.to_vec(),
            self.dtype(),
        ))
    }

    /// Permute axes; `None` reverses them.
    pub fn transpose(&self, axes: Option<&[usize]>) -> Result<Array> {
        let rank = self.ndim();
        let perm: Vec<usize> = match axes {
            Some(axes) => {
                let mut seen = vec![false; rank];
                if axes.len() != rank {
                    return Err(Error::value(format!(
                        "Transpose axes {axes:?} do not match rank {rank}."
                    )));
                }
                for &a in axes {
                    if a >= rank || seen[a] {
                        return Err(Error::value(format!(
                            "Transpose axes {axes:?} are not a permutation."
                        )));
                    }
                    seen[a] = true;
                }
                axes.to_vec()
            }
            None => (0..rank).rev().collect(),
        };
        let src_shape = self.shape();
        let shape: Vec<usize> = perm.iter().map(|&a| src_shape[a]).collect();
        Ok(Array::from_node(
            Op::Transpose(perm),
            vec![self.clone()],
            shape,
            self.dtype(),
        ))
    }

    /// Stretch to a larger shape under broadcasting rules.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Array> {
        check_shape(shape)?;
        if !crate::shape::broadcastable_to(&self.shape(), shape) {
            return Err(Error::value(format!(
                "Cannot broadcast array of shape {:?} to {shape:?}.",
                self.shape()
            )));
        }
        Ok(Array::from_node(
            Op::Broadcast,
            vec![self.clone()],
            shape.to_vec(),
            self.dtype(),
        ))
    }

    // ------------------------------------------------------------------
    // Arithmetic

    /// Resolve an operand against this array's dtype, applying weak scalar
    /// promotion for literals.
    fn resolve_operand(&self, operand: Operand, what: &str) -> Result<(Array, Dtype)> {
        match operand {
            Operand::Array(a) => {
                let d = a.dtype();
                Ok((a, d))
            }
            Operand::Literal(literal) => {
                let dtype = promote_literal(self.dtype(), literal);
                if let Literal::Int(v) = literal {
                    if dtype.is_integer() {
                        check_int_range(dtype, v)?;
                    }
                }
                Ok((Array::full_impl(&[], literal.into(), dtype), dtype))
            }
            Operand::List(items) => {
                let a = build_nested(&NestedValue::List(items))?;
                let d = a.dtype();
                Ok((a, d))
            }
            Operand::Opaque(name) => Err(Error::type_error(format!(
                "Cannot perform {what} with object of type {name}."
            ))),
        }
    }

    fn binary(&self, op: BinaryOp, rhs: impl Into<Operand>) -> Result<Array> {
        let (other, other_dtype) = self.resolve_operand(rhs.into(), "arithmetic")?;
        let shape = broadcast_shapes(&self.shape(), &other.shape())?;
        let dtype = op.result_dtype(self.dtype(), other_dtype);
        trace!(
            "binary {:?}: {:?} x {:?} -> {:?} {}",
            op,
            self.shape(),
            other.shape(),
            shape,
            dtype
        );
        Ok(Array::from_node(
            Op::Binary(op),
            vec![self.clone(), other],
            shape,
            dtype,
        ))
    }

    pub fn add(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn subtract(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.binary(BinaryOp::Subtract, rhs)
    }

    pub fn multiply(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.binary(BinaryOp::Multiply, rhs)
    }

    pub fn divide(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.binary(BinaryOp::Divide, rhs)
    }

    pub fn maximum(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.binary(BinaryOp::Maximum, rhs)
    }

    pub fn minimum(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.binary(BinaryOp::Minimum, rhs)
    }

    pub fn logical_and(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.binary(BinaryOp::LogicalAnd, rhs)
    }

    pub fn logical_or(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.binary(BinaryOp::LogicalOr, rhs)
    }

    fn unary(&self, op: UnaryOp) -> Array {
        Array::from_node(
            Op::Unary(op),
            vec![self.clone()],
            self.shape(),
            op.result_dtype(self.dtype()),
        )
    }

    pub fn negate(&self) -> Array {
        self.unary(UnaryOp::Negate)
    }

    pub fn abs(&self) -> Array {
        self.unary(UnaryOp::Abs)
    }

    pub fn logical_not(&self) -> Array {
        self.unary(UnaryOp::LogicalNot)
    }

    pub fn real(&self) -> Array {
        self.unary(UnaryOp::Real)
    }

    pub fn imag(&self) -> Array {
        self.unary(UnaryOp::Imag)
    }

    /// Rebind this handle to `self <op> rhs`, so every clone of the handle
    /// observes the update. Graphs composed earlier captured the old value
    /// node and are unaffected.
    fn binary_in_place(&self, op: BinaryOp, rhs: impl Into<Operand>) -> Result<()> {
        let updated = self.binary(op, rhs)?;
        self.rebind(&updated);
        Ok(())
    }

    pub fn add_in_place(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.binary_in_place(BinaryOp::Add, rhs)
    }

    pub fn subtract_in_place(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.binary_in_place(BinaryOp::Subtract, rhs)
    }

    pub fn multiply_in_place(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.binary_in_place(BinaryOp::Multiply, rhs)
    }

    pub fn divide_in_place(&self, rhs: impl Into<Operand>) -> Result<()> {
        self.binary_in_place(BinaryOp::Divide, rhs)
    }

    // ------------------------------------------------------------------
    // Comparison

    fn compare(&self, op: CompareOp, rhs: Operand) -> Result<Array> {
        let ordering = !matches!(op, CompareOp::Equal | CompareOp::NotEqual);
        let (other, _dtype) = match rhs {
            Operand::Opaque(name) => {
                if ordering {
                    return Err(Error::value(format!(
                        "Cannot perform ordering comparison with object of type {name}."
                    )));
                }
                // Equality against an uninterpretable object degrades.
                let answer = matches!(op, CompareOp::NotEqual);
                return Ok(Array::full_impl(
                    &[],
                    ScalarValue::Bool(answer),
                    Dtype::Bool,
                ));
            }
            Operand::List(items) => {
                if ordering {
                    return Err(Error::value(
                        "Cannot perform ordering comparison with a list.",
                    ));
                }
                let a = build_nested(&NestedValue::List(items))?;
                let d = a.dtype();
                (a, d)
            }
            other => self.resolve_operand(other, "comparison")?,
        };
        let shape = broadcast_shapes(&self.shape(), &other.shape())?;
        Ok(Array::from_node(
            Op::Compare(op),
            vec![self.clone(), other],
            shape,
            Dtype::Bool,
        ))
    }

    pub fn eq(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.compare(CompareOp::Equal, rhs.into())
    }

    pub fn ne(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.compare(CompareOp::NotEqual, rhs.into())
    }

    pub fn lt(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.compare(CompareOp::Less, rhs.into())
    }

    pub fn le(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.compare(CompareOp::LessEqual, rhs.into())
    }

    pub fn gt(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.compare(CompareOp::Greater, rhs.into())
    }

    pub fn ge(&self, rhs: impl Into<Operand>) -> Result<Array> {
        self.compare(CompareOp::GreaterEqual, rhs.into())
    }

    // ------------------------------------------------------------------
    // Indexing

    /// Read through an index expression; always lazy.
    pub fn index(&self, parts: &[IndexPart]) -> Result<Array> {
        let (plan, indices) = IndexPlan::build(&self.shape(), parts)?;
        let shape = plan.out_shape().to_vec();
        let mut src = Vec::with_capacity(1 + indices.len());
        src.push(self.clone());
        src.extend(indices);
        Ok(Array::from_node(
            Op::Gather(plan),
            src,
            shape,
            self.dtype(),
        ))
    }

    /// Write through an index expression, rebinding this handle to the
    /// updated value. Index and value expressions may reference this array;
    /// they read the value it held before the write.
    pub fn index_assign(&self, parts: &[IndexPart], value: impl Into<Operand>) -> Result<()> {
        let updated = self.scatter_node(parts, value.into(), ScatterMode::Assign)?;
        self.rebind(&updated);
        Ok(())
    }

    /// Functional accumulate-at-indices. Unlike [`Array::index_assign`],
    /// duplicate indices each apply and the result is a new array.
    pub fn at<'a>(&'a self, parts: &'a [IndexPart]) -> AtIndex<'a> {
        AtIndex { array: self, parts }
    }

    fn scatter_node(&self, parts: &[IndexPart], value: Operand, mode: ScatterMode) -> Result<Array> {
        let (plan, indices) = IndexPlan::build(&self.shape(), parts)?;
        if plan.has_advanced() && !plan.adv_contiguous {
            return Err(Error::value(
                "Cannot write through advanced indices separated by slices.",
            ));
        }
        let (value, _) = self.resolve_operand(value, "assignment")?;
        // The value must broadcast to the shape the same read would produce.
        // Surplus leading unit axes on the value are tolerated.
        let value_shape = value.shape();
        let trimmed: Vec<usize> = {
            let extra = value_shape.len().saturating_sub(plan.out_shape().len());
            if value_shape[..extra].iter().all(|&d| d == 1) {
                value_shape[extra..].to_vec()
            } else {
                value_shape.clone()
            }
        };
        if !crate::shape::broadcastable_to(&trimmed, plan.out_shape()) {
            return Err(Error::value(format!(
                "Cannot broadcast value of shape {value_shape:?} to indexed shape {:?}.",
                plan.out_shape()
            )));
        }
        let shape = self.shape();
        let dtype = self.dtype();
        let mut src = Vec::with_capacity(2 + indices.len());
        src.push(self.clone());
        src.extend(indices);
        src.push(value);
        Ok(Array::from_node(Op::Scatter { plan, mode }, src, shape, dtype))
    }
}

/// Pending accumulate-at-indices operation returned by [`Array::at`].
pub struct AtIndex<'a> {
    array: &'a Array,
    parts: &'a [IndexPart],
}

impl AtIndex<'_> {
    fn apply(&self, mode: ScatterMode, value: Operand) -> Result<Array> {
        self.array.scatter_node(self.parts, value, mode)
    }

    pub fn add(&self, value: impl Into<Operand>) -> Result<Array> {
        self.apply(ScatterMode::Add, value.into())
    }

    pub fn subtract(&self, value: impl Into<Operand>) -> Result<Array> {
        self.apply(ScatterMode::Subtract, value.into())
    }

    pub fn multiply(&self, value: impl Into<Operand>) -> Result<Array> {
        self.apply(ScatterMode::Multiply, value.into())
    }

    pub fn divide(&self, value: impl Into<Operand>) -> Result<Array> {
        self.apply(ScatterMode::Divide, value.into())
    }

    pub fn maximum(&self, value: impl Into<Operand>) -> Result<Array> {
        self.apply(ScatterMode::Maximum, value.into())
    }

    pub fn minimum(&self, value: impl Into<Operand>) -> Result<Array> {
        self.apply(ScatterMode::Minimum, value.into())
    }
}

impl std::ops::Neg for &Array {
    type Output = Array;

    fn neg(self) -> Array {
        self.negate()
    }
}

/// Infer shape and dtype of a nested value, then materialize it. A list of
/// arrays stacks lazily; a pure scalar nest fills a buffer eagerly.
fn build_nested(value: &NestedValue) -> Result<Array> {
    match value {
        NestedValue::Bool(v) => Ok(Array::scalar(Literal::Bool(*v))),
        NestedValue::Int(v) => Ok(Array::scalar(Literal::Int(*v))),
        NestedValue::Float(v) => Ok(Array::scalar(Literal::Float(*v))),
        NestedValue::Complex(re, im) => Ok(Array::scalar(Literal::Complex(*re, *im))),
        NestedValue::Array(a) => Ok(a.clone()),
        NestedValue::List(items) => {
            if items.is_empty() {
                return Array::zeros(&[0], Dtype::Float32);
            }
            if items
                .iter()
                .any(|i| matches!(i, NestedValue::Array(_) | NestedValue::List(_)))
            {
                let parts: Vec<Array> = items
                    .iter()
                    .map(build_nested)
                    .collect::<Result<_>>()?;
                let mut dtype = parts[0].dtype();
                for p in &parts[1..] {
                    dtype = promote(dtype, p.dtype());
                }
                let parts: Vec<Array> = parts
                    .into_iter()
                    .map(|p| p.astype(dtype))
                    .collect::<Result<_>>()?;
                return Array::stack(&parts);
            }
            // Flat list of scalars: infer the dtype, fill a buffer.
            let mut dtype = Dtype::Bool;
            for item in items {
                let literal = match item {
                    NestedValue::Bool(v) => Literal::Bool(*v),
                    NestedValue::Int(v) => Literal::Int(*v),
                    NestedValue::Float(v) => Literal::Float(*v),
                    NestedValue::Complex(re, im) => Literal::Complex(*re, *im),
                    _ => unreachable!("handled above"),
                };
                dtype = promote(dtype, literal.default_dtype());
            }
            let mut buffer = Buffer::new(dtype, items.len());
            for (i, item) in items.iter().enumerate() {
                let value = match item {
                    NestedValue::Bool(v) => ScalarValue::Bool(*v),
                    NestedValue::Int(v) => ScalarValue::Int(*v),
                    NestedValue::Float(v) => ScalarValue::Float(*v),
                    NestedValue::Complex(re, im) => ScalarValue::Complex(*re, *im),
                    _ => unreachable!("handled above"),
                };
                buffer.set(i, value);
            }
            let shape = vec![items.len()];
            Ok(Array::from_view(
                View::contiguous(buffer, &shape),
                shape,
                dtype,
            ))
        }
    }
}
