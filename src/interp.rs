//! CPU kernels for the graph interpreter.
//!
//! [`execute`] materializes one node whose sources are already evaluated.
//! Elementwise kernels iterate output coordinates and go through the scalar
//! helpers in `ops`; broadcast, transpose and contiguous reshape produce
//! strided views over the source buffer instead of copying.

use log::trace;

use crate::array::{Array, View};
use crate::buffer::Buffer;
use crate::dtype::{promote, Dtype, ScalarValue};
use crate::error::{Error, Result};
use crate::indexing::IndexPlan;
use crate::ops::{apply_binary, apply_compare, apply_scatter, apply_unary, Op, ScatterMode};
use crate::shape::{contiguous_strides, numel, stride_offset, unravel};

/// Compute the view for one node from its evaluated sources.
pub(crate) fn execute(op: &Op, src: &[Array], shape: &[usize], dtype: Dtype) -> Result<View> {
    trace!("execute {op:?} -> shape {shape:?} dtype {dtype}");
    match op {
        Op::Source => Err(Error::runtime("Source node reached the interpreter.")),
        Op::Full(value) => {
            let n = numel(shape);
            let mut buffer = Buffer::new(dtype, n);
            for i in 0..n {
                buffer.set(i, *value);
            }
            Ok(View::contiguous(buffer, shape))
        }
        Op::Arange { start, step } => {
            let n = numel(shape);
            let mut buffer = Buffer::new(dtype, n);
            for i in 0..n {
                let v = start + step * i as f64;
                let value = if dtype.is_integer() || dtype == Dtype::Bool {
                    ScalarValue::Int(v as i64)
                } else {
                    ScalarValue::Float(v)
                };
                buffer.set(i, value);
            }
            Ok(View::contiguous(buffer, shape))
        }
        Op::Cast => {
            let input = source_view(src, 0)?;
            let n = numel(shape);
            let mut buffer = Buffer::new(dtype, n);
            for flat in 0..n {
                let coords = unravel(flat, shape);
                buffer.set(flat, input.get(&coords));
            }
            Ok(View::contiguous(buffer, shape))
        }
        Op::Unary(op) => {
            let input = source_view(src, 0)?;
            let src_dtype = src[0].dtype();
            let n = numel(shape);
            let mut buffer = Buffer::new(dtype, n);
            for flat in 0..n {
                let coords = unravel(flat, shape);
                buffer.set(flat, apply_unary(*op, src_dtype, input.get(&coords)));
            }
            Ok(View::contiguous(buffer, shape))
        }
        Op::Binary(op) => {
            let a = source_view(src, 0)?;
            let b = source_view(src, 1)?;
            let a_shape = src[0].shape();
            let b_shape = src[1].shape();
            let n = numel(shape);
            let mut buffer = Buffer::new(dtype, n);
            for flat in 0..n {
                let coords = unravel(flat, shape);
                let x = broadcast_get(&a, &a_shape, &coords);
                let y = broadcast_get(&b, &b_shape, &coords);
                buffer.set(flat, apply_binary(*op, dtype, x, y));
            }
            Ok(View::contiguous(buffer, shape))
        }
        Op::Compare(op) => {
            let a = source_view(src, 0)?;
            let b = source_view(src, 1)?;
            let a_shape = src[0].shape();
            let b_shape = src[1].shape();
            let common = promote(src[0].dtype(), src[1].dtype());
            let n = numel(shape);
            let mut buffer = Buffer::new(Dtype::Bool, n);
            for flat in 0..n {
                let coords = unravel(flat, shape);
                let x = broadcast_get(&a, &a_shape, &coords);
                let y = broadcast_get(&b, &b_shape, &coords);
                buffer.set(flat, ScalarValue::Bool(apply_compare(*op, common, x, y)));
            }
            Ok(View::contiguous(buffer, shape))
        }
        Op::Broadcast => {
            // Zero-copy: stretched axes read through a zero stride.
            let input = source_view(src, 0)?;
            let src_shape = src[0].shape();
            let extra = shape.len() - src_shape.len();
            let mut strides = vec![0isize; shape.len()];
            for (j, &dim) in src_shape.iter().enumerate() {
                strides[extra + j] = if dim == 1 { 0 } else { input.strides[j] };
            }
            Ok(View {
                buffer: input.buffer,
                strides,
                offset: input.offset,
            })
        }
        Op::Reshape => {
            let input = source_view(src, 0)?;
            let src_shape = src[0].shape();
            if input.is_contiguous(&src_shape) {
                return Ok(View {
                    strides: contiguous_strides(shape),
                    offset: 0,
                    buffer: input.buffer,
                });
            }
            // Strided source: compact it while renumbering.
            let n = numel(shape);
            let mut buffer = Buffer::new(dtype, n);
            for flat in 0..n {
                let coords = unravel(flat, &src_shape);
                buffer.set(flat, input.get(&coords));
            }
            Ok(View::contiguous(buffer, shape))
        }
        Op::Transpose(perm) => {
            let input = source_view(src, 0)?;
            let strides: Vec<isize> = perm.iter().map(|&a| input.strides[a]).collect();
            Ok(View {
                buffer: input.buffer,
                strides,
                offset: input.offset,
            })
        }
        Op::Gather(plan) => gather(plan, src, shape, dtype),
        Op::Scatter { plan, mode } => scatter(plan, *mode, src, shape, dtype),
        Op::Stack => {
            let n = numel(shape);
            let mut buffer = Buffer::new(dtype, n);
            let item_shape = &shape[1..];
            let item_len = numel(item_shape);
            for (i, part) in src.iter().enumerate() {
                let view = source_view(src, i)?;
                let part_shape = part.shape();
                for flat in 0..item_len {
                    let coords = unravel(flat, &part_shape);
                    buffer.set(i * item_len + flat, view.get(&coords));
                }
            }
            Ok(View::contiguous(buffer, shape))
        }
    }
}

fn source_view(src: &[Array], i: usize) -> Result<View> {
    src.get(i)
        .and_then(|a| a.view())
        .ok_or_else(|| Error::runtime("Interpreter reached an unevaluated source."))
}

/// Read one element of a view broadcast against a larger coordinate.
/// Surplus leading axes on either side are unit by construction.
fn broadcast_get(view: &View, shape: &[usize], out: &[usize]) -> ScalarValue {
    let mut coords = Vec::with_capacity(shape.len());
    if shape.len() > out.len() {
        let extra = shape.len() - out.len();
        coords.extend(std::iter::repeat(0).take(extra));
        for (j, &dim) in shape[extra..].iter().enumerate() {
            coords.push(if dim == 1 { 0 } else { out[j] });
        }
    } else {
        let offset = out.len() - shape.len();
        for (j, &dim) in shape.iter().enumerate() {
            coords.push(if dim == 1 { 0 } else { out[offset + j] });
        }
    }
    view.get(&coords)
}

/// Read one advanced index value broadcast over the advanced-block shape.
fn index_value(view: &View, shape: &[usize], adv_coords: &[usize]) -> i64 {
    match broadcast_get(view, shape, adv_coords) {
        ScalarValue::Int(v) => v,
        ScalarValue::Uint(v) => v as i64,
        other => other.to_f64() as i64,
    }
}

fn gather(plan: &IndexPlan, src: &[Array], shape: &[usize], dtype: Dtype) -> Result<View> {
    let target = source_view(src, 0)?;
    let target_shape = src[0].shape();
    let index_views: Vec<(View, Vec<usize>)> = (1..src.len())
        .map(|i| Ok((source_view(src, i)?, src[i].shape())))
        .collect::<Result<_>>()?;
    let n = numel(shape);
    let mut buffer = Buffer::new(dtype, n);
    let lookup = |slot: usize, adv: &[usize]| -> i64 {
        let (view, idx_shape) = &index_views[slot];
        index_value(view, idx_shape, adv)
    };
    for flat in 0..n {
        let out_coords = unravel(flat, shape);
        let src_coords = plan.source_coords(&out_coords, &target_shape, &lookup)?;
        buffer.set(flat, target.get(&src_coords));
    }
    Ok(View::contiguous(buffer, shape))
}

fn scatter(
    plan: &IndexPlan,
    mode: ScatterMode,
    src: &[Array],
    shape: &[usize],
    dtype: Dtype,
) -> Result<View> {
    let target = source_view(src, 0)?;
    let target_shape = src[0].shape();
    let value = source_view(src, src.len() - 1)?;
    let value_shape = src[src.len() - 1].shape();
    let index_views: Vec<(View, Vec<usize>)> = (1..src.len() - 1)
        .map(|i| Ok((source_view(src, i)?, src[i].shape())))
        .collect::<Result<_>>()?;

    // Compact copy of the target; the source buffer stays untouched so
    // other readers of it are unaffected.
    let n = numel(shape);
    let mut buffer = Buffer::new(dtype, n);
    for flat in 0..n {
        let coords = unravel(flat, shape);
        buffer.set(flat, target.get(&coords));
    }

    let out_shape = plan.out_shape();
    let out_strides = contiguous_strides(shape);
    let lookup = |slot: usize, adv: &[usize]| -> i64 {
        let (view, idx_shape) = &index_views[slot];
        index_value(view, idx_shape, adv)
    };
    // Row-major traversal makes duplicate plain assignments last-write-wins
    // while accumulate modes apply once per occurrence.
    for flat in 0..numel(out_shape) {
        let out_coords = unravel(flat, out_shape);
        let src_coords = plan.source_coords(&out_coords, &target_shape, &lookup)?;
        let at = stride_offset(&src_coords, &out_strides) as usize;
        let stored = buffer.get(at);
        let incoming = broadcast_get(&value, &value_shape, &out_coords);
        buffer.set(at, apply_scatter(mode, dtype, stored, incoming));
    }
    Ok(View::contiguous(buffer, shape))
}
