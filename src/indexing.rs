//! Index expression resolution.
//!
//! An index expression is a sequence of [`IndexPart`]s applied to one array.
//! Building an [`IndexPlan`] normalizes the expression against the source
//! shape: the ellipsis is expanded, missing trailing axes get full slices,
//! integer indices are wrapped and bounds-checked, slices are clamped the
//! Python way, and advanced (array) indices are broadcast together and given
//! their output position. Index array values are only range-checked at
//! evaluation time, through [`IndexPlan::source_coords`].

use crate::array::{Array, View};
use crate::buffer::Buffer;
use crate::dtype::{Dtype, ScalarValue};
use crate::error::{Error, Result};
use crate::shape::{broadcast_shapes, normalize_index};

/// One element of an index expression.
#[derive(Clone, Debug)]
pub enum IndexPart {
    /// Select a single position along one axis, dropping it.
    Int(i64),
    /// Python-style half-open slice with optional bounds and step.
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    /// Insert a new axis of extent one.
    NewAxis,
    /// Expand to as many full slices as needed to consume every axis.
    Ellipsis,
    /// Integer array index (advanced indexing).
    Take(Array),
}

impl IndexPart {
    pub fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> IndexPart {
        IndexPart::Slice { start, stop, step }
    }

    pub fn full() -> IndexPart {
        IndexPart::Slice {
            start: None,
            stop: None,
            step: None,
        }
    }
}

impl From<i64> for IndexPart {
    fn from(index: i64) -> Self {
        IndexPart::Int(index)
    }
}

impl From<std::ops::Range<i64>> for IndexPart {
    fn from(range: std::ops::Range<i64>) -> Self {
        IndexPart::Slice {
            start: Some(range.start),
            stop: Some(range.end),
            step: None,
        }
    }
}

impl From<std::ops::RangeFull> for IndexPart {
    fn from(_: std::ops::RangeFull) -> Self {
        IndexPart::full()
    }
}

impl From<std::ops::RangeFrom<i64>> for IndexPart {
    fn from(range: std::ops::RangeFrom<i64>) -> Self {
        IndexPart::Slice {
            start: Some(range.start),
            stop: None,
            step: None,
        }
    }
}

impl From<std::ops::RangeTo<i64>> for IndexPart {
    fn from(range: std::ops::RangeTo<i64>) -> Self {
        IndexPart::Slice {
            start: None,
            stop: Some(range.end),
            step: None,
        }
    }
}

impl From<&Array> for IndexPart {
    fn from(index: &Array) -> Self {
        IndexPart::Take(index.clone())
    }
}

impl From<Array> for IndexPart {
    fn from(index: Array) -> Self {
        IndexPart::Take(index)
    }
}

impl From<&[i64]> for IndexPart {
    fn from(values: &[i64]) -> Self {
        let mut buffer = Buffer::new(Dtype::Int64, values.len());
        for (i, &v) in values.iter().enumerate() {
            buffer.set(i, ScalarValue::Int(v));
        }
        let shape = vec![values.len()];
        IndexPart::Take(Array::from_view(
            View::contiguous(buffer, &shape),
            shape,
            Dtype::Int64,
        ))
    }
}

impl From<Vec<i64>> for IndexPart {
    fn from(values: Vec<i64>) -> Self {
        values.as_slice().into()
    }
}

/// A normalized per-axis selector.
#[derive(Clone, Debug)]
pub(crate) enum PlanPart {
    /// Fixed coordinate; consumes a source axis, produces no output axis.
    Int(usize),
    /// Strided range; consumes a source axis, produces one output axis.
    Slice { start: isize, step: isize, len: usize },
    /// Produces an output axis of extent one, consumes nothing.
    NewAxis,
    /// Advanced index; coordinate comes from index array `slot`.
    Take { slot: usize },
}

/// A resolved index expression, shape-checked but value-lazy.
#[derive(Clone, Debug)]
pub struct IndexPlan {
    pub(crate) parts: Vec<PlanPart>,
    /// Broadcast shape of all advanced indices. Empty when none and the
    /// expression is purely basic.
    pub(crate) adv_shape: Vec<usize>,
    /// Output axis where the advanced block starts.
    pub(crate) adv_position: usize,
    /// Whether the advanced indices sat next to each other in the
    /// expression. When they did not, the block moves to the front.
    pub(crate) adv_contiguous: bool,
    pub(crate) out_shape: Vec<usize>,
    pub(crate) num_indices: usize,
}

impl IndexPlan {
    pub fn has_advanced(&self) -> bool {
        self.num_indices > 0
    }

    pub fn out_shape(&self) -> &[usize] {
        &self.out_shape
    }

    /// Build a plan for `parts` applied to an array of shape `src_shape`.
    /// Returns the plan together with the advanced index arrays in slot
    /// order, ready to become graph sources.
    pub fn build(src_shape: &[usize], parts: &[IndexPart]) -> Result<(IndexPlan, Vec<Array>)> {
        let expanded = expand_ellipsis(src_shape.len(), parts)?;

        let mut plan_parts = Vec::with_capacity(expanded.len());
        let mut indices: Vec<Array> = Vec::new();
        let mut adv_shape: Vec<usize> = Vec::new();
        let mut axis = 0usize;

        for part in &expanded {
            match part {
                IndexPart::Int(i) => {
                    let coord = normalize_index(*i, axis, src_shape[axis])?;
                    plan_parts.push(PlanPart::Int(coord));
                    axis += 1;
                }
                IndexPart::Slice { start, stop, step } => {
                    let (start, step, len) =
                        normalize_slice(*start, *stop, *step, src_shape[axis])?;
                    plan_parts.push(PlanPart::Slice { start, step, len });
                    axis += 1;
                }
                IndexPart::NewAxis => plan_parts.push(PlanPart::NewAxis),
                IndexPart::Take(index) => {
                    if !index.dtype().is_integer() {
                        return Err(Error::type_error(format!(
                            "Indices must be integral, got {}.",
                            index.dtype()
                        )));
                    }
                    adv_shape = broadcast_shapes(&adv_shape, &index.shape())?;
                    plan_parts.push(PlanPart::Take {
                        slot: indices.len(),
                    });
                    indices.push(index.clone());
                    axis += 1;
                }
                IndexPart::Ellipsis => unreachable!("expanded above"),
            }
        }

        // The advanced block is contiguous when no slice or new axis falls
        // between the first and last index array. Plain integers do not
        // split it.
        let take_positions: Vec<usize> = plan_parts
            .iter()
            .enumerate()
            .filter(|(_, p)| matches!(p, PlanPart::Take { .. }))
            .map(|(i, _)| i)
            .collect();
        let adv_contiguous = match (take_positions.first(), take_positions.last()) {
            (Some(&first), Some(&last)) => plan_parts[first..=last]
                .iter()
                .all(|p| matches!(p, PlanPart::Take { .. } | PlanPart::Int(_))),
            _ => true,
        };

        let adv_position = if !indices.is_empty() && adv_contiguous {
            let first = take_positions[0];
            plan_parts[..first]
                .iter()
                .filter(|p| matches!(p, PlanPart::Slice { .. } | PlanPart::NewAxis))
                .count()
        } else {
            0
        };

        let mut basic_axes: Vec<usize> = Vec::new();
        for part in &plan_parts {
            match part {
                PlanPart::Slice { len, .. } => basic_axes.push(*len),
                PlanPart::NewAxis => basic_axes.push(1),
                PlanPart::Int(_) | PlanPart::Take { .. } => {}
            }
        }
        let mut out_shape = Vec::with_capacity(basic_axes.len() + adv_shape.len());
        if indices.is_empty() {
            out_shape = basic_axes;
        } else {
            out_shape.extend_from_slice(&basic_axes[..adv_position.min(basic_axes.len())]);
            out_shape.extend_from_slice(&adv_shape);
            out_shape.extend_from_slice(&basic_axes[adv_position.min(basic_axes.len())..]);
        }

        Ok((
            IndexPlan {
                parts: plan_parts,
                adv_shape,
                adv_position,
                adv_contiguous,
                out_shape,
                num_indices: indices.len(),
            },
            indices,
        ))
    }

    /// Map an output coordinate to the source coordinate it reads. The
    /// callback fetches one advanced index value, already broadcast over
    /// `adv_shape`; values are wrapped and bounds-checked here.
    pub(crate) fn source_coords(
        &self,
        out: &[usize],
        src_shape: &[usize],
        index_at: &dyn Fn(usize, &[usize]) -> i64,
    ) -> Result<Vec<usize>> {
        let adv_rank = self.adv_shape.len();
        let adv_coords: &[usize] = if self.num_indices > 0 {
            &out[self.adv_position..self.adv_position + adv_rank]
        } else {
            &[]
        };

        let mut src = Vec::with_capacity(src_shape.len());
        let mut out_axis = 0usize;
        let mut src_axis = 0usize;
        for part in &self.parts {
            match part {
                PlanPart::Int(coord) => {
                    src.push(*coord);
                    src_axis += 1;
                }
                PlanPart::Slice { start, step, .. } => {
                    if self.num_indices > 0 && out_axis == self.adv_position {
                        out_axis += adv_rank;
                    }
                    let c = out[out_axis] as isize;
                    src.push((start + step * c) as usize);
                    out_axis += 1;
                    src_axis += 1;
                }
                PlanPart::NewAxis => {
                    if self.num_indices > 0 && out_axis == self.adv_position {
                        out_axis += adv_rank;
                    }
                    out_axis += 1;
                }
                PlanPart::Take { slot } => {
                    let raw = index_at(*slot, adv_coords);
                    src.push(normalize_index(raw, src_axis, src_shape[src_axis])?);
                    src_axis += 1;
                }
            }
        }
        Ok(src)
    }
}

/// Replace the ellipsis (or the implicit one at the end) with full slices so
/// that the parts consume every source axis.
fn expand_ellipsis(rank: usize, parts: &[IndexPart]) -> Result<Vec<IndexPart>> {
    let ellipses = parts
        .iter()
        .filter(|p| matches!(p, IndexPart::Ellipsis))
        .count();
    if ellipses > 1 {
        return Err(Error::value(
            "An index can only have a single ellipsis.",
        ));
    }
    let consuming = parts
        .iter()
        .filter(|p| !matches!(p, IndexPart::NewAxis | IndexPart::Ellipsis))
        .count();
    if consuming > rank {
        return Err(Error::value(format!(
            "Too many indices for array with {rank} dimensions."
        )));
    }
    let fill = rank - consuming;

    let mut out = Vec::with_capacity(parts.len() + fill);
    let mut expanded = false;
    for part in parts {
        if matches!(part, IndexPart::Ellipsis) {
            out.extend(std::iter::repeat_with(IndexPart::full).take(fill));
            expanded = true;
        } else {
            out.push(part.clone());
        }
    }
    if !expanded {
        out.extend(std::iter::repeat_with(IndexPart::full).take(fill));
    }
    Ok(out)
}

/// Python slice normalization. Out-of-range bounds clamp, a reversed range
/// is empty, only a zero step is an error.
fn normalize_slice(
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    size: usize,
) -> Result<(isize, isize, usize)> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(Error::value("Slice step cannot be zero."));
    }
    let n = size as i64;

    let clamp = |v: i64, lo: i64, hi: i64| v.max(lo).min(hi);
    let resolve = |v: Option<i64>, default: i64, lo: i64, hi: i64| match v {
        None => default,
        Some(v) if v < 0 => clamp(v + n, lo, hi),
        Some(v) => clamp(v, lo, hi),
    };

    let (start, stop) = if step > 0 {
        (resolve(start, 0, 0, n), resolve(stop, n, 0, n))
    } else {
        (resolve(start, n - 1, -1, n - 1), resolve(stop, -1, -1, n - 1))
    };

    let len = if step > 0 {
        ((stop - start).max(0) + step - 1) / step
    } else {
        ((start - stop).max(0) + (-step) - 1) / (-step)
    };
    Ok((start as isize, step as isize, len as usize))
}
