//! Graph evaluation.
//!
//! A non-recursive post-order walk materializes every unevaluated ancestor
//! of the requested node. Shared nodes are deduplicated by pointer identity
//! and computed once. As soon as a node holds data its source edges are
//! dropped, so intermediate results release their buffers the moment the
//! last consumer finishes instead of living until the root does.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashSet;

use crate::array::{Array, ArrayData, Node};
use crate::error::Result;
use crate::interp;
use crate::ops::Op;

enum Visit {
    Enter(Node),
    Exit(Node),
}

/// Materialize `root`, computing ancestors bottom-up.
pub(crate) fn eval(root: &Array) -> Result<()> {
    if root.is_evaluated() {
        return Ok(());
    }
    debug!("eval: shape {:?} dtype {}", root.shape(), root.dtype());

    let mut stack = vec![Visit::Enter(root.node())];
    let mut scheduled: FxHashSet<*const RefCell<ArrayData>> = FxHashSet::default();

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(node) => {
                let ptr = Rc::as_ptr(&node);
                if node.borrow().data.is_some() || scheduled.contains(&ptr) {
                    continue;
                }
                scheduled.insert(ptr);
                let src = node.borrow().src.clone();
                stack.push(Visit::Exit(node));
                for child in src {
                    stack.push(Visit::Enter(child.node()));
                }
            }
            Visit::Exit(node) => {
                let (op, src, shape, dtype) = {
                    let inner = node.borrow();
                    (
                        inner.op.clone(),
                        inner.src.clone(),
                        inner.shape.clone(),
                        inner.dtype,
                    )
                };
                let view = interp::execute(&op, &src, &shape, dtype)?;
                let mut inner = node.borrow_mut();
                inner.data = Some(view);
                inner.op = Op::Source;
                // Release the subgraph; `src` still holds it until the
                // local clones drop at the end of this arm.
                inner.src.clear();
            }
        }
    }
    Ok(())
}
