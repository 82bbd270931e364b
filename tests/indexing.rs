// tests/indexing.rs

use weft::prelude::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn iota2d() -> Array {
    // [[0, 1, 2, 3], [4, 5, 6, 7], [8, 9, 10, 11]]
    Array::arange(0.0, 12.0, 1.0, Dtype::Int32)
        .unwrap()
        .reshape(&[3, 4])
        .unwrap()
}

fn iota3d() -> Array {
    Array::arange(0.0, 24.0, 1.0, Dtype::Int32)
        .unwrap()
        .reshape(&[2, 3, 4])
        .unwrap()
}

#[test]
fn test_int_index_read() {
    init();
    let a = iota2d();
    let row = a.index(&[IndexPart::Int(1)]).unwrap();
    assert_eq!(row.shape(), vec![4]);
    assert_eq!(row.to_vec::<i32>().unwrap(), vec![4, 5, 6, 7]);

    let last = a.index(&[IndexPart::Int(-1), IndexPart::Int(-1)]).unwrap();
    assert_eq!(last.item::<i32>().unwrap(), 11);
}

#[test]
fn test_int_index_out_of_bounds_is_eager() {
    init();
    let a = iota2d();
    assert!(a.index(&[IndexPart::Int(3)]).is_err());
    assert!(a.index(&[IndexPart::Int(-4)]).is_err());
}

#[test]
fn test_slice_read() {
    init();
    let a = iota2d();
    let mid = a
        .index(&[IndexPart::from(1..3), IndexPart::from(..2i64)])
        .unwrap();
    assert_eq!(mid.shape(), vec![2, 2]);
    assert_eq!(mid.to_vec::<i32>().unwrap(), vec![4, 5, 8, 9]);
}

#[test]
fn test_slice_clamps_instead_of_erroring() {
    init();
    let v = Array::arange(0.0, 5.0, 1.0, Dtype::Int32).unwrap();
    let big = v.index(&[IndexPart::slice(Some(2), Some(100), None)]).unwrap();
    assert_eq!(big.to_vec::<i32>().unwrap(), vec![2, 3, 4]);
    let empty = v.index(&[IndexPart::slice(Some(4), Some(1), None)]).unwrap();
    assert_eq!(empty.shape(), vec![0]);
}

#[test]
fn test_negative_step_read() {
    init();
    let v = Array::arange(0.0, 5.0, 1.0, Dtype::Int32).unwrap();
    let rev = v.index(&[IndexPart::slice(None, None, Some(-1))]).unwrap();
    assert_eq!(rev.to_vec::<i32>().unwrap(), vec![4, 3, 2, 1, 0]);
    let skip = v.index(&[IndexPart::slice(None, None, Some(-2))]).unwrap();
    assert_eq!(skip.to_vec::<i32>().unwrap(), vec![4, 2, 0]);
}

#[test]
fn test_ellipsis_and_newaxis() {
    init();
    let x = iota3d();
    let a = x
        .index(&[IndexPart::Ellipsis, IndexPart::Int(0)])
        .unwrap();
    assert_eq!(a.shape(), vec![2, 3]);
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![0, 4, 8, 12, 16, 20]);

    let b = x
        .index(&[IndexPart::NewAxis, IndexPart::Ellipsis, IndexPart::NewAxis])
        .unwrap();
    assert_eq!(b.shape(), vec![1, 2, 3, 4, 1]);
}

#[test]
fn test_advanced_row_gather() {
    init();
    let a = iota2d();
    let idx = Array::from_slice(&[2i32, 0], &[2]).unwrap();
    let picked = a.index(&[IndexPart::from(&idx)]).unwrap();
    assert_eq!(picked.shape(), vec![2, 4]);
    assert_eq!(
        picked.to_vec::<i32>().unwrap(),
        vec![8, 9, 10, 11, 0, 1, 2, 3]
    );
}

#[test]
fn test_advanced_negative_values_wrap() {
    init();
    let a = iota2d();
    let idx = Array::from_slice(&[-1i32], &[1]).unwrap();
    let picked = a.index(&[IndexPart::from(&idx)]).unwrap();
    assert_eq!(picked.to_vec::<i32>().unwrap(), vec![8, 9, 10, 11]);
}

#[test]
fn test_advanced_out_of_bounds_surfaces_at_eval() {
    init();
    let a = iota2d();
    let idx = Array::from_slice(&[10i32], &[1]).unwrap();
    // Building is shape-only, so this succeeds.
    let picked = a.index(&[IndexPart::from(&idx)]).unwrap();
    assert!(picked.eval().is_err());
}

#[test]
fn test_advanced_pair_gather() {
    init();
    let a = iota2d();
    let rows = Array::from_slice(&[0i32, 1, 2], &[3]).unwrap();
    let cols = Array::from_slice(&[0i32, 1, 0], &[3]).unwrap();
    let picked = a
        .index(&[IndexPart::from(&rows), IndexPart::from(&cols)])
        .unwrap();
    assert_eq!(picked.shape(), vec![3]);
    assert_eq!(picked.to_vec::<i32>().unwrap(), vec![0, 5, 8]);
}

#[test]
fn test_advanced_broadcast_indices() {
    init();
    let a = iota2d();
    let rows = Array::from_slice(&[0i32, 2], &[2, 1]).unwrap();
    let cols = Array::from_slice(&[0i32, 3], &[2]).unwrap();
    let picked = a
        .index(&[IndexPart::from(&rows), IndexPart::from(&cols)])
        .unwrap();
    assert_eq!(picked.shape(), vec![2, 2]);
    assert_eq!(picked.to_vec::<i32>().unwrap(), vec![0, 3, 8, 11]);
}

#[test]
fn test_separated_advanced_block_moves_to_front() {
    init();
    let x = iota3d();
    let i = Array::from_slice(&[1i32, 0], &[2]).unwrap();
    let k = Array::from_slice(&[3i32, 0], &[2]).unwrap();
    let picked = x
        .index(&[IndexPart::from(&i), IndexPart::full(), IndexPart::from(&k)])
        .unwrap();
    assert_eq!(picked.shape(), vec![2, 3]);
    assert_eq!(
        picked.to_vec::<i32>().unwrap(),
        vec![15, 19, 23, 0, 4, 8]
    );
}

#[test]
fn test_integer_does_not_split_advanced_block() {
    init();
    let x = iota3d();
    let i = Array::from_slice(&[1i32, 0], &[2]).unwrap();
    let k = Array::from_slice(&[3i32, 0], &[2]).unwrap();
    let picked = x
        .index(&[IndexPart::from(&i), IndexPart::Int(2), IndexPart::from(&k)])
        .unwrap();
    assert_eq!(picked.shape(), vec![2]);
    assert_eq!(picked.to_vec::<i32>().unwrap(), vec![23, 8]);
}

#[test]
fn test_list_index_read_and_write() {
    init();
    let a = iota2d();
    let rows = a.index(&[IndexPart::from(vec![2i64, 0])]).unwrap();
    assert_eq!(rows.shape(), vec![2, 4]);
    assert_eq!(
        rows.to_vec::<i32>().unwrap(),
        vec![8, 9, 10, 11, 0, 1, 2, 3]
    );

    let z = Array::zeros(&[4], Dtype::Int32).unwrap();
    z.index_assign(&[IndexPart::from(&[1i64, 3][..])], 5i64)
        .unwrap();
    assert_eq!(z.to_vec::<i32>().unwrap(), vec![0, 5, 0, 5]);
}

#[test]
fn test_non_integer_index_rejected() {
    init();
    let a = iota2d();
    let idx = Array::from_slice(&[0.5f32], &[1]).unwrap();
    assert!(a.index(&[IndexPart::from(&idx)]).is_err());
}

#[test]
fn test_slice_assignment_in_place() {
    init();
    let a = iota2d();
    let alias = a.clone();
    a.index_assign(&[IndexPart::from(1..3)], 0i64).unwrap();
    assert!(a.same_node(&alias));
    assert_eq!(
        alias.to_vec::<i32>().unwrap(),
        vec![0, 1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0]
    );
}

#[test]
fn test_consumer_graph_keeps_value_before_index_write() {
    init();
    let a = Array::from_slice(&[1i32, 2, 3], &[3]).unwrap();
    let b = a.add(0i64).unwrap();
    a.index_assign(&[IndexPart::Int(0)], 9i64).unwrap();
    assert_eq!(b.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![9, 2, 3]);
}

#[test]
fn test_index_write_through_expression_over_target() {
    init();
    // The index is computed from the array being written; it reads the
    // pre-write value.
    let a = Array::from_slice(&[1i32, 0, 2], &[3]).unwrap();
    let idx = a.minimum(1i64).unwrap();
    a.index_assign(&[IndexPart::from(&idx)], 7i64).unwrap();
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![7, 7, 2]);
}

#[test]
fn test_negative_step_assignment() {
    init();
    let v = Array::zeros(&[5], Dtype::Int32).unwrap();
    let value = Array::from_slice(&[10i32, 11, 12, 13, 14], &[5]).unwrap();
    v.index_assign(&[IndexPart::slice(None, None, Some(-1))], &value)
        .unwrap();
    assert_eq!(v.to_vec::<i32>().unwrap(), vec![14, 13, 12, 11, 10]);
}

#[test]
fn test_duplicate_assignment_is_last_write_wins() {
    init();
    let z = Array::zeros(&[4], Dtype::Int32).unwrap();
    let idx = Array::from_slice(&[1i32, 1, 2], &[3]).unwrap();
    let value = Array::from_slice(&[10i32, 20, 30], &[3]).unwrap();
    z.index_assign(&[IndexPart::from(&idx)], &value).unwrap();
    assert_eq!(z.to_vec::<i32>().unwrap(), vec![0, 20, 30, 0]);
}

#[test]
fn test_at_add_accumulates_duplicates() {
    init();
    let z = Array::zeros(&[4], Dtype::Int32).unwrap();
    let idx = Array::from_slice(&[1i32, 1, 2], &[3]).unwrap();
    let bumped = z.at(&[IndexPart::from(&idx)]).add(1i64).unwrap();
    assert_eq!(bumped.to_vec::<i32>().unwrap(), vec![0, 2, 1, 0]);
    // The original array is untouched.
    assert_eq!(z.to_vec::<i32>().unwrap(), vec![0, 0, 0, 0]);
}

#[test]
fn test_at_modes() {
    init();
    let a = Array::from_slice(&[8i32, 9], &[2]).unwrap();
    let first = &[IndexPart::Int(0)];
    assert_eq!(
        a.at(first).subtract(3i64).unwrap().to_vec::<i32>().unwrap(),
        vec![5, 9]
    );
    assert_eq!(
        a.at(first).multiply(2i64).unwrap().to_vec::<i32>().unwrap(),
        vec![16, 9]
    );
    // Divide runs in the float domain, then truncates back to int32.
    assert_eq!(
        a.at(first).divide(2i64).unwrap().to_vec::<i32>().unwrap(),
        vec![4, 9]
    );
    assert_eq!(
        a.at(first).maximum(10i64).unwrap().to_vec::<i32>().unwrap(),
        vec![10, 9]
    );
    assert_eq!(
        a.at(first).minimum(1i64).unwrap().to_vec::<i32>().unwrap(),
        vec![1, 9]
    );
}

#[test]
fn test_discontiguous_advanced_write_rejected() {
    init();
    let x = iota3d();
    let i = Array::from_slice(&[0i32, 1], &[2]).unwrap();
    let k = Array::from_slice(&[0i32, 1], &[2]).unwrap();
    let parts = [IndexPart::from(&i), IndexPart::full(), IndexPart::from(&k)];
    assert!(x.index_assign(&parts, 0i64).is_err());
    assert!(x.at(&parts).add(1i64).is_err());
    // Reads through the same expression stay legal.
    assert!(x.index(&parts).is_ok());
}

#[test]
fn test_assignment_value_broadcasts() {
    init();
    let a = Array::zeros(&[3, 4], Dtype::Int32).unwrap();
    let row = Array::from_slice(&[1i32, 2, 3, 4], &[4]).unwrap();
    a.index_assign(&[IndexPart::full()], &row).unwrap();
    assert_eq!(
        a.to_vec::<i32>().unwrap(),
        vec![1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]
    );

    let wrong = Array::from_slice(&[1i32, 2, 3], &[3]).unwrap();
    assert!(a.index_assign(&[IndexPart::full()], &wrong).is_err());
}

#[test]
fn test_assignment_value_leading_units_squeeze() {
    init();
    let a = Array::zeros(&[3], Dtype::Int32).unwrap();
    let value = Array::from_slice(&[7i32, 8, 9], &[1, 3]).unwrap();
    a.index_assign(&[IndexPart::full()], &value).unwrap();
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![7, 8, 9]);
}

#[test]
fn test_write_casts_value_to_target_dtype() {
    init();
    let a = Array::zeros(&[2], Dtype::Int32).unwrap();
    a.index_assign(&[IndexPart::Int(0)], 2.9f64).unwrap();
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![2, 0]);
    assert_eq!(a.dtype(), Dtype::Int32);
}

#[test]
fn test_chained_updates_stack_lazily() {
    init();
    let a = Array::zeros(&[3], Dtype::Int32).unwrap();
    a.index_assign(&[IndexPart::Int(0)], 1i64).unwrap();
    a.index_assign(&[IndexPart::Int(1)], 2i64).unwrap();
    a.index_assign(&[IndexPart::Int(0)], 5i64).unwrap();
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![5, 2, 0]);
}
