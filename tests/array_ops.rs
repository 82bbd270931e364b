// tests/array_ops.rs

use weft::prelude::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_nested_construction() {
    init();
    let value = NestedValue::List(vec![
        NestedValue::List(vec![NestedValue::Int(1), NestedValue::Int(2)]),
        NestedValue::List(vec![NestedValue::Int(3), NestedValue::Int(4)]),
    ]);
    let a = Array::from_nested(&value, None).unwrap();
    assert_eq!(a.shape(), vec![2, 2]);
    assert_eq!(a.dtype(), Dtype::Int32);
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_nested_with_explicit_dtype() {
    init();
    let value = NestedValue::List(vec![NestedValue::Int(1), NestedValue::Int(0)]);
    let a = Array::from_nested(&value, Some(Dtype::Bool)).unwrap();
    assert_eq!(a.dtype(), Dtype::Bool);
    assert_eq!(a.to_vec::<bool>().unwrap(), vec![true, false]);
}

#[test]
fn test_nested_round_trip() {
    init();
    let a = Array::from_slice(&[1.5f32, 2.5, 3.5, 4.5], &[2, 2]).unwrap();
    let nested = a.to_nested().unwrap();
    assert_eq!(
        nested,
        NestedValue::List(vec![
            NestedValue::List(vec![NestedValue::Float(1.5), NestedValue::Float(2.5)]),
            NestedValue::List(vec![NestedValue::Float(3.5), NestedValue::Float(4.5)]),
        ])
    );
}

#[test]
fn test_item_requires_single_element() {
    init();
    let a = Array::from_slice(&[1i32, 2], &[2]).unwrap();
    assert!(a.item::<i32>().is_err());
    let s = Array::from_slice(&[42i32], &[1]).unwrap();
    assert_eq!(s.item::<i32>().unwrap(), 42);
}

#[test]
fn test_transpose_values() {
    init();
    let a = Array::from_slice(&[1i32, 2, 3, 4], &[2, 2]).unwrap();
    let t = a.transpose(None).unwrap();
    assert_eq!(t.to_vec::<i32>().unwrap(), vec![1, 3, 2, 4]);
}

#[test]
fn test_reshape_of_strided_result() {
    init();
    let a = Array::from_slice(&[1i32, 2, 3, 4], &[2, 2]).unwrap();
    let flat = a.transpose(None).unwrap().reshape(&[4]).unwrap();
    assert_eq!(flat.to_vec::<i32>().unwrap(), vec![1, 3, 2, 4]);
}

#[test]
fn test_broadcast_binary() {
    init();
    let col = Array::from_slice(&[10i32, 20], &[2, 1]).unwrap();
    let row = Array::from_slice(&[1i32, 2, 3], &[3]).unwrap();
    let sum = col.add(&row).unwrap();
    assert_eq!(sum.shape(), vec![2, 3]);
    assert_eq!(sum.to_vec::<i32>().unwrap(), vec![11, 12, 13, 21, 22, 23]);
}

#[test]
fn test_broadcast_shape_mismatch() {
    init();
    let a = Array::zeros(&[2, 3], Dtype::Int32).unwrap();
    let b = Array::zeros(&[4], Dtype::Int32).unwrap();
    assert!(a.add(&b).is_err());
}

#[test]
fn test_minimum_maximum() {
    init();
    let a = Array::from_slice(&[1i32, 5], &[2]).unwrap();
    let b = Array::from_slice(&[3i32, 2], &[2]).unwrap();
    assert_eq!(a.maximum(&b).unwrap().to_vec::<i32>().unwrap(), vec![3, 5]);
    assert_eq!(a.minimum(&b).unwrap().to_vec::<i32>().unwrap(), vec![1, 2]);
}

#[test]
fn test_logical_ops_mixed_dtypes() {
    init();
    let a = Array::from_slice(&[0.0f32, 2.0], &[2]).unwrap();
    let b = Array::from_slice(&[1i32, 1], &[2]).unwrap();
    let both = a.logical_and(&b).unwrap();
    assert_eq!(both.dtype(), Dtype::Bool);
    assert_eq!(both.to_vec::<bool>().unwrap(), vec![false, true]);
    let either = a.logical_or(&b).unwrap();
    assert_eq!(either.to_vec::<bool>().unwrap(), vec![true, true]);
    let not = a.logical_not();
    assert_eq!(not.to_vec::<bool>().unwrap(), vec![true, false]);
}

#[test]
fn test_negate_and_abs() {
    init();
    let a = Array::from_slice(&[1i32, -2], &[2]).unwrap();
    assert_eq!((-&a).to_vec::<i32>().unwrap(), vec![-1, 2]);
    assert_eq!(a.abs().to_vec::<i32>().unwrap(), vec![1, 2]);
}

#[test]
fn test_real_imag() {
    init();
    let z = Array::from_slice(&[Complex64::new(1.0, 2.0)], &[1]).unwrap();
    assert_eq!(z.real().item::<f32>().unwrap(), 1.0);
    assert_eq!(z.imag().item::<f32>().unwrap(), 2.0);
    let f = Array::from_slice(&[3.0f32], &[1]).unwrap();
    assert_eq!(f.imag().item::<f32>().unwrap(), 0.0);
}

#[test]
fn test_elementwise_comparison() {
    init();
    let a = Array::from_slice(&[1i32, 2, 3], &[3]).unwrap();
    let b = Array::from_slice(&[2i32, 2, 2], &[3]).unwrap();
    assert_eq!(
        a.gt(&b).unwrap().to_vec::<bool>().unwrap(),
        vec![false, false, true]
    );
    assert_eq!(
        a.eq(&b).unwrap().to_vec::<bool>().unwrap(),
        vec![false, true, false]
    );
    assert_eq!(
        a.le(&b).unwrap().to_vec::<bool>().unwrap(),
        vec![true, true, false]
    );
}

#[test]
fn test_full_respects_dtype_range() {
    init();
    assert!(Array::full(&[2], 300i64, Some(Dtype::Uint8)).is_err());
    let a = Array::full(&[2], 7i64, Some(Dtype::Float16)).unwrap();
    assert_eq!(a.to_vec::<f32>().unwrap(), vec![7.0, 7.0]);
}

#[test]
fn test_arange() {
    init();
    let a = Array::arange(0.0, 1.0, 0.25, Dtype::Float32).unwrap();
    assert_eq!(a.to_vec::<f32>().unwrap(), vec![0.0, 0.25, 0.5, 0.75]);
    let b = Array::iota(4).unwrap();
    assert_eq!(b.dtype(), Dtype::Int32);
    assert_eq!(b.to_vec::<i32>().unwrap(), vec![0, 1, 2, 3]);
    assert!(Array::arange(0.0, 1.0, 0.0, Dtype::Float32).is_err());
}

#[test]
fn test_stack_requires_uniform_shapes() {
    init();
    let a = Array::zeros(&[2], Dtype::Int32).unwrap();
    let b = Array::zeros(&[3], Dtype::Int32).unwrap();
    let err = Array::stack(&[a, b]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Initialization encountered non-uniform length."
    );
}

#[test]
fn test_stack_promotes_dtypes() {
    init();
    let a = Array::from_slice(&[1i32, 2], &[2]).unwrap();
    let b = Array::from_slice(&[0.5f32, 1.5], &[2]).unwrap();
    let s = Array::stack(&[a, b]).unwrap();
    assert_eq!(s.shape(), vec![2, 2]);
    assert_eq!(s.dtype(), Dtype::Float32);
    assert_eq!(s.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 0.5, 1.5]);
}

#[test]
fn test_shape_dimension_range_guard() {
    init();
    let err = Array::zeros(&[i32::MAX as usize + 1], Dtype::Int8).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Shape dimension falls outside supported `int` range."
    );
}

#[test]
fn test_zero_sized_arrays() {
    init();
    let a = Array::zeros(&[0, 3], Dtype::Float32).unwrap();
    assert_eq!(a.size(), 0);
    let b = a.add(1.0f64).unwrap();
    b.eval().unwrap();
    assert_eq!(b.to_vec::<f32>().unwrap(), Vec::<f32>::new());
}

#[test]
fn test_in_place_with_self_operand() {
    init();
    let a = Array::from_slice(&[1i32, 2], &[2]).unwrap();
    let alias = a.clone();
    a.add_in_place(&a).unwrap();
    assert!(a.same_node(&alias));
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![2, 4]);
}

#[test]
fn test_in_place_error_restores_node() {
    init();
    let a = Array::from_slice(&[1i32, 2], &[2]).unwrap();
    let b = Array::zeros(&[3], Dtype::Int32).unwrap();
    assert!(a.add_in_place(&b).is_err());
    assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 2]);
}
