use test_case::test_case;

use gmlst_dtype::DType;

use crate::error::Error;
use crate::mixed::{MixedIndex, OffsetsSizesStrides};
use crate::op::{Op, Operation};
use crate::ops::MaterializeOp;
use crate::region::Block;
use crate::types::{Dim, Type};

fn source(ty: Type) -> Block {
    Block::new([ty, Type::index()])
}

#[test]
fn test_tensor_result_shape_follows_sizes() {
    let block = source(Type::static_tensor(&[8, 8], DType::Float32));
    let op = MaterializeOp::new(
        block.arguments()[0].clone(),
        OffsetsSizesStrides::from_static(&[0, 2], &[4, 2], &[2, 1]).unwrap(),
    )
    .unwrap();
    assert_eq!(op.infer_result_type(false).unwrap(), Type::static_tensor(&[4, 2], DType::Float32));
}

#[test]
fn test_vector_source_gives_vector() {
    let block = source(Type::vector([Dim::Static(16)], DType::Int32));
    let op = MaterializeOp::new(block.arguments()[0].clone(), OffsetsSizesStrides::from_static(&[4], &[4], &[1]).unwrap())
        .unwrap();
    assert_eq!(op.infer_result_type(false).unwrap(), Type::vector([Dim::Static(4)], DType::Int32));
}

#[test]
fn test_dynamic_size_on_vector_rejected() {
    let block = source(Type::vector([Dim::Static(16)], DType::Int32));
    let n = block.arguments()[1].clone();
    let triple = OffsetsSizesStrides::with_unit_strides([MixedIndex::Const(0)], [MixedIndex::from(n)]).unwrap();
    let op = MaterializeOp::new(block.arguments()[0].clone(), triple).unwrap();
    assert!(matches!(op.infer_result_type(false), Err(Error::DynamicVectorShape { .. })));
}

#[test]
fn test_scalar_result() {
    let block = source(Type::static_tensor(&[8, 8], DType::Float64));
    let iv = block.arguments()[1].clone();
    let triple = OffsetsSizesStrides::with_unit_strides(
        [MixedIndex::from(&iv), MixedIndex::Const(3)],
        [MixedIndex::Const(1), MixedIndex::Const(1)],
    )
    .unwrap();
    let op = MaterializeOp::new(block.arguments()[0].clone(), triple).unwrap();
    assert_eq!(op.infer_result_type(true).unwrap(), Type::Scalar(DType::Float64));
}

#[test_case(&[2, 1]; "non_unit_static")]
#[test_case(&[1, 0]; "zero")]
fn test_scalar_result_requires_unit_sizes(sizes: &[i64]) {
    let block = source(Type::static_tensor(&[8, 8], DType::Float64));
    let op = MaterializeOp::new(block.arguments()[0].clone(), OffsetsSizesStrides::from_static(&[0, 0], sizes, &[1, 1]).unwrap())
        .unwrap();
    assert!(matches!(op.infer_result_type(true), Err(Error::ScalarResultRequiresUnitSizes)));
}

#[test]
fn test_rank_must_match_source() {
    let block = source(Type::static_tensor(&[8, 8], DType::Float32));
    let result = MaterializeOp::new(block.arguments()[0].clone(), OffsetsSizesStrides::from_static(&[0], &[8], &[1]).unwrap());
    assert!(matches!(result, Err(Error::RankMismatch { what: "materialize triple", expected: 2, actual: 1 })));
}

#[test]
fn test_source_must_be_shaped() {
    let block = source(Type::static_tensor(&[8], DType::Float32));
    let result = MaterializeOp::new(block.arguments()[1].clone(), OffsetsSizesStrides::from_static(&[], &[], &[]).unwrap());
    assert!(matches!(result, Err(Error::InvalidOperandKind { operand: "materialize source", .. })));
}

#[test]
fn test_declared_result_type_checked() {
    let block = source(Type::static_tensor(&[8], DType::Float32));
    let op = MaterializeOp::new(block.arguments()[0].clone(), OffsetsSizesStrides::from_static(&[0], &[4], &[1]).unwrap())
        .unwrap();
    let operation = Operation::new(Op::Materialize(op), [Type::static_tensor(&[8], DType::Float32)]);
    assert!(matches!(operation.verify().unwrap_err().root(), Error::ResultTypeMismatch { .. }));
}

#[test_case(&[6], &[4], &[1]; "past_end")]
#[test_case(&[0], &[5], &[2]; "stride_past_end")]
#[test_case(&[8], &[1], &[1]; "offset_at_extent")]
fn test_static_out_of_bounds(offsets: &[i64], sizes: &[i64], strides: &[i64]) {
    let block = source(Type::static_tensor(&[8], DType::Float32));
    let op =
        MaterializeOp::new(block.arguments()[0].clone(), OffsetsSizesStrides::from_static(offsets, sizes, strides).unwrap())
            .unwrap();
    let ty = op.infer_result_type(false).unwrap();
    let operation = Operation::new(Op::Materialize(op), [ty]);
    assert!(matches!(operation.verify().unwrap_err().root(), Error::SliceOutOfBounds { dim: 0, .. }));
}

#[test_case(&[4], &[4], &[1]; "tail")]
#[test_case(&[1], &[4], &[2]; "strided")]
#[test_case(&[7], &[4], &[-2]; "reversed")]
#[test_case(&[8], &[0], &[1]; "empty")]
fn test_static_in_bounds(offsets: &[i64], sizes: &[i64], strides: &[i64]) {
    let block = source(Type::static_tensor(&[8], DType::Float32));
    let op =
        MaterializeOp::new(block.arguments()[0].clone(), OffsetsSizesStrides::from_static(offsets, sizes, strides).unwrap())
            .unwrap();
    let ty = op.infer_result_type(false).unwrap();
    assert!(Operation::new(Op::Materialize(op), [ty]).verify().is_ok());
}

#[test]
fn test_is_trivial() {
    let block = source(Type::static_tensor(&[4, 2], DType::Float32));
    let whole = MaterializeOp::new(
        block.arguments()[0].clone(),
        OffsetsSizesStrides::from_static(&[0, 0], &[4, 2], &[1, 1]).unwrap(),
    )
    .unwrap();
    assert!(whole.is_trivial(&Type::static_tensor(&[4, 2], DType::Float32)));

    let part = MaterializeOp::new(
        block.arguments()[0].clone(),
        OffsetsSizesStrides::from_static(&[0, 0], &[4, 1], &[1, 1]).unwrap(),
    )
    .unwrap();
    assert!(!part.is_trivial(&Type::static_tensor(&[4, 1], DType::Float32)));
}
