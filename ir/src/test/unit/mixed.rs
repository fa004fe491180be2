use smallvec::smallvec;
use test_case::test_case;

use gmlst_dtype::DType;

use crate::error::Error;
use crate::mixed::{DYNAMIC_INDEX, MixedIndex, OffsetsSizesStrides, StaticEncoding};
use crate::region::Block;
use crate::types::{Dim, TileType, Type};

#[test_case(&[0, 0], &[1, 1, 1], &[1, 1], "sizes"; "sizes_longer")]
#[test_case(&[0, 0], &[1, 1], &[1], "strides"; "strides_shorter")]
#[test_case(&[0], &[4, 4], &[1, 1], "sizes"; "offsets_shorter")]
fn test_rank_mismatch(offsets: &[i64], sizes: &[i64], strides: &[i64], expected_what: &str) {
    let result = OffsetsSizesStrides::from_static(offsets, sizes, strides);
    assert!(matches!(result, Err(Error::RankMismatch { what, .. }) if what == expected_what));
}

#[test_case(&[-1], &[4]; "negative_offset")]
#[test_case(&[0], &[-4]; "negative_size")]
fn test_negative_static_entry(offsets: &[i64], sizes: &[i64]) {
    let result = OffsetsSizesStrides::from_static(offsets, sizes, &[1]);
    assert!(matches!(result, Err(Error::NegativeStaticIndex { value, .. }) if value < 0));
}

#[test]
fn test_stride_may_not_equal_dynamic_sentinel() {
    let result = OffsetsSizesStrides::from_static(&[0], &[1], &[DYNAMIC_INDEX]);
    assert!(matches!(result, Err(Error::ReservedStaticIndex { what: "strides", position: 0 })));

    let triple = OffsetsSizesStrides::from_static(&[0], &[1], &[i64::MIN + 1]).unwrap();
    assert_eq!(triple.tile_type(), TileType::from_static(&[1]));
}

#[test]
fn test_negative_stride_allowed() {
    let triple = OffsetsSizesStrides::from_static(&[7], &[4], &[-2]).unwrap();
    assert_eq!(triple.tile_type(), TileType::from_static(&[4]));
}

#[test]
fn test_dynamic_entry_must_be_index() {
    let block = Block::new([Type::Scalar(DType::Float32)]);
    let not_index = block.arguments()[0].clone();
    let result = OffsetsSizesStrides::with_unit_strides([MixedIndex::from(not_index)], [MixedIndex::Const(1)]);
    assert!(matches!(result, Err(Error::IndexOperandType { .. })));
}

#[test]
fn test_tile_type_follows_sizes() {
    let block = Block::new([Type::index()]);
    let n = block.arguments()[0].clone();
    let triple = OffsetsSizesStrides::with_unit_strides(
        [MixedIndex::from(&n), MixedIndex::Const(0)],
        [MixedIndex::Const(4), MixedIndex::from(&n)],
    )
    .unwrap();

    assert_eq!(triple.tile_type(), TileType::new([Dim::Static(4), Dim::Dynamic]));
    assert!(!triple.is_static());
    assert_eq!(triple.num_dynamic(), 2);
}

#[test]
fn test_static_encoding_positions() {
    let block = Block::new([Type::index(), Type::index()]);
    let (a, b) = (block.arguments()[0].clone(), block.arguments()[1].clone());
    let triple = OffsetsSizesStrides::new(
        [MixedIndex::Const(2), MixedIndex::from(&a)],
        [MixedIndex::from(&b), MixedIndex::Const(3)],
        [MixedIndex::Const(1), MixedIndex::Const(1)],
    )
    .unwrap();

    let encoding = triple.to_static_encoding();
    assert_eq!(encoding.static_offsets.as_slice(), &[2, DYNAMIC_INDEX]);
    assert_eq!(encoding.static_sizes.as_slice(), &[DYNAMIC_INDEX, 3]);
    assert_eq!(encoding.static_strides.as_slice(), &[1, 1]);
    assert_eq!(encoding.dynamic.as_slice(), &[a, b]);

    let decoded = OffsetsSizesStrides::from_static_encoding(&encoding).unwrap();
    assert_eq!(decoded, triple);
}

#[test]
fn test_static_encoding_operand_count() {
    let block = Block::new([Type::index()]);
    let encoding = StaticEncoding {
        static_offsets: smallvec![DYNAMIC_INDEX],
        static_sizes: smallvec![DYNAMIC_INDEX],
        static_strides: smallvec![1],
        dynamic: smallvec![block.arguments()[0].clone()],
    };
    let result = OffsetsSizesStrides::from_static_encoding(&encoding);
    assert!(matches!(result, Err(Error::DynamicOperandCount { expected: 2, actual: 1 })));
}
