//! Generators for property-based testing.
//!
//! Strategies for tensor contents, static triples, parallel iteration orders
//! and types.

use proptest::prelude::*;

use gmlst_dtype::DType;

use crate::config::IterationOrder;
use crate::eval::ShapedValue;
use crate::test::fixtures::f32_values;
use crate::types::{Dim, Type};

// ============================================================================
// Values
// ============================================================================

/// Integers representable exactly in f32, so sums do not depend on order.
pub fn arb_exact_f32() -> impl Strategy<Value = f64> {
    (-100i32..=100).prop_map(f64::from)
}

/// Rank-1 f32 contents of length `len`.
pub fn arb_f32_values(len: usize) -> impl Strategy<Value = ShapedValue> {
    prop::collection::vec(arb_exact_f32(), len).prop_map(|values| f32_values(&values))
}

/// Length and two tensors of that length (input, initial output).
pub fn arb_scatter_args() -> impl Strategy<Value = (usize, ShapedValue, ShapedValue)> {
    (1usize..=12).prop_flat_map(|len| (Just(len), arb_f32_values(len), arb_f32_values(len)))
}

// ============================================================================
// Iteration Orders
// ============================================================================

/// Forward, reverse or an arbitrary permutation of `count` iterations.
pub fn arb_iteration_order(count: usize) -> impl Strategy<Value = IterationOrder> {
    prop_oneof![
        Just(IterationOrder::Forward),
        Just(IterationOrder::Reverse),
        Just((0..count).collect::<Vec<_>>()).prop_shuffle().prop_map(IterationOrder::Custom),
    ]
}

/// Arbitrary index lists; the evaluator repairs them into permutations.
pub fn arb_raw_order() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..16, 0..24)
}

// ============================================================================
// Triples
// ============================================================================

/// `(extent, offset, size, stride)` with a positive stride and every addressed
/// index inside `[0, extent)`.
pub fn arb_in_bounds_slice() -> impl Strategy<Value = (u64, i64, i64, i64)> {
    (1u64..=16)
        .prop_flat_map(|extent| (Just(extent), 1i64..=extent as i64))
        .prop_flat_map(|(extent, size)| {
            let max_stride = if size == 1 { 4 } else { (extent as i64 - 1) / (size - 1) };
            (Just(extent), Just(size), 1i64..=max_stride.max(1))
        })
        .prop_flat_map(|(extent, size, stride)| {
            let span = (size - 1) * stride;
            (Just(extent), 0i64..extent as i64 - span, Just(size), Just(stride))
        })
}

/// Like [`arb_in_bounds_slice`] but the last addressed index is past the extent.
pub fn arb_out_of_bounds_slice() -> impl Strategy<Value = (u64, i64, i64, i64)> {
    arb_in_bounds_slice().prop_map(|(extent, offset, size, stride)| {
        let last = offset + (size - 1) * stride;
        (extent, offset + (extent as i64 - last), size, stride)
    })
}

// ============================================================================
// Types
// ============================================================================

pub fn arb_dim() -> impl Strategy<Value = Dim> {
    prop_oneof![3 => (0u64..=64).prop_map(Dim::Static), 1 => Just(Dim::Dynamic)]
}

/// Tensor, vector and tile types of rank up to 4.
pub fn arb_type() -> impl Strategy<Value = Type> {
    let dims = || prop::collection::vec(arb_dim(), 0..=4);
    prop_oneof![
        (dims(), DType::element_generator()).prop_map(|(dims, dtype)| Type::tensor(dims, dtype)),
        (dims(), DType::int_generator()).prop_map(|(dims, dtype)| Type::tensor(dims, dtype)),
        (prop::collection::vec((1u64..=16).prop_map(Dim::Static), 1..=3), DType::element_generator())
            .prop_map(|(dims, dtype)| Type::vector(dims, dtype)),
        dims().prop_map(Type::tile),
    ]
}
