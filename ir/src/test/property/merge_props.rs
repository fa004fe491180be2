//! Property tests for loop merge semantics and tile bounds.

use proptest::prelude::*;

use gmlst_dtype::DType;

use crate::config::{EvalConfig, IterationOrder};
use crate::error::Error;
use crate::eval::{Interpreter, RtValue, ShapedValue};
use crate::func::Function;
use crate::mixed::OffsetsSizesStrides;
use crate::test::fixtures::{Merge, Target, f32_values, running_sum, scatter, strided_slice};
use crate::types::ConstValue;

use super::generators::*;

fn run_with(order: IterationOrder, function: &Function, args: &[RtValue]) -> Vec<RtValue> {
    let config = EvalConfig::builder().parallel_order(order).build();
    Interpreter::new(config).run(function, args).expect("evaluation should succeed")
}

fn floats(value: &RtValue) -> Vec<f64> {
    let shaped = value.as_shaped().expect("shaped result");
    shaped
        .data()
        .iter()
        .map(|v| match v {
            ConstValue::Float(x) => *x,
            other => panic!("expected a float element, got {other:?}"),
        })
        .collect()
}

// ============================================================================
// Parallel Merge Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Overlapping accumulated updates do not depend on the visiting order.
    #[test]
    fn accumulate_is_order_independent(
        (len, input, init) in arb_scatter_args(),
        seed in any::<prop::sample::Index>(),
    ) {
        let function = scatter(len as u64, Target::First, Merge::Add).unwrap();
        let args = [input.clone().into(), init.clone().into()];
        let forward = run_with(IterationOrder::Forward, &function, &args);

        let mut order: Vec<usize> = (0..len).collect();
        order.rotate_left(seed.index(len));
        let rotated = run_with(IterationOrder::Custom(order), &function, &args);
        let reverse = run_with(IterationOrder::Reverse, &function, &args);
        prop_assert_eq!(&forward, &rotated);
        prop_assert_eq!(&forward, &reverse);

        let out = floats(&forward[0]);
        let init = floats(&init.into());
        let total: f64 = floats(&input.into()).iter().sum();
        prop_assert_eq!(out[0], init[0] + total);
        prop_assert_eq!(&out[1..], &init[1..]);
    }

    /// Shuffled orders agree with forward order for accumulated updates.
    #[test]
    fn accumulate_agrees_under_permutations(
        (len, order) in (1usize..=10).prop_flat_map(|len| (Just(len), arb_iteration_order(len))),
    ) {
        let function = scatter(len as u64, Target::First, Merge::Add).unwrap();
        let input = f32_values(&(1..=len).map(|v| v as f64).collect::<Vec<_>>());
        let args = [input.into(), ShapedValue::zeros(vec![len], DType::Float32).into()];
        prop_assert_eq!(run_with(order, &function, &args), run_with(IterationOrder::Forward, &function, &args));
    }

    /// Overlapping overwrites keep the value of the last iteration visited.
    #[test]
    fn overwrite_keeps_last_visited(
        (len, order) in (1usize..=10).prop_flat_map(|len| (Just(len), arb_iteration_order(len))),
    ) {
        let function = scatter(len as u64, Target::First, Merge::Overwrite).unwrap();
        let input: Vec<f64> = (0..len).map(|v| v as f64 * 10.0).collect();
        let args = [f32_values(&input).into(), ShapedValue::zeros(vec![len], DType::Float32).into()];
        let last = *order.permutation(len).last().unwrap();
        let result = run_with(order, &function, &args);
        prop_assert_eq!(floats(&result[0])[0], input[last]);
    }

    /// Disjoint updates yield the same tensor whether overwritten or accumulated
    /// onto zeros; onto other values accumulation adds the initial contents.
    #[test]
    fn disjoint_overwrite_and_accumulate((len, input, init) in arb_scatter_args()) {
        let overwrite = scatter(len as u64, Target::Own, Merge::Overwrite).unwrap();
        let accumulate = scatter(len as u64, Target::Own, Merge::Add).unwrap();
        let zeros: RtValue = ShapedValue::zeros(vec![len], DType::Float32).into();

        let args = [input.clone().into(), zeros];
        prop_assert_eq!(run_with(IterationOrder::Forward, &overwrite, &args), vec![RtValue::from(input.clone())]);
        prop_assert_eq!(run_with(IterationOrder::Reverse, &accumulate, &args), vec![RtValue::from(input.clone())]);

        let args = [input.clone().into(), init.clone().into()];
        prop_assert_eq!(run_with(IterationOrder::Forward, &overwrite, &args), vec![RtValue::from(input.clone())]);
        let summed = floats(&run_with(IterationOrder::Forward, &accumulate, &args)[0]);
        let expected: Vec<f64> =
            floats(&input.into()).iter().zip(floats(&init.into())).map(|(a, b)| a + b).collect();
        prop_assert_eq!(summed, expected);
    }

    /// Sequential loops ignore the parallel order and thread their state.
    #[test]
    fn sequential_ignores_parallel_order(
        (len, input, _) in arb_scatter_args(),
        order in arb_raw_order(),
    ) {
        let function = running_sum(len as u64, false).unwrap();
        let args = [input.clone().into(), ShapedValue::zeros(vec![1], DType::Float32).into()];
        let result = run_with(IterationOrder::Custom(order), &function, &args);
        let total: f64 = floats(&input.into()).iter().sum();
        prop_assert_eq!(floats(&result[0]), vec![total]);
    }

    /// Repaired custom orders are permutations of every iteration.
    #[test]
    fn custom_order_is_permutation(count in 0usize..16, order in arb_raw_order()) {
        let mut permutation = IterationOrder::Custom(order).permutation(count);
        permutation.sort_unstable();
        prop_assert_eq!(permutation, (0..count).collect::<Vec<_>>());
    }
}

// ============================================================================
// Static Bounds Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// An in-bounds strided read returns `offset + k * stride` from an iota source.
    #[test]
    fn strided_read_matches_indexing((extent, offset, size, stride) in arb_in_bounds_slice()) {
        let function = strided_slice(extent, offset, size, stride).unwrap();
        let iota = ShapedValue::from_vec(DType::Int32, (0..extent as i64).map(ConstValue::Int).collect());
        let result = Interpreter::default().run(&function, &[iota.into()]).unwrap();

        let expected = ShapedValue::from_vec(DType::Int32, (0..size).map(|k| ConstValue::Int(offset + k * stride)).collect());
        prop_assert_eq!(result, vec![RtValue::from(expected)]);
    }

    /// A constant slice leaving the source is rejected when built.
    #[test]
    fn static_out_of_bounds_rejected((extent, offset, size, stride) in arb_out_of_bounds_slice()) {
        let result = strided_slice(extent, offset, size, stride);
        let rejected = matches!(result.as_ref().map_err(Error::root), Err(Error::SliceOutOfBounds { .. }));
        prop_assert!(rejected);
    }

    /// Negative constant offsets and sizes never form a triple.
    #[test]
    fn negative_static_entries_rejected(negative in -64i64..=-1, stride in -4i64..=4) {
        let offset = OffsetsSizesStrides::from_static(&[negative], &[1], &[stride]);
        let size = OffsetsSizesStrides::from_static(&[0], &[negative], &[stride]);
        let is_negative = |r: &crate::Result<OffsetsSizesStrides>| matches!(r, Err(Error::NegativeStaticIndex { .. }));
        prop_assert!(is_negative(&offset));
        prop_assert!(is_negative(&size));
    }

    /// Triple entries of unequal rank never form a triple.
    #[test]
    fn unequal_triple_ranks_rejected(a in 0usize..4, b in 0usize..4, c in 0usize..4) {
        prop_assume!(a != b || b != c);
        let result = OffsetsSizesStrides::from_static(&vec![0; a], &vec![1; b], &vec![1; c]);
        let rejected = matches!(result, Err(Error::RankMismatch { .. }));
        prop_assert!(rejected, "ranks {a}, {b}, {c} accepted");
    }
}
