//! Property tests for the textual form.

use proptest::prelude::*;

use gmlst_dtype::DType;

use crate::asm::{parse_function, parse_type, print_function};
use crate::eval::{Interpreter, RtValue, ShapedValue};
use crate::func::Function;
use crate::test::fixtures::{Merge, Target, running_sum, scatter, strided_slice};
use crate::types::ConstValue;

use super::generators::*;

fn arb_target() -> impl Strategy<Value = Target> {
    prop_oneof![Just(Target::Own), Just(Target::First)]
}

fn arb_merge() -> impl Strategy<Value = Merge> {
    prop_oneof![Just(Merge::Overwrite), Just(Merge::Add)]
}

fn reparse(function: &Function) -> (String, Function) {
    let text = print_function(function);
    let parsed = parse_function(&text).unwrap_or_else(|e| panic!("{e}\n{text}"));
    (text, parsed)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Printed scatter loops parse back to equivalent functions that print identically.
    #[test]
    fn scatter_round_trips(
        (len, input, init) in arb_scatter_args(),
        target in arb_target(),
        merge in arb_merge(),
    ) {
        let function = scatter(len as u64, target, merge).unwrap();
        let (text, parsed) = reparse(&function);
        prop_assert!(function.is_equivalent(&parsed), "not equivalent:\n{}", text);
        prop_assert_eq!(print_function(&parsed), text);

        let args: [RtValue; 2] = [input.into(), init.into()];
        let interpreter = Interpreter::default();
        prop_assert_eq!(interpreter.run(&function, &args).unwrap(), interpreter.run(&parsed, &args).unwrap());
    }

    /// Sequential and parallel running sums round-trip.
    #[test]
    fn running_sum_round_trips(len in 1u64..=16, parallel in any::<bool>()) {
        let function = running_sum(len, parallel).unwrap();
        let (text, parsed) = reparse(&function);
        prop_assert!(function.is_equivalent(&parsed), "not equivalent:\n{}", text);
        prop_assert_eq!(print_function(&parsed), text);
    }

    /// Constant strided slices keep their triple and their results through text.
    #[test]
    fn strided_slice_round_trips((extent, offset, size, stride) in arb_in_bounds_slice()) {
        let function = strided_slice(extent, offset, size, stride).unwrap();
        let (text, parsed) = reparse(&function);
        let triple = format!("[{offset}] [{size}] [{stride}]");
        prop_assert!(text.contains(&triple), "missing {} in:\n{}", triple, text);
        prop_assert!(function.is_equivalent(&parsed));

        let iota: RtValue = ShapedValue::from_vec(DType::Int32, (0..extent as i64).map(ConstValue::Int).collect()).into();
        let interpreter = Interpreter::default();
        let args = std::slice::from_ref(&iota);
        prop_assert_eq!(interpreter.run(&function, args).unwrap(), interpreter.run(&parsed, args).unwrap());
    }

    /// Every printed type parses back to itself.
    #[test]
    fn types_round_trip(ty in arb_type()) {
        let text = ty.to_string();
        prop_assert_eq!(parse_type(&text).unwrap(), ty, "{}", text);
    }
}
