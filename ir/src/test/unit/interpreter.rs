use test_case::test_case;

use gmlst_dtype::DType;

use crate::asm::parse_function;
use crate::builder::FunctionBuilder;
use crate::config::{EvalConfig, IterationOrder};
use crate::error::Error;
use crate::eval::{Interpreter, RtValue, ShapedValue};
use crate::func::Function;
use crate::test::fixtures::{
    Merge, Target, dynamic_window, f32_tensor, f32_values, range_header, rank0_add, running_sum, scatter,
};
use crate::types::ConstValue;

const INPUT: [f64; 8] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

fn run(function: &Function, args: Vec<RtValue>, order: IterationOrder) -> Result<Vec<RtValue>, Error> {
    Interpreter::new(EvalConfig::builder().parallel_order(order).build()).run(function, &args)
}

fn zeros(n: usize) -> RtValue {
    ShapedValue::zeros(vec![n], DType::Float32).into()
}

#[test_case(IterationOrder::Forward; "forward")]
#[test_case(IterationOrder::Reverse; "reverse")]
#[test_case(IterationOrder::Custom(vec![5, 2, 7, 0, 3]); "custom")]
fn test_parallel_sum_disjoint(order: IterationOrder) {
    let function = scatter(8, Target::Own, Merge::Add).unwrap();
    let result = run(&function, vec![f32_values(&INPUT).into(), zeros(8)], order).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&INPUT))]);
}

#[test_case(IterationOrder::Forward; "forward")]
#[test_case(IterationOrder::Reverse; "reverse")]
#[test_case(IterationOrder::Custom(vec![4, 1, 6]); "custom")]
fn test_parallel_sum_overlapping(order: IterationOrder) {
    let function = scatter(8, Target::First, Merge::Add).unwrap();
    let result = run(&function, vec![f32_values(&INPUT).into(), zeros(8)], order).unwrap();
    let mut expected = [0.0; 8];
    expected[0] = INPUT.iter().sum();
    assert_eq!(result, vec![RtValue::from(f32_values(&expected))]);
}

#[test]
fn test_overwrite_keeps_last_visited() {
    let function = scatter(8, Target::First, Merge::Overwrite).unwrap();
    let args = || vec![f32_values(&INPUT).into(), zeros(8)];
    let forward = run(&function, args(), IterationOrder::Forward).unwrap();
    let reverse = run(&function, args(), IterationOrder::Reverse).unwrap();
    assert_eq!(forward[0].as_shaped().unwrap().data()[0], ConstValue::Float(8.0));
    assert_eq!(reverse[0].as_shaped().unwrap().data()[0], ConstValue::Float(1.0));
}

#[test]
fn test_accumulate_combines_with_initial_value() {
    let function = scatter(4, Target::Own, Merge::Add).unwrap();
    let init = f32_values(&[10.0, 20.0, 30.0, 40.0]);
    let result = run(&function, vec![f32_values(&[1.0, 2.0, 3.0, 4.0]).into(), init.clone().into()], IterationOrder::Forward).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&[11.0, 22.0, 33.0, 44.0]))]);

    let function = scatter(4, Target::Own, Merge::Overwrite).unwrap();
    let result = run(&function, vec![f32_values(&[1.0, 2.0, 3.0, 4.0]).into(), init.into()], IterationOrder::Forward).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&[1.0, 2.0, 3.0, 4.0]))]);
}

#[test]
fn test_sequential_iterations_see_previous_state() {
    let function = running_sum(8, false).unwrap();
    let result = run(&function, vec![f32_values(&INPUT).into(), zeros(1)], IterationOrder::Reverse).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&[36.0]))]);
}

#[test]
fn test_parallel_iterations_see_initial_outputs() {
    let function = running_sum(8, true).unwrap();
    let result = run(&function, vec![f32_values(&INPUT).into(), f32_values(&[100.0]).into()], IterationOrder::Forward).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&[108.0]))]);
}

#[test]
fn test_rank0_accumulate() {
    let function = rank0_add().unwrap();
    let scalar = ShapedValue::new(vec![], DType::Float32, vec![ConstValue::Float(1.5)]).unwrap();
    let result = run(&function, vec![scalar.into(), ConstValue::Float(2.0).into()], IterationOrder::Forward).unwrap();
    let expected = ShapedValue::new(vec![], DType::Float32, vec![ConstValue::Float(3.5)]).unwrap();
    assert_eq!(result, vec![RtValue::from(expected)]);
}

#[test]
fn test_strided_materialize() {
    let function = parse_function(
        "func @odd(%arg0: tensor<2x4xi32>) -> (tensor<2x2xi32>, tensor<1x2xi32>) {
           %0 = materialize %arg0 [0, 1] [2, 2] [1, 2] : tensor<2x4xi32> to tensor<2x2xi32>
           %1 = materialize %arg0 [1, 3] [1, 2] [1, -3] : tensor<2x4xi32> to tensor<1x2xi32>
           return %0, %1 : tensor<2x2xi32>, tensor<1x2xi32>
         }",
    )
    .unwrap();
    let source = ShapedValue::new(vec![2, 4], DType::Int32, (0..8).map(ConstValue::Int).collect()).unwrap();
    let result = Interpreter::default().run(&function, &[source.into()]).unwrap();

    let ints = |shape: Vec<usize>, data: &[i64]| -> RtValue {
        ShapedValue::new(shape, DType::Int32, data.iter().copied().map(ConstValue::Int).collect()).unwrap().into()
    };
    assert_eq!(result, vec![ints(vec![2, 2], &[1, 3, 5, 7]), ints(vec![1, 2], &[7, 4])]);
}

#[test]
fn test_splat_and_elementwise_binary() {
    let function = parse_function(
        "func @axpy(%arg0: tensor<3xf32>, %arg1: f32) -> (tensor<3xf32>) {
           %0 = splat %arg1 : tensor<3xf32>
           %1 = mul %0, %arg0 : tensor<3xf32>
           %2 = add %1, %arg0 : tensor<3xf32>
           return %2 : tensor<3xf32>
         }",
    )
    .unwrap();
    let result =
        Interpreter::default().run(&function, &[f32_values(&[1.0, 2.0, 3.0]).into(), ConstValue::Float(2.0).into()]).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&[3.0, 6.0, 9.0]))]);
}

#[test]
fn test_fusion_runs_once() {
    let function = parse_function(
        "func @fused(%arg0: i32, %arg1: i32) -> (i32) {
           %0 = fusion (%a = %arg0 : i32, %b = %arg1 : i32) {
             %s = sub %a, %b : i32
             %m = max %s, %b : i32
             yield %m : i32
           } : i32
           return %0 : i32
         }",
    )
    .unwrap();
    let result = Interpreter::default().run(&function, &[ConstValue::Int(10).into(), ConstValue::Int(3).into()]).unwrap();
    assert_eq!(result, vec![RtValue::Scalar(ConstValue::Int(7))]);
}

#[test]
fn test_multi_dim_loop_order() {
    // Each point (i, j) writes i * 10 + j.
    let function = parse_function(
        "func @grid(%arg0: tensor<2x3xindex>) -> (tensor<2x3xindex>) {
           %c0 = constant 0 : index
           %c1 = constant 1 : index
           %c2 = constant 2 : index
           %c3 = constant 3 : index
           %c10 = constant 10 : index
           %r = for (%i, %j) = (%c0, %c0) to (%c2, %c3) step (%c1, %c1) outs (%out = %arg0 : tensor<2x3xindex>) {
             %t = tile [%i, %j] [1, 1] [1, 1] : !tile<1x1>
             %x = mul %i, %c10 : index
             %v = add %x, %j : index
             set_yield %v at %t into %out : index into tensor<2x3xindex>[!tile<1x1>]
           } : tensor<2x3xindex>
           return %r : tensor<2x3xindex>
         }",
    )
    .unwrap();
    let init = ShapedValue::zeros(vec![2, 3], DType::Index);
    let result = Interpreter::default().run(&function, &[init.into()]).unwrap();
    let expected = ShapedValue::new(vec![2, 3], DType::Index, [0, 1, 2, 10, 11, 12].map(ConstValue::Int).to_vec()).unwrap();
    assert_eq!(result, vec![RtValue::from(expected)]);
}

#[test]
fn test_empty_iteration_space() {
    let function = FunctionBuilder::new("none", [f32_tensor(2)], vec![f32_tensor(2)])
        .build(|b, args| {
            let header = range_header(b, 5, 1, vec![args[0].clone()])?;
            let results = b.parallel_loop(header, Some("threads".into()), |b, _, _| b.set_yield(Vec::new()))?;
            b.return_(&results)
        })
        .unwrap();
    let result = Interpreter::default().run(&function, &[f32_values(&[4.0, 2.0]).into()]).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&[4.0, 2.0]))]);
}

#[test]
fn test_f32_results_are_single_precision() {
    let function = parse_function(
        "func @sum(%arg0: f32, %arg1: f32) -> (f32) {
           %0 = add %arg0, %arg1 : f32
           return %0 : f32
         }",
    )
    .unwrap();
    let result = Interpreter::default().run(&function, &[ConstValue::Float(0.1).into(), ConstValue::Float(0.2).into()]).unwrap();
    let RtValue::Scalar(ConstValue::Float(sum)) = result[0] else {
        panic!("expected a float scalar, got {result:?}");
    };
    assert_eq!(sum, sum as f32 as f64);
    assert_ne!(sum, 0.1 + 0.2);
}

#[test]
fn test_step_spanning_whole_index_range() {
    let function = parse_function(
        "func @wide(%arg0: tensor<2xf32>) -> (tensor<2xf32>) {
           %c0 = constant 0 : index
           %max = constant 9223372036854775807 : index
           %r = for (%i) = (%c0) to (%max) step (%max) outs (%out = %arg0 : tensor<2xf32>) {
             set_yield
           } : tensor<2xf32>
           return %r : tensor<2xf32>
         }",
    )
    .unwrap();
    let result = Interpreter::default().run(&function, &[f32_values(&[1.0, 2.0]).into()]).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&[1.0, 2.0]))]);
}

// =========================================================================
// Errors
// =========================================================================

#[test]
fn test_argument_count() {
    let function = scatter(2, Target::Own, Merge::Add).unwrap();
    let result = Interpreter::default().run(&function, &[zeros(2)]);
    assert!(matches!(result, Err(Error::ArgumentCount { expected: 2, actual: 1 })));
}

#[test]
fn test_argument_mismatch() {
    let function = scatter(2, Target::Own, Merge::Add).unwrap();
    let result = Interpreter::default().run(&function, &[zeros(2), zeros(3)]);
    assert!(matches!(result, Err(Error::ArgumentMismatch { index: 1, .. })));

    let result = Interpreter::default().run(&function, &[ConstValue::Float(0.0).into(), zeros(2)]);
    assert!(matches!(result, Err(Error::ArgumentMismatch { index: 0, .. })));
}

#[test_case("0"; "zero")]
#[test_case("-1"; "negative")]
fn test_non_positive_step(step: &str) {
    let text = format!(
        "func @f(%arg0: tensor<2xf32>) -> (tensor<2xf32>) {{
           %c0 = constant 0 : index
           %c2 = constant 2 : index
           %s = constant {step} : index
           %r = for (%i) = (%c0) to (%c2) step (%s) outs (%out = %arg0 : tensor<2xf32>) {{
             set_yield
           }} : tensor<2xf32>
           return %r : tensor<2xf32>
         }}"
    );
    let function = parse_function(&text).unwrap();
    let result = Interpreter::default().run(&function, &[zeros(2)]);
    assert!(matches!(result, Err(Error::NonPositiveStep { dim: 0, .. })));
}

#[test]
fn test_dynamic_tile_out_of_bounds() {
    let function = dynamic_window().unwrap();
    let source: RtValue = ShapedValue::from_vec(DType::Float32, vec![ConstValue::Float(0.0); 4]).into();

    let ok = Interpreter::default().run(&function, &[source.clone(), ConstValue::Int(1).into(), ConstValue::Int(3).into()]);
    assert_eq!(ok.unwrap()[0].as_shaped().unwrap().shape(), &[3]);

    let result = Interpreter::default().run(&function, &[source, ConstValue::Int(2).into(), ConstValue::Int(3).into()]);
    assert!(matches!(result, Err(Error::TileOutOfBounds { dim: 0, index: 4, extent: 4 })));
}

#[test]
fn test_division_by_zero() {
    let function = parse_function(
        "func @div(%arg0: i64, %arg1: i64) -> (i64) {
           %0 = div %arg0, %arg1 : i64
           return %0 : i64
         }",
    )
    .unwrap();
    let result = Interpreter::default().run(&function, &[ConstValue::Int(1).into(), ConstValue::Int(0).into()]);
    assert!(matches!(result, Err(Error::DivisionByZero)));

    let result = Interpreter::default().run(&function, &[ConstValue::Int(-7).into(), ConstValue::Int(2).into()]);
    assert_eq!(result.unwrap(), vec![RtValue::Scalar(ConstValue::Int(-3))]);
}

#[test]
fn test_verification_can_be_skipped() {
    let function = Function::new("unterminated", [], vec![]);
    assert!(matches!(Interpreter::default().run(&function, &[]), Err(Error::MissingTerminator { .. })));

    let config = EvalConfig::builder().verify_before_run(false).build();
    let result = Interpreter::new(config).run(&function, &[]);
    assert!(matches!(result, Err(Error::MissingTerminator { expected: "return" })));
}

#[test]
fn test_overwrite_source_must_fill_runtime_tile() {
    let function = parse_function(
        "func @fill(%arg0: tensor<?xf32>, %arg1: tensor<?xf32>, %arg2: index) -> (tensor<?xf32>) {
           %c0 = constant 0 : index
           %c1 = constant 1 : index
           %r = parallel (%i) = (%c0) to (%c1) step (%c1) outs (%out = %arg1 : tensor<?xf32>) {
             %t = tile [0] [%arg2] [1] : !tile<?>
             set_yield %arg0 at %t into %out : tensor<?xf32> into tensor<?xf32>[!tile<?>]
           } : tensor<?xf32>
           return %r : tensor<?xf32>
         }",
    )
    .unwrap();
    let args = |src: &[f64]| vec![RtValue::from(f32_values(src)), zeros(4), ConstValue::Int(2).into()];

    let result = Interpreter::default().run(&function, &args(&[1.0, 2.0])).unwrap();
    assert_eq!(result, vec![RtValue::from(f32_values(&[1.0, 2.0, 0.0, 0.0]))]);

    let result = Interpreter::default().run(&function, &args(&[1.0, 2.0, 3.0]));
    assert!(matches!(result, Err(Error::UpdateShapeMismatch { update: 0, .. })), "{result:?}");
}
