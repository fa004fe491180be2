use crate::asm::{parse_function, print_function};
use crate::canonicalize::{CanonicalizeStats, canonicalize};
use crate::error::Error;
use crate::eval::{Interpreter, RtValue};
use crate::test::fixtures::f32_values;
use crate::verify::verify_function;

#[test]
fn test_folds_constant_tile_sizes() {
    let mut function = parse_function(
        "func @window(%arg0: tensor<8xf32>, %arg1: tensor<8xf32>) -> (tensor<8xf32>) {
           %c0 = constant 0 : index
           %c2 = constant 2 : index
           %c8 = constant 8 : index
           %r = parallel (%i) = (%c0) to (%c8) step (%c2) outs (%out = %arg1 : tensor<8xf32>) {
             %t = tile [%i] [%c2] [1] : !tile<?>
             %s = materialize %arg0 [%i] [%c2] [1] : tensor<8xf32> to tensor<?xf32>
             set_yield %s at %t into %out : tensor<?xf32> into tensor<8xf32>[!tile<?>]
           } : tensor<8xf32>
           return %r : tensor<8xf32>
         }",
    )
    .unwrap();
    let input = vec![RtValue::from(f32_values(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])), f32_values(&[0.0; 8]).into()];
    let before = Interpreter::default().run(&function, &input).unwrap();

    let stats = canonicalize(&mut function).unwrap();
    assert_eq!(stats, CanonicalizeStats { folded_tiles: 1, removed_materializes: 0 });

    let text = print_function(&function);
    assert!(text.contains("tile [%4] [2] [1] : !tile<2>"), "{text}");
    assert!(text.contains("into tensor<8xf32>[!tile<2>]"), "{text}");
    assert_eq!(Interpreter::default().run(&function, &input).unwrap(), before);

    // A second pass finds nothing left to do.
    assert_eq!(canonicalize(&mut function).unwrap().total(), 0);
}

#[test]
fn test_removes_identity_materialize() {
    let mut function = parse_function(
        "func @id(%arg0: tensor<4x2xf32>) -> (tensor<4x2xf32>) {
           %0 = materialize %arg0 [0, 0] [4, 2] [1, 1] : tensor<4x2xf32> to tensor<4x2xf32>
           %1 = materialize %0 [0, 0] [4, 1] [1, 1] : tensor<4x2xf32> to tensor<4x1xf32>
           return %0 : tensor<4x2xf32>
         }",
    )
    .unwrap();
    let stats = canonicalize(&mut function).unwrap();
    assert_eq!(stats.removed_materializes, 1);

    let expected = "\
func @id(%arg0: tensor<4x2xf32>) -> (tensor<4x2xf32>) {
  %0 = materialize %arg0 [0, 0] [4, 1] [1, 1] : tensor<4x2xf32> to tensor<4x1xf32>
  return %arg0 : tensor<4x2xf32>
}
";
    assert_eq!(print_function(&function), expected);
}

#[test]
fn test_escaping_tile_keeps_type() {
    let mut function = parse_function(
        "func @escape() -> (!tile<?>) {
           %c4 = constant 4 : index
           %t = tile [0] [%c4] [1] : !tile<?>
           return %t : !tile<?>
         }",
    )
    .unwrap();
    let stats = canonicalize(&mut function).unwrap();
    assert_eq!(stats.total(), 0);
    assert!(print_function(&function).contains("!tile<?>"));
}

#[test]
fn test_offsets_fold_without_type_change() {
    let mut function = parse_function(
        "func @offset() -> (!tile<4>) {
           %c1 = constant 1 : index
           %t = tile [%c1] [4] [1] : !tile<4>
           return %t : !tile<4>
         }",
    )
    .unwrap();
    assert_eq!(canonicalize(&mut function).unwrap().folded_tiles, 1);
    assert!(print_function(&function).contains("%1 = tile [1] [4] [1] : !tile<4>"));
}

#[test]
fn test_failed_fold_leaves_function_untouched() {
    // Folding %c3 pins the tile to 3 elements while the source holds 2.
    let mut function = parse_function(
        "func @clash(%arg0: tensor<2xf32>, %arg1: tensor<4xf32>) -> (tensor<4xf32>) {
           %c0 = constant 0 : index
           %c1 = constant 1 : index
           %c3 = constant 3 : index
           %r = parallel (%i) = (%c0) to (%c1) step (%c1) outs (%out = %arg1 : tensor<4xf32>) {
             %t = tile [0] [%c3] [1] : !tile<?>
             set_yield %arg0 at %t into %out : tensor<2xf32> into tensor<4xf32>[!tile<?>]
           } : tensor<4xf32>
           return %r : tensor<4xf32>
         }",
    )
    .unwrap();
    let before = print_function(&function);

    let result = canonicalize(&mut function);
    let root = result.as_ref().map_err(Error::root);
    assert!(matches!(root, Err(Error::SetShapeMismatch { update: 0, .. })), "{result:?}");
    assert_eq!(print_function(&function), before);
    verify_function(&function).unwrap();
}
