//! Host operations: constants, splats and binary arithmetic.

use snafu::ensure;

use gmlst_dtype::DType;

use super::expect_results;
use crate::Result;
use crate::error::{
    ConstantTypeMismatchSnafu, DynamicSplatSnafu, InvalidOperandKindSnafu, TypeMismatchSnafu,
    UnsupportedBinaryOpSnafu,
};
use crate::types::{BinaryOp, ConstValue, Type};
use crate::value::Value;

pub(crate) fn verify_constant(value: &ConstValue, results: &[Value]) -> Result<()> {
    expect_results("constant", results, 1)?;
    let ty = results[0].ty();
    let Type::Scalar(dtype) = ty else {
        return InvalidOperandKindSnafu { operand: "constant result", expected: "a scalar", actual: ty.clone() }
            .fail();
    };
    ensure!(value.is_compatible(*dtype), ConstantTypeMismatchSnafu { value: *value, dtype: *dtype });
    Ok(())
}

pub(crate) fn verify_splat(value: &Value, results: &[Value]) -> Result<()> {
    expect_results("splat", results, 1)?;
    let ty = results[0].ty();
    let Some(shaped) = ty.as_shaped() else {
        return InvalidOperandKindSnafu { operand: "splat result", expected: "a tensor or vector", actual: ty.clone() }
            .fail();
    };
    ensure!(shaped.is_static(), DynamicSplatSnafu { ty: ty.clone() });
    let expected = Type::Scalar(shaped.element);
    ensure!(
        *value.ty() == expected,
        TypeMismatchSnafu { what: "splat operand", expected, actual: value.ty().clone() }
    );
    Ok(())
}

pub(crate) fn verify_binary(op: BinaryOp, lhs: &Value, rhs: &Value, results: &[Value]) -> Result<()> {
    expect_results(op.mnemonic(), results, 1)?;
    let ty = lhs.ty();
    ensure!(rhs.ty() == ty, TypeMismatchSnafu { what: "rhs operand", expected: ty.clone(), actual: rhs.ty().clone() });
    ensure!(
        results[0].ty() == ty,
        TypeMismatchSnafu { what: "binary result", expected: ty.clone(), actual: results[0].ty().clone() }
    );
    ensure!(!ty.is_tile(), UnsupportedBinaryOpSnafu { op, ty: ty.clone() });
    // Booleans only order; there is no arithmetic on them.
    if ty.element_type() == Some(DType::Bool) {
        ensure!(matches!(op, BinaryOp::Max | BinaryOp::Min), UnsupportedBinaryOpSnafu { op, ty: ty.clone() });
    }
    Ok(())
}

pub(crate) fn verify_no_results(what: &'static str, results: &[Value]) -> Result<()> {
    expect_results(what, results, 0)
}
