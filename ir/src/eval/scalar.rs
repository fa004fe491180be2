//! Scalar evaluation of host arithmetic.
//!
//! # Semantics
//!
//! - Floating point operations follow IEEE 754
//! - Integer operations use wrapping arithmetic at the width of the element type
//! - Integer division or remainder by zero is an error

use gmlst_dtype::DType;

use crate::Result;
use crate::error::{DivisionByZeroSnafu, RuntimeKindMismatchSnafu};
use crate::types::{BinaryOp, ConstValue};

/// Evaluate `op` on two scalars of element type `dtype`.
pub fn eval_binary(op: BinaryOp, dtype: DType, a: ConstValue, b: ConstValue) -> Result<ConstValue> {
    let is_zero_divisor = matches!(op, BinaryOp::Div | BinaryOp::Rem)
        && matches!(b, ConstValue::Int(0) | ConstValue::UInt(0));
    if is_zero_divisor {
        return DivisionByZeroSnafu.fail();
    }
    match eval_binary_op(op, a, b) {
        Some(value) => Ok(value.cast(dtype)),
        None => RuntimeKindMismatchSnafu { expected: "matching scalar operands" }.fail(),
    }
}

/// Evaluate a binary operation on constant values.
///
/// Returns `None` if the operand kinds differ, the operation is not defined
/// for them, or an integer divisor is zero.
pub fn eval_binary_op(op: BinaryOp, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match op {
        BinaryOp::Add => eval_add(a, b),
        BinaryOp::Sub => eval_sub(a, b),
        BinaryOp::Mul => eval_mul(a, b),
        BinaryOp::Div => eval_div(a, b),
        BinaryOp::Rem => eval_rem(a, b),
        BinaryOp::Max => eval_max(a, b),
        BinaryOp::Min => eval_min(a, b),
    }
}

#[inline]
fn eval_add(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_add(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_add(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x + y)),
        _ => None,
    }
}

#[inline]
fn eval_sub(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_sub(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_sub(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x - y)),
        _ => None,
    }
}

#[inline]
fn eval_mul(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_mul(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_mul(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x * y)),
        _ => None,
    }
}

#[inline]
fn eval_div(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) if y != 0 => Some(ConstValue::Int(x.wrapping_div(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) if y != 0 => Some(ConstValue::UInt(x / y)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x / y)),
        _ => None,
    }
}

#[inline]
fn eval_rem(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) if y != 0 => Some(ConstValue::Int(x.wrapping_rem(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) if y != 0 => Some(ConstValue::UInt(x % y)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x % y)),
        _ => None,
    }
}

#[inline]
fn eval_max(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.max(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.max(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x.max(y))),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x || y)),
        _ => None,
    }
}

#[inline]
fn eval_min(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.min(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.min(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x.min(y))),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x && y)),
        _ => None,
    }
}
