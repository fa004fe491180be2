//! Transitive, region-aware verification.
//!
//! [`crate::Operation::verify`] checks one operation in isolation. This module
//! walks whole functions and adds what needs context:
//!
//! - every operand is defined earlier in an enclosing scope
//! - terminators appear only as the last operation of a block
//! - each terminator kind appears only under its owning construct
//!   (`set_yield` in loop bodies, `yield` in accumulators and fusion bodies,
//!   `return` in function bodies)
//! - `return` matches the function result types

use std::collections::HashSet;

use snafu::{ResultExt, ensure};

use crate::Result;
use crate::error::{
    InOpSnafu, MisplacedTerminatorSnafu, MissingTerminatorSnafu, ResultCountMismatchSnafu, TypeMismatchSnafu,
    UndefinedValueSnafu,
};
use crate::func::{Function, Module};
use crate::op::{Op, Operation};
use crate::region::Block;
use crate::types::Type;
use crate::value::{Value, ValueId};

/// Construct owning the block being verified.
#[derive(Debug, Clone, Copy)]
enum Parent<'a> {
    Function { result_types: &'a [Type] },
    LoopBody,
    Accumulator,
    FusionBody,
}

impl Parent<'_> {
    fn admits(&self, op: &Op) -> bool {
        match op {
            Op::SetYield(_) => matches!(self, Parent::LoopBody),
            Op::Yield(_) => matches!(self, Parent::Accumulator | Parent::FusionBody),
            Op::Return(_) => matches!(self, Parent::Function { .. }),
            _ => true,
        }
    }
}

/// Verify a function and everything nested in it.
#[tracing::instrument(skip_all, fields(function = %function.name()))]
pub fn verify_function(function: &Function) -> Result<()> {
    let mut verifier = Verifier::default();
    verifier.define(function.arguments());
    let result = verifier.block(function.body(), Parent::Function { result_types: function.result_types() });
    if let Err(error) = &result {
        tracing::error!(%error, "verification failed");
    }
    result
}

pub fn verify_module(module: &Module) -> Result<()> {
    module.functions().iter().try_for_each(verify_function)
}

#[derive(Default)]
struct Verifier {
    scopes: Vec<HashSet<ValueId>>,
}

impl Verifier {
    fn define(&mut self, values: &[Value]) {
        if self.scopes.is_empty() {
            self.scopes.push(HashSet::new());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.extend(values.iter().map(Value::id));
        }
    }

    fn is_visible(&self, value: &Value) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(&value.id()))
    }

    fn block(&mut self, block: &Block, parent: Parent<'_>) -> Result<()> {
        self.scopes.push(HashSet::new());
        let result = self.block_in_scope(block, parent);
        self.scopes.pop();
        result
    }

    fn block_in_scope(&mut self, block: &Block, parent: Parent<'_>) -> Result<()> {
        self.define(block.arguments());
        let last = block.operations().len().saturating_sub(1);
        for (position, operation) in block.operations().iter().enumerate() {
            self.operation(operation, parent, position == last)?;
        }

        if let Parent::Function { .. } = parent
            && !matches!(block.terminator().map(Operation::op), Some(Op::Return(_)))
        {
            return MissingTerminatorSnafu { expected: "return" }.fail();
        }
        Ok(())
    }

    fn operation(&mut self, operation: &Operation, parent: Parent<'_>, is_last: bool) -> Result<()> {
        let op = operation.op();
        tracing::trace!(op = operation.name(), id = %operation.id(), "verifying");

        if op.is_terminator() {
            ensure!(is_last && parent.admits(op), MisplacedTerminatorSnafu { op: operation.name() });
        }
        if let Some(undefined) = op.operands().into_iter().find(|operand| !self.is_visible(operand)) {
            return UndefinedValueSnafu { id: undefined.id() }.fail().context(InOpSnafu { op: operation.name() });
        }
        operation.verify()?;

        if let (Op::Return(values), Parent::Function { result_types }) = (op, parent) {
            check_return(values, result_types).context(InOpSnafu { op: "return" })?;
        }

        match op {
            Op::Loop(loop_op) => self.block(loop_op.body().single_block("loop body")?, Parent::LoopBody)?,
            Op::Fusion(fusion) => self.block(fusion.body().single_block("fusion body")?, Parent::FusionBody)?,
            Op::SetYield(set_yield) => {
                for region in set_yield.accumulators() {
                    self.block(region.single_block("accumulator")?, Parent::Accumulator)?;
                }
            }
            _ => {}
        }

        self.define(operation.results());
        Ok(())
    }
}

fn check_return(values: &[Value], result_types: &[Type]) -> Result<()> {
    ensure!(
        values.len() == result_types.len(),
        ResultCountMismatchSnafu { what: "return", expected: result_types.len(), actual: values.len() }
    );
    for (value, expected) in values.iter().zip(result_types) {
        ensure!(
            value.ty() == expected,
            TypeMismatchSnafu { what: "returned value", expected: expected.clone(), actual: value.ty().clone() }
        );
    }
    Ok(())
}
