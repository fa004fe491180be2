//! Fusion clusters and the `yield` terminator.

use smallvec::SmallVec;
use snafu::ensure;

use crate::Result;
use crate::error::{
    BlockArgCountSnafu, MissingTerminatorSnafu, TerminatorMismatchSnafu, TypeMismatchSnafu, YieldCountMismatchSnafu,
};
use crate::op::Op;
use crate::region::Region;
use crate::value::Value;

/// Returns values from an accumulator region or a fusion body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldOp {
    values: SmallVec<[Value; 4]>,
}

impl YieldOp {
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self { values: values.into_iter().collect() }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }
}

/// Sub-computation grouped for joint tiling and fusion.
///
/// The body block takes one argument per input and runs exactly once.
#[derive(Debug, Clone)]
pub struct FusionOp {
    inputs: SmallVec<[Value; 4]>,
    body: Region,
}

impl FusionOp {
    pub fn new(inputs: impl IntoIterator<Item = Value>, body: Region) -> Result<Self> {
        let op = Self { inputs: inputs.into_iter().collect(), body };
        op.verify_body()?;
        Ok(op)
    }

    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut [Value] {
        &mut self.inputs
    }

    pub fn body(&self) -> &Region {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut Region {
        &mut self.body
    }

    /// The body's `yield`.
    pub fn terminator(&self) -> Option<&YieldOp> {
        match self.body.entry()?.terminator()?.op() {
            Op::Yield(op) => Some(op),
            _ => None,
        }
    }

    fn verify_body(&self) -> Result<&YieldOp> {
        let block = self.body.single_block("fusion body")?;
        let args = block.arguments();
        ensure!(
            args.len() == self.inputs.len(),
            BlockArgCountSnafu { what: "fusion body", expected: self.inputs.len(), actual: args.len() }
        );
        for (arg, input) in args.iter().zip(&self.inputs) {
            ensure!(
                arg.ty() == input.ty(),
                TypeMismatchSnafu { what: "fusion block argument", expected: input.ty().clone(), actual: arg.ty().clone() }
            );
        }

        let Some(last) = block.operations().last() else {
            return MissingTerminatorSnafu { expected: "yield" }.fail();
        };
        match last.op() {
            Op::Yield(terminator) => Ok(terminator),
            _ => TerminatorMismatchSnafu { expected: "yield", actual: last.name() }.fail(),
        }
    }

    pub(crate) fn verify(&self, results: &[Value]) -> Result<()> {
        let terminator = self.verify_body()?;
        let values = terminator.values();
        ensure!(values.len() == results.len(), YieldCountMismatchSnafu { expected: results.len(), actual: values.len() });
        for (value, result) in values.iter().zip(results) {
            ensure!(
                value.ty() == result.ty(),
                TypeMismatchSnafu { what: "fusion result", expected: result.ty().clone(), actual: value.ty().clone() }
            );
        }
        Ok(())
    }
}
