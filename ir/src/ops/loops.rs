//! Loop-like construct shared by the sequential and parallel variants.
//!
//! Both variants have the same operand, block-argument and result layout:
//!
//! ```text
//! operands:   lower[0..n] upper[0..n] step[0..n] outputs[0..k]
//! block args: iv[0..n] out[0..k]
//! results:    result[0..k]
//! ```
//!
//! Output `i` maps to operand `3n + i`, block argument `n + i` and result `i`.
//! All index arithmetic for that mapping lives in the accessors below.

use bon::bon;
use smallvec::SmallVec;
use snafu::ensure;

use crate::Result;
use crate::error::{
    DstNotLoopOutputSnafu, EmptyLoopHeaderSnafu, IndexOutOfRangeSnafu, InductionVarCountSnafu,
    InvalidOperandKindSnafu, LoopBoundsMismatchSnafu, MissingTerminatorSnafu, OutputArgCountSnafu,
    ResultCountMismatchSnafu, TerminatorMismatchSnafu, TypeMismatchSnafu,
};
use crate::op::Op;
use crate::ops::SetYieldOp;
use crate::region::{Block, Region};
use crate::types::Type;
use crate::value::Value;

/// Iteration discipline of a loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum LoopKind {
    /// Iterations run in increasing lexicographic order, dimension 0 outermost.
    #[default]
    Sequential,
    /// Iterations may run in any order.
    ///
    /// The distribution tag is opaque metadata for later scheduling.
    Parallel { distribution: Option<String> },
}

impl LoopKind {
    pub fn parallel() -> Self {
        Self::Parallel { distribution: None }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel { .. })
    }

    pub fn distribution(&self) -> Option<&str> {
        match self {
            Self::Parallel { distribution } => distribution.as_deref(),
            Self::Sequential => None,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Sequential => "for",
            Self::Parallel { .. } => "parallel",
        }
    }
}

/// Bounds, steps and initial outputs of a loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopHeader {
    pub lower: SmallVec<[Value; 4]>,
    pub upper: SmallVec<[Value; 4]>,
    pub step: SmallVec<[Value; 4]>,
    pub outputs: SmallVec<[Value; 4]>,
}

#[bon]
impl LoopHeader {
    /// Create a loop header with builder pattern.
    #[builder]
    pub fn new(
        #[builder(into)] lower: Vec<Value>,
        #[builder(into)] upper: Vec<Value>,
        #[builder(into)] step: Vec<Value>,
        #[builder(default, into)] outputs: Vec<Value>,
    ) -> Self {
        Self {
            lower: lower.into_iter().collect(),
            upper: upper.into_iter().collect(),
            step: step.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    pub fn num_loops(&self) -> usize {
        self.lower.len()
    }

    /// Block argument types of a body for this header: index IVs, then one per output.
    pub fn body_arg_types(&self) -> Vec<Type> {
        std::iter::repeat_n(Type::index(), self.num_loops())
            .chain(self.outputs.iter().map(|o| o.ty().clone()))
            .collect()
    }

    fn verify(&self) -> Result<()> {
        let (lower, upper, step) = (self.lower.len(), self.upper.len(), self.step.len());
        ensure!(lower == upper && upper == step, LoopBoundsMismatchSnafu { lower, upper, step });
        ensure!(lower > 0, EmptyLoopHeaderSnafu);

        for (operand, values) in [("lower bound", &self.lower), ("upper bound", &self.upper), ("step", &self.step)] {
            for value in values {
                ensure!(
                    value.ty().is_index(),
                    InvalidOperandKindSnafu { operand, expected: "an index", actual: value.ty().clone() }
                );
            }
        }
        for output in &self.outputs {
            ensure!(
                output.ty().is_shaped(),
                InvalidOperandKindSnafu { operand: "loop output", expected: "a tensor or vector", actual: output.ty().clone() }
            );
        }
        Ok(())
    }
}

/// Loop over the rectangular domain `[lower, upper)` stepped by `step`.
#[derive(Debug, Clone)]
pub struct LoopOp {
    kind: LoopKind,
    header: LoopHeader,
    body: Region,
}

impl LoopOp {
    /// Create a loop after checking header and body structure.
    pub fn new(kind: LoopKind, header: LoopHeader, body: Region) -> Result<Self> {
        let op = Self { kind, header, body };
        op.verify_structure()?;
        Ok(op)
    }

    pub fn kind(&self) -> &LoopKind {
        &self.kind
    }

    pub fn header(&self) -> &LoopHeader {
        &self.header
    }

    pub fn lower(&self) -> &[Value] {
        &self.header.lower
    }

    pub fn upper(&self) -> &[Value] {
        &self.header.upper
    }

    pub fn step(&self) -> &[Value] {
        &self.header.step
    }

    pub fn outputs(&self) -> &[Value] {
        &self.header.outputs
    }

    pub fn body(&self) -> &Region {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut Region {
        &mut self.body
    }

    pub fn num_loops(&self) -> usize {
        self.header.lower.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.header.outputs.len()
    }

    pub(crate) fn operands(&self) -> impl Iterator<Item = &Value> {
        let h = &self.header;
        h.lower.iter().chain(&h.upper).chain(&h.step).chain(&h.outputs)
    }

    pub(crate) fn operand_lists_mut(&mut self) -> [&mut [Value]; 4] {
        let h = &mut self.header;
        [h.lower.as_mut_slice(), h.upper.as_mut_slice(), h.step.as_mut_slice(), h.outputs.as_mut_slice()]
    }

    fn block_args(&self) -> &[Value] {
        self.body.entry().map(Block::arguments).unwrap_or(&[])
    }

    /// Induction variables, one per dimension.
    pub fn induction_vars(&self) -> &[Value] {
        let args = self.block_args();
        &args[..self.num_loops().min(args.len())]
    }

    /// Block arguments standing for the current value of each output.
    pub fn output_args(&self) -> &[Value] {
        let args = self.block_args();
        &args[self.num_loops().min(args.len())..]
    }

    // =========================================================================
    // Output mapping
    // =========================================================================

    /// Operand position of output `index`.
    pub fn output_operand_index(&self, index: usize) -> usize {
        3 * self.num_loops() + index
    }

    pub fn output_operand(&self, index: usize) -> Result<&Value> {
        let len = self.num_outputs();
        ensure!(index < len, IndexOutOfRangeSnafu { what: "loop outputs", index, len });
        Ok(&self.header.outputs[index])
    }

    /// Output index of operand position `operand`, if it is an output.
    pub fn output_index_of_operand(&self, operand: usize) -> Option<usize> {
        operand.checked_sub(3 * self.num_loops()).filter(|index| *index < self.num_outputs())
    }

    /// Block argument position of output `index`.
    pub fn block_arg_index_of_output(&self, index: usize) -> usize {
        self.num_loops() + index
    }

    pub fn output_block_arg(&self, index: usize) -> Result<&Value> {
        let len = self.num_outputs();
        ensure!(index < len, IndexOutOfRangeSnafu { what: "loop outputs", index, len });
        let position = self.block_arg_index_of_output(index);
        self.block_args().get(position).ok_or_else(|| {
            IndexOutOfRangeSnafu { what: "loop block arguments", index: position, len: self.block_args().len() }.build()
        })
    }

    /// Output index of `value` if it is an output block argument of this loop.
    pub fn output_index_of_block_arg(&self, value: &Value) -> Option<usize> {
        let block = self.body.entry()?;
        value
            .block_arg_index(block.id())?
            .checked_sub(self.num_loops())
            .filter(|index| *index < self.num_outputs())
    }

    /// The body's merge terminator.
    pub fn terminator(&self) -> Option<&SetYieldOp> {
        match self.body.entry()?.terminator()?.op() {
            Op::SetYield(op) => Some(op),
            _ => None,
        }
    }

    // =========================================================================
    // Verification
    // =========================================================================

    fn verify_structure(&self) -> Result<()> {
        self.header.verify()?;

        let block = self.body.single_block("loop body")?;
        let args = block.arguments();
        let ivs = self.num_loops();
        let outs = self.num_outputs();
        ensure!(
            args.len() >= ivs,
            InductionVarCountSnafu { expected: ivs, actual: args.len() }
        );
        for iv in &args[..ivs] {
            ensure!(
                iv.ty().is_index(),
                InvalidOperandKindSnafu { operand: "induction variable", expected: "an index", actual: iv.ty().clone() }
            );
        }
        ensure!(args.len() - ivs == outs, OutputArgCountSnafu { expected: outs, actual: args.len() - ivs });
        for (arg, output) in args[ivs..].iter().zip(self.outputs()) {
            ensure!(
                arg.ty() == output.ty(),
                TypeMismatchSnafu { what: "output block argument", expected: output.ty().clone(), actual: arg.ty().clone() }
            );
        }

        let Some(last) = block.operations().last() else {
            return MissingTerminatorSnafu { expected: "set_yield" }.fail();
        };
        let Op::SetYield(terminator) = last.op() else {
            return TerminatorMismatchSnafu { expected: "set_yield", actual: last.name() }.fail();
        };
        for (update, dst) in terminator.dsts().iter().enumerate() {
            ensure!(self.output_index_of_block_arg(dst).is_some(), DstNotLoopOutputSnafu { update });
        }
        Ok(())
    }

    pub(crate) fn verify(&self, results: &[Value]) -> Result<()> {
        self.verify_structure()?;
        let what = self.kind.mnemonic();
        ensure!(
            results.len() == self.num_outputs(),
            ResultCountMismatchSnafu { what, expected: self.num_outputs(), actual: results.len() }
        );
        for (result, output) in results.iter().zip(self.outputs()) {
            ensure!(
                result.ty() == output.ty(),
                TypeMismatchSnafu { what: "loop result", expected: output.ty().clone(), actual: result.ty().clone() }
            );
        }
        Ok(())
    }
}
