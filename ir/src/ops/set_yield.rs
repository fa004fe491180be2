//! Merge terminator of loop bodies.
//!
//! Each update `i` writes `srcs[i]` into the part of `dsts[i]` addressed by
//! the tile `sets[i]`. Unflagged updates overwrite; flagged updates combine
//! the new and old contents through an accumulator region whose single
//! `yield` produces the merged value.
//!
//! Operand layout: `srcs[0..n] dsts[0..n] sets[0..n]`.

use smallvec::SmallVec;
use snafu::ensure;

use super::expect_results;
use crate::Result;
use crate::error::{
    AccumulatorAritySnafu, AccumulatorCountMismatchSnafu, AccumulatorTypeSnafu, DstNotLoopOutputSnafu,
    IndexOutOfRangeSnafu, InvalidOperandKindSnafu, MissingTerminatorSnafu, NoTiedResultSnafu, SetElementMismatchSnafu,
    SetRankMismatchSnafu, SetShapeMismatchSnafu, TerminatorMismatchSnafu, UpdateCountMismatchSnafu,
    YieldCountMismatchSnafu,
};
use crate::op::{Op, Operation};
use crate::region::Region;
use crate::types::{Type, is_compatible_shape};
use crate::value::Value;

/// One update of a [`SetYieldOp`], as handed to constructors.
#[derive(Debug, Clone)]
pub struct SetUpdate {
    pub src: Value,
    pub dst: Value,
    pub set: Value,
    pub accumulator: Option<Region>,
}

impl SetUpdate {
    /// Overwrite the addressed part of `dst` with `src`.
    pub fn overwrite(src: Value, dst: Value, set: Value) -> Self {
        Self { src, dst, set, accumulator: None }
    }

    /// Combine `src` with the addressed part of `dst` through `accumulator`.
    pub fn accumulate(src: Value, dst: Value, set: Value, accumulator: Region) -> Self {
        Self { src, dst, set, accumulator: Some(accumulator) }
    }
}

#[derive(Debug, Clone)]
pub struct SetYieldOp {
    srcs: SmallVec<[Value; 4]>,
    dsts: SmallVec<[Value; 4]>,
    sets: SmallVec<[Value; 4]>,
    accumulator_flags: SmallVec<[bool; 4]>,
    accumulators: Vec<Region>,
}

impl SetYieldOp {
    pub fn new(
        srcs: impl IntoIterator<Item = Value>,
        dsts: impl IntoIterator<Item = Value>,
        sets: impl IntoIterator<Item = Value>,
        accumulator_flags: impl IntoIterator<Item = bool>,
        accumulators: Vec<Region>,
    ) -> Result<Self> {
        let op = Self {
            srcs: srcs.into_iter().collect(),
            dsts: dsts.into_iter().collect(),
            sets: sets.into_iter().collect(),
            accumulator_flags: accumulator_flags.into_iter().collect(),
            accumulators,
        };
        op.verify_updates()?;
        Ok(op)
    }

    pub fn from_updates(updates: impl IntoIterator<Item = SetUpdate>) -> Result<Self> {
        let (mut srcs, mut dsts, mut sets, mut flags, mut accumulators) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for update in updates {
            srcs.push(update.src);
            dsts.push(update.dst);
            sets.push(update.set);
            flags.push(update.accumulator.is_some());
            accumulators.extend(update.accumulator);
        }
        Self::new(srcs, dsts, sets, flags, accumulators)
    }

    pub fn num_updates(&self) -> usize {
        self.srcs.len()
    }

    pub fn srcs(&self) -> &[Value] {
        &self.srcs
    }

    pub fn dsts(&self) -> &[Value] {
        &self.dsts
    }

    pub fn sets(&self) -> &[Value] {
        &self.sets
    }

    pub fn accumulator_flags(&self) -> &[bool] {
        &self.accumulator_flags
    }

    pub fn accumulators(&self) -> &[Region] {
        &self.accumulators
    }

    pub(crate) fn accumulators_mut(&mut self) -> &mut [Region] {
        &mut self.accumulators
    }

    pub(crate) fn operands(&self) -> impl Iterator<Item = &Value> {
        self.srcs.iter().chain(&self.dsts).chain(&self.sets)
    }

    pub(crate) fn operand_lists_mut(&mut self) -> [&mut [Value]; 3] {
        [self.srcs.as_mut_slice(), self.dsts.as_mut_slice(), self.sets.as_mut_slice()]
    }

    /// Operand position of the destination of update `index`.
    pub fn dst_operand_index(&self, index: usize) -> usize {
        self.num_updates() + index
    }

    /// Operand position of the tile of update `index`.
    pub fn set_operand_index(&self, index: usize) -> usize {
        2 * self.num_updates() + index
    }

    pub fn dst_operand(&self, index: usize) -> Result<&Value> {
        self.check_index(index)?;
        Ok(&self.dsts[index])
    }

    pub fn is_accumulated(&self, index: usize) -> bool {
        self.accumulator_flags.get(index).copied().unwrap_or(false)
    }

    /// Accumulator region of update `index`; `None` for overwriting updates.
    ///
    /// Regions are matched to flagged updates in order.
    pub fn accumulator_for(&self, index: usize) -> Option<&Region> {
        if !self.is_accumulated(index) {
            return None;
        }
        let position = self.accumulator_flags[..index].iter().filter(|flag| **flag).count();
        self.accumulators.get(position)
    }

    /// Loop result that receives the final value of update `index`.
    ///
    /// Only the parallel variant ties destinations to results; a sequential
    /// parent yields [`crate::Error::NoTiedResult`].
    pub fn tied_loop_result<'a>(&self, index: usize, parent: &'a Operation) -> Result<&'a Value> {
        self.check_index(index)?;
        let Some(loop_op) = parent.as_loop() else {
            return DstNotLoopOutputSnafu { update: index }.fail();
        };
        ensure!(loop_op.kind().is_parallel(), NoTiedResultSnafu { update: index });
        let Some(output) = loop_op.output_index_of_block_arg(&self.dsts[index]) else {
            return DstNotLoopOutputSnafu { update: index }.fail();
        };
        parent.loop_result(output)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.num_updates();
        ensure!(index < len, IndexOutOfRangeSnafu { what: "set_yield updates", index, len });
        Ok(())
    }

    // =========================================================================
    // Verification
    // =========================================================================

    fn verify_updates(&self) -> Result<()> {
        let (srcs, dsts, sets, flags) =
            (self.srcs.len(), self.dsts.len(), self.sets.len(), self.accumulator_flags.len());
        ensure!(
            srcs == dsts && dsts == sets && sets == flags,
            UpdateCountMismatchSnafu { srcs, dsts, sets, flags }
        );
        let flagged = self.accumulator_flags.iter().filter(|flag| **flag).count();
        ensure!(
            flagged == self.accumulators.len(),
            AccumulatorCountMismatchSnafu { flagged, regions: self.accumulators.len() }
        );

        for update in 0..self.num_updates() {
            self.verify_update(update)?;
            if let Some(region) = self.accumulator_for(update) {
                verify_accumulator(update, region, self.srcs[update].ty())?;
            }
        }
        Ok(())
    }

    fn verify_update(&self, update: usize) -> Result<()> {
        let (src, dst, set) = (self.srcs[update].ty(), self.dsts[update].ty(), self.sets[update].ty());

        let Some(tile) = set.as_tile() else {
            return InvalidOperandKindSnafu { operand: "set_yield set", expected: "a tile", actual: set.clone() }.fail();
        };
        let Some(dst_shaped) = dst.as_shaped() else {
            return InvalidOperandKindSnafu {
                operand: "set_yield destination",
                expected: "a tensor or vector",
                actual: dst.clone(),
            }
            .fail();
        };
        ensure!(
            tile.rank() == dst_shaped.rank(),
            SetRankMismatchSnafu { update, set_rank: tile.rank(), dst_rank: dst_shaped.rank() }
        );

        let shape_ok = match src {
            Type::Scalar(_) => tile.is_unit(),
            Type::Tensor(s) | Type::Vector(s) => {
                s.rank() == tile.rank() && is_compatible_shape(tile.dims(), &s.shape)
            }
            Type::Tile(_) => {
                return InvalidOperandKindSnafu {
                    operand: "set_yield source",
                    expected: "a tensor, vector or scalar",
                    actual: src.clone(),
                }
                .fail();
            }
        };
        ensure!(shape_ok, SetShapeMismatchSnafu { update, set: tile.clone(), src: src.clone() });
        ensure!(
            src.element_type() == Some(dst_shaped.element),
            SetElementMismatchSnafu { update, src: src.clone(), dst: dst.clone() }
        );
        Ok(())
    }

    pub(crate) fn verify(&self, results: &[Value]) -> Result<()> {
        self.verify_updates()?;
        expect_results("set_yield", results, 0)
    }
}

/// Accumulator shape: one block, `(new, old)` of the source type, one yielded value of that type.
fn verify_accumulator(update: usize, region: &Region, src: &Type) -> Result<()> {
    let block = region.single_block("accumulator")?;
    let args = block.arguments();
    ensure!(args.len() == 2, AccumulatorAritySnafu { update, actual: args.len() });
    for arg in args {
        ensure!(arg.ty() == src, AccumulatorTypeSnafu { update, expected: src.clone(), actual: arg.ty().clone() });
    }

    let Some(last) = block.operations().last() else {
        return MissingTerminatorSnafu { expected: "yield" }.fail();
    };
    let Op::Yield(terminator) = last.op() else {
        return TerminatorMismatchSnafu { expected: "yield", actual: last.name() }.fail();
    };
    let values = terminator.values();
    ensure!(values.len() == 1, YieldCountMismatchSnafu { expected: 1usize, actual: values.len() });
    ensure!(
        values[0].ty() == src,
        AccumulatorTypeSnafu { update, expected: src.clone(), actual: values[0].ty().clone() }
    );
    Ok(())
}
