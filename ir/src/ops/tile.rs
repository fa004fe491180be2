//! Tile construction.

use snafu::ensure;

use super::expect_results;
use crate::Result;
use crate::error::{InvalidOperandKindSnafu, RankMismatchSnafu, TileTypeMismatchSnafu};
use crate::mixed::{MixedIndex, OffsetsSizesStrides};
use crate::types::Type;
use crate::value::Value;

/// Rectangular tile of an iteration space.
///
/// The result type is fully determined by the sizes: constant sizes become
/// static dimensions, runtime sizes dynamic ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileOp {
    triple: OffsetsSizesStrides,
}

impl TileOp {
    pub fn new(triple: OffsetsSizesStrides) -> Self {
        Self { triple }
    }

    pub fn triple(&self) -> &OffsetsSizesStrides {
        &self.triple
    }

    pub(crate) fn triple_mut(&mut self) -> &mut OffsetsSizesStrides {
        &mut self.triple
    }

    pub fn result_type(&self) -> Type {
        Type::Tile(self.triple.tile_type())
    }

    pub(crate) fn verify(&self, results: &[Value]) -> Result<()> {
        self.triple.validate()?;
        expect_results("tile", results, 1)?;

        let actual = results[0].ty();
        let Some(actual) = actual.as_tile() else {
            return InvalidOperandKindSnafu { operand: "tile result", expected: "a tile", actual: actual.clone() }
                .fail();
        };
        let expected = self.triple.tile_type();
        ensure!(
            actual.rank() == expected.rank(),
            RankMismatchSnafu { what: "tile type", expected: expected.rank(), actual: actual.rank() }
        );
        ensure!(*actual == expected, TileTypeMismatchSnafu { expected, actual: actual.clone() });
        Ok(())
    }

    /// Replace runtime entries whose value is a known non-negative constant.
    ///
    /// Returns `None` when nothing folds.
    pub(crate) fn fold_constants(&self, lookup: impl Fn(&Value) -> Option<i64>) -> Option<Self> {
        let mut folded = self.clone();
        let changed = folded.triple.remap(&mut |value| lookup(value).filter(|v| *v >= 0).map(MixedIndex::Const));
        changed.then_some(folded)
    }
}
