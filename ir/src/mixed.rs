//! Mixed static/dynamic index lists.
//!
//! Offsets, sizes and strides are each an ordered sequence of [`MixedIndex`]
//! entries: a compile-time constant or a runtime index value. Keeping the two
//! cases in one sequence preserves positional order without parallel arrays.
//!
//! Tiles, materializations and the dense static encoding all go through
//! [`OffsetsSizesStrides`].

use smallvec::SmallVec;
use snafu::ensure;

use crate::Result;
use crate::error::{
    DynamicOperandCountSnafu, IndexOperandTypeSnafu, NegativeStaticIndexSnafu, RankMismatchSnafu, ReservedStaticIndexSnafu,
};
use crate::types::{Dim, TileType};
use crate::value::Value;

/// Placeholder recorded in the static encoding where a runtime operand is read.
pub const DYNAMIC_INDEX: i64 = i64::MIN;

/// A single index entry: constant or runtime-supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MixedIndex {
    Const(i64),
    Dynamic(Value),
}

impl MixedIndex {
    pub fn is_const(&self) -> bool {
        matches!(self, Self::Const(_))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    pub fn as_const(&self) -> Option<i64> {
        match self {
            Self::Const(v) => Some(*v),
            Self::Dynamic(_) => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&Value> {
        match self {
            Self::Const(_) => None,
            Self::Dynamic(value) => Some(value),
        }
    }

    /// Extent classification of a size entry.
    ///
    /// Only meaningful for validated, non-negative sizes.
    pub fn to_dim(&self) -> Dim {
        match self {
            Self::Const(v) => Dim::Static(*v as u64),
            Self::Dynamic(_) => Dim::Dynamic,
        }
    }
}

impl From<i64> for MixedIndex {
    fn from(value: i64) -> Self {
        Self::Const(value)
    }
}

impl From<Value> for MixedIndex {
    fn from(value: Value) -> Self {
        Self::Dynamic(value)
    }
}

impl From<&Value> for MixedIndex {
    fn from(value: &Value) -> Self {
        Self::Dynamic(value.clone())
    }
}

pub type MixedIndices = SmallVec<[MixedIndex; 4]>;

/// Dense encoding: per-position constants with [`DYNAMIC_INDEX`] placeholders,
/// plus the runtime operands in positional order (offsets, then sizes, then strides).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticEncoding {
    pub static_offsets: SmallVec<[i64; 4]>,
    pub static_sizes: SmallVec<[i64; 4]>,
    pub static_strides: SmallVec<[i64; 4]>,
    pub dynamic: SmallVec<[Value; 4]>,
}

/// Offsets, sizes and strides of one rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OffsetsSizesStrides {
    offsets: MixedIndices,
    sizes: MixedIndices,
    strides: MixedIndices,
}

impl OffsetsSizesStrides {
    /// Build and validate a triple.
    ///
    /// Fails when the three ranks disagree, when a constant offset or size is
    /// negative, when a constant stride equals [`DYNAMIC_INDEX`], or when a
    /// dynamic entry is not of index type.
    pub fn new(
        offsets: impl IntoIterator<Item = MixedIndex>,
        sizes: impl IntoIterator<Item = MixedIndex>,
        strides: impl IntoIterator<Item = MixedIndex>,
    ) -> Result<Self> {
        let triple =
            Self { offsets: offsets.into_iter().collect(), sizes: sizes.into_iter().collect(), strides: strides.into_iter().collect() };
        triple.validate()?;
        Ok(triple)
    }

    /// Fully static triple.
    pub fn from_static(offsets: &[i64], sizes: &[i64], strides: &[i64]) -> Result<Self> {
        Self::new(
            offsets.iter().copied().map(MixedIndex::Const),
            sizes.iter().copied().map(MixedIndex::Const),
            strides.iter().copied().map(MixedIndex::Const),
        )
    }

    /// Triple with every stride equal to one.
    pub fn with_unit_strides(
        offsets: impl IntoIterator<Item = MixedIndex>,
        sizes: impl IntoIterator<Item = MixedIndex>,
    ) -> Result<Self> {
        let sizes: MixedIndices = sizes.into_iter().collect();
        let strides: MixedIndices = sizes.iter().map(|_| MixedIndex::Const(1)).collect();
        Self::new(offsets, sizes, strides)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let rank = self.offsets.len();
        ensure!(self.sizes.len() == rank, RankMismatchSnafu { what: "sizes", expected: rank, actual: self.sizes.len() });
        ensure!(
            self.strides.len() == rank,
            RankMismatchSnafu { what: "strides", expected: rank, actual: self.strides.len() }
        );

        for (what, list) in [("offsets", &self.offsets), ("sizes", &self.sizes)] {
            for (position, entry) in list.iter().enumerate() {
                if let MixedIndex::Const(value) = entry {
                    ensure!(*value >= 0, NegativeStaticIndexSnafu { what, position, value: *value });
                }
            }
        }
        for (position, entry) in self.strides.iter().enumerate() {
            ensure!(*entry != MixedIndex::Const(DYNAMIC_INDEX), ReservedStaticIndexSnafu { what: "strides", position });
        }
        for value in self.dynamic_operands() {
            ensure!(value.ty().is_index(), IndexOperandTypeSnafu { actual: value.ty().clone() });
        }
        Ok(())
    }

    pub fn rank(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[MixedIndex] {
        &self.offsets
    }

    pub fn sizes(&self) -> &[MixedIndex] {
        &self.sizes
    }

    pub fn strides(&self) -> &[MixedIndex] {
        &self.strides
    }

    /// Tile type implied by the sizes; offsets and strides do not participate.
    pub fn tile_type(&self) -> TileType {
        TileType::new(self.sizes.iter().map(MixedIndex::to_dim))
    }

    pub fn is_static(&self) -> bool {
        self.offsets.iter().chain(&self.sizes).chain(&self.strides).all(MixedIndex::is_const)
    }

    /// Runtime operands in positional order (offsets, sizes, strides).
    pub fn dynamic_operands(&self) -> impl Iterator<Item = &Value> {
        self.offsets.iter().chain(&self.sizes).chain(&self.strides).filter_map(MixedIndex::as_dynamic)
    }

    pub fn num_dynamic(&self) -> usize {
        self.dynamic_operands().count()
    }

    pub fn to_static_encoding(&self) -> StaticEncoding {
        fn encode(list: &[MixedIndex]) -> SmallVec<[i64; 4]> {
            list.iter().map(|entry| entry.as_const().unwrap_or(DYNAMIC_INDEX)).collect()
        }

        StaticEncoding {
            static_offsets: encode(&self.offsets),
            static_sizes: encode(&self.sizes),
            static_strides: encode(&self.strides),
            dynamic: self.dynamic_operands().cloned().collect(),
        }
    }

    /// Inverse of [`Self::to_static_encoding`].
    pub fn from_static_encoding(encoding: &StaticEncoding) -> Result<Self> {
        let expected = [&encoding.static_offsets, &encoding.static_sizes, &encoding.static_strides]
            .into_iter()
            .flat_map(|list| list.iter())
            .filter(|v| **v == DYNAMIC_INDEX)
            .count();
        ensure!(
            expected == encoding.dynamic.len(),
            DynamicOperandCountSnafu { expected, actual: encoding.dynamic.len() }
        );

        let mut dynamic = encoding.dynamic.iter();
        let mut decode = |list: &[i64]| -> MixedIndices {
            list.iter()
                .map(|&v| match (v == DYNAMIC_INDEX).then(|| dynamic.next()).flatten() {
                    Some(value) => MixedIndex::Dynamic(value.clone()),
                    None => MixedIndex::Const(v),
                })
                .collect()
        };
        let offsets = decode(&encoding.static_offsets);
        let sizes = decode(&encoding.static_sizes);
        let strides = decode(&encoding.static_strides);
        Self::new(offsets, sizes, strides)
    }

    /// Replace dynamic entries; `f` returns the new entry or `None` to keep it.
    pub(crate) fn remap(&mut self, f: &mut impl FnMut(&Value) -> Option<MixedIndex>) -> bool {
        let mut changed = false;
        for entry in self.offsets.iter_mut().chain(self.sizes.iter_mut()).chain(self.strides.iter_mut()) {
            if let MixedIndex::Dynamic(value) = entry
                && let Some(replacement) = f(value)
            {
                *entry = replacement;
                changed = true;
            }
        }
        changed
    }
}
