//! Runtime values of the reference evaluator.

use smallvec::SmallVec;
use snafu::ensure;

use gmlst_dtype::DType;

use crate::Result;
use crate::error::{RuntimeKindMismatchSnafu, TileOutOfBoundsSnafu};
use crate::types::{ConstValue, Dim, Type};

type Index = SmallVec<[usize; 4]>;

/// Concrete value bound to an SSA value during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum RtValue {
    Scalar(ConstValue),
    Shaped(ShapedValue),
    Tile(TileValue),
}

impl RtValue {
    pub fn as_scalar(&self) -> Result<ConstValue> {
        match self {
            Self::Scalar(value) => Ok(*value),
            _ => RuntimeKindMismatchSnafu { expected: "a scalar" }.fail(),
        }
    }

    /// Integer payload of an index scalar.
    pub fn as_index(&self) -> Result<i64> {
        match self.as_scalar()?.as_i64() {
            Some(v) => Ok(v),
            None => RuntimeKindMismatchSnafu { expected: "an index" }.fail(),
        }
    }

    pub fn as_shaped(&self) -> Result<&ShapedValue> {
        match self {
            Self::Shaped(value) => Ok(value),
            _ => RuntimeKindMismatchSnafu { expected: "a tensor or vector" }.fail(),
        }
    }

    pub fn as_tile(&self) -> Result<&TileValue> {
        match self {
            Self::Tile(tile) => Ok(tile),
            _ => RuntimeKindMismatchSnafu { expected: "a tile" }.fail(),
        }
    }

    /// Whether this value may be bound to a value of type `ty`.
    pub fn matches_type(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Self::Scalar(value), Type::Scalar(dtype)) => value.is_compatible(*dtype),
            (Self::Shaped(value), Type::Tensor(shaped) | Type::Vector(shaped)) => {
                value.element == shaped.element
                    && value.shape.len() == shaped.rank()
                    && value.shape.iter().zip(&shaped.shape).all(|(n, d)| d.is_compatible(&Dim::Static(*n as u64)))
                    && value.data.iter().all(|v| v.is_compatible(shaped.element))
            }
            (Self::Tile(tile), Type::Tile(tile_ty)) => {
                tile.sizes.len() == tile_ty.rank()
                    && tile.sizes.iter().zip(tile_ty.dims()).all(|(n, d)| d.is_compatible(&Dim::Static(*n as u64)))
            }
            _ => false,
        }
    }
}

impl From<ConstValue> for RtValue {
    fn from(value: ConstValue) -> Self {
        Self::Scalar(value)
    }
}

impl From<ShapedValue> for RtValue {
    fn from(value: ShapedValue) -> Self {
        Self::Shaped(value)
    }
}

impl From<TileValue> for RtValue {
    fn from(tile: TileValue) -> Self {
        Self::Tile(tile)
    }
}

/// Dense row-major tensor or vector contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedValue {
    shape: Vec<usize>,
    element: DType,
    data: Vec<ConstValue>,
}

impl ShapedValue {
    /// Returns `None` when `data` does not hold exactly one entry per position.
    pub fn new(shape: Vec<usize>, element: DType, data: Vec<ConstValue>) -> Option<Self> {
        (shape.iter().product::<usize>() == data.len()).then_some(Self { shape, element, data })
    }

    pub fn filled(shape: Vec<usize>, value: ConstValue, element: DType) -> Self {
        let len = shape.iter().product();
        Self { shape, element, data: vec![value; len] }
    }

    pub fn zeros(shape: Vec<usize>, element: DType) -> Self {
        Self::filled(shape, ConstValue::zero(element), element)
    }

    /// Rank-1 value.
    pub fn from_vec(element: DType, data: Vec<ConstValue>) -> Self {
        Self { shape: vec![data.len()], element, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn element(&self) -> DType {
        self.element
    }

    pub fn data(&self) -> &[ConstValue] {
        &self.data
    }

    pub fn get(&self, index: &[usize]) -> Option<ConstValue> {
        self.linear(index).and_then(|i| self.data.get(i).copied())
    }

    fn linear(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        index.iter().zip(&self.shape).try_fold(0usize, |acc, (i, n)| (*i < *n).then_some(acc * n + i))
    }

    /// Read the positions addressed by `tile`.
    pub fn extract(&self, tile: &TileValue) -> Result<ShapedValue> {
        let positions = tile.source_positions(&self.shape)?;
        let data = positions.iter().map(|i| self.data[*i]).collect();
        Ok(ShapedValue { shape: tile.sizes.clone(), element: self.element, data })
    }

    /// Overwrite the positions addressed by `tile` with `values`, in tile row-major order.
    pub fn insert(&mut self, tile: &TileValue, values: &[ConstValue]) -> Result<()> {
        let positions = tile.source_positions(&self.shape)?;
        ensure!(positions.len() == values.len(), RuntimeKindMismatchSnafu { expected: "a source matching the tile" });
        for (position, value) in positions.into_iter().zip(values) {
            self.data[position] = *value;
        }
        Ok(())
    }

    /// Elementwise combination of two values of the same shape.
    pub fn zip_with(&self, other: &ShapedValue, mut f: impl FnMut(ConstValue, ConstValue) -> Result<ConstValue>) -> Result<ShapedValue> {
        ensure!(self.shape == other.shape, RuntimeKindMismatchSnafu { expected: "operands of equal shape" });
        let data = self.data.iter().zip(&other.data).map(|(a, b)| f(*a, *b)).collect::<Result<_>>()?;
        Ok(ShapedValue { shape: self.shape.clone(), element: self.element, data })
    }
}

/// Concrete offsets, sizes and strides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileValue {
    pub offsets: Vec<i64>,
    pub sizes: Vec<usize>,
    pub strides: Vec<i64>,
}

impl TileValue {
    pub fn rank(&self) -> usize {
        self.sizes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.sizes.iter().product()
    }

    /// Linear positions in a row-major value of `shape`, in tile row-major order.
    pub(crate) fn source_positions(&self, shape: &[usize]) -> Result<Vec<usize>> {
        ensure!(shape.len() == self.rank(), RuntimeKindMismatchSnafu { expected: "a tile of the value's rank" });

        for (dim, (&extent, ((&offset, &size), &stride))) in
            shape.iter().zip(self.offsets.iter().zip(&self.sizes).zip(&self.strides)).enumerate()
        {
            if size == 0 {
                continue;
            }
            let last = offset.saturating_add((size as i64 - 1).saturating_mul(stride));
            for index in [offset, last] {
                ensure!(index >= 0 && (index as usize) < extent, TileOutOfBoundsSnafu { dim, index, extent });
            }
        }

        let positions = row_major(&self.sizes)
            .into_iter()
            .map(|k| {
                k.iter().zip(shape).enumerate().fold(0usize, |acc, (dim, (k, extent))| {
                    let coordinate = self.offsets[dim] + *k as i64 * self.strides[dim];
                    acc * extent + coordinate as usize
                })
            })
            .collect();
        Ok(positions)
    }
}

/// Every multi-index of `sizes` in row-major order; one empty index for rank 0.
pub(crate) fn row_major(sizes: &[usize]) -> Vec<Index> {
    let mut indices = vec![Index::new()];
    for &size in sizes {
        indices = indices
            .into_iter()
            .flat_map(|prefix| {
                (0..size).map(move |i| {
                    let mut index = prefix.clone();
                    index.push(i);
                    index
                })
            })
            .collect();
    }
    indices
}
