//! Type definitions for IR values.
//!
//! This module contains the value-kind union ([`Type`]), the tile and shaped
//! types it is built from, constant payloads and the binary operation tags used
//! by host arithmetic.

use std::fmt;

use smallvec::SmallVec;

use gmlst_dtype::DType;

// ============================================================================
// Dimensions
// ============================================================================

/// A single extent: statically known or determined at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dim {
    Static(u64),
    Dynamic,
}

impl Dim {
    pub const fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    pub const fn as_static(&self) -> Option<u64> {
        match self {
            Self::Static(n) => Some(*n),
            Self::Dynamic => None,
        }
    }

    /// Two extents may describe the same runtime size.
    ///
    /// A dynamic extent is compatible with anything; static extents must agree.
    pub const fn is_compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => *a == *b,
            _ => true,
        }
    }
}

impl From<u64> for Dim {
    fn from(value: u64) -> Self {
        Self::Static(value)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(n) => write!(f, "{n}"),
            Self::Dynamic => f.write_str("?"),
        }
    }
}

pub type Shape = SmallVec<[Dim; 4]>;

/// Product of static extents, `None` as soon as one extent is dynamic.
pub fn num_elements(dims: &[Dim]) -> Option<u64> {
    dims.iter().try_fold(1u64, |acc, d| d.as_static().map(|n| acc.saturating_mul(n)))
}

pub fn is_compatible_shape(lhs: &[Dim], rhs: &[Dim]) -> bool {
    lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(a, b)| a.is_compatible(b))
}

fn write_dims(f: &mut fmt::Formatter<'_>, dims: &[Dim]) -> fmt::Result {
    for (i, dim) in dims.iter().enumerate() {
        if i > 0 {
            f.write_str("x")?;
        }
        write!(f, "{dim}")?;
    }
    Ok(())
}

// ============================================================================
// Tile
// ============================================================================

/// N-dimensional rectangle of an iteration space.
///
/// Rank 0 denotes a single scalar position. Tiles are immutable; equality is
/// structural, with `Dynamic` only equal to `Dynamic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileType {
    dims: Shape,
}

impl TileType {
    pub fn new(dims: impl IntoIterator<Item = Dim>) -> Self {
        Self { dims: dims.into_iter().collect() }
    }

    /// Fully static tile.
    pub fn from_static(sizes: &[u64]) -> Self {
        Self::new(sizes.iter().copied().map(Dim::Static))
    }

    /// Rank-0 tile addressing one scalar position.
    pub fn scalar() -> Self {
        Self::new([])
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn is_static(&self) -> bool {
        self.dims.iter().all(Dim::is_static)
    }

    /// Total element count; `None` ("unknown") when any dimension is dynamic.
    pub fn num_elements(&self) -> Option<u64> {
        num_elements(&self.dims)
    }

    /// Every dimension is statically one.
    pub fn is_unit(&self) -> bool {
        self.dims.iter().all(|d| *d == Dim::Static(1))
    }
}

impl fmt::Display for TileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("!tile<")?;
        write_dims(f, &self.dims)?;
        f.write_str(">")
    }
}

// ============================================================================
// Shaped (tensor / vector)
// ============================================================================

/// Shape plus element type, shared by tensors and vectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapedType {
    pub shape: Shape,
    pub element: DType,
}

impl ShapedType {
    pub fn new(shape: impl IntoIterator<Item = Dim>, element: DType) -> Self {
        Self { shape: shape.into_iter().collect(), element }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn is_static(&self) -> bool {
        self.shape.iter().all(Dim::is_static)
    }

    pub fn num_elements(&self) -> Option<u64> {
        num_elements(&self.shape)
    }

    fn write_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_dims(f, &self.shape)?;
        if !self.shape.is_empty() {
            f.write_str("x")?;
        }
        write!(f, "{}", self.element)
    }
}

// ============================================================================
// Value kinds
// ============================================================================

/// Closed union of value kinds.
///
/// Operations accept a subset of kinds through the predicates below rather
/// than through an open interface hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Tile(TileType),
    Tensor(ShapedType),
    Vector(ShapedType),
    Scalar(DType),
}

impl Type {
    pub fn tensor(shape: impl IntoIterator<Item = Dim>, element: DType) -> Self {
        Self::Tensor(ShapedType::new(shape, element))
    }

    pub fn vector(shape: impl IntoIterator<Item = Dim>, element: DType) -> Self {
        Self::Vector(ShapedType::new(shape, element))
    }

    /// Static tensor type, convenient for tests and builders.
    pub fn static_tensor(shape: &[u64], element: DType) -> Self {
        Self::tensor(shape.iter().copied().map(Dim::Static), element)
    }

    pub fn tile(dims: impl IntoIterator<Item = Dim>) -> Self {
        Self::Tile(TileType::new(dims))
    }

    pub const fn index() -> Self {
        Self::Scalar(DType::Index)
    }

    pub fn is_tile(&self) -> bool {
        matches!(self, Self::Tile(_))
    }

    /// Region-identifying value usable to locate a sub-extent of a larger value.
    ///
    /// Tiles are the only kind implementing this capability.
    pub fn is_set(&self) -> bool {
        self.is_tile()
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Self::Tensor(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    /// Tensor or vector.
    pub fn is_shaped(&self) -> bool {
        matches!(self, Self::Tensor(_) | Self::Vector(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Scalar(DType::Index))
    }

    pub fn as_tile(&self) -> Option<&TileType> {
        match self {
            Self::Tile(tile) => Some(tile),
            _ => None,
        }
    }

    pub fn as_shaped(&self) -> Option<&ShapedType> {
        match self {
            Self::Tensor(s) | Self::Vector(s) => Some(s),
            _ => None,
        }
    }

    /// Element type of shaped values, the type itself for scalars.
    pub fn element_type(&self) -> Option<DType> {
        match self {
            Self::Tensor(s) | Self::Vector(s) => Some(s.element),
            Self::Scalar(dtype) => Some(*dtype),
            Self::Tile(_) => None,
        }
    }

    /// Dimensions of tiles and shaped values; scalars have none.
    pub fn dims(&self) -> &[Dim] {
        match self {
            Self::Tile(tile) => tile.dims(),
            Self::Tensor(s) | Self::Vector(s) => &s.shape,
            Self::Scalar(_) => &[],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims().len()
    }

    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Tile(_) => "tile",
            Self::Tensor(_) => "tensor",
            Self::Vector(_) => "vector",
            Self::Scalar(_) => "scalar",
        }
    }
}

impl From<DType> for Type {
    fn from(dtype: DType) -> Self {
        Self::Scalar(dtype)
    }
}

impl From<TileType> for Type {
    fn from(tile: TileType) -> Self {
        Self::Tile(tile)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tile(tile) => write!(f, "{tile}"),
            Self::Tensor(s) => {
                f.write_str("tensor<")?;
                s.write_body(f)?;
                f.write_str(">")
            }
            Self::Vector(s) => {
                f.write_str("vector<")?;
                s.write_body(f)?;
                f.write_str(">")
            }
            Self::Scalar(dtype) => write!(f, "{dtype}"),
        }
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Constant payload of a `constant` operation or a runtime scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Helper macro to cast to target width and back to storage type (for proper truncation/extension).
macro_rules! cast_via {
    ($v:expr, $target:ty, $storage:ty) => {
        ($v as $target) as $storage
    };
}

impl ConstValue {
    pub const fn zero(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(false),
            Int8 | Int16 | Int32 | Int64 | Index => Self::Int(0),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(0),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(0.0),
        }
    }

    pub const fn one(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(true),
            Int8 | Int16 | Int32 | Int64 | Index => Self::Int(1),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(1),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(1.0),
        }
    }

    /// The payload variant matches the storage class of `dtype`.
    pub const fn is_compatible(&self, dtype: DType) -> bool {
        match self {
            Self::Int(_) => dtype.is_signed() || dtype.is_index(),
            Self::UInt(_) => dtype.is_unsigned(),
            Self::Float(_) => dtype.is_float(),
            Self::Bool(_) => dtype.is_bool(),
        }
    }

    /// Cast this constant to the storage class of `dtype`.
    ///
    /// Narrowing integer casts truncate to the target width, floats convert to
    /// integers by truncation toward zero.
    pub fn cast(&self, dtype: DType) -> Self {
        use DType::*;
        match (*self, dtype) {
            (Self::Bool(v), Bool) => Self::Bool(v),
            (Self::Int(v), Bool) => Self::Bool(v != 0),
            (Self::UInt(v), Bool) => Self::Bool(v != 0),
            (Self::Float(v), Bool) => Self::Bool(v != 0.0),
            (v, Int8) => Self::Int(cast_via!(v.as_i64_lossy(), i8, i64)),
            (v, Int16) => Self::Int(cast_via!(v.as_i64_lossy(), i16, i64)),
            (v, Int32) => Self::Int(cast_via!(v.as_i64_lossy(), i32, i64)),
            (v, Int64 | Index) => Self::Int(v.as_i64_lossy()),
            (v, UInt8) => Self::UInt(cast_via!(v.as_i64_lossy(), u8, u64)),
            (v, UInt16) => Self::UInt(cast_via!(v.as_i64_lossy(), u16, u64)),
            (v, UInt32) => Self::UInt(cast_via!(v.as_i64_lossy(), u32, u64)),
            (Self::UInt(v), UInt64) => Self::UInt(v),
            (v, UInt64) => Self::UInt(v.as_i64_lossy() as u64),
            (v, Float16 | BFloat16 | Float32 | Float64) => Self::Float(round_float(v.as_f64_lossy(), dtype)),
        }
    }

    fn as_f64_lossy(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
            Self::Bool(v) => v as u8 as f64,
        }
    }

    fn as_i64_lossy(&self) -> i64 {
        match *self {
            Self::Int(v) => v,
            Self::UInt(v) => v as i64,
            Self::Float(v) => v as i64,
            Self::Bool(v) => v as i64,
        }
    }

    /// Integer payload, used for index arithmetic.
    pub const fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::UInt(v) if v <= i64::MAX as u64 => Some(v as i64),
            _ => None,
        }
    }
}

/// Round `v` to the nearest value representable in the float type `dtype`.
fn round_float(v: f64, dtype: DType) -> f64 {
    match dtype {
        DType::Float16 => half::f16::from_f64(v).to_f64(),
        DType::BFloat16 => half::bf16::from_f64(v).to_f64(),
        DType::Float32 => v as f32 as f64,
        _ => v,
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            // Debug keeps a fractional part or exponent, so the literal re-lexes as a float.
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

// ============================================================================
// Host arithmetic
// ============================================================================

/// Binary arithmetic on scalars, or elementwise on tensors and vectors.
///
/// All binary operations preserve the operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString, strum::IntoStaticStr, strum::EnumIter, strum::VariantArray)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Max,
    Min,
}

impl BinaryOp {
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Associative and commutative: safe as a combiner for overlapping parallel updates.
    pub const fn is_commutative_monoid(&self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::Max | Self::Min)
    }
}
