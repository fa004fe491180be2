//! Element data types for the gmlst IR.
//!
//! Every scalar value, and the elements of every tensor or vector, carry one
//! [`DType`]. The textual mnemonic of each variant (`f32`, `i64`, `index`, ...)
//! is what the IR printer emits and the parser accepts.

#[cfg(any(test, feature = "proptest"))]
pub mod proptest_gen;


/// Scalar element type.
///
/// `Index` is the target-independent integer used for loop bounds, induction
/// variables and dynamic offsets/sizes/strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString, strum::IntoStaticStr)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray)]
#[cfg_attr(any(test, feature = "proptest"), derive(proptest_derive::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DType {
    #[strum(serialize = "i1")]
    Bool,

    #[strum(serialize = "i8")]
    Int8,
    #[strum(serialize = "i16")]
    Int16,
    #[strum(serialize = "i32")]
    Int32,
    #[strum(serialize = "i64")]
    Int64,

    #[strum(serialize = "ui8")]
    UInt8,
    #[strum(serialize = "ui16")]
    UInt16,
    #[strum(serialize = "ui32")]
    UInt32,
    #[strum(serialize = "ui64")]
    UInt64,

    #[strum(serialize = "f16")]
    Float16,
    #[strum(serialize = "bf16")]
    BFloat16,
    #[strum(serialize = "f32")]
    Float32,
    #[strum(serialize = "f64")]
    Float64,

    /// Index type for loop iteration and tile coordinates.
    #[strum(serialize = "index")]
    Index,
}

impl DType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
            Self::Index => 8, // Treat as 64-bit index
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    /// Signed, unsigned or index integer.
    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned() || self.is_index()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    pub const fn is_index(&self) -> bool {
        matches!(self, Self::Index)
    }

    /// Textual mnemonic used by the IR printer.
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Parse a mnemonic, returning `None` for unknown names.
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        text.parse().ok()
    }
}
