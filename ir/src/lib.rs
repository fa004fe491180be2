//! Tiling IR with fusable iteration.
//!
//! Tiles describe rectangular sections of an iteration space. `materialize`
//! reads the section of a tensor or vector a tile addresses, loops iterate
//! over index spaces, and `set_yield` merges per-iteration partial results
//! into loop outputs, either by overwriting or through an accumulator region.
//!
//! # Module Organization
//!
//! - [`types`] - Tile, tensor, vector and scalar types
//! - [`mixed`] - Offsets/sizes/strides mixing static and runtime entries
//! - [`value`], [`region`], [`op`] - SSA values, blocks and operations
//! - [`ops`] - Per-operation payloads and their verifiers
//! - [`func`] - Functions and modules
//! - [`verify`] - Dominance and terminator placement
//! - [`builder`] - Verified construction
//! - [`asm`] - Textual form
//! - [`canonicalize`] - Constant folding of tiles and identity materialize removal
//! - [`eval`] - Reference evaluator
//! - [`config`] - Evaluator and printer options
//! - [`error`] - Error types and result handling

pub mod asm;
pub mod builder;
pub mod canonicalize;
pub mod config;
pub mod error;
pub mod eval;
pub mod func;
pub mod mixed;
pub mod op;
pub mod ops;
pub mod prelude;
pub mod region;
pub mod types;
pub mod value;
pub mod verify;

#[cfg(any(test, feature = "proptest"))]
pub mod test;

pub use builder::{Builder, FunctionBuilder};
pub use error::{Error, Result};
pub use func::{Function, Module};
pub use mixed::{DYNAMIC_INDEX, MixedIndex, OffsetsSizesStrides};
pub use op::{Op, Operation};
pub use ops::{FusionOp, LoopHeader, LoopKind, LoopOp, MaterializeOp, SetUpdate, SetYieldOp, TileOp, YieldOp};
pub use region::{Block, Region};
pub use types::{BinaryOp, ConstValue, Dim, ShapedType, TileType, Type};
pub use value::{BlockId, OpId, Value, ValueId, ValueOrigin};
pub use verify::{verify_function, verify_module};

pub use gmlst_dtype::DType;
