//! Common imports for building and running IR:
//!
//! ```rust,ignore
//! use gmlst_ir::prelude::*;
//! ```

pub use crate::builder::{Builder, FunctionBuilder};
pub use crate::config::{EvalConfig, IterationOrder, PrintOptions};
pub use crate::eval::{Interpreter, RtValue, ShapedValue, TileValue};
pub use crate::func::{Function, Module};
pub use crate::mixed::{MixedIndex, OffsetsSizesStrides};
pub use crate::ops::{LoopHeader, LoopKind, SetUpdate};
pub use crate::types::{BinaryOp, ConstValue, Dim, TileType, Type};
pub use crate::value::Value;

pub use gmlst_dtype::DType;
