//! Reference evaluator.
//!
//! Defines the observable semantics of the IR on concrete values: tiles
//! address strided sections, `materialize` reads them and `set_yield`
//! writes or accumulates them into loop outputs.

mod interpreter;
mod scalar;
mod value;

pub use interpreter::Interpreter;
pub use scalar::{eval_binary, eval_binary_op};
pub use value::{RtValue, ShapedValue, TileValue};
