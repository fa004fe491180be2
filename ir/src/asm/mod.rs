//! Textual form of the IR.
//!
//! ```text
//! func @copy(%arg0: tensor<8xf32>, %arg1: tensor<8xf32>) -> (tensor<8xf32>) {
//!   %0 = constant 0 : index
//!   %1 = constant 8 : index
//!   %2 = constant 1 : index
//!   %3 = parallel (%4) = (%0) to (%1) step (%2) outs (%5 = %arg1 : tensor<8xf32>) {
//!     %6 = tile [%4] [1] [1] : !tile<1>
//!     %7 = materialize %arg0 [%4] [1] [1] : tensor<8xf32> to f32
//!     set_yield %7 at %6 into %5 : f32 into tensor<8xf32>[!tile<1>]
//!   } : tensor<8xf32>
//!   return %3 : tensor<8xf32>
//! }
//! ```
//!
//! Printing then parsing yields a structurally equivalent function, and
//! printing that again reproduces the same text.

mod lexer;
mod parser;
mod printer;

pub use parser::{parse_function, parse_module, parse_type};
pub use printer::{print_function, print_function_with, print_module};
