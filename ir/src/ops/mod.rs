//! Per-kind operation structs.
//!
//! This module contains the structured operations carried by [`crate::Op`]:
//! - `tile`: rectangular tile of an iteration space
//! - `materialize`: sub-value extraction addressed by a triple
//! - `loops`: shared loop struct for the sequential and parallel variants
//! - `set_yield`: merge terminator of loop bodies
//! - `fusion`: fusion cluster and the `yield` terminator
//! - `arith`: verification of host operations (constant, splat, binary)

pub mod arith;
pub mod fusion;
pub mod loops;
pub mod materialize;
pub mod set_yield;
pub mod tile;

pub use fusion::{FusionOp, YieldOp};
pub use loops::{LoopHeader, LoopKind, LoopOp};
pub use materialize::MaterializeOp;
pub use set_yield::{SetYieldOp, SetUpdate};
pub use tile::TileOp;

use snafu::ensure;

use crate::Result;
use crate::error::ResultCountMismatchSnafu;
use crate::value::Value;

// =========================================================================
// Common Helper Functions
// =========================================================================

/// Check that an operation produces exactly `expected` results.
pub(crate) fn expect_results(what: &'static str, results: &[Value], expected: usize) -> Result<()> {
    ensure!(results.len() == expected, ResultCountMismatchSnafu { what, expected, actual: results.len() });
    Ok(())
}
