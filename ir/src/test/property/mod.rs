//! Property-based tests for tiling and merge semantics.
//!
//! Uses proptest to check evaluator and printer invariants across many shapes
//! and iteration orders.

#[cfg(test)]
mod merge_props;
#[cfg(test)]
mod roundtrip_props;

pub mod generators;
