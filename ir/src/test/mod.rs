//! Test suite for the IR.
//!
//! `fixtures` and `property::generators` are also exported under the
//! `proptest` feature so downstream crates can reuse them.

pub mod property;
