//! Evaluator and printer configuration.
//!
//! Provides typed configuration with bon builders.
//! Supports both explicit configuration and environment variable fallbacks.

use bon::bon;

// ============================================================================
// ITERATION ORDER
// ============================================================================

/// Order in which the reference evaluator visits parallel-loop iterations.
///
/// Sequential loops always run in lexicographic order; this only affects the
/// parallel variant, whose result must not depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IterationOrder {
    /// Lexicographic order (default).
    #[default]
    Forward,

    /// Reverse lexicographic order.
    Reverse,

    /// Explicit visiting order over linearized iteration indices.
    ///
    /// Indices out of range or repeated are skipped; iterations not listed run
    /// afterwards in forward order.
    Custom(Vec<usize>),
}

impl IterationOrder {
    /// Get iteration order from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `GMLST_PARALLEL_ORDER=forward|reverse` - Parallel iteration order
    pub fn from_env() -> Self {
        match std::env::var("GMLST_PARALLEL_ORDER").as_deref() {
            Ok("reverse") => Self::Reverse,
            _ => Self::Forward,
        }
    }

    /// Visiting order for `count` iterations.
    pub fn permutation(&self, count: usize) -> Vec<usize> {
        match self {
            Self::Forward => (0..count).collect(),
            Self::Reverse => (0..count).rev().collect(),
            Self::Custom(order) => {
                let mut seen = vec![false; count];
                let mut permutation = Vec::with_capacity(count);
                for &index in order.iter().chain(&(0..count).collect::<Vec<_>>()) {
                    if index < count && !seen[index] {
                        seen[index] = true;
                        permutation.push(index);
                    }
                }
                permutation
            }
        }
    }
}

// ============================================================================
// EVALUATOR
// ============================================================================

/// Reference evaluator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// Order of parallel-loop iterations.
    pub parallel_order: IterationOrder,

    /// Run the verifier on a function before evaluating it.
    pub verify_before_run: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self { parallel_order: IterationOrder::default(), verify_before_run: true }
    }
}

#[bon]
impl EvalConfig {
    /// Create an evaluator configuration with builder pattern.
    #[builder]
    pub fn new(
        #[builder(default)] parallel_order: IterationOrder,
        #[builder(default = true)] verify_before_run: bool,
    ) -> Self {
        Self { parallel_order, verify_before_run }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `GMLST_PARALLEL_ORDER` - See [`IterationOrder::from_env`]
    /// * `GMLST_NO_VERIFY` - Skip pre-run verification if set
    pub fn from_env() -> Self {
        Self { parallel_order: IterationOrder::from_env(), verify_before_run: std::env::var("GMLST_NO_VERIFY").is_err() }
    }
}

// ============================================================================
// PRINTER
// ============================================================================

/// Textual form settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintOptions {
    /// Spaces per nesting level.
    pub indent: usize,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl PrintOptions {
    /// Create options from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `GMLST_PRINT_INDENT` - Spaces per nesting level (default: 2)
    pub fn from_env() -> Self {
        let indent = std::env::var("GMLST_PRINT_INDENT").ok().and_then(|s| s.parse().ok()).unwrap_or(2);
        Self { indent }
    }
}
