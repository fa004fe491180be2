//! Function-level simplifications.
//!
//! Two rewrites are applied:
//!
//! - runtime tile entries defined by `constant` operations become static
//!   entries, refining the tile type
//! - a `materialize` that reads its whole source unchanged (zero offsets,
//!   unit strides, full static sizes, identical type) is replaced by the source
//!
//! A tile whose type would change is left alone when the tile escapes through
//! `yield`, `return` or a fusion input, since those pin the type.

use std::collections::{HashMap, HashSet};

use crate::Result;
use crate::func::{Function, walk_block};
use crate::op::{Op, Operation};
use crate::region::Block;
use crate::types::ConstValue;
use crate::value::{Value, ValueId};
use crate::verify::verify_function;

/// Number of rewrites applied, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalizeStats {
    pub folded_tiles: usize,
    pub removed_materializes: usize,
}

impl CanonicalizeStats {
    pub fn total(&self) -> usize {
        self.folded_tiles + self.removed_materializes
    }
}

/// Simplify `function` and re-verify it.
///
/// The rewrites are committed only when the result verifies; on error
/// `function` is left untouched.
#[tracing::instrument(skip_all, fields(function = %function.name()))]
pub fn canonicalize(function: &mut Function) -> Result<CanonicalizeStats> {
    let mut rewritten = function.clone();
    let mut rewriter = Rewriter::collect(&rewritten);
    rewriter.block(rewritten.body_mut());
    let stats = rewriter.stats;
    verify_function(&rewritten)?;
    tracing::debug!(folded_tiles = stats.folded_tiles, removed_materializes = stats.removed_materializes, "canonicalized");
    *function = rewritten;
    Ok(stats)
}

struct Rewriter {
    constants: HashMap<ValueId, i64>,
    pinned: HashSet<ValueId>,
    substitutions: HashMap<ValueId, Value>,
    stats: CanonicalizeStats,
}

impl Rewriter {
    fn collect(function: &Function) -> Self {
        let mut constants = HashMap::new();
        let mut pinned = HashSet::new();
        walk_block(function.body(), &mut |operation: &Operation| match operation.op() {
            Op::Constant(ConstValue::Int(v)) if operation.results()[0].ty().is_index() => {
                constants.insert(operation.results()[0].id(), *v);
            }
            Op::Yield(_) | Op::Return(_) | Op::Fusion(_) => {
                pinned.extend(operation.op().operands().into_iter().map(Value::id));
            }
            _ => {}
        });
        Self { constants, pinned, substitutions: HashMap::new(), stats: CanonicalizeStats::default() }
    }

    fn block(&mut self, block: &mut Block) {
        let operations = std::mem::take(block.operations_mut());
        let mut kept = Vec::with_capacity(operations.len());

        for mut operation in operations {
            let substitutions = &self.substitutions;
            operation.op_mut().remap_operands(&mut |value| substitutions.get(&value.id()).cloned());
            for region in operation.op_mut().regions_mut() {
                for nested in region.blocks_mut() {
                    self.block(nested);
                }
            }

            match self.rewrite(&operation) {
                Rewrite::Keep => kept.push(operation),
                Rewrite::Replace(replacement) => kept.push(replacement),
                Rewrite::Erase => {}
            }
        }
        *block.operations_mut() = kept;
    }

    fn rewrite(&mut self, operation: &Operation) -> Rewrite {
        match operation.op() {
            Op::Tile(tile) => {
                let constants = &self.constants;
                let Some(folded) = tile.fold_constants(|value| constants.get(&value.id()).copied()) else {
                    return Rewrite::Keep;
                };
                let old = &operation.results()[0];
                let ty = folded.result_type();
                if ty != *old.ty() && self.pinned.contains(&old.id()) {
                    return Rewrite::Keep;
                }
                let replacement = Operation::new(Op::Tile(folded), [ty]);
                tracing::debug!(from = %old.ty(), to = %replacement.results()[0].ty(), "folded constant tile operands");
                self.substitutions.insert(old.id(), replacement.results()[0].clone());
                self.stats.folded_tiles += 1;
                Rewrite::Replace(replacement)
            }
            Op::Materialize(op) if op.is_trivial(operation.results()[0].ty()) => {
                tracing::debug!(source = %op.source().id(), "removed identity materialize");
                self.substitutions.insert(operation.results()[0].id(), op.source().clone());
                self.stats.removed_materializes += 1;
                Rewrite::Erase
            }
            _ => Rewrite::Keep,
        }
    }
}

enum Rewrite {
    Keep,
    Replace(Operation),
    Erase,
}
