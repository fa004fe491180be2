//! Operation enum and the [`Operation`] node.
//!
//! The [`Op`] enum encodes each operation's operand structure directly in its
//! variant. Structured operations (tiles, materializations, loops, merges and
//! fusion clusters) carry their own structs from [`crate::ops`]; the remaining
//! variants are the host operations bodies need to compute anything.

use smallvec::SmallVec;
use snafu::{ResultExt, ensure};

use crate::Result;
use crate::error::{DynamicVectorShapeSnafu, IndexOutOfRangeSnafu, InOpSnafu};
use crate::ops::{FusionOp, LoopOp, MaterializeOp, SetYieldOp, TileOp, YieldOp};
use crate::region::Region;
use crate::types::{BinaryOp, ConstValue, Type};
use crate::value::{OpId, Value, ValueOrigin};

/// Operation kind with typed operands.
///
/// Design choices:
/// - Structured ops live in dedicated structs with validated accessors
/// - Host ops (constant, splat, binary, return) are inline variants
/// - Variable-arity operand lists use SmallVec
#[derive(Debug, Clone)]
pub enum Op {
    // Host operations
    Constant(ConstValue),
    Splat(Value),
    Binary(BinaryOp, Value, Value),
    Return(SmallVec<[Value; 4]>),

    // Tiling operations
    Tile(TileOp),
    Materialize(MaterializeOp),

    // Structured control flow
    Loop(LoopOp),
    SetYield(SetYieldOp),
    Yield(YieldOp),
    Fusion(FusionOp),
}

impl Op {
    /// Mnemonic, as printed.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Constant(_) => "constant",
            Op::Splat(_) => "splat",
            Op::Binary(op, ..) => op.mnemonic(),
            Op::Return(_) => "return",
            Op::Tile(_) => "tile",
            Op::Materialize(_) => "materialize",
            Op::Loop(op) => op.kind().mnemonic(),
            Op::SetYield(_) => "set_yield",
            Op::Yield(_) => "yield",
            Op::Fusion(_) => "fusion",
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::SetYield(_) | Op::Yield(_) | Op::Return(_))
    }

    /// Operands in positional order.
    pub fn operands(&self) -> SmallVec<[&Value; 8]> {
        match self {
            Op::Constant(_) => SmallVec::new(),
            Op::Splat(value) => SmallVec::from_iter([value]),
            Op::Binary(_, lhs, rhs) => SmallVec::from_iter([lhs, rhs]),
            Op::Return(values) => values.iter().collect(),
            Op::Tile(op) => op.triple().dynamic_operands().collect(),
            Op::Materialize(op) => std::iter::once(op.source()).chain(op.triple().dynamic_operands()).collect(),
            Op::Loop(op) => op.operands().collect(),
            Op::SetYield(op) => op.operands().collect(),
            Op::Yield(op) => op.values().iter().collect(),
            Op::Fusion(op) => op.inputs().iter().collect(),
        }
    }

    /// Nested regions, in order.
    pub fn regions(&self) -> SmallVec<[&Region; 2]> {
        match self {
            Op::Loop(op) => SmallVec::from_iter([op.body()]),
            Op::Fusion(op) => SmallVec::from_iter([op.body()]),
            Op::SetYield(op) => op.accumulators().iter().collect(),
            _ => SmallVec::new(),
        }
    }

    pub(crate) fn regions_mut(&mut self) -> SmallVec<[&mut Region; 2]> {
        match self {
            Op::Loop(op) => SmallVec::from_iter([op.body_mut()]),
            Op::Fusion(op) => SmallVec::from_iter([op.body_mut()]),
            Op::SetYield(op) => op.accumulators_mut().iter_mut().collect(),
            _ => SmallVec::new(),
        }
    }

    /// Substitute direct operands; nested regions are left untouched.
    ///
    /// Returns whether any operand changed.
    pub(crate) fn remap_operands(&mut self, f: &mut impl FnMut(&Value) -> Option<Value>) -> bool {
        fn remap_list(values: &mut [Value], f: &mut impl FnMut(&Value) -> Option<Value>) -> bool {
            let mut changed = false;
            for value in values {
                if let Some(replacement) = f(value) {
                    *value = replacement;
                    changed = true;
                }
            }
            changed
        }

        match self {
            Op::Constant(_) => false,
            Op::Splat(value) => remap_list(std::slice::from_mut(value), f),
            Op::Binary(_, lhs, rhs) => {
                let l = remap_list(std::slice::from_mut(lhs), f);
                let r = remap_list(std::slice::from_mut(rhs), f);
                l || r
            }
            Op::Return(values) => remap_list(values, f),
            Op::Tile(op) => op.triple_mut().remap(&mut |v| f(v).map(Into::into)),
            Op::Materialize(op) => {
                let (source, triple) = op.parts_mut();
                let s = remap_list(std::slice::from_mut(source), f);
                let t = triple.remap(&mut |v| f(v).map(Into::into));
                s || t
            }
            Op::Loop(op) => op.operand_lists_mut().into_iter().fold(false, |acc, list| remap_list(list, f) || acc),
            Op::SetYield(op) => op.operand_lists_mut().into_iter().fold(false, |acc, list| remap_list(list, f) || acc),
            Op::Yield(op) => remap_list(op.values_mut(), f),
            Op::Fusion(op) => remap_list(op.inputs_mut(), f),
        }
    }
}

/// A node of the IR: an [`Op`] and the values it produces.
#[derive(Debug, Clone)]
pub struct Operation {
    id: OpId,
    op: Op,
    results: SmallVec<[Value; 1]>,
}

impl Operation {
    /// Create an operation, allocating one result per type.
    ///
    /// No verification happens here; builders and the parser call
    /// [`Operation::verify`] before handing the node out.
    pub fn new(op: Op, result_types: impl IntoIterator<Item = Type>) -> Self {
        let id = OpId::fresh();
        let results = result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| Value::new(ty, ValueOrigin::OpResult { op: id, index }))
            .collect();
        Self { id, op, results }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub(crate) fn op_mut(&mut self) -> &mut Op {
        &mut self.op
    }

    pub fn name(&self) -> &'static str {
        self.op.name()
    }

    pub fn results(&self) -> &[Value] {
        &self.results
    }

    pub fn result(&self, index: usize) -> Option<&Value> {
        self.results.get(index)
    }

    pub fn as_loop(&self) -> Option<&LoopOp> {
        match &self.op {
            Op::Loop(op) => Some(op),
            _ => None,
        }
    }

    /// Loop result carrying the final value of output `index`.
    pub fn loop_result(&self, index: usize) -> Result<&Value> {
        let len = if self.as_loop().is_some() { self.results.len() } else { 0 };
        ensure!(index < len, IndexOutOfRangeSnafu { what: "loop results", index, len });
        Ok(&self.results[index])
    }

    /// Output index of a loop result, if `value` is one.
    pub fn output_index_of_result(&self, value: &Value) -> Option<usize> {
        self.as_loop()?;
        value.result_index(self.id)
    }

    /// Local verification of this operation alone.
    ///
    /// Checks that need the enclosing construct (terminator placement,
    /// destination ties) live in [`crate::verify`].
    pub fn verify(&self) -> Result<()> {
        self.verify_local().context(InOpSnafu { op: self.name() })
    }

    fn verify_local(&self) -> Result<()> {
        for result in &self.results {
            verify_type(result.ty())?;
        }
        match &self.op {
            Op::Constant(value) => crate::ops::arith::verify_constant(value, &self.results),
            Op::Splat(value) => crate::ops::arith::verify_splat(value, &self.results),
            Op::Binary(op, lhs, rhs) => crate::ops::arith::verify_binary(*op, lhs, rhs, &self.results),
            Op::Return(_) => crate::ops::arith::verify_no_results("return", &self.results),
            Op::Tile(op) => op.verify(&self.results),
            Op::Materialize(op) => op.verify(&self.results),
            Op::Loop(op) => op.verify(&self.results),
            Op::SetYield(op) => op.verify(&self.results),
            Op::Yield(_) => crate::ops::arith::verify_no_results("yield", &self.results),
            Op::Fusion(op) => op.verify(&self.results),
        }
    }
}

/// Well-formedness of a type on its own.
pub(crate) fn verify_type(ty: &Type) -> Result<()> {
    if let Type::Vector(shaped) = ty {
        ensure!(shaped.is_static(), DynamicVectorShapeSnafu { ty: ty.clone() });
    }
    Ok(())
}
