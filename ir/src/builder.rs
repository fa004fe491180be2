//! Programmatic construction.
//!
//! A [`Builder`] appends operations to one block and hands back their result
//! values. Every operation is verified locally before it is appended, so an
//! ill-formed node never becomes reachable. Nested bodies are built through
//! callbacks that receive a fresh builder for the nested block.
//!
//! # Examples
//!
//! ```ignore
//! let header = LoopHeader::builder().lower(vec![c0]).upper(vec![c8]).step(vec![c1]).outputs(vec![init]).build();
//! let results = b.parallel_loop(header, None, |b, ivs, outs| {
//!     let tile = b.tile(OffsetsSizesStrides::with_unit_strides([MixedIndex::from(&ivs[0])], [MixedIndex::Const(1)])?)?;
//!     ...
//!     b.set_yield(vec![SetUpdate::overwrite(elem, outs[0].clone(), tile)])
//! })?;
//! ```

use smallvec::SmallVec;

use gmlst_dtype::DType;

use crate::Result;
use crate::func::Function;
use crate::mixed::OffsetsSizesStrides;
use crate::op::{Op, Operation};
use crate::ops::{FusionOp, LoopHeader, LoopKind, LoopOp, MaterializeOp, SetUpdate, SetYieldOp, TileOp, YieldOp};
use crate::region::{Block, Region};
use crate::types::{BinaryOp, ConstValue, Type};
use crate::value::Value;
use crate::verify::verify_function;

/// Appends verified operations to a block.
#[derive(Debug)]
pub struct Builder {
    block: Block,
}

impl Builder {
    pub fn new(block: Block) -> Self {
        Self { block }
    }

    /// Builder over a fresh block with the given argument types.
    pub fn with_arguments(arg_types: impl IntoIterator<Item = Type>) -> Self {
        Self::new(Block::new(arg_types))
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn into_block(self) -> Block {
        self.block
    }

    /// Verify and append an operation, returning its results.
    pub fn insert(&mut self, op: Op, result_types: impl IntoIterator<Item = Type>) -> Result<SmallVec<[Value; 4]>> {
        let operation = Operation::new(op, result_types);
        operation.verify()?;
        let results = operation.results().iter().cloned().collect();
        self.block.push(operation);
        Ok(results)
    }

    fn insert_single(&mut self, op: Op, result_type: Type) -> Result<Value> {
        let operation = Operation::new(op, [result_type]);
        operation.verify()?;
        let result = operation.results()[0].clone();
        self.block.push(operation);
        Ok(result)
    }

    // =========================================================================
    // Host operations
    // =========================================================================

    pub fn constant(&mut self, value: ConstValue, dtype: DType) -> Result<Value> {
        self.insert_single(Op::Constant(value), Type::Scalar(dtype))
    }

    /// Constant of index type.
    pub fn index(&mut self, value: i64) -> Result<Value> {
        self.constant(ConstValue::Int(value), DType::Index)
    }

    pub fn splat(&mut self, value: &Value, ty: Type) -> Result<Value> {
        self.insert_single(Op::Splat(value.clone()), ty)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
        self.insert_single(Op::Binary(op, lhs.clone(), rhs.clone()), lhs.ty().clone())
    }

    // =========================================================================
    // Tiling
    // =========================================================================

    pub fn tile(&mut self, triple: OffsetsSizesStrides) -> Result<Value> {
        let op = TileOp::new(triple);
        let ty = op.result_type();
        self.insert_single(Op::Tile(op), ty)
    }

    /// Extract the part of `source` addressed by `triple`.
    ///
    /// With `scalar_result`, every size must be the constant 1 and the result
    /// is a bare element.
    pub fn materialize(&mut self, source: &Value, triple: OffsetsSizesStrides, scalar_result: bool) -> Result<Value> {
        let op = MaterializeOp::new(source.clone(), triple)?;
        let ty = op.infer_result_type(scalar_result)?;
        self.insert_single(Op::Materialize(op), ty)
    }

    // =========================================================================
    // Loops
    // =========================================================================

    /// Sequential loop. The callback receives induction variables and output arguments.
    pub fn for_loop(
        &mut self,
        header: LoopHeader,
        body: impl FnOnce(&mut Builder, &[Value], &[Value]) -> Result<()>,
    ) -> Result<SmallVec<[Value; 4]>> {
        self.loop_op(LoopKind::Sequential, header, body)
    }

    /// Declared-parallel loop with an optional distribution tag.
    pub fn parallel_loop(
        &mut self,
        header: LoopHeader,
        distribution: Option<String>,
        body: impl FnOnce(&mut Builder, &[Value], &[Value]) -> Result<()>,
    ) -> Result<SmallVec<[Value; 4]>> {
        self.loop_op(LoopKind::Parallel { distribution }, header, body)
    }

    fn loop_op(
        &mut self,
        kind: LoopKind,
        header: LoopHeader,
        body: impl FnOnce(&mut Builder, &[Value], &[Value]) -> Result<()>,
    ) -> Result<SmallVec<[Value; 4]>> {
        let mut nested = Builder::with_arguments(header.body_arg_types());
        let args: SmallVec<[Value; 8]> = nested.block.arguments().iter().cloned().collect();
        let (ivs, outs) = args.split_at(header.num_loops().min(args.len()));
        body(&mut nested, ivs, outs)?;

        let result_types: Vec<Type> = header.outputs.iter().map(|o| o.ty().clone()).collect();
        let op = LoopOp::new(kind, header, Region::with_block(nested.into_block()))?;
        self.insert(Op::Loop(op), result_types)
    }

    /// Merge terminator of a loop body.
    pub fn set_yield(&mut self, updates: Vec<SetUpdate>) -> Result<()> {
        let op = SetYieldOp::from_updates(updates)?;
        self.insert(Op::SetYield(op), []).map(drop)
    }

    /// Accumulator region over `(new, old)` of type `ty`; the callback returns the merged value.
    pub fn accumulator(ty: Type, combine: impl FnOnce(&mut Builder, &Value, &Value) -> Result<Value>) -> Result<Region> {
        let mut nested = Builder::with_arguments([ty.clone(), ty]);
        let (new, old) = (nested.block.arguments()[0].clone(), nested.block.arguments()[1].clone());
        let merged = combine(&mut nested, &new, &old)?;
        nested.yield_(&[merged])?;
        Ok(Region::with_block(nested.into_block()))
    }

    /// Accumulator applying `op` to the new and old values.
    pub fn combining(ty: Type, op: BinaryOp) -> Result<Region> {
        Self::accumulator(ty, |b, new, old| b.binary(op, new, old))
    }

    // =========================================================================
    // Fusion
    // =========================================================================

    /// Fusion cluster. The callback receives one block argument per input and
    /// must end the body with [`Builder::yield_`].
    pub fn fusion(
        &mut self,
        inputs: &[Value],
        body: impl FnOnce(&mut Builder, &[Value]) -> Result<()>,
    ) -> Result<SmallVec<[Value; 4]>> {
        let mut nested = Builder::with_arguments(inputs.iter().map(|v| v.ty().clone()));
        let args: SmallVec<[Value; 4]> = nested.block.arguments().iter().cloned().collect();
        body(&mut nested, &args)?;

        let op = FusionOp::new(inputs.iter().cloned(), Region::with_block(nested.into_block()))?;
        let result_types: Vec<Type> =
            op.terminator().map(|y| y.values().iter().map(|v| v.ty().clone()).collect()).unwrap_or_default();
        self.insert(Op::Fusion(op), result_types)
    }

    pub fn yield_(&mut self, values: &[Value]) -> Result<()> {
        self.insert(Op::Yield(YieldOp::new(values.iter().cloned())), []).map(drop)
    }

    pub fn return_(&mut self, values: &[Value]) -> Result<()> {
        self.insert(Op::Return(values.iter().cloned().collect()), []).map(drop)
    }
}

/// Creates a [`Function`] from argument types and a body callback.
#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, arg_types: impl IntoIterator<Item = Type>, result_types: Vec<Type>) -> Self {
        Self { function: Function::new(name, arg_types, result_types) }
    }

    /// Run `body` over the function's arguments and verify the result.
    pub fn build(mut self, body: impl FnOnce(&mut Builder, &[Value]) -> Result<()>) -> Result<Function> {
        let mut builder = Builder::new(Block::new([]));
        let args: SmallVec<[Value; 4]> = self.function.arguments().iter().cloned().collect();
        body(&mut builder, &args)?;
        *self.function.body_mut() = builder.into_block();
        verify_function(&self.function)?;
        Ok(self.function)
    }
}
