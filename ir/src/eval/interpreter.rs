//! Tree-walking interpreter over verified functions.

use std::collections::HashMap;

use smallvec::SmallVec;
use snafu::ensure;

use super::scalar::eval_binary;
use super::value::{RtValue, ShapedValue, TileValue, row_major};
use crate::Result;
use crate::config::EvalConfig;
use crate::error::{
    ArgumentCountSnafu, ArgumentMismatchSnafu, DstNotLoopOutputSnafu, MissingTerminatorSnafu,
    NegativeStaticIndexSnafu, NonPositiveStepSnafu, RuntimeKindMismatchSnafu, TerminatorMismatchSnafu,
    UndefinedValueSnafu, UpdateShapeMismatchSnafu,
};
use crate::func::Function;
use crate::mixed::{MixedIndex, OffsetsSizesStrides};
use crate::op::{Op, Operation};
use crate::ops::{FusionOp, LoopOp, SetYieldOp};
use crate::region::{Block, Region};
use crate::types::{BinaryOp, ConstValue, Type};
use crate::value::{Value, ValueId};
use crate::verify::verify_function;

type Env = HashMap<ValueId, RtValue>;

/// Reference evaluator.
///
/// Parallel loops are run one iteration at a time in the configured order.
/// Every iteration observes the initial outputs through its block arguments
/// and its updates merge into the shared result, so the result is independent
/// of the order exactly when overlapping updates use an associative and
/// commutative accumulator.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    config: EvalConfig,
}

impl Interpreter {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(EvalConfig::from_env())
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate `function` on `args`, returning the values of its `return`.
    #[tracing::instrument(skip_all, fields(function = %function.name(), args = args.len()))]
    pub fn run(&self, function: &Function, args: &[RtValue]) -> Result<Vec<RtValue>> {
        let params = function.arguments();
        ensure!(params.len() == args.len(), ArgumentCountSnafu { expected: params.len(), actual: args.len() });
        for (index, (param, arg)) in params.iter().zip(args).enumerate() {
            ensure!(arg.matches_type(param.ty()), ArgumentMismatchSnafu { index, expected: param.ty().clone() });
        }
        if self.config.verify_before_run {
            verify_function(function)?;
        }

        let mut env = Env::new();
        for (param, arg) in params.iter().zip(args) {
            env.insert(param.id(), arg.clone());
        }
        match self.exec_block(&mut env, function.body())?.map(Operation::op) {
            Some(Op::Return(values)) => values.iter().map(|v| lookup(&env, v).cloned()).collect(),
            Some(other) => TerminatorMismatchSnafu { expected: "return", actual: other.name() }.fail(),
            None => MissingTerminatorSnafu { expected: "return" }.fail(),
        }
    }

    /// Run every non-terminator operation; the terminator is handed back to the caller.
    fn exec_block<'b>(&self, env: &mut Env, block: &'b Block) -> Result<Option<&'b Operation>> {
        for operation in block.operations() {
            if operation.op().is_terminator() {
                return Ok(Some(operation));
            }
            let results = self.exec(env, operation)?;
            for (value, result) in operation.results().iter().zip(results) {
                env.insert(value.id(), result);
            }
        }
        Ok(None)
    }

    fn exec(&self, env: &mut Env, operation: &Operation) -> Result<SmallVec<[RtValue; 4]>> {
        let result_ty = operation.results().first().map(Value::ty);
        let single = |value: RtValue| -> Result<SmallVec<[RtValue; 4]>> { Ok(SmallVec::from_iter([value])) };

        match operation.op() {
            Op::Constant(value) => single(RtValue::Scalar(*value)),
            Op::Splat(value) => {
                let scalar = lookup(env, value)?.as_scalar()?;
                let Some(Type::Tensor(shaped) | Type::Vector(shaped)) = result_ty else {
                    return RuntimeKindMismatchSnafu { expected: "a shaped splat result" }.fail();
                };
                let shape = shaped.shape.iter().map(|d| d.as_static().unwrap_or(0) as usize).collect();
                single(ShapedValue::filled(shape, scalar, shaped.element).into())
            }
            Op::Binary(op, lhs, rhs) => single(self.binary(env, *op, lhs, rhs)?),
            Op::Tile(tile) => single(tile_value(env, tile.triple())?.into()),
            Op::Materialize(op) => {
                let source = lookup(env, op.source())?.as_shaped()?;
                let tile = tile_value(env, op.triple())?;
                let part = source.extract(&tile)?;
                match result_ty {
                    Some(Type::Scalar(_)) => single(RtValue::Scalar(part.data()[0])),
                    _ => single(part.into()),
                }
            }
            Op::Loop(op) => self.run_loop(env, op),
            Op::Fusion(op) => self.run_fusion(env, op),
            Op::SetYield(_) | Op::Yield(_) | Op::Return(_) => Ok(SmallVec::new()),
        }
    }

    fn binary(&self, env: &Env, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<RtValue> {
        let dtype = lhs.ty().element_type();
        let (a, b) = (lookup(env, lhs)?, lookup(env, rhs)?);
        match (a, b, dtype) {
            (RtValue::Scalar(a), RtValue::Scalar(b), Some(dtype)) => Ok(eval_binary(op, dtype, *a, *b)?.into()),
            (RtValue::Shaped(a), RtValue::Shaped(b), Some(dtype)) => {
                Ok(a.zip_with(b, |x, y| eval_binary(op, dtype, x, y))?.into())
            }
            _ => RuntimeKindMismatchSnafu { expected: "matching binary operands" }.fail(),
        }
    }

    // =========================================================================
    // Loops
    // =========================================================================

    fn run_loop(&self, env: &mut Env, op: &LoopOp) -> Result<SmallVec<[RtValue; 4]>> {
        let points = iteration_points(env, op)?;
        let initial: Vec<ShapedValue> =
            op.outputs().iter().map(|o| lookup(env, o)?.as_shaped().cloned()).collect::<Result<_>>()?;
        let mut state = initial.clone();

        let order: Vec<usize> = match op.kind().is_parallel() {
            true => self.config.parallel_order.permutation(points.len()),
            false => (0..points.len()).collect(),
        };
        tracing::debug!(kind = op.kind().mnemonic(), iterations = points.len(), outputs = op.num_outputs(), "evaluating loop");

        let block = op.body().single_block("loop body")?;
        for iteration in order {
            let point = &points[iteration];
            tracing::trace!(iteration, ?point, "loop iteration");

            for (iv, value) in op.induction_vars().iter().zip(point) {
                env.insert(iv.id(), RtValue::Scalar(ConstValue::Int(*value)));
            }
            // Parallel iterations never observe each other's writes.
            let visible = if op.kind().is_parallel() { &initial } else { &state };
            for (arg, value) in op.output_args().iter().zip(visible) {
                env.insert(arg.id(), value.clone().into());
            }

            match self.exec_block(env, block)?.map(Operation::op) {
                Some(Op::SetYield(set_yield)) => self.apply_updates(env, op, set_yield, &mut state)?,
                Some(other) => return TerminatorMismatchSnafu { expected: "set_yield", actual: other.name() }.fail(),
                None => return MissingTerminatorSnafu { expected: "set_yield" }.fail(),
            }
        }
        Ok(state.into_iter().map(RtValue::from).collect())
    }

    fn apply_updates(&self, env: &mut Env, op: &LoopOp, set_yield: &SetYieldOp, state: &mut [ShapedValue]) -> Result<()> {
        for update in 0..set_yield.num_updates() {
            let Some(output) = op.output_index_of_block_arg(&set_yield.dsts()[update]) else {
                return DstNotLoopOutputSnafu { update }.fail();
            };
            let tile = lookup(env, &set_yield.sets()[update])?.as_tile()?.clone();
            let src = lookup(env, &set_yield.srcs()[update])?.clone();
            if let RtValue::Shaped(value) = &src {
                ensure!(
                    value.shape() == tile.sizes.as_slice(),
                    UpdateShapeMismatchSnafu { update, src: value.shape().to_vec(), sizes: tile.sizes.clone() }
                );
            }

            let merged = match set_yield.accumulator_for(update) {
                None => src,
                Some(region) => {
                    let current = state[output].extract(&tile)?;
                    let old = match &src {
                        RtValue::Scalar(_) => RtValue::Scalar(current.data()[0]),
                        _ => RtValue::Shaped(current),
                    };
                    self.run_accumulator(env, region, src, old)?
                }
            };
            tracing::trace!(update, output, accumulated = set_yield.is_accumulated(update), "set_yield update");

            match &merged {
                RtValue::Scalar(value) => state[output].insert(&tile, std::slice::from_ref(value))?,
                RtValue::Shaped(value) => state[output].insert(&tile, value.data())?,
                RtValue::Tile(_) => return RuntimeKindMismatchSnafu { expected: "a tensor, vector or scalar" }.fail(),
            }
        }
        Ok(())
    }

    fn run_accumulator(&self, env: &mut Env, region: &Region, new: RtValue, old: RtValue) -> Result<RtValue> {
        let block = region.single_block("accumulator")?;
        let [new_arg, old_arg] = block.arguments() else {
            return RuntimeKindMismatchSnafu { expected: "a two-argument accumulator" }.fail();
        };
        env.insert(new_arg.id(), new);
        env.insert(old_arg.id(), old);
        match self.exec_block(env, block)?.map(Operation::op) {
            Some(Op::Yield(yield_op)) => match yield_op.values() {
                [merged] => lookup(env, merged).cloned(),
                _ => RuntimeKindMismatchSnafu { expected: "a single merged value" }.fail(),
            },
            Some(other) => TerminatorMismatchSnafu { expected: "yield", actual: other.name() }.fail(),
            None => MissingTerminatorSnafu { expected: "yield" }.fail(),
        }
    }

    fn run_fusion(&self, env: &mut Env, op: &FusionOp) -> Result<SmallVec<[RtValue; 4]>> {
        let block = op.body().single_block("fusion body")?;
        for (arg, input) in block.arguments().iter().zip(op.inputs()) {
            let value = lookup(env, input)?.clone();
            env.insert(arg.id(), value);
        }
        match self.exec_block(env, block)?.map(Operation::op) {
            Some(Op::Yield(yield_op)) => yield_op.values().iter().map(|v| lookup(env, v).cloned()).collect(),
            Some(other) => TerminatorMismatchSnafu { expected: "yield", actual: other.name() }.fail(),
            None => MissingTerminatorSnafu { expected: "yield" }.fail(),
        }
    }
}

fn lookup<'e>(env: &'e Env, value: &Value) -> Result<&'e RtValue> {
    match env.get(&value.id()) {
        Some(v) => Ok(v),
        None => UndefinedValueSnafu { id: value.id() }.fail(),
    }
}

fn resolve(env: &Env, entry: &MixedIndex) -> Result<i64> {
    match entry {
        MixedIndex::Const(v) => Ok(*v),
        MixedIndex::Dynamic(value) => lookup(env, value)?.as_index(),
    }
}

fn tile_value(env: &Env, triple: &OffsetsSizesStrides) -> Result<TileValue> {
    let offsets = triple.offsets().iter().map(|e| resolve(env, e)).collect::<Result<_>>()?;
    let strides = triple.strides().iter().map(|e| resolve(env, e)).collect::<Result<_>>()?;
    let mut sizes = Vec::with_capacity(triple.rank());
    for (position, entry) in triple.sizes().iter().enumerate() {
        let value = resolve(env, entry)?;
        ensure!(value >= 0, NegativeStaticIndexSnafu { what: "sizes", position, value });
        sizes.push(value as usize);
    }
    Ok(TileValue { offsets, sizes, strides })
}

/// Iteration points in lexicographic order, dimension 0 outermost.
fn iteration_points(env: &Env, op: &LoopOp) -> Result<Vec<SmallVec<[i64; 4]>>> {
    let mut starts = SmallVec::<[i64; 4]>::new();
    let mut steps = SmallVec::<[i64; 4]>::new();
    let mut counts = SmallVec::<[usize; 4]>::new();
    for (dim, ((lower, upper), step)) in op.lower().iter().zip(op.upper()).zip(op.step()).enumerate() {
        let lower = lookup(env, lower)?.as_index()?;
        let upper = lookup(env, upper)?.as_index()?;
        let step = lookup(env, step)?.as_index()?;
        ensure!(step > 0, NonPositiveStepSnafu { dim, step });
        let span = upper.saturating_sub(lower).max(0);
        starts.push(lower);
        steps.push(step);
        counts.push(if span == 0 { 0 } else { ((span - 1) / step + 1) as usize });
    }

    Ok(row_major(&counts)
        .into_iter()
        .map(|k| k.iter().enumerate().map(|(dim, k)| starts[dim] + *k as i64 * steps[dim]).collect())
        .collect())
}
