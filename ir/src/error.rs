use gmlst_dtype::DType;
use snafu::Snafu;

use crate::types::{BinaryOp, ConstValue, TileType, Type};
use crate::value::ValueId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // =========================================================================
    // Arity
    // =========================================================================
    /// Offsets/sizes/strides or a declared type disagree on rank.
    #[snafu(display("rank mismatch: {what} has rank {actual}, expected {expected}"))]
    RankMismatch { what: &'static str, expected: usize, actual: usize },

    /// Static encoding references more or fewer dynamic operands than supplied.
    #[snafu(display("static encoding expects {expected} dynamic operands, got {actual}"))]
    DynamicOperandCount { expected: usize, actual: usize },

    /// Loop header lists disagree.
    #[snafu(display("loop header mismatch: {lower} lower bounds, {upper} upper bounds, {step} steps"))]
    LoopBoundsMismatch { lower: usize, upper: usize, step: usize },

    /// Loop without dimensions.
    #[snafu(display("loop must have at least one dimension"))]
    EmptyLoopHeader,

    #[snafu(display("loop body has {actual} induction variables, loop rank is {expected}"))]
    InductionVarCount { expected: usize, actual: usize },

    #[snafu(display("loop body has {actual} output arguments, loop has {expected} outputs"))]
    OutputArgCount { expected: usize, actual: usize },

    #[snafu(display("{what} has {actual} block arguments, expected {expected}"))]
    BlockArgCount { what: &'static str, expected: usize, actual: usize },

    #[snafu(display("{what}: expected {expected} results, got {actual}"))]
    ResultCountMismatch { what: &'static str, expected: usize, actual: usize },

    /// Parallel arrays of a `set_yield` disagree.
    #[snafu(display("set_yield lists disagree: {srcs} srcs, {dsts} dsts, {sets} sets, {flags} accumulator flags"))]
    UpdateCountMismatch { srcs: usize, dsts: usize, sets: usize, flags: usize },

    #[snafu(display("set_yield has {flagged} accumulated updates but {regions} accumulator regions"))]
    AccumulatorCountMismatch { flagged: usize, regions: usize },

    #[snafu(display("accumulator of update {update} has {actual} arguments, expected 2"))]
    AccumulatorArity { update: usize, actual: usize },

    #[snafu(display("expected {expected} yielded values, got {actual}"))]
    YieldCountMismatch { expected: usize, actual: usize },

    #[snafu(display("{what}: index {index} out of range for {len} entries"))]
    IndexOutOfRange { what: &'static str, index: usize, len: usize },

    // =========================================================================
    // Types and shapes
    // =========================================================================
    #[snafu(display("declared tile type {actual} does not match sizes, expected {expected}"))]
    TileTypeMismatch { expected: TileType, actual: TileType },

    #[snafu(display("{what} entry {position} is negative ({value})"))]
    NegativeStaticIndex { what: &'static str, position: usize, value: i64 },

    #[snafu(display("{what} entry {position} equals the dynamic-index sentinel"))]
    ReservedStaticIndex { what: &'static str, position: usize },

    #[snafu(display("dynamic index operand must have index type, got {actual}"))]
    IndexOperandType { actual: Type },

    #[snafu(display("{operand} must be {expected}, got {actual}"))]
    InvalidOperandKind { operand: &'static str, expected: &'static str, actual: Type },

    #[snafu(display("scalar result requires every size to be statically 1"))]
    ScalarResultRequiresUnitSizes,

    #[snafu(display("{what}: expected type {expected}, got {actual}"))]
    TypeMismatch { what: &'static str, expected: Type, actual: Type },

    #[snafu(display("result type {actual} does not match inferred type {expected}"))]
    ResultTypeMismatch { expected: Type, actual: Type },

    #[snafu(display("vector types must be fully static, got {ty}"))]
    DynamicVectorShape { ty: Type },

    #[snafu(display("splat requires a statically shaped result, got {ty}"))]
    DynamicSplat { ty: Type },

    #[snafu(display(
        "slice out of bounds in dimension {dim}: offset {offset}, size {size}, stride {stride} exceed extent {extent}"
    ))]
    SliceOutOfBounds { dim: usize, offset: i64, size: i64, stride: i64, extent: u64 },

    #[snafu(display("update {update}: tile {set} does not match source type {src}"))]
    SetShapeMismatch { update: usize, set: TileType, src: Type },

    #[snafu(display("update {update}: tile rank {set_rank} differs from destination rank {dst_rank}"))]
    SetRankMismatch { update: usize, set_rank: usize, dst_rank: usize },

    #[snafu(display("update {update}: source {src} and destination {dst} element types differ"))]
    SetElementMismatch { update: usize, src: Type, dst: Type },

    #[snafu(display("accumulator of update {update}: expected argument type {expected}, got {actual}"))]
    AccumulatorType { update: usize, expected: Type, actual: Type },

    #[snafu(display("constant {value} is not representable as {dtype}"))]
    ConstantTypeMismatch { value: ConstValue, dtype: DType },

    #[snafu(display("{op} is not defined for {ty}"))]
    UnsupportedBinaryOp { op: BinaryOp, ty: Type },

    // =========================================================================
    // Structure
    // =========================================================================
    #[snafu(display("{what} must have exactly one block, got {actual}"))]
    ExpectedSingleBlock { what: &'static str, actual: usize },

    #[snafu(display("block is missing its {expected} terminator"))]
    MissingTerminator { expected: &'static str },

    #[snafu(display("expected {expected} terminator, got {actual}"))]
    TerminatorMismatch { expected: &'static str, actual: &'static str },

    #[snafu(display("{op} may only appear as the last operation of its block"))]
    MisplacedTerminator { op: &'static str },

    #[snafu(display("update {update}: destination is not an output argument of the enclosing loop"))]
    DstNotLoopOutput { update: usize },

    /// Destination-to-result ties exist only for the parallel loop variant.
    #[snafu(display("update {update} has no tied loop result: enclosing loop is not parallel"))]
    NoTiedResult { update: usize },

    #[snafu(display("use of value {id} outside of its defining scope"))]
    UndefinedValue { id: ValueId },

    /// Wraps a verification failure with the operation that produced it.
    #[snafu(display("'{op}' op: {source}"))]
    InOp {
        op: &'static str,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    // =========================================================================
    // Textual form
    // =========================================================================
    #[snafu(display("{line}:{column}: {message}"))]
    Parse { line: usize, column: usize, message: String },

    // =========================================================================
    // Evaluation
    // =========================================================================
    #[snafu(display("expected {expected} arguments, got {actual}"))]
    ArgumentCount { expected: usize, actual: usize },

    #[snafu(display("argument {index} does not match parameter type {expected}"))]
    ArgumentMismatch { index: usize, expected: Type },

    #[snafu(display("loop dimension {dim} has non-positive step {step}"))]
    NonPositiveStep { dim: usize, step: i64 },

    #[snafu(display("tile addresses index {index} in dimension {dim} of extent {extent}"))]
    TileOutOfBounds { dim: usize, index: i64, extent: usize },

    #[snafu(display("update {update}: source of shape {src:?} written through a tile of sizes {sizes:?}"))]
    UpdateShapeMismatch { update: usize, src: Vec<usize>, sizes: Vec<usize> },

    #[snafu(display("division by zero"))]
    DivisionByZero,

    #[snafu(display("runtime value is not {expected}"))]
    RuntimeKindMismatch { expected: &'static str },
}

impl Error {
    /// Innermost error, unwrapping operation context.
    pub fn root(&self) -> &Error {
        match self {
            Error::InOp { source, .. } => source.root(),
            other => other,
        }
    }
}
