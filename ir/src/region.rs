//! Blocks and regions: nested scopes owning their own argument lists.

use smallvec::SmallVec;
use snafu::ensure;

use crate::Result;
use crate::error::ExpectedSingleBlockSnafu;
use crate::op::Operation;
use crate::types::Type;
use crate::value::{BlockId, Value, ValueOrigin};

/// Straight-line list of operations with block arguments.
///
/// Arguments are bound by the construct owning the enclosing region (loop
/// induction variables, output arguments, accumulator operands, ...).
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    arguments: SmallVec<[Value; 4]>,
    operations: Vec<Operation>,
}

impl Block {
    pub fn new(arg_types: impl IntoIterator<Item = Type>) -> Self {
        let id = BlockId::fresh();
        let arguments = arg_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| Value::new(ty, ValueOrigin::BlockArgument { block: id, index }))
            .collect();
        Self { id, arguments, operations: Vec::new() }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub(crate) fn operations_mut(&mut self) -> &mut Vec<Operation> {
        &mut self.operations
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Last operation if it is a terminator.
    pub fn terminator(&self) -> Option<&Operation> {
        self.operations.last().filter(|op| op.op().is_terminator())
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Ordered list of blocks forming a sub-computation.
#[derive(Debug, Clone, Default)]
pub struct Region {
    blocks: Vec<Block>,
}

impl Region {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn with_block(block: Block) -> Self {
        Self { blocks: vec![block] }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    /// The only block; every region in this IR is single-block.
    pub fn single_block(&self, what: &'static str) -> Result<&Block> {
        ensure!(self.blocks.len() == 1, ExpectedSingleBlockSnafu { what, actual: self.blocks.len() });
        Ok(&self.blocks[0])
    }

    /// First block, when present.
    pub fn entry(&self) -> Option<&Block> {
        self.blocks.first()
    }
}
