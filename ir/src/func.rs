//! Functions and modules: the host containers of the IR.

use std::collections::HashMap;
use std::mem::discriminant;

use smallvec::SmallVec;

use crate::op::{Op, Operation};
use crate::region::{Block, Region};
use crate::types::Type;
use crate::value::{Value, ValueId, ValueOrigin};

/// Named function with typed arguments and a single-block body terminated by `return`.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    arguments: SmallVec<[Value; 4]>,
    result_types: Vec<Type>,
    body: Block,
}

impl Function {
    /// Create a function with an empty body.
    pub fn new(name: impl Into<String>, arg_types: impl IntoIterator<Item = Type>, result_types: Vec<Type>) -> Self {
        let arguments = arg_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| Value::new(ty, ValueOrigin::Argument { index }))
            .collect();
        Self { name: name.into(), arguments, result_types, body: Block::new([]) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    pub fn result_types(&self) -> &[Type] {
        &self.result_types
    }

    pub fn body(&self) -> &Block {
        &self.body
    }

    pub(crate) fn body_mut(&mut self) -> &mut Block {
        &mut self.body
    }

    /// Visit every operation in pre-order, nested regions included.
    pub fn walk(&self, f: &mut impl FnMut(&Operation)) {
        walk_block(&self.body, f);
    }

    /// Structural equality modulo value identities.
    ///
    /// Values are matched by where and in which order they are defined, so a
    /// printed and re-parsed function is equivalent to the original.
    pub fn is_equivalent(&self, other: &Function) -> bool {
        if self.name != other.name || self.result_types != other.result_types {
            return false;
        }
        let mut eq = Equivalence::default();
        eq.bind(&self.arguments, &other.arguments) && eq.blocks(&self.body, &other.body)
    }
}

pub(crate) fn walk_block(block: &Block, f: &mut impl FnMut(&Operation)) {
    for operation in block.operations() {
        f(operation);
        for region in operation.op().regions() {
            for nested in region.blocks() {
                walk_block(nested, f);
            }
        }
    }
}

/// Ordered collection of functions.
#[derive(Debug, Clone, Default)]
pub struct Module {
    functions: Vec<Function>,
}

impl Module {
    pub fn new(functions: Vec<Function>) -> Self {
        Self { functions }
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn push(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    pub fn is_equivalent(&self, other: &Module) -> bool {
        self.functions.len() == other.functions.len()
            && self.functions.iter().zip(&other.functions).all(|(a, b)| a.is_equivalent(b))
    }
}

#[derive(Default)]
struct Equivalence {
    map: HashMap<ValueId, ValueId>,
}

impl Equivalence {
    fn bind(&mut self, lhs: &[Value], rhs: &[Value]) -> bool {
        if lhs.len() != rhs.len() {
            return false;
        }
        for (a, b) in lhs.iter().zip(rhs) {
            if a.ty() != b.ty() {
                return false;
            }
            self.map.insert(a.id(), b.id());
        }
        true
    }

    fn same(&self, a: &Value, b: &Value) -> bool {
        self.map.get(&a.id()) == Some(&b.id())
    }

    fn blocks(&mut self, lhs: &Block, rhs: &Block) -> bool {
        self.bind(lhs.arguments(), rhs.arguments())
            && lhs.operations().len() == rhs.operations().len()
            && lhs.operations().iter().zip(rhs.operations()).all(|(a, b)| self.operations(a, b))
    }

    fn regions(&mut self, lhs: &Region, rhs: &Region) -> bool {
        lhs.blocks().len() == rhs.blocks().len()
            && lhs.blocks().iter().zip(rhs.blocks()).all(|(a, b)| self.blocks(a, b))
    }

    fn operations(&mut self, lhs: &Operation, rhs: &Operation) -> bool {
        if !same_attributes(lhs.op(), rhs.op()) {
            return false;
        }
        let (a_operands, b_operands) = (lhs.op().operands(), rhs.op().operands());
        if a_operands.len() != b_operands.len() || !a_operands.iter().zip(&b_operands).all(|(a, b)| self.same(a, b)) {
            return false;
        }

        let (a_regions, b_regions) = (lhs.op().regions(), rhs.op().regions());
        if a_regions.len() != b_regions.len()
            || !a_regions.iter().zip(&b_regions).all(|(a, b)| self.regions(a, b))
        {
            return false;
        }
        self.bind(lhs.results(), rhs.results())
    }
}

/// Same kind and same static attributes; operands and regions are compared separately.
fn same_attributes(lhs: &Op, rhs: &Op) -> bool {
    if discriminant(lhs) != discriminant(rhs) {
        return false;
    }
    match (lhs, rhs) {
        (Op::Constant(a), Op::Constant(b)) => a == b,
        (Op::Binary(a, ..), Op::Binary(b, ..)) => a == b,
        (Op::Tile(a), Op::Tile(b)) => same_static_layout(a.triple(), b.triple()),
        (Op::Materialize(a), Op::Materialize(b)) => same_static_layout(a.triple(), b.triple()),
        (Op::Loop(a), Op::Loop(b)) => a.kind() == b.kind(),
        (Op::SetYield(a), Op::SetYield(b)) => a.accumulator_flags() == b.accumulator_flags(),
        _ => true,
    }
}

fn same_static_layout(lhs: &crate::mixed::OffsetsSizesStrides, rhs: &crate::mixed::OffsetsSizesStrides) -> bool {
    let (a, b) = (lhs.to_static_encoding(), rhs.to_static_encoding());
    a.static_offsets == b.static_offsets && a.static_sizes == b.static_sizes && a.static_strides == b.static_strides
}
