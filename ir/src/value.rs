//! SSA values and the stable identifiers of values, blocks and operations.
//!
//! A [`Value`] is a cheap, reference-counted handle. Equality and hashing use
//! the stable [`ValueId`] assigned at creation, never the payload.

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Type;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $counter:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
        #[display("{}{_0}", $prefix)]
        pub struct $name(u64);

        static $counter: AtomicU64 = AtomicU64::new(0);

        impl $name {
            pub(crate) fn fresh() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

define_id!(
    /// Identity of a [`Value`].
    ValueId, VALUE_ID_COUNTER, "v"
);
define_id!(
    /// Identity of a [`crate::Block`].
    BlockId, BLOCK_ID_COUNTER, "bb"
);
define_id!(
    /// Identity of an [`crate::Operation`].
    OpId, OP_ID_COUNTER, "op"
);

/// Where a value is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueOrigin {
    /// Argument of the enclosing function.
    Argument { index: usize },
    /// Argument of a block, bound by the construct owning the region.
    BlockArgument { block: BlockId, index: usize },
    /// Result of an operation.
    OpResult { op: OpId, index: usize },
}

#[derive(derive_more::Debug)]
struct ValueData {
    id: ValueId,
    ty: Type,
    origin: ValueOrigin,
}

/// Handle to an SSA value.
#[derive(Clone)]
pub struct Value(Arc<ValueData>);

impl Value {
    pub(crate) fn new(ty: Type, origin: ValueOrigin) -> Self {
        Self(Arc::new(ValueData { id: ValueId::fresh(), ty, origin }))
    }

    pub fn id(&self) -> ValueId {
        self.0.id
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn origin(&self) -> ValueOrigin {
        self.0.origin
    }

    /// Position of this value as an argument of `block`, if it is one.
    pub fn block_arg_index(&self, block: crate::BlockId) -> Option<usize> {
        match self.0.origin {
            ValueOrigin::BlockArgument { block: owner, index } if owner == block => Some(index),
            _ => None,
        }
    }

    /// Position of this value among the results of `op`, if it is one.
    pub fn result_index(&self, op: OpId) -> Option<usize> {
        match self.0.origin {
            ValueOrigin::OpResult { op: owner, index } if owner == op => Some(index),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

// Show identity and type only; origins point back into the op tree.
impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}: {}", self.0.id, self.0.ty)
    }
}
