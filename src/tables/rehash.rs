//! The rehash registry: hash collections that must rebuild their buckets
//! once unflattening has finished.
//!
//! A key's effective hash can depend on object identity, which is only final
//! after both fix-up passes complete. Collections register themselves here
//! during the second pass and are drained exactly once afterwards.

use rustc_hash::FxHashSet;

use crate::object::ObjRef;

/// An identity set of hash-based collections awaiting rehash.
#[derive(Debug, Default)]
pub struct RehashRegistry {
    seen: FxHashSet<ObjRef>,
    order: Vec<ObjRef>,
}

impl RehashRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            seen: FxHashSet::default(),
            order: Vec::new(),
        }
    }

    /// Registers a collection; registering the same one twice is a no-op.
    pub fn register(&mut self, collection: ObjRef) {
        if self.seen.insert(collection) {
            self.order.push(collection);
        }
    }

    /// Drains the registry in registration order.
    pub fn drain(&mut self) -> Vec<ObjRef> {
        self.seen.clear();
        std::mem::take(&mut self.order)
    }

    /// Number of collections awaiting rehash.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no collection is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
