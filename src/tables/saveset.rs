//! The save set: a temporary GC root for pack-transient objects.
//!
//! Packing can run while an independent collector is active in the host
//! process. Objects created purely for serialization (proxy stand-ins)
//! are reachable from nothing else, so the save set holds them for the
//! duration of one pack call.

use rustc_hash::FxHashSet;

use crate::object::ObjRef;

/// The protection seam offered to the external collector.
///
/// The crate does not implement collection; it only promises that anything
/// passed to `protect` stays reachable until the current pack call returns.
/// Deployments with a real collector wire this to their root registry.
pub trait GcGuard {
    /// Keeps `object` reachable for the rest of the current call.
    fn protect(&mut self, object: ObjRef);
}

/// An identity set of objects protected for the duration of one pack call.
///
/// The default [`GcGuard`] implementation; scoped to a single envelope and
/// discarded with it.
#[derive(Debug, Default)]
pub struct SaveSet {
    held: FxHashSet<ObjRef>,
}

impl SaveSet {
    /// Creates an empty save set.
    pub fn new() -> Self {
        Self {
            held: FxHashSet::default(),
        }
    }

    /// Returns true if `object` is currently protected.
    pub fn contains(&self, object: ObjRef) -> bool {
        self.held.contains(&object)
    }

    /// Number of protected objects.
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns true if nothing is protected.
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl GcGuard for SaveSet {
    fn protect(&mut self, object: ObjRef) {
        self.held.insert(object);
    }
}
