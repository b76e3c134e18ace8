//! The dup table: one copy per object, no matter how many fields alias it.

use rustc_hash::FxHashMap;

use crate::error::{FlatpackError, Result};
use crate::format::BufOffset;
use crate::object::ObjRef;

/// Maps an object's identity to the offset at which its copy lives in the
/// output buffer.
///
/// Every object reachable from the root is looked up here *before* being
/// copied: a hit means "already copied, reuse the offset", which is exactly
/// how structural sharing and cycles survive packing, and a miss means
/// "copy now and register". Created fresh per pack call, discarded after.
#[derive(Debug, Default)]
pub struct DupTable {
    entries: FxHashMap<ObjRef, BufOffset>,
}

impl DupTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Looks up the offset already assigned to `object`, if any.
    pub fn lookup(&self, object: ObjRef) -> Option<BufOffset> {
        self.entries.get(&object).copied()
    }

    /// Records that `object`'s copy lives at `offset`.
    ///
    /// Re-associating the same pair is harmless; associating a *different*
    /// offset for an already-registered object is an identity conflict and
    /// indicates a bug.
    pub fn associate(&mut self, object: ObjRef, offset: BufOffset) -> Result<()> {
        match self.entries.insert(object, offset) {
            None => Ok(()),
            Some(previous) if previous == offset => Ok(()),
            Some(previous) => Err(FlatpackError::IdentityConflict(format!(
                "Object {object} associated with both {previous} and {offset}"
            ))),
        }
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no object has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
