use std::fmt;

/// A strong type representing the identity of a live object in a [`Heap`].
///
/// This is the only in-process object identifier the crate deals in; raw
/// addresses never cross the serialization boundary. Two fields holding the
/// same `ObjRef` are aliases of one object, and the pack machinery keys its
/// dup table on exactly this identity.
///
/// [`Heap`]: super::Heap
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(u32); // u32 is sufficient for 4 billion live objects per heap.

impl ObjRef {
    /// Creates a new ObjRef.
    /// Restrict visibility to the crate to prevent arbitrary creation;
    /// callers obtain refs from `Heap::alloc`.
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({})", self.0)
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
