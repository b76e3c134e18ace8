//! Proxy substitution for objects whose state cannot cross processes.
//!
//! Some kinds hold resources that are meaningless outside the originating
//! process, such as open handles or host-environment bindings. A kind declares this
//! with the `proxied` capability on its [`TypeDescriptor`]; during packing
//! the envelope asks the [`ProxyHandler`] for a lightweight stand-in carrying
//! only reconstructible information (a lookup key), and it is the stand-in
//! that travels in the buffer. On the receiving side, the stand-in resolves
//! itself back into a live equivalent.
//!
//! Resolution happens in place at the proxy's [`ObjRef`], so every field that
//! resolved to the proxy observes the live replacement; it runs at most once
//! per object and assumes nothing about unflatten order.
//!
//! [`TypeDescriptor`]: crate::object::TypeDescriptor

use crate::error::{FlatpackError, Result};
use crate::object::{Heap, HeapObject, ObjRef, TypeTag};

/// Builds a proxy stand-in object carrying only the given lookup key.
pub fn proxy_object(key: &[u8]) -> HeapObject {
    let mut object = HeapObject::new(crate::object::ClassRef::Primitive(TypeTag::PROXY));
    object.data = key.to_vec();
    object
}

/// The substitution seam between the envelope and host-process resources.
///
/// Which concrete kinds need proxying is a deployment decision; the envelope
/// only acts on the `proxied` capability flag and delegates both directions
/// to this trait.
pub trait ProxyHandler: std::fmt::Debug {
    /// Produces the stand-in to serialize in place of `original`.
    ///
    /// The returned object is protected in the envelope's save set for the
    /// rest of the pack call; typical implementations allocate it with
    /// [`proxy_object`] and a key that identifies the resource.
    fn make_proxy(&self, heap: &mut Heap, original: ObjRef) -> Result<ObjRef>;

    /// Rebuilds a live equivalent from a stand-in's key bytes.
    ///
    /// The result replaces the stand-in at its own identity. Must be
    /// idempotent with respect to the resource it names: resolving the same
    /// key twice (e.g. two buffers carrying the same resource) yields
    /// equivalent objects.
    fn resolve_proxy(&self, heap: &mut Heap, key: &[u8]) -> Result<HeapObject>;
}

/// A handler for deployments with no proxied kinds (the default).
///
/// Both operations fail: encountering a proxied object or a proxy stand-in
/// without a real handler configured is a protocol violation.
#[derive(Debug, Clone, Copy)]
pub struct NoProxies;

impl ProxyHandler for NoProxies {
    fn make_proxy(&self, _heap: &mut Heap, original: ObjRef) -> Result<ObjRef> {
        Err(FlatpackError::Protocol(format!(
            "Object {original} requires proxy substitution but no handler is configured"
        )))
    }

    fn resolve_proxy(&self, _heap: &mut Heap, _key: &[u8]) -> Result<HeapObject> {
        Err(FlatpackError::Protocol(
            "Buffer contains a proxy stand-in but no handler is configured".into(),
        ))
    }
}
