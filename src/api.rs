//! The main entry points for flattening and unflattening.

use crate::envelope::Envelope;
use crate::error::Result;
use crate::object::{Heap, ObjRef, TypeTable};
use crate::proxy::{NoProxies, ProxyHandler};

/// The main entry point for flattening and unflattening object graphs.
#[derive(Debug)]
pub struct Flatpack;

impl Flatpack {
    /// Flattens the graph reachable from `root` into a relocatable buffer.
    ///
    /// Uses the [`NoProxies`] handler: reachable proxied kinds fail the
    /// pack. Deployments with host-resource kinds use [`Flatpack::pack_with`].
    ///
    /// # Arguments
    /// * `heap`: The object space holding the graph.
    /// * `types`: The process-wide tag registry, shared with the receiver.
    /// * `root`: The top-level object to serialize.
    pub fn pack(heap: &mut Heap, types: &TypeTable, root: ObjRef) -> Result<Vec<u8>> {
        Envelope::pack(heap, types, &NoProxies, root)
    }

    /// Flattens with a proxy handler for host-resource kinds.
    pub fn pack_with(
        heap: &mut Heap,
        types: &TypeTable,
        proxies: &dyn ProxyHandler,
        root: ObjRef,
    ) -> Result<Vec<u8>> {
        Envelope::pack(heap, types, proxies, root)
    }

    /// Reconstructs a graph from a flattened buffer, returning the root.
    ///
    /// `bytes` must be exactly the range produced by a pack; the transport
    /// owns framing; this crate performs none of its own.
    pub fn puff(heap: &mut Heap, types: &TypeTable, bytes: &[u8]) -> Result<ObjRef> {
        Envelope::puff(heap, types, &NoProxies, bytes)
    }

    /// Reconstructs with a proxy handler that can revive host resources.
    pub fn puff_with(
        heap: &mut Heap,
        types: &TypeTable,
        proxies: &dyn ProxyHandler,
        bytes: &[u8],
    ) -> Result<ObjRef> {
        Envelope::puff(heap, types, proxies, bytes)
    }
}
