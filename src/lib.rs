//! # Flatpack
//!
//! An object-graph envelope serializer: it turns a live, pointer-rich object
//! graph, aliasing and cycles included, into a single contiguous,
//! relocatable byte buffer, and reconstitutes that buffer back into live
//! objects in the same or a different process image.
//!
//! ## Overview
//!
//! Flatpack is not a value serializer. Instead of encoding a tree of values,
//! it computes the transitive closure of an arbitrary object graph and copies
//! every reachable object into the buffer **exactly once**, rewriting every
//! reference field into a buffer offset. Two fields that alias one object
//! before packing hold the same offset after packing, and resolve back to one
//! shared object after unpacking; structural sharing and cycles survive the
//! trip intact.
//!
//! ### Key Properties
//!
//! *   **One copy per object:** a dup table keyed on object identity
//!     guarantees shared sub-objects are serialized once and only once.
//! *   **Cycle safe:** traversal uses an explicit worklist of buffer offsets,
//!     never native recursion, so arbitrarily deep and cyclic graphs pack in
//!     bounded stack space.
//! *   **Relocatable:** reference fields hold offsets, never addresses; the
//!     buffer can be written to a pipe, socket, or disk and revived by a
//!     process with a completely different memory layout.
//! *   **Class identity preserved:** statically registered kinds travel as
//!     small numeric tags resolved through a shared table; dynamically
//!     defined kinds flatten their own descriptor objects into the stream.
//! *   **Proxy substitution:** kinds tied to host-process resources serialize
//!     a lightweight stand-in instead, revived into a live equivalent on the
//!     receiving side.
//!
//! ## Architecture
//!
//! ### The Envelope
//!
//! The [`envelope::Envelope`] is the per-call context coordinating one pack
//! or puff operation: it binds the [`object::Heap`], the shared
//! [`object::TypeTable`], a [`proxy::ProxyHandler`], the output buffer and
//! the per-call tables (dup table, pending worklist, save set, rehash
//! registry). Envelopes are created per call and never reused.
//!
//! ### Buffer Layout
//!
//! ```text
//! [Sentinel Header] [Object 0] [Object 1] ... [Object N]
//! ```
//!
//! Each object is self-describing:
//!
//! ```text
//! [ PackedHeader ] [ Reference Slots (8 bytes each) ] [ Payload ]
//! ```
//!
//! The sentinel occupies offset 0, so a reference slot holding 0 can
//! unambiguously mean "null". There is no framing or checksumming: the
//! transport moving the bytes between processes owns those concerns.
//!
//! ### Unflattening
//!
//! Reading is two linear passes, never recursive descent (a referenced
//! object may sit before or after its referrer in buffer order). Pass 1
//! walks object-by-object by self-reported size, validates headers and type
//! tags, and materializes one live object per packed object. Pass 2 resolves
//! every reference slot to the target's new identity and runs the liveness
//! hooks: proxy stand-ins resolve themselves in place, and hash collections
//! register for a final rehash once the whole graph is live.
//!
//! ## Usage
//!
//! ```rust
//! use flatpack::{Flatpack, Heap, TypeDescriptor, TypeTable, TypeTag};
//!
//! let pair = TypeTag::new(10);
//! let leaf = TypeTag::new(11);
//! let mut types = TypeTable::new();
//! types.register(pair, TypeDescriptor::plain("pair"))?;
//! types.register(leaf, TypeDescriptor::plain("leaf"))?;
//!
//! // Root{left: Leaf, right: Leaf}: both fields alias one leaf.
//! let mut heap = Heap::new();
//! let shared = heap.alloc_with(leaf, vec![], vec![42]);
//! let root = heap.alloc_with(pair, vec![Some(shared), Some(shared)], vec![]);
//!
//! let bytes = Flatpack::pack(&mut heap, &types, root)?;
//!
//! // Typically in another process, with the same TypeTable by convention.
//! let mut revived = Heap::new();
//! let root = Flatpack::puff(&mut revived, &types, &bytes)?;
//! let fields = &revived.get(root)?.refs;
//! assert_eq!(fields[0], fields[1]); // still one shared leaf
//! # Ok::<(), flatpack::FlatpackError>(())
//! ```
//!
//! ## Concurrency
//!
//! Pack and puff are synchronous, single-threaded operations that run to
//! completion or fail atomically on the calling thread. Nothing per-call is
//! shared; the only longer-lived resource is the [`object::TypeTable`],
//! which this crate treats as read-only and which must be fully published
//! before any unflatten begins. There is no cancellation mid-call: wrap the
//! call externally and discard partial results on timeout.
//!
//! ## Safety and Error Handling
//!
//! * **No unsafe, no panics:** enforced by crate-level lints; all failures
//!   surface as a [`FlatpackError`].
//! * **No partial success:** every error aborts the whole pack or puff call;
//!   nothing is retried internally.
//! * **Malformed input is rejected:** truncated buffers, inconsistent
//!   headers, unknown tags and dangling offsets all fail with a protocol
//!   error rather than yielding a corrupt graph.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod envelope;
pub mod error;
pub mod format;
pub mod hashtab;
pub mod object;
pub mod proxy;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod buffer;
#[doc(hidden)]
pub mod tables;

// --- RE-EXPORTS ---

pub use api::Flatpack;
pub use envelope::Envelope;
pub use error::{FlatpackError, Result};
pub use format::BufOffset;
pub use object::{ClassRef, Heap, HeapObject, ObjRef, TypeDescriptor, TypeTable, TypeTag};
pub use proxy::{NoProxies, ProxyHandler};

/// Constants used throughout the library.
pub mod constants {
    /// The default initial capacity of a pack buffer.
    pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;
}
