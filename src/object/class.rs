//! Type identification for serializable objects.
//!
//! Every object belongs to a kind, identified at the serialization boundary
//! by a [`ClassRef`]: either a small stable [`TypeTag`] naming a statically
//! registered kind (fast path, resolved by table lookup on both sides), or a
//! reference to a descriptor object that is itself part of the graph and
//! travels inside the flattened buffer (slow path, for dynamically defined
//! kinds whose descriptors the receiving process cannot know in advance).

use std::fmt;

use rustc_hash::FxHashMap;

use super::id::ObjRef;
use crate::error::{FlatpackError, Result};

/// A small non-negative integer naming a statically registered object kind.
///
/// Tags are shared by convention between the sending and receiving process;
/// they are the only type identification that crosses the process boundary
/// for primitive kinds. Tags below [`TypeTag::FIRST_USER`] are reserved.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(u32);

impl TypeTag {
    /// Reserved tag for dynamic type descriptor objects.
    pub const DESCRIPTOR: TypeTag = TypeTag(1);
    /// Reserved tag for proxy stand-in objects.
    pub const PROXY: TypeTag = TypeTag(2);
    /// First tag available for user-registered kinds.
    pub const FIRST_USER: TypeTag = TypeTag(8);

    /// Creates a tag from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw tag value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// The class of a live object, as seen by the serialization boundary.
///
/// Modeled as a sum type rather than a raw polymorphic pointer: the two
/// variants map directly onto the two wire encodings (stable numeric tag vs.
/// "my descriptor is a flattened object in the same buffer").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRef {
    /// A statically registered kind, resolved through the [`TypeTable`].
    Primitive(TypeTag),
    /// A dynamically defined kind; the referenced heap object is a
    /// descriptor object (class `Primitive(TypeTag::DESCRIPTOR)`) whose
    /// payload encodes the [`TypeDescriptor`].
    Dynamic(ObjRef),
}

/// Describes one serializable kind: its name and its capabilities.
///
/// The capability flags are the seam the envelope driver acts on; the crate
/// never hard-codes concrete kinds (which resource types need proxying is a
/// deployment decision).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Human-readable kind name, carried inside dynamic descriptors.
    pub name: String,
    /// Transient kinds refuse to be serialized at all.
    pub transient: bool,
    /// Proxied kinds substitute a stand-in on pack (see the `proxy` module).
    pub proxied: bool,
    /// Hashed kinds must rebuild their buckets after unflatten.
    pub hashed: bool,
}

impl TypeDescriptor {
    /// Creates a plain descriptor with no special capabilities.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transient: false,
            proxied: false,
            hashed: false,
        }
    }

    const FLAG_TRANSIENT: u8 = 0b0000_0001;
    const FLAG_PROXIED: u8 = 0b0000_0010;
    const FLAG_HASHED: u8 = 0b0000_0100;

    /// Encodes the descriptor into the payload of a descriptor object:
    /// `[flags u8] [name bytes]`.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.name.len());
        let mut flags = 0u8;
        if self.transient {
            flags |= Self::FLAG_TRANSIENT;
        }
        if self.proxied {
            flags |= Self::FLAG_PROXIED;
        }
        if self.hashed {
            flags |= Self::FLAG_HASHED;
        }
        out.push(flags);
        out.extend_from_slice(self.name.as_bytes());
        out
    }

    /// Decodes a descriptor from a descriptor object's payload.
    pub fn decode_payload(payload: &[u8]) -> Result<Self> {
        let (flags, name) = payload
            .split_first()
            .ok_or_else(|| FlatpackError::Protocol("Empty type descriptor payload".into()))?;
        let name = std::str::from_utf8(name)
            .map_err(|_| FlatpackError::Protocol("Type descriptor name is not UTF-8".into()))?;
        Ok(Self {
            name: name.to_string(),
            transient: (flags & Self::FLAG_TRANSIENT) != 0,
            proxied: (flags & Self::FLAG_PROXIED) != 0,
            hashed: (flags & Self::FLAG_HASHED) != 0,
        })
    }
}

/// The process-wide tag → descriptor registry.
///
/// The table is injected into every envelope and treated as read-only there;
/// it must be fully published before any unflatten begins. It is the only
/// state shared between pack/puff calls.
#[derive(Debug, Clone)]
pub struct TypeTable {
    entries: FxHashMap<TypeTag, TypeDescriptor>,
}

impl TypeTable {
    /// Creates a table pre-populated with the reserved builtin kinds.
    pub fn new() -> Self {
        let mut entries = FxHashMap::default();
        entries.insert(
            TypeTag::DESCRIPTOR,
            TypeDescriptor::plain("type-descriptor"),
        );
        entries.insert(TypeTag::PROXY, TypeDescriptor::plain("proxy"));
        Self { entries }
    }

    /// Registers a user kind under `tag`.
    ///
    /// Tags below [`TypeTag::FIRST_USER`] are reserved, and a tag may only be
    /// registered once; both misuses are internal errors on the caller's side.
    pub fn register(&mut self, tag: TypeTag, descriptor: TypeDescriptor) -> Result<()> {
        if tag < TypeTag::FIRST_USER {
            return Err(FlatpackError::Internal(format!(
                "Tag {tag} is in the reserved range"
            )));
        }
        if self.entries.contains_key(&tag) {
            return Err(FlatpackError::Internal(format!(
                "Tag {tag} is already registered"
            )));
        }
        self.entries.insert(tag, descriptor);
        Ok(())
    }

    /// Resolves a tag to its descriptor, if registered.
    pub fn resolve(&self, tag: TypeTag) -> Option<&TypeDescriptor> {
        self.entries.get(&tag)
    }

    /// Resolves a tag that the wire format claims is valid.
    ///
    /// An unknown tag during unflatten means sender and receiver disagree on
    /// the registry; the buffer cannot be interpreted.
    pub fn resolve_required(&self, tag: TypeTag) -> Result<&TypeDescriptor> {
        self.resolve(tag).ok_or_else(|| {
            FlatpackError::Protocol(format!("Tag {tag} does not name a registered kind"))
        })
    }

    /// Returns the number of registered kinds, builtins included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no kinds are registered (never the case in practice,
    /// since builtins are always present).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}
