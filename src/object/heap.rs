//! The `Heap` arena and the `HeapObject` layout.
//!
//! Live objects never hand out addresses; they are addressed exclusively by
//! [`ObjRef`] indices into the arena. The arena does not collect; the
//! garbage collector proper is an external collaborator, and the pack-side
//! `SaveSet` is the seam through which pack-transient objects are kept
//! reachable while a collector could be running.

use super::class::{ClassRef, TypeDescriptor, TypeTable, TypeTag};
use super::id::ObjRef;
use crate::error::{FlatpackError, Result};
use crate::format::PackedHeader;

/// A single live object: class identity, reference fields, scalar payload.
///
/// Reference fields and scalar bytes are kept separate so that the packed
/// size of an object is computable from the object alone, with no external side
/// table is ever consulted to know how many bytes to copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapObject {
    /// The object's kind.
    pub class: ClassRef,
    /// Reference fields; `None` is the null reference.
    pub refs: Vec<Option<ObjRef>>,
    /// Scalar payload bytes, opaque to the envelope machinery.
    pub data: Vec<u8>,
}

impl HeapObject {
    /// Creates an object of the given class with no fields.
    pub fn new(class: ClassRef) -> Self {
        Self {
            class,
            refs: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Total packed size of this object: header + slots + payload.
    pub fn packed_size(&self) -> usize {
        PackedHeader::packed_size(self.refs.len(), self.data.len())
    }
}

/// An arena of live objects.
///
/// Acts as the process's object space from the envelope's point of view.
/// Allocation only; reclamation belongs to the external collector.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    /// Creates a new, empty heap.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// Allocates an object, returning its identity.
    pub fn alloc(&mut self, object: HeapObject) -> ObjRef {
        let id = ObjRef::new(u32::try_from(self.objects.len()).unwrap_or(u32::MAX));
        self.objects.push(object);
        id
    }

    /// Convenience allocator for a primitive-kind object.
    pub fn alloc_with(
        &mut self,
        tag: TypeTag,
        refs: Vec<Option<ObjRef>>,
        data: Vec<u8>,
    ) -> ObjRef {
        self.alloc(HeapObject {
            class: ClassRef::Primitive(tag),
            refs,
            data,
        })
    }

    /// Allocates a descriptor object for a dynamically defined kind.
    ///
    /// The returned object travels inside flattened buffers like any other
    /// graph node; objects of the dynamic kind carry `ClassRef::Dynamic` of
    /// this ref as their class.
    pub fn alloc_descriptor(&mut self, descriptor: &TypeDescriptor) -> ObjRef {
        self.alloc_with(TypeTag::DESCRIPTOR, Vec::new(), descriptor.encode_payload())
    }

    /// Retrieves an object by identity.
    pub fn get(&self, id: ObjRef) -> Result<&HeapObject> {
        self.objects
            .get(id.as_u32() as usize)
            .ok_or_else(|| FlatpackError::Internal(format!("Dangling object reference {id}")))
    }

    /// Retrieves an object mutably by identity.
    pub fn get_mut(&mut self, id: ObjRef) -> Result<&mut HeapObject> {
        self.objects
            .get_mut(id.as_u32() as usize)
            .ok_or_else(|| FlatpackError::Internal(format!("Dangling object reference {id}")))
    }

    /// Replaces the object at `id` in place, keeping its identity.
    ///
    /// This is how a revived proxy becomes the live equivalent object:
    /// every field already resolved to `id` observes the replacement.
    pub fn replace(&mut self, id: ObjRef, object: HeapObject) -> Result<()> {
        *self.get_mut(id)? = object;
        Ok(())
    }

    /// Resolves the effective [`TypeDescriptor`] of an object, following a
    /// dynamic class through its descriptor object.
    pub fn descriptor_of(&self, types: &TypeTable, id: ObjRef) -> Result<TypeDescriptor> {
        match self.get(id)?.class {
            ClassRef::Primitive(tag) => Ok(types.resolve_required(tag)?.clone()),
            ClassRef::Dynamic(desc_ref) => {
                let desc_obj = self.get(desc_ref)?;
                if desc_obj.class != ClassRef::Primitive(TypeTag::DESCRIPTOR) {
                    return Err(FlatpackError::Protocol(format!(
                        "Object {id} names {desc_ref} as its descriptor, \
                         but that object is not a descriptor"
                    )));
                }
                TypeDescriptor::decode_payload(&desc_obj.data)
            }
        }
    }

    /// Returns the number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the heap holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
