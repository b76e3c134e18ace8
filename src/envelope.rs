//! The envelope driver: pack (flatten) and puff (unflatten).
//!
//! This module orchestrates the whole traversal. Packing copies the root
//! into the buffer and then drains an explicit worklist of buffer offsets,
//! resolving each packed object's reference slots through the dup table so
//! every distinct object is copied exactly once, which is how aliasing and
//! cycles survive the trip. Puffing is two linear passes over the byte
//! range: the first rebuilds each object and its class binding, the second
//! resolves reference slots and runs the liveness hooks (proxy resolution,
//! rehash registration).
//!
//! ## The one correctness rule that matters
//!
//! Copying an object can grow the buffer, which may move the backing store.
//! Nothing in this module ever holds a position across a call that can
//! append; slot positions are recomputed from the object's offset on every
//! access. Offsets are stable under growth, pointers are not.
//!
//! ## Per-call state
//!
//! An envelope binds one heap, one type table, one proxy handler, and fresh
//! instances of every bookkeeping table. It is created per call and never
//! reused; both entry points run synchronously on the calling thread with no
//! internal parallelism, and a failed call leaves no partial result worth
//! keeping.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::buffer::SmartBuffer;
use crate::error::{FlatpackError, Result};
use crate::format::{BufOffset, PackedFlags, PackedHeader, SentinelHeader, DYNAMIC_CLASS};
use crate::hashtab;
use crate::object::{ClassRef, Heap, HeapObject, ObjRef, TypeTable, TypeTag};
use crate::proxy::ProxyHandler;
use crate::tables::{DupTable, GcGuard, PendingWorklist, RehashRegistry, SaveSet};

/// The per-call context for one flatten operation.
///
/// Binds the heap, the shared (read-only) type table, the proxy handler, the
/// output buffer and the per-call tables. Use [`Envelope::pack`] and
/// [`Envelope::puff`]; an envelope cannot be constructed directly or reused.
#[derive(Debug)]
pub struct Envelope<'a> {
    heap: &'a mut Heap,
    types: &'a TypeTable,
    proxies: &'a dyn ProxyHandler,
    buffer: SmartBuffer,
    dups: DupTable,
    pending: PendingWorklist,
    saves: SaveSet,
}

impl<'a> Envelope<'a> {
    /// Flattens the graph reachable from `root` into a relocatable buffer.
    ///
    /// The returned bytes are trimmed to the used length; the transport is
    /// expected to deliver exactly this range to the receiving process.
    ///
    /// ## Errors
    ///
    /// - [`FlatpackError::Protocol`] if a transient kind is reachable
    /// - [`FlatpackError::ResourceExhaustion`] if buffer growth fails
    /// - [`FlatpackError::IdentityConflict`] on a dup-table invariant breach
    pub fn pack(
        heap: &mut Heap,
        types: &TypeTable,
        proxies: &dyn ProxyHandler,
        root: ObjRef,
    ) -> Result<Vec<u8>> {
        let mut env = Envelope {
            heap,
            types,
            proxies,
            buffer: SmartBuffer::new()?,
            dups: DupTable::new(),
            pending: PendingWorklist::new(),
            saves: SaveSet::new(),
        };

        // The sentinel claims offset 0 and is never registered in the dup
        // table, so 0 stays free to mean "null reference".
        env.buffer.append(&SentinelHeader::to_bytes())?;

        let root_offset = env.copy_object(root)?;
        env.dups.associate(root, root_offset)?;
        env.flatten_slots(root_offset)?;

        // Drain deferred objects. The worklist carries offsets, not
        // pointers: the buffer may have moved since an entry was pushed.
        while let Some(offset) = env.pending.pop() {
            env.flatten_slots(offset)?;
        }

        debug!(
            objects = env.dups.len(),
            proxies = env.saves.len(),
            bytes = env.buffer.trimmed_len(),
            "pack complete"
        );
        Ok(env.buffer.into_bytes())
    }

    /// Resolves one reference to the offset of the target's copy.
    ///
    /// A dup-table hit reuses the already-assigned offset; this is what
    /// encodes "two fields alias one object" as "two slots hold the same
    /// offset". A miss copies the target (or its proxy stand-in), registers
    /// the assignment, and defers the target's own slots to the worklist.
    fn flatten_reference(&mut self, target: ObjRef) -> Result<BufOffset> {
        if let Some(offset) = self.dups.lookup(target) {
            return Ok(offset);
        }

        let descriptor = self.heap.descriptor_of(self.types, target)?;
        let offset = if descriptor.proxied {
            let stand_in = self.proxies.make_proxy(self.heap, target)?;
            // The stand-in is reachable from nothing but this envelope;
            // protect it until the pack call returns.
            self.saves.protect(stand_in);
            self.copy_object(stand_in)?
        } else {
            self.copy_object(target)?
        };

        self.dups.associate(target, offset)?;
        self.pending.push(offset);
        Ok(offset)
    }

    /// Appends a raw copy of `obj` to the buffer and returns its offset.
    ///
    /// Reference slots are written in a transient live encoding (resolved
    /// later by [`Self::flatten_slots`]). For a dynamic class the descriptor
    /// object is flattened immediately (descriptors are graph nodes) and
    /// its offset patched into the header; for a primitive class the stable
    /// numeric tag is stored instead, so the receiver can restore the
    /// descriptor by table lookup.
    fn copy_object(&mut self, obj: ObjRef) -> Result<BufOffset> {
        let descriptor = self.heap.descriptor_of(self.types, obj)?;
        if descriptor.transient {
            return Err(FlatpackError::Protocol(format!(
                "Kind '{}' is transient; object {obj} cannot be serialized",
                descriptor.name
            )));
        }

        let object = self.heap.get(obj)?;
        let class = object.class;
        if object.refs.len() > u16::MAX as usize {
            return Err(FlatpackError::Protocol(format!(
                "Object {obj} has too many reference fields to pack"
            )));
        }
        if object.data.len() > u32::MAX as usize {
            return Err(FlatpackError::Protocol(format!(
                "Object {obj} has too large a payload to pack"
            )));
        }

        let type_code = match class {
            ClassRef::Primitive(tag) => tag.as_u32(),
            ClassRef::Dynamic(_) => DYNAMIC_CLASS,
        };
        let header = PackedHeader {
            total_size: object.packed_size() as u32,
            type_code,
            desc: BufOffset::NULL,
            flags: PackedFlags::new(
                descriptor.hashed,
                class == ClassRef::Primitive(TypeTag::PROXY),
            ),
            ref_count: object.refs.len() as u16,
            data_len: object.data.len() as u32,
        };

        let mut bytes = Vec::with_capacity(object.packed_size());
        bytes.extend_from_slice(&header.to_bytes());
        for slot in &object.refs {
            bytes.extend_from_slice(&encode_live(*slot).to_le_bytes());
        }
        bytes.extend_from_slice(&object.data);

        let offset = self.buffer.append(&bytes)?;
        trace!(object = %obj, %offset, size = bytes.len(), "copied object");

        if let ClassRef::Dynamic(desc_ref) = class {
            let desc_offset = self.flatten_reference(desc_ref)?;
            // flatten_reference may have grown the buffer; patch through
            // the offset, which growth cannot invalidate.
            self.buffer.write_u64(
                offset.as_usize() + PackedHeader::DESC_FIELD,
                desc_offset.as_u64(),
            )?;
        }
        Ok(offset)
    }

    /// Walks the reference slots of the packed object at `offset`,
    /// replacing each live reference with the offset of the target's copy.
    fn flatten_slots(&mut self, offset: BufOffset) -> Result<()> {
        let header = PackedHeader::from_bytes(self.buffer.bytes_at(offset)?)?;
        for index in 0..header.ref_count as usize {
            let position = PackedHeader::slot_position(offset, index);
            let raw = self.buffer.read_u64(position)?;
            let value = match decode_live(raw)? {
                None => BufOffset::NULL,
                Some(target) => self.flatten_reference(target)?,
            };
            // The position is recomputed from the offset because
            // flatten_reference can grow the buffer.
            self.buffer
                .write_u64(PackedHeader::slot_position(offset, index), value.as_u64())?;
        }
        Ok(())
    }

    /// Reconstructs live objects from a previously flattened byte range.
    ///
    /// Two linear passes: the first walks object-by-object by self-reported
    /// size, validating the sentinel, header arithmetic and type tags, and
    /// materializes one arena object per packed object; the second resolves
    /// every reference slot to the target's new identity and runs the
    /// liveness hooks. Hash collections are rehashed after both passes.
    /// Returns the object originally packed as the root.
    ///
    /// ## Errors
    ///
    /// Any truncated, inconsistent or unresolvable input fails with
    /// [`FlatpackError::Protocol`]; the caller must discard the whole byte
    /// range. Objects already allocated into `heap` by a failed puff are
    /// garbage for the external collector; no partial graph is returned.
    pub fn puff(
        heap: &mut Heap,
        types: &TypeTable,
        proxies: &dyn ProxyHandler,
        bytes: &[u8],
    ) -> Result<ObjRef> {
        SentinelHeader::validate(bytes)?;

        // Pass 1: structural fix-up. Rebuild each object and bind classes.
        let mut offsets: FxHashMap<u64, ObjRef> = FxHashMap::default();
        let mut order: Vec<(BufOffset, ObjRef, PackedHeader)> = Vec::new();
        let mut cursor = SentinelHeader::SIZE;
        while cursor < bytes.len() {
            let header = PackedHeader::from_bytes(&bytes[cursor..])?;
            let total = header.total_size as usize;
            if cursor + total > bytes.len() {
                return Err(FlatpackError::Protocol(format!(
                    "Truncated buffer: object at {cursor} overruns the byte range"
                )));
            }

            let class = if header.type_code == DYNAMIC_CLASS {
                // Placeholder; bound below once every offset is known (the
                // descriptor may sit before or after its instances).
                ClassRef::Primitive(TypeTag::DESCRIPTOR)
            } else if header.type_code == SentinelHeader::TYPE_CODE {
                return Err(FlatpackError::Protocol(format!(
                    "Sentinel tag on a non-sentinel object at {cursor}"
                )));
            } else {
                let tag = TypeTag::new(header.type_code);
                types.resolve_required(tag)?;
                ClassRef::Primitive(tag)
            };

            let data_start =
                cursor + PackedHeader::SIZE + header.ref_count as usize * PackedHeader::SLOT_SIZE;
            let object = heap.alloc(HeapObject {
                class,
                refs: vec![None; header.ref_count as usize],
                data: bytes[data_start..cursor + total].to_vec(),
            });
            offsets.insert(cursor as u64, object);
            order.push((BufOffset::new(cursor as u64), object, header));
            cursor += total;
        }

        let root = match order.first() {
            Some((_, root, _)) => *root,
            None => {
                return Err(FlatpackError::Protocol(
                    "Buffer contains no objects after the sentinel".into(),
                ))
            }
        };

        for (offset, object, header) in &order {
            if header.type_code != DYNAMIC_CLASS {
                continue;
            }
            let desc = offsets.get(&header.desc.as_u64()).ok_or_else(|| {
                FlatpackError::Protocol(format!(
                    "Object at {offset} names descriptor {}, which is not an object boundary",
                    header.desc
                ))
            })?;
            heap.get_mut(*object)?.class = ClassRef::Dynamic(*desc);
            // Fails here, not later, if the descriptor payload is garbage.
            heap.descriptor_of(types, *object)?;
        }

        // Pass 2: reference fix-up and liveness hooks.
        let mut registry = RehashRegistry::new();
        for (offset, object, header) in &order {
            for index in 0..header.ref_count as usize {
                let position = PackedHeader::slot_position(*offset, index);
                let raw = u64::from_le_bytes(
                    bytes[position..position + PackedHeader::SLOT_SIZE]
                        .try_into()
                        .unwrap_or([0; 8]),
                );
                heap.get_mut(*object)?.refs[index] = if raw == 0 {
                    None
                } else {
                    Some(*offsets.get(&raw).ok_or_else(|| {
                        FlatpackError::Protocol(format!(
                            "Slot {index} of object at {offset} holds {raw}, \
                             which is not an object boundary"
                        ))
                    })?)
                };
            }

            if header.flags.is_proxy() {
                // In-place replacement keeps the identity every resolved
                // slot already points at.
                let key = heap.get(*object)?.data.clone();
                let live = proxies.resolve_proxy(heap, &key)?;
                heap.replace(*object, live)?;
                trace!(object = %object, "resolved proxy stand-in");
            }
            if header.flags.is_hashed() {
                registry.register(*object);
            }
        }

        let rehashed = registry.len();
        for table in registry.drain() {
            hashtab::rehash(heap, table)?;
        }

        debug!(
            objects = order.len(),
            rehashed,
            bytes = bytes.len(),
            "puff complete"
        );
        Ok(root)
    }
}

/// Transient in-buffer encoding of a still-live reference slot: 0 for null,
/// identity + 1 otherwise. Replaced by a real offset during slot fix-up.
fn encode_live(slot: Option<ObjRef>) -> u64 {
    match slot {
        None => 0,
        Some(target) => u64::from(target.as_u32()) + 1,
    }
}

/// Decodes the transient live encoding written by [`encode_live`].
fn decode_live(raw: u64) -> Result<Option<ObjRef>> {
    if raw == 0 {
        return Ok(None);
    }
    let index = raw - 1;
    u32::try_from(index)
        .map(|index| Some(ObjRef::new(index)))
        .map_err(|_| FlatpackError::Internal(format!("Live slot encoding {raw} out of range")))
}
