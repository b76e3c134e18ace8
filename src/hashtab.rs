//! An identity-hashed table kind, and the rehash operation the envelope
//! driver runs after unflattening.
//!
//! ## Object layout
//!
//! A table object stores its entries in reference slots and its bucket index
//! in the scalar payload:
//!
//! - `refs`: `[key 0, value 0, key 1, value 1, ...]`
//! - `data`: `[bucket_count u32] [bucket_count * u32]`; each bucket holds a
//!   pair index + 1, with 0 meaning empty; collisions resolve by linear
//!   probing.
//!
//! ## Why rehash exists
//!
//! Bucket placement is derived from a hash of the key's *identity* and
//! payload. Identities are assigned anew when a buffer is unflattened, so a
//! freshly revived table's bucket index is stale: probes start from the wrong
//! bucket and lookups miss. Table kinds therefore carry the `hashed`
//! capability, which makes the envelope register them during the second
//! fix-up pass and call [`rehash`] once the whole graph is live.

use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::error::{FlatpackError, Result};
use crate::object::{Heap, ObjRef};

/// Minimum bucket count for a non-empty table.
const MIN_BUCKETS: usize = 8;

/// Hashes a key by identity and payload.
fn key_hash(heap: &Heap, key: ObjRef) -> Result<u64> {
    let object = heap.get(key)?;
    let mut hasher = FxHasher::default();
    hasher.write_u32(key.as_u32());
    hasher.write(&object.data);
    Ok(hasher.finish())
}

/// Decodes the bucket index from a table's payload.
fn read_buckets(data: &[u8]) -> Result<Vec<u32>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 4 {
        return Err(FlatpackError::Protocol(
            "Hash table payload too small for bucket count".into(),
        ));
    }
    let count = u32::from_le_bytes(data[0..4].try_into().unwrap_or([0; 4])) as usize;
    if data.len() != 4 + count * 4 {
        return Err(FlatpackError::Protocol(
            "Hash table payload does not match its bucket count".into(),
        ));
    }
    let mut buckets = Vec::with_capacity(count);
    for i in 0..count {
        let start = 4 + i * 4;
        buckets.push(u32::from_le_bytes(
            data[start..start + 4].try_into().unwrap_or([0; 4]),
        ));
    }
    Ok(buckets)
}

/// Encodes a bucket index into a table payload.
fn write_buckets(buckets: &[u32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + buckets.len() * 4);
    data.extend_from_slice(&(buckets.len() as u32).to_le_bytes());
    for bucket in buckets {
        data.extend_from_slice(&bucket.to_le_bytes());
    }
    data
}

/// Rebuilds the bucket index of `table` from its entry slots.
///
/// Idempotent; this is the "internal rehash-buckets operation" the envelope
/// invokes for every collection in the rehash registry.
pub fn rehash(heap: &mut Heap, table: ObjRef) -> Result<()> {
    let pairs = heap.get(table)?.refs.len() / 2;
    let bucket_count = if pairs == 0 {
        0
    } else {
        (pairs * 4).next_power_of_two().max(MIN_BUCKETS)
    };
    let mut buckets = vec![0u32; bucket_count];
    for pair in 0..pairs {
        let key = entry_key(heap, table, pair)?;
        let hash = key_hash(heap, key)?;
        place(&mut buckets, hash, pair as u32)?;
    }
    heap.get_mut(table)?.data = write_buckets(&buckets);
    Ok(())
}

/// Inserts or replaces a key/value pair.
pub fn insert(heap: &mut Heap, table: ObjRef, key: ObjRef, value: ObjRef) -> Result<()> {
    // Replace in place if the identical key is already present.
    if let Some(pair) = probe(heap, table, key)? {
        heap.get_mut(table)?.refs[pair * 2 + 1] = Some(value);
        return Ok(());
    }
    let object = heap.get_mut(table)?;
    object.refs.push(Some(key));
    object.refs.push(Some(value));
    // Rebuilding on every insert keeps the index trivially consistent; table
    // sizes in envelope traffic are small.
    rehash(heap, table)
}

/// Looks up the value stored under `key`, by identity.
///
/// A stale bucket index (a table that has been unflattened but not yet
/// rehashed) makes lookups unreliable; callers go through the envelope,
/// which rehashes before handing the graph back.
pub fn get(heap: &Heap, table: ObjRef, key: ObjRef) -> Result<Option<ObjRef>> {
    match probe(heap, table, key)? {
        Some(pair) => Ok(heap.get(table)?.refs[pair * 2 + 1]),
        None => Ok(None),
    }
}

/// Number of entries in the table.
pub fn len(heap: &Heap, table: ObjRef) -> Result<usize> {
    Ok(heap.get(table)?.refs.len() / 2)
}

/// Probes the bucket index for `key`, returning its pair index.
fn probe(heap: &Heap, table: ObjRef, key: ObjRef) -> Result<Option<usize>> {
    let object = heap.get(table)?;
    let buckets = read_buckets(&object.data)?;
    if buckets.is_empty() {
        return Ok(None);
    }
    let hash = key_hash(heap, key)?;
    let mask = buckets.len() - 1;
    let mut slot = (hash as usize) & mask;
    for _ in 0..buckets.len() {
        match buckets[slot] {
            0 => return Ok(None),
            entry => {
                let pair = (entry - 1) as usize;
                if entry_key(heap, table, pair)? == key {
                    return Ok(Some(pair));
                }
            }
        }
        slot = (slot + 1) & mask;
    }
    Ok(None)
}

/// Places a pair index into the bucket array by linear probing.
fn place(buckets: &mut [u32], hash: u64, pair: u32) -> Result<()> {
    let mask = buckets.len() - 1;
    let mut slot = (hash as usize) & mask;
    for _ in 0..buckets.len() {
        if buckets[slot] == 0 {
            buckets[slot] = pair + 1;
            return Ok(());
        }
        slot = (slot + 1) & mask;
    }
    Err(FlatpackError::Internal(
        "Hash table bucket array full during rehash".into(),
    ))
}

/// Reads the key of pair `pair`, which must be non-null.
fn entry_key(heap: &Heap, table: ObjRef, pair: usize) -> Result<ObjRef> {
    heap.get(table)?
        .refs
        .get(pair * 2)
        .copied()
        .flatten()
        .ok_or_else(|| {
            FlatpackError::Protocol(format!("Hash table {table} has a null key at pair {pair}"))
        })
}
