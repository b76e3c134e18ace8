#![allow(missing_docs)]

//! Buffer and table behavior: growth policy, offset stability, dup-table
//! invariants, worklist termination.

use flatpack::buffer::{GrowableBuffer, SmartBuffer};
use flatpack::format::BufOffset;
use flatpack::tables::{DupTable, GcGuard, PendingWorklist, RehashRegistry, SaveSet};
use flatpack::{FlatpackError, Heap, Result};

#[test]
fn test_append_returns_sequential_offsets() -> Result<()> {
    let mut buffer = SmartBuffer::new()?;
    let first = buffer.append(b"hello")?;
    let second = buffer.append(b"world")?;
    assert_eq!(first.as_u64(), 0);
    assert_eq!(second.as_u64(), 5);
    assert_eq!(buffer.trimmed_len(), 10);
    Ok(())
}

#[test]
fn test_growth_preserves_contents_and_offsets() -> Result<()> {
    let mut buffer = SmartBuffer::with_capacity(16)?;
    let mut offsets = Vec::new();
    for i in 0..256u32 {
        // 64 bytes per append forces repeated growth past any initial cap.
        let chunk = [i as u8; 64];
        offsets.push((buffer.append(&chunk)?, i as u8));
    }
    for (offset, marker) in offsets {
        let bytes = buffer.bytes_at(offset)?;
        assert!(bytes[..64].iter().all(|b| *b == marker));
    }
    assert_eq!(buffer.trimmed_len(), 256 * 64);
    Ok(())
}

#[test]
fn test_positional_read_write() -> Result<()> {
    let mut buffer = SmartBuffer::new()?;
    buffer.append(&[0u8; 32])?;
    buffer.write_u64(8, 0xDEAD_BEEF)?;
    assert_eq!(buffer.read_u64(8)?, 0xDEAD_BEEF);
    assert!(buffer.read_u64(30).is_err());
    assert!(buffer.write_u64(25, 1).is_err());
    Ok(())
}

#[test]
fn test_raw_buffer_refuses_append_past_capacity() -> Result<()> {
    let mut raw = GrowableBuffer::with_capacity(8)?;
    raw.append(&[1u8; 8])?;
    assert!(matches!(
        raw.append(&[2u8; 1]),
        Err(FlatpackError::Internal(_))
    ));
    raw.grow_to(16)?;
    let offset = raw.append(&[2u8; 8])?;
    assert_eq!(offset.as_u64(), 8);
    assert_eq!(raw.len(), 16);
    Ok(())
}

#[test]
fn test_into_bytes_is_trimmed() -> Result<()> {
    let mut buffer = SmartBuffer::with_capacity(64)?;
    buffer.append(b"abc")?;
    let bytes = buffer.into_bytes();
    assert_eq!(bytes, b"abc");
    Ok(())
}

#[test]
fn test_dup_table_invariants() -> Result<()> {
    let mut heap = Heap::new();
    let a = heap.alloc_with(flatpack::TypeTag::new(10), vec![], vec![]);

    let mut dups = DupTable::new();
    assert_eq!(dups.lookup(a), None);

    dups.associate(a, BufOffset::new(30))?;
    assert_eq!(dups.lookup(a), Some(BufOffset::new(30)));

    // Re-associating the same pair is harmless.
    dups.associate(a, BufOffset::new(30))?;
    assert_eq!(dups.len(), 1);

    // A different offset for the same object is a conflict.
    assert!(matches!(
        dups.associate(a, BufOffset::new(60)),
        Err(FlatpackError::IdentityConflict(_))
    ));
    Ok(())
}

#[test]
fn test_worklist_drains_to_sentinel() {
    let mut pending = PendingWorklist::new();
    pending.push(BufOffset::new(30));
    pending.push(BufOffset::new(70));
    assert_eq!(pending.len(), 2);

    // LIFO order, then the sentinel terminates draining.
    assert_eq!(pending.pop(), Some(BufOffset::new(70)));
    assert_eq!(pending.pop(), Some(BufOffset::new(30)));
    assert_eq!(pending.pop(), None);
    assert_eq!(pending.pop(), None, "a drained worklist stays drained");
}

#[test]
fn test_save_set_protects_identities() {
    let mut heap = Heap::new();
    let a = heap.alloc_with(flatpack::TypeTag::new(10), vec![], vec![]);
    let b = heap.alloc_with(flatpack::TypeTag::new(10), vec![], vec![]);

    let mut saves = SaveSet::new();
    saves.protect(a);
    saves.protect(a);
    assert!(saves.contains(a));
    assert!(!saves.contains(b));
    assert_eq!(saves.len(), 1);
}

#[test]
fn test_rehash_registry_deduplicates_in_order() {
    let mut heap = Heap::new();
    let a = heap.alloc_with(flatpack::TypeTag::new(10), vec![], vec![]);
    let b = heap.alloc_with(flatpack::TypeTag::new(10), vec![], vec![]);

    let mut registry = RehashRegistry::new();
    registry.register(a);
    registry.register(b);
    registry.register(a);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.drain(), vec![a, b]);
    assert!(registry.is_empty());
}
