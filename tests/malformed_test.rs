#![allow(missing_docs)]

//! Malformed-input rejection: truncation, corruption, unknown tags, and
//! protocol misuse must all fail loudly, never yield a corrupt graph.

use flatpack::format::{PackedHeader, SentinelHeader};
use flatpack::{Flatpack, FlatpackError, Heap, Result, TypeDescriptor, TypeTable, TypeTag};

const PAIR: TypeTag = TypeTag::new(10);
const LEAF: TypeTag = TypeTag::new(11);
const GHOST: TypeTag = TypeTag::new(30);

fn fixture_types() -> TypeTable {
    let mut types = TypeTable::new();
    types
        .register(PAIR, TypeDescriptor::plain("pair"))
        .expect("register pair");
    types
        .register(LEAF, TypeDescriptor::plain("leaf"))
        .expect("register leaf");
    types
}

fn packed_fixture(types: &TypeTable) -> Vec<u8> {
    let mut heap = Heap::new();
    let leaf = heap.alloc_with(LEAF, vec![], vec![42]);
    let root = heap.alloc_with(PAIR, vec![Some(leaf), Some(leaf)], vec![]);
    Flatpack::pack(&mut heap, types, root).expect("fixture pack")
}

fn expect_protocol(result: Result<flatpack::ObjRef>) {
    match result {
        Err(FlatpackError::Protocol(_)) => {}
        Err(other) => panic!("expected a protocol violation, got {other}"),
        Ok(_) => panic!("malformed input was accepted"),
    }
}

#[test]
fn test_truncation_at_many_lengths() {
    let types = fixture_types();
    let bytes = packed_fixture(&types);

    // Drop 1..=N trailing bytes; every prefix must be rejected, whether the
    // cut lands mid-object or exactly on an object boundary (which leaves a
    // dangling slot offset behind).
    for drop in 1..=bytes.len() {
        let mut heap = Heap::new();
        let truncated = &bytes[..bytes.len() - drop];
        expect_protocol(Flatpack::puff(&mut heap, &types, truncated));
    }
}

#[test]
fn test_empty_input() {
    let types = fixture_types();
    let mut heap = Heap::new();
    expect_protocol(Flatpack::puff(&mut heap, &types, &[]));
}

#[test]
fn test_bad_magic() {
    let types = fixture_types();
    let mut bytes = packed_fixture(&types);
    bytes[PackedHeader::SIZE] ^= 0xFF; // first magic byte of the sentinel payload
    let mut heap = Heap::new();
    expect_protocol(Flatpack::puff(&mut heap, &types, &bytes));
}

#[test]
fn test_bad_version() {
    let types = fixture_types();
    let mut bytes = packed_fixture(&types);
    bytes[PackedHeader::SIZE + 4] = 0xEE; // version field of the sentinel payload
    let mut heap = Heap::new();
    expect_protocol(Flatpack::puff(&mut heap, &types, &bytes));
}

#[test]
fn test_inconsistent_header_arithmetic() {
    let types = fixture_types();
    let mut bytes = packed_fixture(&types);
    // Corrupt the root object's declared total size.
    bytes[SentinelHeader::SIZE] ^= 0x0F;
    let mut heap = Heap::new();
    expect_protocol(Flatpack::puff(&mut heap, &types, &bytes));
}

#[test]
fn test_dangling_slot_offset() {
    let types = fixture_types();
    let mut bytes = packed_fixture(&types);
    // Point the root's first slot at a byte position that is not an object
    // boundary.
    let slot0 = SentinelHeader::SIZE + PackedHeader::SIZE;
    bytes[slot0..slot0 + 8].copy_from_slice(&(SentinelHeader::SIZE as u64 + 3).to_le_bytes());
    let mut heap = Heap::new();
    expect_protocol(Flatpack::puff(&mut heap, &types, &bytes));
}

#[test]
fn test_unknown_tag_is_rejected() {
    let types = fixture_types();
    let bytes = packed_fixture(&types);

    // The receiver's registry is missing the kinds the sender used.
    let receiver_types = TypeTable::new();
    let mut heap = Heap::new();
    expect_protocol(Flatpack::puff(&mut heap, &receiver_types, &bytes));
}

#[test]
fn test_transient_kind_refuses_to_pack() {
    let mut types = fixture_types();
    let ghost = TypeDescriptor {
        name: "ghost".to_string(),
        transient: true,
        proxied: false,
        hashed: false,
    };
    types.register(GHOST, ghost).expect("register ghost");

    let mut heap = Heap::new();
    let ghost = heap.alloc_with(GHOST, vec![], vec![]);
    let root = heap.alloc_with(PAIR, vec![Some(ghost)], vec![]);

    match Flatpack::pack(&mut heap, &types, root) {
        Err(FlatpackError::Protocol(msg)) => assert!(msg.contains("transient")),
        other => panic!("expected a protocol violation, got {other:?}"),
    }

    // A transient root fails just the same.
    let lone = heap.alloc_with(GHOST, vec![], vec![]);
    assert!(matches!(
        Flatpack::pack(&mut heap, &types, lone),
        Err(FlatpackError::Protocol(_))
    ));
}

#[test]
fn test_sentinel_only_buffer_has_no_root() {
    let types = fixture_types();
    let bytes = SentinelHeader::to_bytes().to_vec();
    let mut heap = Heap::new();
    expect_protocol(Flatpack::puff(&mut heap, &types, &bytes));
}

#[test]
fn test_failed_puff_returns_no_partial_graph() {
    let types = fixture_types();
    let bytes = packed_fixture(&types);
    let truncated = &bytes[..bytes.len() - 1];

    let mut heap = Heap::new();
    assert!(Flatpack::puff(&mut heap, &types, truncated).is_err());
    // Whatever was allocated before the failure is unreachable garbage; a
    // subsequent puff of the intact buffer still works on the same heap.
    let root = Flatpack::puff(&mut heap, &types, &bytes).expect("intact buffer");
    let fields = heap.get(root).expect("root").refs.clone();
    assert_eq!(fields[0], fields[1]);
}
