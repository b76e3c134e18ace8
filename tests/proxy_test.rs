#![allow(missing_docs)]

//! Proxy substitution: host-resource kinds travel as stand-ins and come back
//! as live equivalents.

use flatpack::proxy::proxy_object;
use flatpack::{
    ClassRef, Flatpack, FlatpackError, Heap, HeapObject, NoProxies, ObjRef, ProxyHandler, Result,
    TypeDescriptor, TypeTable, TypeTag,
};

const PAIR: TypeTag = TypeTag::new(10);
const HANDLE: TypeTag = TypeTag::new(20);

fn fixture_types() -> TypeTable {
    let mut types = TypeTable::new();
    types
        .register(PAIR, TypeDescriptor::plain("pair"))
        .expect("register pair");
    let handle = TypeDescriptor {
        name: "handle".to_string(),
        transient: false,
        proxied: true,
        hashed: false,
    };
    types.register(HANDLE, handle).expect("register handle");
    types
}

/// A bridge that serializes handles as their resource key and revives them
/// by "reopening" the resource on the receiving side.
#[derive(Debug)]
struct HandleBridge;

impl ProxyHandler for HandleBridge {
    fn make_proxy(&self, heap: &mut Heap, original: ObjRef) -> Result<ObjRef> {
        // The key is the only reconstructible part of a handle.
        let key = heap.get(original)?.data.clone();
        Ok(heap.alloc(proxy_object(&key)))
    }

    fn resolve_proxy(&self, _heap: &mut Heap, key: &[u8]) -> Result<HeapObject> {
        let mut revived = HeapObject::new(ClassRef::Primitive(HANDLE));
        revived.data = key.to_vec();
        Ok(revived)
    }
}

#[test]
fn test_proxy_round_trip() -> Result<()> {
    let types = fixture_types();
    let mut heap = Heap::new();
    let handle = heap.alloc_with(HANDLE, vec![], b"resource-17".to_vec());
    let root = heap.alloc_with(PAIR, vec![Some(handle), Some(handle)], vec![]);

    let bytes = Flatpack::pack_with(&mut heap, &types, &HandleBridge, root)?;

    let mut revived = Heap::new();
    let root = Flatpack::puff_with(&mut revived, &types, &HandleBridge, &bytes)?;
    let fields = revived.get(root)?.refs.clone();

    // Both aliases resolve to one live equivalent of the handle kind.
    assert_eq!(fields[0], fields[1]);
    let handle = fields[0].expect("handle field");
    let revived_handle = revived.get(handle)?;
    assert_eq!(revived_handle.class, ClassRef::Primitive(HANDLE));
    assert_eq!(revived_handle.data, b"resource-17");
    Ok(())
}

/// The proxied kind never appears in the buffer; only the stand-in does.
#[test]
fn test_proxied_kind_packs_as_stand_in() -> Result<()> {
    let types = fixture_types();
    let mut heap = Heap::new();
    let handle = heap.alloc_with(HANDLE, vec![], b"k".to_vec());
    let root = heap.alloc_with(PAIR, vec![Some(handle)], vec![]);

    let bytes = Flatpack::pack_with(&mut heap, &types, &HandleBridge, root)?;

    // Without a handler the receiving side must reject the stand-in.
    let mut revived = Heap::new();
    let err = Flatpack::puff(&mut revived, &types, &bytes)
        .expect_err("stand-in must not survive without a handler");
    assert!(matches!(err, FlatpackError::Protocol(_)));
    Ok(())
}

#[test]
fn test_proxied_kind_without_handler_fails_pack() {
    let types = fixture_types();
    let mut heap = Heap::new();
    let handle = heap.alloc_with(HANDLE, vec![], b"k".to_vec());
    let root = heap.alloc_with(PAIR, vec![Some(handle)], vec![]);

    let err = Flatpack::pack(&mut heap, &types, root).expect_err("NoProxies must refuse");
    assert!(matches!(err, FlatpackError::Protocol(_)));
    let _ = NoProxies; // the default handler is what Flatpack::pack used
}

/// Two buffers carrying the same resource key resolve independently; the
/// handler contract is idempotence with respect to the resource, not the
/// object.
#[test]
fn test_proxy_resolution_is_repeatable() -> Result<()> {
    let types = fixture_types();
    let mut heap = Heap::new();
    let handle = heap.alloc_with(HANDLE, vec![], b"shared".to_vec());
    let root = heap.alloc_with(PAIR, vec![Some(handle)], vec![]);
    let bytes = Flatpack::pack_with(&mut heap, &types, &HandleBridge, root)?;

    let mut revived = Heap::new();
    let first = Flatpack::puff_with(&mut revived, &types, &HandleBridge, &bytes)?;
    let second = Flatpack::puff_with(&mut revived, &types, &HandleBridge, &bytes)?;

    let h1 = revived.get(first)?.refs[0].expect("first handle");
    let h2 = revived.get(second)?.refs[0].expect("second handle");
    assert_eq!(revived.get(h1)?.data, revived.get(h2)?.data);
    Ok(())
}
