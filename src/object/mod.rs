//! The in-process object model consumed by the envelope driver.
//!
//! This module defines the `Heap` arena, the `ObjRef` identity type, and the
//! class/descriptor machinery that ties objects to their serializable kinds.

/// Defines the `TypeTag`, `ClassRef`, `TypeDescriptor` and `TypeTable` types.
pub mod class;
/// Defines the `Heap` arena and `HeapObject` structure.
pub mod heap;
/// Defines the `ObjRef` identity type.
pub mod id;

pub use class::{ClassRef, TypeDescriptor, TypeTable, TypeTag};
pub use heap::{Heap, HeapObject};
pub use id::ObjRef;
