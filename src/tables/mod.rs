//! Per-call bookkeeping tables for the envelope driver.
//!
//! Every pack or puff call gets fresh instances of these; none of them are
//! shared across threads or reused across calls.

/// Defines the `DupTable` (object identity → buffer offset).
pub mod dup;
/// Defines the `RehashRegistry` for hash collections found during puff.
pub mod rehash;
/// Defines the `SaveSet` and the `GcGuard` protection seam.
pub mod saveset;
/// Defines the `PendingWorklist` of offsets awaiting slot fix-up.
pub mod worklist;

pub use dup::DupTable;
pub use rehash::RehashRegistry;
pub use saveset::{GcGuard, SaveSet};
pub use worklist::PendingWorklist;
