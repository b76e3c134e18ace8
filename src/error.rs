//! Centralized error handling for Flatpack.
//!
//! All failure conditions are propagated through the `Result` type; the crate
//! enforces this with `#![deny(clippy::panic)]` and `#![deny(clippy::unwrap_used)]`.
//!
//! ## Error Categories
//!
//! Errors are categorized by their domain:
//!
//! - **Resource Exhaustion** ([`FlatpackError::ResourceExhaustion`]): buffer growth failed
//! - **Protocol Violations** ([`FlatpackError::Protocol`]): transient objects, bad tags,
//!   truncated or inconsistent buffers
//! - **Identity Conflicts** ([`FlatpackError::IdentityConflict`]): one object associated
//!   with two different offsets
//! - **Internal Errors** ([`FlatpackError::Internal`]): logic errors (should not occur
//!   in production)
//!
//! ## Propagation Policy
//!
//! Every error is unrecoverable for the current pack or puff call. There is no
//! partial-success mode and nothing is retried internally: a failed pack returns
//! no buffer, a failed puff leaves the caller's byte range unusable, and the
//! caller decides whether to redo the whole operation.
//!
//! ## Usage
//!
//! ```rust
//! use flatpack::FlatpackError;
//!
//! fn check(err: &FlatpackError) {
//!     match err {
//!         FlatpackError::Protocol(msg) => eprintln!("bad buffer: {msg}"),
//!         FlatpackError::ResourceExhaustion(msg) => eprintln!("out of memory: {msg}"),
//!         _ => eprintln!("other error"),
//!     }
//! }
//! ```

use std::fmt;

/// A specialized `Result` type for Flatpack operations.
///
/// Equivalent to `std::result::Result<T, FlatpackError>` and used throughout
/// the crate.
pub type Result<T> = std::result::Result<T, FlatpackError>;

/// The master error enum covering all failure domains in Flatpack.
///
/// Each variant corresponds to one entry of the error taxonomy and carries a
/// diagnostic message describing the concrete condition.
///
/// ## Cloneability
///
/// The type is `Clone` so errors can be stored for later analysis or carried
/// across the caller's own channel/transport boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatpackError {
    /// Buffer growth failed (out of memory).
    ///
    /// Fatal for the pack call in progress: no partial buffer is returned and
    /// the envelope's per-call state is discarded.
    ResourceExhaustion(String),

    /// The object graph or the byte buffer violates the flatten protocol.
    ///
    /// ## Common Causes
    ///
    /// - An object marked non-serializable (transient) reached `copy_object`
    /// - The sentinel header carries wrong magic bytes or an unknown version
    /// - A type tag does not resolve to any registered descriptor
    /// - The byte range is truncated, or an object's header arithmetic is
    ///   inconsistent with the bytes that follow it
    /// - A reference slot holds an offset that is not an object boundary
    Protocol(String),

    /// An object was associated with two different buffer offsets.
    ///
    /// Defensive: this cannot occur in correct per-call-scoped usage and
    /// indicates a bug in the caller's object model or in this crate.
    IdentityConflict(String),

    /// Logic error in the envelope driver or a supporting table.
    ///
    /// This should not occur in production. If you encounter it, please
    /// report it with a minimal reproduction case.
    Internal(String),
}

impl fmt::Display for FlatpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhaustion(s) => write!(f, "Resource Exhaustion: {s}"),
            Self::Protocol(s) => write!(f, "Protocol Violation: {s}"),
            Self::IdentityConflict(s) => write!(f, "Identity Conflict: {s}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for FlatpackError {}
