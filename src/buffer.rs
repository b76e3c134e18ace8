//! The output buffer: a raw growable byte store plus a smart wrapper that
//! owns the growth policy.
//!
//! Everything outside this module addresses the buffer through [`BufOffset`]
//! positions, never through cached slices or pointers. Any append can move
//! the backing store, so positional reads and writes recompute their location
//! from the offset on every access. That discipline is what makes
//! growth-triggered reallocation harmless.
//!
//! Allocation failure is a fatal resource-exhaustion condition: the pack in
//! progress is aborted and no partial buffer escapes.

use crate::error::{FlatpackError, Result};
use crate::format::BufOffset;

/// Floor for one growth step, so tiny appends do not trigger per-append
/// reallocation early in a pack.
const GROWTH_FLOOR: usize = 4 * 1024;

/// A byte store with an explicit logical capacity.
///
/// `append` copies bytes to the end of the logical region and returns the
/// offset at which they now live; it never grows on its own. Growth is an
/// explicit, fallible operation ([`GrowableBuffer::grow_to`]) so the owner
/// controls the policy and allocation failure surfaces as an error instead
/// of an abort.
#[derive(Debug)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl GrowableBuffer {
    /// Creates a buffer with the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|e| FlatpackError::ResourceExhaustion(format!("Buffer allocation: {e}")))?;
        Ok(Self { data, capacity })
    }

    /// Bytes actually used.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current logical capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows the logical capacity to at least `new_capacity`, reallocating
    /// the backing store (existing contents are preserved, their offsets
    /// unchanged).
    pub fn grow_to(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity <= self.capacity {
            return Ok(());
        }
        let additional = new_capacity - self.data.len();
        self.data
            .try_reserve_exact(additional)
            .map_err(|e| FlatpackError::ResourceExhaustion(format!("Buffer growth: {e}")))?;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Appends bytes within the reserved capacity and returns their offset.
    pub fn append(&mut self, bytes: &[u8]) -> Result<BufOffset> {
        if self.data.len() + bytes.len() > self.capacity {
            // The owner must grow first; hitting this is a driver bug.
            return Err(FlatpackError::Internal(
                "Append past reserved buffer capacity".into(),
            ));
        }
        let offset = BufOffset::new(self.data.len() as u64);
        self.data.extend_from_slice(bytes);
        Ok(offset)
    }

    /// The full used region.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer, yielding the used bytes trimmed to length.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.shrink_to_fit();
        self.data
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Owns a [`GrowableBuffer`] and grows it geometrically on overflow.
///
/// This is the buffer handle the envelope driver actually holds. Besides the
/// growth policy it provides the positional accessors used during slot
/// fix-up; all of them take offsets and bounds-check on every call.
#[derive(Debug)]
pub struct SmartBuffer {
    inner: GrowableBuffer,
}

impl SmartBuffer {
    /// Creates a buffer with the default initial capacity.
    pub fn new() -> Result<Self> {
        Self::with_capacity(crate::constants::DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates a buffer with a specific initial capacity.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            inner: GrowableBuffer::with_capacity(capacity.max(GROWTH_FLOOR))?,
        })
    }

    /// Appends bytes, growing the backing store first if needed, and returns
    /// the offset at which they now live.
    ///
    /// Growth doubles the capacity (with a floor of the requested size), so
    /// appends stay amortized O(1) over a whole pack.
    pub fn append(&mut self, bytes: &[u8]) -> Result<BufOffset> {
        let needed = self.inner.len() + bytes.len();
        if needed > self.inner.capacity() {
            let doubled = self.inner.capacity().saturating_mul(2);
            self.inner.grow_to(doubled.max(needed + GROWTH_FLOOR))?;
        }
        self.inner.append(bytes)
    }

    /// Bytes actually used; this is the length handed to the transport.
    pub fn trimmed_len(&self) -> usize {
        self.inner.len()
    }

    /// Reads the packed bytes starting at `offset`.
    pub fn bytes_at(&self, offset: BufOffset) -> Result<&[u8]> {
        self.inner
            .as_slice()
            .get(offset.as_usize()..)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                FlatpackError::Internal(format!("Offset {offset} outside the packed region"))
            })
    }

    /// Reads a little-endian u64 at an absolute byte position.
    pub fn read_u64(&self, position: usize) -> Result<u64> {
        let bytes = self
            .inner
            .as_slice()
            .get(position..position + 8)
            .ok_or_else(|| {
                FlatpackError::Internal(format!("Read of 8 bytes at {position} out of bounds"))
            })?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap_or([0; 8])))
    }

    /// Writes a little-endian u64 at an absolute byte position.
    pub fn write_u64(&mut self, position: usize, value: u64) -> Result<()> {
        let slot = self
            .inner
            .as_mut_slice()
            .get_mut(position..position + 8)
            .ok_or_else(|| {
                FlatpackError::Internal(format!("Write of 8 bytes at {position} out of bounds"))
            })?;
        slot.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Consumes the buffer, yielding the packed bytes trimmed to the used
    /// length. This is the byte range the transport sends.
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_bytes()
    }
}
