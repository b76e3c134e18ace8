//! Defines the physical binary layout of a flattened buffer.
//!
//! # Layout Strategy
//! A flattened buffer is a contiguous sequence of packed objects with a
//! sentinel header at offset 0:
//!
//! Buffer: `[Sentinel Header] [Object 0] [Object 1] ... [Object N]`
//!
//! The sentinel occupies offset 0 so that no real object can ever be assigned
//! offset 0. A reference slot holding 0 therefore unambiguously means "null".
//!
//! ## Packed Object Anatomy
//! Each object is self-describing:
//! `[ PackedHeader (24 bytes) ] [ Reference Slots (8 bytes each) ] [ Payload ]`
//!
//! The header carries the total size, so a reader can walk object-to-object
//! without any external index. All integers are little-endian.
//!
//! There is no framing, length prefix, or checksum here: the transport that
//! moves the buffer between processes owns those concerns and is expected to
//! deliver exactly the trimmed byte range before unflattening begins.

use crate::error::{FlatpackError, Result};

/// Magic bytes carried in the sentinel header payload: "FPK1".
pub const MAGIC_BYTES: [u8; 4] = *b"FPK1";

/// Version of the wire layout. Bumped on any incompatible header change.
pub const FORMAT_VERSION: u16 = 1;

/// Marker value in the `type_code` field meaning "my type descriptor is
/// itself a flattened object; see the `desc` field for its offset".
pub const DYNAMIC_CLASS: u32 = u32::MAX;

/// A position inside the flattened buffer.
///
/// Once packing begins this is the *only* valid cross-process identifier for
/// an object, never a raw address. Offset 0 is reserved for the sentinel
/// header and doubles as the null reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufOffset(u64);

impl BufOffset {
    /// The null reference: no object ever lives at offset 0.
    pub const NULL: BufOffset = BufOffset(0);

    /// Creates an offset from a raw byte position.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw byte position.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the raw byte position as a usize index.
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }

    /// Returns true if this is the null reference.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for BufOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Capability flags for a packed object, stored in the header's `flags` field.
///
/// The flags are copied from the object's type descriptor at pack time so the
/// receiving side can act on them during the fix-up passes without resolving
/// the descriptor first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedFlags(u16);

impl PackedFlags {
    const HASHED_MASK: u16 = 0b0000_0001; // Bit 0
    const PROXY_MASK: u16 = 0b0000_0010; // Bit 1

    /// Creates a new flag set.
    pub fn new(hashed: bool, proxy: bool) -> Self {
        let mut bits = 0;
        if hashed {
            bits |= Self::HASHED_MASK;
        }
        if proxy {
            bits |= Self::PROXY_MASK;
        }
        Self(bits)
    }

    /// Decodes the raw field.
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns true if the object is a hash-based collection that must be
    /// re-bucketed after unflattening.
    pub fn is_hashed(&self) -> bool {
        (self.0 & Self::HASHED_MASK) != 0
    }

    /// Returns true if the object is a proxy stand-in that must be resolved
    /// to a live equivalent on the receiving side.
    pub fn is_proxy(&self) -> bool {
        (self.0 & Self::PROXY_MASK) != 0
    }

    /// Returns the raw field representation.
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

/// The fixed-size header prefixed to every packed object.
///
/// The reference slots that follow the header hold either 0 (null) or the
/// [`BufOffset`] of another packed object in the same buffer; two slots
/// holding the same offset is how structural sharing survives the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedHeader {
    /// Total packed size of the object: header + slots + payload.
    pub total_size: u32,
    /// Registered primitive type tag, or [`DYNAMIC_CLASS`].
    pub type_code: u32,
    /// Offset of the flattened type descriptor when `type_code` is
    /// [`DYNAMIC_CLASS`]; [`BufOffset::NULL`] otherwise.
    pub desc: BufOffset,
    /// Capability flags copied from the type descriptor.
    pub flags: PackedFlags,
    /// Number of 8-byte reference slots following the header.
    pub ref_count: u16,
    /// Number of scalar payload bytes following the reference slots.
    pub data_len: u32,
}

impl PackedHeader {
    /// The size in bytes of a serialized header.
    /// Size(4) + TypeCode(4) + Desc(8) + Flags(2) + RefCount(2) + DataLen(4) = 24
    pub const SIZE: usize = 24;

    /// The size in bytes of one reference slot.
    pub const SLOT_SIZE: usize = 8;

    /// Byte offset of the `desc` field within a serialized header, used to
    /// patch the descriptor offset after the descriptor itself is flattened.
    pub const DESC_FIELD: usize = 8;

    /// Computes the total packed size for an object with the given shape.
    pub fn packed_size(ref_count: usize, data_len: usize) -> usize {
        Self::SIZE + ref_count * Self::SLOT_SIZE + data_len
    }

    /// Returns the buffer position of reference slot `index` for an object
    /// packed at `base`.
    pub fn slot_position(base: BufOffset, index: usize) -> usize {
        base.as_usize() + Self::SIZE + index * Self::SLOT_SIZE
    }

    /// Serializes to a fixed-size byte array (Little Endian).
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.total_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.type_code.to_le_bytes());
        buf[8..16].copy_from_slice(&self.desc.as_u64().to_le_bytes());
        buf[16..18].copy_from_slice(&self.flags.as_u16().to_le_bytes());
        buf[18..20].copy_from_slice(&self.ref_count.to_le_bytes());
        buf[20..24].copy_from_slice(&self.data_len.to_le_bytes());
        buf
    }

    /// Deserializes from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(FlatpackError::Protocol(
                "Buffer too small for PackedHeader".into(),
            ));
        }
        let total_size = u32::from_le_bytes(bytes[0..4].try_into().unwrap_or([0; 4]));
        let type_code = u32::from_le_bytes(bytes[4..8].try_into().unwrap_or([0; 4]));
        let desc = u64::from_le_bytes(bytes[8..16].try_into().unwrap_or([0; 8]));
        let flags = u16::from_le_bytes(bytes[16..18].try_into().unwrap_or([0; 2]));
        let ref_count = u16::from_le_bytes(bytes[18..20].try_into().unwrap_or([0; 2]));
        let data_len = u32::from_le_bytes(bytes[20..24].try_into().unwrap_or([0; 4]));

        let header = Self {
            total_size,
            type_code,
            desc: BufOffset::new(desc),
            flags: PackedFlags::from_bits(flags),
            ref_count,
            data_len,
        };
        header.check_arithmetic()?;
        Ok(header)
    }

    /// Validates that the declared total size matches the declared shape.
    ///
    /// An inconsistent header means the buffer is corrupt; the whole byte
    /// range must be discarded.
    fn check_arithmetic(&self) -> Result<()> {
        let expected = Self::packed_size(self.ref_count as usize, self.data_len as usize);
        if self.total_size as usize != expected {
            return Err(FlatpackError::Protocol(format!(
                "Header size {} does not match shape (refs={}, data={}, expected {})",
                self.total_size, self.ref_count, self.data_len, expected
            )));
        }
        Ok(())
    }
}

/// The sentinel header object occupying offset 0.
///
/// A degenerate packed object whose payload carries the magic bytes and the
/// format version. It is never registered in the dup table, so it can never
/// alias a user object.
#[derive(Debug, Clone, Copy)]
pub struct SentinelHeader;

impl SentinelHeader {
    /// Payload size: Magic(4) + Version(2).
    pub const PAYLOAD_SIZE: usize = 6;

    /// Total packed size of the sentinel, which is also the offset of the
    /// first real object (the root).
    pub const SIZE: usize = PackedHeader::SIZE + Self::PAYLOAD_SIZE;

    /// Type code reserved for the sentinel.
    pub const TYPE_CODE: u32 = 0;

    /// Serializes the sentinel to bytes.
    pub fn to_bytes() -> [u8; Self::SIZE] {
        let header = PackedHeader {
            total_size: Self::SIZE as u32,
            type_code: Self::TYPE_CODE,
            desc: BufOffset::NULL,
            flags: PackedFlags::default(),
            ref_count: 0,
            data_len: Self::PAYLOAD_SIZE as u32,
        };
        let mut buf = [0u8; Self::SIZE];
        buf[0..PackedHeader::SIZE].copy_from_slice(&header.to_bytes());
        buf[PackedHeader::SIZE..PackedHeader::SIZE + 4].copy_from_slice(&MAGIC_BYTES);
        buf[PackedHeader::SIZE + 4..].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf
    }

    /// Validates the sentinel at the start of a byte range.
    pub fn validate(bytes: &[u8]) -> Result<()> {
        if bytes.len() < Self::SIZE {
            return Err(FlatpackError::Protocol(
                "Buffer smaller than sentinel header".into(),
            ));
        }
        let header = PackedHeader::from_bytes(bytes)?;
        if header.type_code != Self::TYPE_CODE || header.ref_count != 0 {
            return Err(FlatpackError::Protocol(
                "Offset 0 does not hold a sentinel header".into(),
            ));
        }
        let payload = &bytes[PackedHeader::SIZE..Self::SIZE];
        if payload[0..4] != MAGIC_BYTES {
            return Err(FlatpackError::Protocol("Invalid Magic Bytes".into()));
        }
        let version = u16::from_le_bytes(payload[4..6].try_into().unwrap_or([0; 2]));
        if version != FORMAT_VERSION {
            return Err(FlatpackError::Protocol(format!(
                "Unsupported format version: {version}"
            )));
        }
        Ok(())
    }
}
