//! kstor wire format: on-wire types for every client/server exchange.
//!
//! These types ARE the protocol. Every field and every size is part of the
//! wire format shared with the kernel-side chunk server (`kstor/api.h`).
//!
//! Two header layouts exist and they are NOT interchangeable:
//!   - `PacketHeader` (16 bytes): the plain framing.
//!   - `ChecksummedHeader` (32 bytes): the same fields followed by an
//!     xxHash64 of the body and an xxHash64 of the header itself.
//!
//! All integers are little-endian regardless of host. The types use
//! zerocopy's byteorder wrappers so they can be read straight out of a
//! receive buffer without any unsafe code.

use std::fmt;

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub type U32Le = U32<LittleEndian>;
pub type U64Le = U64<LittleEndian>;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Sentinel carried in the first four bytes of every frame, both directions.
pub const PACKET_MAGIC: u32 = 0xCCBE_CCBE;

/// Size of a chunk identifier (a random 128-bit GUID).
pub const GUID_SIZE: usize = 16;

/// Size of the data block carried by chunk write and chunk read.
pub const CHUNK_SIZE: usize = 65536;

/// Body limit of the first, ping-only protocol evolution.
pub const LEGACY_MAX_DATA_SIZE: u32 = 65536;

/// Body limit of the chunk-capable evolutions.
/// A chunk write body is `GUID_SIZE + CHUNK_SIZE`, so 64 KiB is not enough.
pub const MAX_DATA_SIZE: u32 = 2 * 65536;

/// Size of the ping value buffer. Values are zero-padded to this length on
/// the wire and the reply is read up to its first NUL.
pub const PING_VALUE_SIZE: usize = 65536;

/// Body size of a chunk write request.
pub const CHUNK_WRITE_BODY_SIZE: usize = GUID_SIZE + CHUNK_SIZE;

/// Result codes set by the server in `PacketHeader::result`.
pub const RESULT_SUCCESS: u32 = 0;
pub const RESULT_UNEXPECTED_DATA_SIZE: u32 = 1;
pub const RESULT_NOT_FOUND: u32 = 2;

// ── Packet type ───────────────────────────────────────────────────────────────

/// Operation identifier carried in `PacketHeader::packet_type`.
///
/// A response always carries the type of the request it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PacketType {
    Ping = 1,
    ChunkCreate = 2,
    ChunkWrite = 3,
    ChunkRead = 4,
    ChunkDelete = 5,
}

impl PacketType {
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Ping => "ping",
            PacketType::ChunkCreate => "chunk-create",
            PacketType::ChunkWrite => "chunk-write",
            PacketType::ChunkRead => "chunk-read",
            PacketType::ChunkDelete => "chunk-delete",
        }
    }
}

impl TryFrom<u32> for PacketType {
    type Error = WireError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketType::Ping),
            2 => Ok(PacketType::ChunkCreate),
            3 => Ok(PacketType::ChunkWrite),
            4 => Ok(PacketType::ChunkRead),
            5 => Ok(PacketType::ChunkDelete),
            other => Err(WireError::UnknownPacketType(other)),
        }
    }
}

impl From<PacketType> for u32 {
    fn from(t: PacketType) -> u32 {
        t as u32
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Frame format ──────────────────────────────────────────────────────────────

/// Header layout used on a connection. Chosen once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// 16-byte header, no integrity hashes.
    Plain,
    /// 32-byte header with body and header xxHash64.
    Checksummed,
}

impl FrameFormat {
    pub fn header_len(self) -> usize {
        match self {
            FrameFormat::Plain => std::mem::size_of::<PacketHeader>(),
            FrameFormat::Checksummed => std::mem::size_of::<ChecksummedHeader>(),
        }
    }
}

// ── Headers ───────────────────────────────────────────────────────────────────

/// Fixed header present on every frame.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct PacketHeader {
    /// Must equal `PACKET_MAGIC`. Anything else means the stream is out of step.
    pub magic: U32Le,

    /// `PacketType` discriminant.
    pub packet_type: U32Le,

    /// Length of the body that follows. Bounded by the codec's maximum.
    pub data_size: U32Le,

    /// 0 on success. Any other value is a server error code, read as i32.
    pub result: U32Le,
}

assert_eq_size!(PacketHeader, [u8; 16]);

impl PacketHeader {
    pub fn new(packet_type: u32, data_size: u32, result: u32) -> Self {
        Self {
            magic: U32Le::new(PACKET_MAGIC),
            packet_type: U32Le::new(packet_type),
            data_size: U32Le::new(data_size),
            result: U32Le::new(result),
        }
    }
}

/// Header of the checksummed evolution.
///
/// `header_hash` covers all 32 bytes with `header_hash` itself zeroed, so it
/// also protects `data_hash`.
///
/// Wire size: 32 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct ChecksummedHeader {
    pub base: PacketHeader,

    /// xxHash64 (seed 0) of the body bytes.
    pub data_hash: U64Le,

    /// xxHash64 (seed 0) of this header with `header_hash` set to zero.
    pub header_hash: U64Le,
}

assert_eq_size!(ChecksummedHeader, [u8; 32]);

impl ChecksummedHeader {
    /// Hash over the header as transmitted, with the `header_hash` slot zeroed.
    pub fn compute_header_hash(&self) -> u64 {
        let mut unsealed = *self;
        unsealed.header_hash = U64Le::new(0);
        checksum(unsealed.as_bytes())
    }

    /// Fill in `header_hash`. Must be called after `data_hash` is final.
    pub fn seal(&mut self) {
        self.header_hash = U64Le::new(self.compute_header_hash());
    }
}

/// The integrity hash used by the checksummed framing.
pub fn checksum(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(bytes, 0)
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when building or interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("bad packet magic: 0x{0:08x}")]
    BadMagic(u32),

    #[error("packet data size {size} exceeds maximum {max}")]
    DataTooLarge { size: usize, max: usize },

    #[error("packet header checksum mismatch")]
    HeaderChecksum,

    #[error("packet body checksum mismatch")]
    BodyChecksum,

    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown packet type: {0}")]
    UnknownPacketType(u32),

    #[error("{what} must be exactly {expected} bytes, got {actual}")]
    InputSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} must be at most {max} bytes, got {actual}")]
    InputTooLarge {
        what: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("malformed {packet_type} body: {reason}")]
    MalformedBody {
        packet_type: PacketType,
        reason: String,
    },
}

impl WireError {
    /// True for caller-side shape errors detected before any I/O.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            WireError::InputSize { .. } | WireError::InputTooLarge { .. }
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
