//! Typed request/response bodies, one variant per packet type.
//!
//! `Request::decode` and `Response::decode` are the dispatch table from a
//! `PacketType` to the shape of its body. Every shape is fixed; ping carries
//! its value zero-padded to `PING_VALUE_SIZE` in both directions.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;

use crate::wire::{
    PacketType, WireError, CHUNK_SIZE, CHUNK_WRITE_BODY_SIZE, GUID_SIZE, PING_VALUE_SIZE,
};

// ── Chunk identifier ──────────────────────────────────────────────────────────

/// 128-bit chunk name. Random, not an RFC 4122 UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId([u8; GUID_SIZE]);

impl ChunkId {
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; GUID_SIZE];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, WireError> {
        <[u8; GUID_SIZE]>::try_from(bytes)
            .map(Self)
            .map_err(|_| WireError::InputSize {
                what: "chunk id",
                expected: GUID_SIZE,
                actual: bytes.len(),
            })
    }

    pub fn as_bytes(&self) -> &[u8; GUID_SIZE] {
        &self.0
    }
}

impl From<[u8; GUID_SIZE]> for ChunkId {
    fn from(bytes: [u8; GUID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

// ── Ping value convention ─────────────────────────────────────────────────────

/// The part of a ping value before its first NUL byte.
///
/// Servers written against the fixed-buffer ping zero-pad the value, so the
/// reply is read as a C string. A value that itself contains a NUL comes back
/// cut short at that byte.
pub fn nul_terminated(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// The full `PING_VALUE_SIZE` buffer. Build it with `Request::ping`.
    Ping(Bytes),
    ChunkCreate(ChunkId),
    ChunkWrite { id: ChunkId, data: Bytes },
    ChunkRead(ChunkId),
    ChunkDelete(ChunkId),
}

impl Request {
    /// Ping with `value` copied into a zero-padded `PING_VALUE_SIZE` buffer.
    pub fn ping(value: &[u8]) -> Result<Self, WireError> {
        if value.len() > PING_VALUE_SIZE {
            return Err(WireError::InputTooLarge {
                what: "ping value",
                max: PING_VALUE_SIZE,
                actual: value.len(),
            });
        }
        let mut buf = BytesMut::zeroed(PING_VALUE_SIZE);
        buf[..value.len()].copy_from_slice(value);
        Ok(Request::Ping(buf.freeze()))
    }

    /// Chunk write with its data block checked against `CHUNK_SIZE`.
    pub fn chunk_write(id: ChunkId, data: Bytes) -> Result<Self, WireError> {
        if data.len() != CHUNK_SIZE {
            return Err(WireError::InputSize {
                what: "chunk data",
                expected: CHUNK_SIZE,
                actual: data.len(),
            });
        }
        Ok(Request::ChunkWrite { id, data })
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Request::Ping(_) => PacketType::Ping,
            Request::ChunkCreate(_) => PacketType::ChunkCreate,
            Request::ChunkWrite { .. } => PacketType::ChunkWrite,
            Request::ChunkRead(_) => PacketType::ChunkRead,
            Request::ChunkDelete(_) => PacketType::ChunkDelete,
        }
    }

    pub fn chunk_id(&self) -> Option<&ChunkId> {
        match self {
            Request::Ping(_) => None,
            Request::ChunkCreate(id)
            | Request::ChunkWrite { id, .. }
            | Request::ChunkRead(id)
            | Request::ChunkDelete(id) => Some(id),
        }
    }

    pub fn encode_body(&self) -> Bytes {
        match self {
            Request::Ping(value) => value.clone(),
            Request::ChunkWrite { id, data } => {
                let mut body = BytesMut::with_capacity(GUID_SIZE + data.len());
                body.put_slice(id.as_bytes());
                body.put_slice(data);
                body.freeze()
            }
            Request::ChunkCreate(id) | Request::ChunkRead(id) | Request::ChunkDelete(id) => {
                Bytes::copy_from_slice(id.as_bytes())
            }
        }
    }

    pub fn decode(packet_type: PacketType, body: &[u8]) -> Result<Self, WireError> {
        match packet_type {
            PacketType::Ping => {
                expect_len(packet_type, body, PING_VALUE_SIZE)?;
                Ok(Request::Ping(Bytes::copy_from_slice(body)))
            }
            PacketType::ChunkCreate => Ok(Request::ChunkCreate(id_body(packet_type, body)?)),
            PacketType::ChunkRead => Ok(Request::ChunkRead(id_body(packet_type, body)?)),
            PacketType::ChunkDelete => Ok(Request::ChunkDelete(id_body(packet_type, body)?)),
            PacketType::ChunkWrite => {
                expect_len(packet_type, body, CHUNK_WRITE_BODY_SIZE)?;
                let (id, data) = body.split_at(GUID_SIZE);
                Ok(Request::ChunkWrite {
                    id: id_body(packet_type, id)?,
                    data: Bytes::copy_from_slice(data),
                })
            }
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Raw reply bytes. See `nul_terminated` for how clients read them.
    Ping(Bytes),
    ChunkCreate,
    ChunkWrite,
    ChunkRead(Bytes),
    ChunkDelete,
}

impl Response {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Response::Ping(_) => PacketType::Ping,
            Response::ChunkCreate => PacketType::ChunkCreate,
            Response::ChunkWrite => PacketType::ChunkWrite,
            Response::ChunkRead(_) => PacketType::ChunkRead,
            Response::ChunkDelete => PacketType::ChunkDelete,
        }
    }

    pub fn encode_body(&self) -> Bytes {
        match self {
            Response::Ping(value) | Response::ChunkRead(value) => value.clone(),
            Response::ChunkCreate | Response::ChunkWrite | Response::ChunkDelete => Bytes::new(),
        }
    }

    pub fn decode(packet_type: PacketType, body: &[u8]) -> Result<Self, WireError> {
        match packet_type {
            PacketType::Ping => {
                expect_len(packet_type, body, PING_VALUE_SIZE)?;
                Ok(Response::Ping(Bytes::copy_from_slice(body)))
            }
            PacketType::ChunkRead => {
                expect_len(packet_type, body, CHUNK_SIZE)?;
                Ok(Response::ChunkRead(Bytes::copy_from_slice(body)))
            }
            PacketType::ChunkCreate => expect_len(packet_type, body, 0).map(|_| Response::ChunkCreate),
            PacketType::ChunkWrite => expect_len(packet_type, body, 0).map(|_| Response::ChunkWrite),
            PacketType::ChunkDelete => expect_len(packet_type, body, 0).map(|_| Response::ChunkDelete),
        }
    }
}

fn expect_len(packet_type: PacketType, body: &[u8], expected: usize) -> Result<(), WireError> {
    if body.len() != expected {
        return Err(WireError::MalformedBody {
            packet_type,
            reason: format!("expected {expected} bytes, got {}", body.len()),
        });
    }
    Ok(())
}

fn id_body(packet_type: PacketType, body: &[u8]) -> Result<ChunkId, WireError> {
    expect_len(packet_type, body, GUID_SIZE)?;
    ChunkId::from_slice(body)
}
