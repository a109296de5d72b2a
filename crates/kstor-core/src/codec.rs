//! Packet codec: frame building and frame validation.
//!
//! Decoding is split in two so a stream reader never trusts a length it has
//! not validated:
//!
//!   1. `decode_header`: magic, then size limit, then (checksummed) header
//!      hash. Runs on exactly `header_len()` bytes, before any body is read.
//!   2. `verify_body`: runs once the full declared body is in hand.
//!
//! `decode` chains both over a complete in-memory frame.

use bytes::{Bytes, BytesMut};
use zerocopy::{AsBytes, FromBytes};

use crate::wire::{
    checksum, ChecksummedHeader, FrameFormat, PacketHeader, PacketType, U64Le, WireError,
    MAX_DATA_SIZE, PACKET_MAGIC, RESULT_SUCCESS,
};

/// Header fields after validation, independent of the layout they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub packet_type: u32,
    pub data_size: u32,
    pub result: u32,
    /// Present only for the checksummed layout.
    pub data_hash: Option<u64>,
}

impl FrameHeader {
    /// Server result code, signed as the server meant it.
    pub fn result_code(&self) -> i32 {
        self.result as i32
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: u32,
    pub result: u32,
    pub body: Bytes,
}

/// Encoder/decoder for one framing evolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCodec {
    format: FrameFormat,
    max_data_size: u32,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(FrameFormat::Plain, MAX_DATA_SIZE)
    }
}

impl PacketCodec {
    pub fn new(format: FrameFormat, max_data_size: u32) -> Self {
        Self {
            format,
            max_data_size,
        }
    }

    pub fn plain() -> Self {
        Self::new(FrameFormat::Plain, MAX_DATA_SIZE)
    }

    pub fn checksummed() -> Self {
        Self::new(FrameFormat::Checksummed, MAX_DATA_SIZE)
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn max_data_size(&self) -> u32 {
        self.max_data_size
    }

    pub fn header_len(&self) -> usize {
        self.format.header_len()
    }

    /// Build a request frame (`result` = 0).
    pub fn encode(&self, packet_type: PacketType, body: &[u8]) -> Result<Bytes, WireError> {
        self.encode_with_result(packet_type.into(), RESULT_SUCCESS, body)
    }

    /// Build a frame with an explicit type and result code.
    ///
    /// The answering side uses this; so do tests that need a type the
    /// client does not know about.
    pub fn encode_with_result(
        &self,
        packet_type: u32,
        result: u32,
        body: &[u8],
    ) -> Result<Bytes, WireError> {
        if body.len() > self.max_data_size as usize {
            return Err(WireError::DataTooLarge {
                size: body.len(),
                max: self.max_data_size as usize,
            });
        }

        let base = PacketHeader::new(packet_type, body.len() as u32, result);
        let mut frame = BytesMut::with_capacity(self.header_len() + body.len());
        match self.format {
            FrameFormat::Plain => frame.extend_from_slice(base.as_bytes()),
            FrameFormat::Checksummed => {
                let mut header = ChecksummedHeader {
                    base,
                    data_hash: U64Le::new(checksum(body)),
                    header_hash: U64Le::new(0),
                };
                header.seal();
                frame.extend_from_slice(header.as_bytes());
            }
        }
        frame.extend_from_slice(body);
        Ok(frame.freeze())
    }

    /// Validate a received header. `bytes` must hold at least `header_len()`.
    pub fn decode_header(&self, bytes: &[u8]) -> Result<FrameHeader, WireError> {
        let needed = self.header_len();
        if bytes.len() < needed {
            return Err(WireError::Truncated {
                needed,
                available: bytes.len(),
            });
        }

        let (base, sealed) = match self.format {
            FrameFormat::Plain => {
                let base = PacketHeader::read_from_prefix(bytes).ok_or(WireError::Truncated {
                    needed,
                    available: bytes.len(),
                })?;
                (base, None)
            }
            FrameFormat::Checksummed => {
                let header = ChecksummedHeader::read_from_prefix(bytes).ok_or(
                    WireError::Truncated {
                        needed,
                        available: bytes.len(),
                    },
                )?;
                (header.base, Some(header))
            }
        };

        let magic = base.magic.get();
        if magic != PACKET_MAGIC {
            return Err(WireError::BadMagic(magic));
        }

        let data_size = base.data_size.get();
        if data_size > self.max_data_size {
            return Err(WireError::DataTooLarge {
                size: data_size as usize,
                max: self.max_data_size as usize,
            });
        }

        if let Some(header) = &sealed {
            if header.compute_header_hash() != header.header_hash.get() {
                return Err(WireError::HeaderChecksum);
            }
        }

        Ok(FrameHeader {
            packet_type: base.packet_type.get(),
            data_size,
            result: base.result.get(),
            data_hash: sealed.map(|h| h.data_hash.get()),
        })
    }

    /// Check a fully-read body against its validated header.
    pub fn verify_body(&self, header: &FrameHeader, body: &[u8]) -> Result<(), WireError> {
        if body.len() != header.data_size as usize {
            return Err(WireError::Truncated {
                needed: header.data_size as usize,
                available: body.len(),
            });
        }
        if let Some(expected) = header.data_hash {
            if checksum(body) != expected {
                return Err(WireError::BodyChecksum);
            }
        }
        Ok(())
    }

    /// Decode one complete frame held in memory.
    pub fn decode(&self, frame: &[u8]) -> Result<Packet, WireError> {
        let header = self.decode_header(frame)?;
        let start = self.header_len();
        let end = start + header.data_size as usize;
        let body = frame.get(start..end).ok_or(WireError::Truncated {
            needed: end,
            available: frame.len(),
        })?;
        self.verify_body(&header, body)?;

        Ok(Packet {
            packet_type: header.packet_type,
            result: header.result,
            body: Bytes::copy_from_slice(body),
        })
    }
}
