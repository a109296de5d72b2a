//! kstor-core: wire format, packet codec, and typed payloads for the
//! kstor chunk protocol. The client and the test server both build on it.

pub mod codec;
pub mod config;
pub mod payload;
pub mod wire;

pub use codec::{FrameHeader, Packet, PacketCodec};
pub use payload::{ChunkId, Request, Response};
pub use wire::{FrameFormat, PacketType, WireError};
