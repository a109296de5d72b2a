//! Protocol client: one request, one response, in strict order.
//!
//! Per call the session moves Idle → Sending → AwaitingResponse → Idle.
//! A fatal error (see `ClientError::is_fatal`) moves it to Broken instead;
//! a broken session refuses further calls and should be closed.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use kstor_core::payload::nul_terminated;
use kstor_core::wire::{CHUNK_SIZE, RESULT_SUCCESS};
use kstor_core::{ChunkId, Packet, PacketCodec, PacketType, Request, Response, WireError};

use crate::error::ClientError;
use crate::transport::TransportSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    AwaitingResponse,
    Broken,
}

pub struct Client<S = TcpStream> {
    transport: TransportSession<S>,
    codec: PacketCodec,
    state: SessionState,
}

impl Client<TcpStream> {
    pub async fn connect(addr: &str, codec: PacketCodec) -> Result<Self, ClientError> {
        let transport = TransportSession::connect(addr).await?;
        tracing::debug!(peer = addr, format = ?codec.format(), "session connected");
        Ok(Self::new(transport, codec))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(transport: TransportSession<S>, codec: PacketCodec) -> Self {
        Self {
            transport,
            codec,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn codec(&self) -> &PacketCodec {
        &self.codec
    }

    pub fn peer(&self) -> &str {
        self.transport.peer()
    }

    // ── Raw exchange ─────────────────────────────────────────────────────────

    /// Encode and transmit one request frame.
    pub async fn send_request(&mut self, request: &Request) -> Result<(), ClientError> {
        self.ensure_usable()?;
        self.state = SessionState::Sending;
        let result = self.write_request(request).await;
        self.state = match &result {
            Ok(()) => SessionState::AwaitingResponse,
            Err(e) => state_after(e),
        };
        result
    }

    /// Receive one frame and check it answers a request of type `expected`.
    pub async fn recv_response(&mut self, expected: PacketType) -> Result<Packet, ClientError> {
        self.ensure_usable()?;
        self.state = SessionState::AwaitingResponse;
        let result = self.read_response(expected).await;
        self.state = match &result {
            Ok(_) => SessionState::Idle,
            Err(e) => state_after(e),
        };
        result
    }

    /// Send `request` and decode its response into the matching shape.
    pub async fn call(&mut self, request: &Request) -> Result<Response, ClientError> {
        let packet_type = request.packet_type();
        self.send_request(request).await?;
        let packet = self.recv_response(packet_type).await?;
        Response::decode(packet_type, &packet.body).map_err(|e| {
            self.state = SessionState::Broken;
            ClientError::from(e)
        })
    }

    async fn write_request(&mut self, request: &Request) -> Result<(), ClientError> {
        let frame = self
            .codec
            .encode(request.packet_type(), &request.encode_body())
            .map_err(|e| match e {
                // Nothing has been written yet, so the stream is still in step.
                WireError::DataTooLarge { size, max } => WireError::InputTooLarge {
                    what: "request body",
                    max,
                    actual: size,
                },
                other => other,
            })?;
        self.transport.send(&frame).await
    }

    async fn read_response(&mut self, expected: PacketType) -> Result<Packet, ClientError> {
        let raw = self.transport.recv_exact(self.codec.header_len()).await?;
        let header = self.codec.decode_header(&raw)?;
        let body = self.transport.recv_exact(header.data_size as usize).await?;
        self.codec.verify_body(&header, &body)?;

        if header.packet_type != u32::from(expected) {
            return Err(ClientError::Correlation {
                expected: expected.into(),
                actual: header.packet_type,
            });
        }
        if header.result != RESULT_SUCCESS {
            return Err(ClientError::Operation {
                packet_type: expected,
                code: header.result_code(),
            });
        }

        Ok(Packet {
            packet_type: header.packet_type,
            result: header.result,
            body,
        })
    }

    fn ensure_usable(&self) -> Result<(), ClientError> {
        match self.state {
            SessionState::Broken => Err(ClientError::Broken),
            _ => Ok(()),
        }
    }

    // ── Typed operations ─────────────────────────────────────────────────────

    /// Echo `value` through the server.
    ///
    /// The value travels zero-padded in a `PING_VALUE_SIZE` buffer and the
    /// reply is read up to its first NUL byte, so a value containing a NUL
    /// comes back truncated there. Longer values are rejected before any I/O.
    pub async fn ping(&mut self, value: &str) -> Result<String, ClientError> {
        let request = Request::ping(value.as_bytes())?;
        match self.call(&request).await? {
            Response::Ping(reply) => {
                Ok(String::from_utf8_lossy(nul_terminated(&reply)).into_owned())
            }
            other => Err(shape_mismatch(PacketType::Ping, &other)),
        }
    }

    pub async fn chunk_create(&mut self, id: &[u8]) -> Result<(), ClientError> {
        let id = ChunkId::from_slice(id)?;
        self.call(&Request::ChunkCreate(id)).await.map(|_| ())
    }

    /// Overwrite the chunk with `data`, which must be exactly `CHUNK_SIZE` bytes.
    pub async fn chunk_write(&mut self, id: &[u8], data: &[u8]) -> Result<(), ClientError> {
        let id = ChunkId::from_slice(id)?;
        let request = Request::chunk_write(id, Bytes::copy_from_slice(data))?;
        self.call(&request).await.map(|_| ())
    }

    /// Read the chunk's full `CHUNK_SIZE` data block.
    pub async fn chunk_read(&mut self, id: &[u8]) -> Result<Bytes, ClientError> {
        let id = ChunkId::from_slice(id)?;
        match self.call(&Request::ChunkRead(id)).await? {
            Response::ChunkRead(data) => {
                debug_assert_eq!(data.len(), CHUNK_SIZE);
                Ok(data)
            }
            other => Err(shape_mismatch(PacketType::ChunkRead, &other)),
        }
    }

    pub async fn chunk_delete(&mut self, id: &[u8]) -> Result<(), ClientError> {
        let id = ChunkId::from_slice(id)?;
        self.call(&Request::ChunkDelete(id)).await.map(|_| ())
    }

    /// Shut the connection down. The session cannot be used afterwards.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.transport.shutdown().await
    }
}

fn state_after(error: &ClientError) -> SessionState {
    if error.is_fatal() {
        SessionState::Broken
    } else {
        SessionState::Idle
    }
}

fn shape_mismatch(packet_type: PacketType, response: &Response) -> ClientError {
    WireError::MalformedBody {
        packet_type,
        reason: format!("decoded as {}", response.packet_type()),
    }
    .into()
}
