//! kstor integration test harness.
//!
//! Tests run the real client over loopback TCP against `MockServer`, an
//! in-process chunk server speaking the same framing. No external server
//! or privileges are needed:
//!
//!   cargo test --test integration
//!
//! Each test starts its own server on an OS-assigned port, so tests never
//! share chunk state.

mod chunks;
mod ping;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use kstor_client::{Client, ClientError, TransportSession};
use kstor_core::config::ExerciserConfig;
use kstor_core::wire::{CHUNK_SIZE, RESULT_NOT_FOUND, RESULT_SUCCESS, RESULT_UNEXPECTED_DATA_SIZE};
use kstor_core::{ChunkId, PacketCodec, PacketType, Request, Response};

pub use fault::Fault;

// ── Harness ───────────────────────────────────────────────────────────────────

type ChunkStore = Arc<DashMap<ChunkId, Bytes>>;

/// In-process chunk server. Stops accepting when dropped.
pub struct MockServer {
    addr: SocketAddr,
    codec: PacketCodec,
    chunks: ChunkStore,
    requests: Arc<AtomicU64>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(codec: PacketCodec) -> Result<Self> {
        Self::start_with_fault(codec, Fault::None).await
    }

    pub async fn start_with_fault(codec: PacketCodec, fault: Fault) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock server")?;
        let addr = listener.local_addr()?;
        let chunks: ChunkStore = Arc::new(DashMap::new());
        let requests = Arc::new(AtomicU64::new(0));

        let accept_task = {
            let chunks = chunks.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let chunks = chunks.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, codec, chunks, requests, fault).await {
                            eprintln!("mock server connection ended: {e:#}");
                        }
                    });
                }
            })
        };

        Ok(Self {
            addr,
            codec,
            chunks,
            requests,
            accept_task,
        })
    }

    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// A fresh client session using the server's framing.
    pub async fn connect(&self) -> Result<Client> {
        Client::connect(&self.addr(), self.codec)
            .await
            .with_context(|| format!("failed to connect to mock server at {}", self.addr))
    }

    /// Exerciser config aimed at this server.
    pub fn exerciser_config(&self, sessions: usize, rounds: u32) -> ExerciserConfig {
        let mut config = ExerciserConfig::default();
        config.server.host = self.addr.ip().to_string();
        config.server.port = self.port();
        config.load.sessions = sessions;
        config.load.rounds = rounds;
        config.protocol.checksum = self.codec.format() == kstor_core::FrameFormat::Checksummed;
        config.protocol.max_data_size = self.codec.max_data_size();
        config
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(
    stream: TcpStream,
    codec: PacketCodec,
    chunks: ChunkStore,
    requests: Arc<AtomicU64>,
    fault: Fault,
) -> Result<()> {
    let peer = stream.peer_addr()?.to_string();
    let mut transport = TransportSession::new(stream, peer);

    loop {
        let raw = match transport.recv_exact(codec.header_len()).await {
            Ok(raw) => raw,
            // Clean close between frames.
            Err(ClientError::IncompleteRead { received: 0, .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let header = codec.decode_header(&raw)?;
        let body = transport.recv_exact(header.data_size as usize).await?;
        codec.verify_body(&header, &body)?;
        requests.fetch_add(1, Ordering::Relaxed);

        let request = PacketType::try_from(header.packet_type)
            .and_then(|packet_type| Request::decode(packet_type, &body));
        let (result, reply) = match request {
            Ok(request) => handle(&chunks, request),
            Err(_) => (RESULT_UNEXPECTED_DATA_SIZE, Bytes::new()),
        };

        let frame = fault.frame(&codec, header.packet_type, result, reply)?;
        transport.send(&frame).await?;
    }
}

fn handle(chunks: &DashMap<ChunkId, Bytes>, request: Request) -> (u32, Bytes) {
    let not_found = (RESULT_NOT_FOUND, Bytes::new());
    let response = match request {
        Request::Ping(value) => Response::Ping(value),
        Request::ChunkCreate(id) => {
            chunks
                .entry(id)
                .or_insert_with(|| Bytes::from(vec![0u8; CHUNK_SIZE]));
            Response::ChunkCreate
        }
        Request::ChunkWrite { id, data } => match chunks.get_mut(&id) {
            Some(mut slot) => {
                *slot = data;
                Response::ChunkWrite
            }
            None => return not_found,
        },
        Request::ChunkRead(id) => match chunks.get(&id) {
            Some(data) => Response::ChunkRead(data.value().clone()),
            None => return not_found,
        },
        Request::ChunkDelete(id) => match chunks.remove(&id) {
            Some(_) => Response::ChunkDelete,
            None => return not_found,
        },
    };
    (RESULT_SUCCESS, response.encode_body())
}

/// Both framings, for tests that must hold for either.
pub fn codecs() -> [PacketCodec; 2] {
    [PacketCodec::plain(), PacketCodec::checksummed()]
}
