//! Transport session: one duplex byte stream, exact-length I/O.
//!
//! A short write or a read that hits EOF early is an error, never a partial
//! result. The session is half-duplex by contract: one request, then its
//! response, then the next request.

use std::io::ErrorKind;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::ClientError;

pub struct TransportSession<S = TcpStream> {
    stream: S,
    peer: String,
}

impl TransportSession<TcpStream> {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, addr))
    }
}

impl<S> TransportSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write all of `bytes`. A zero-length write means the peer stopped
    /// accepting data and fails with `IncompleteWrite`.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let mut written = 0;
        while written < bytes.len() {
            match self.stream.write(&bytes[written..]).await {
                Ok(0) => {
                    return Err(ClientError::IncompleteWrite {
                        written,
                        expected: bytes.len(),
                    })
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Read exactly `n` bytes. EOF first fails with `IncompleteRead`.
    pub async fn recv_exact(&mut self, n: usize) -> Result<Bytes, ClientError> {
        let mut buf = vec![0u8; n];
        let mut received = 0;
        while received < n {
            match self.stream.read(&mut buf[received..]).await {
                Ok(0) => {
                    return Err(ClientError::IncompleteRead {
                        received,
                        expected: n,
                    })
                }
                Ok(k) => received += k,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Bytes::from(buf))
    }

    /// Close the write half. The peer sees EOF.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
