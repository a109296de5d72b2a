//! Client error taxonomy.

use kstor_core::{PacketType, WireError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Framing, size, integrity, or shape failure. See `WireError`.
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("incomplete write: {written} of {expected} bytes accepted")]
    IncompleteWrite { written: usize, expected: usize },

    #[error("incomplete read: {received} of {expected} bytes received")]
    IncompleteRead { received: usize, expected: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response type {actual}, expected {expected}")]
    Correlation { expected: u32, actual: u32 },

    #[error("{packet_type} failed with result code {code}")]
    Operation { packet_type: PacketType, code: i32 },

    #[error("session is broken by an earlier failure and must be closed")]
    Broken,
}

impl ClientError {
    /// Whether the byte stream can no longer be trusted.
    ///
    /// Operation errors and caller input errors leave framing intact;
    /// everything else breaks the session.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Wire(e) => !e.is_input_error(),
            ClientError::Operation { .. } => false,
            _ => true,
        }
    }

    /// Server result code, if the server answered with one.
    pub fn result_code(&self) -> Option<i32> {
        match self {
            ClientError::Operation { code, .. } => Some(*code),
            _ => None,
        }
    }
}
