//! Configuration for the kstor exerciser.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $KSTOR_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/kstor/exerciser.toml
//!   3. ~/.config/kstor/exerciser.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::codec::PacketCodec;
use crate::wire::{FrameFormat, CHUNK_WRITE_BODY_SIZE, MAX_DATA_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciserConfig {
    pub server: ServerConfig,
    pub load: LoadConfig,
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Concurrent sessions, one TCP connection each.
    pub sessions: usize,
    /// Create/write/read/delete cycles per session.
    pub rounds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Use the 32-byte checksummed header. Must match the server.
    pub checksum: bool,
    /// Largest body accepted in either direction.
    pub max_data_size: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8111,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            sessions: 1000,
            rounds: 10,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            checksum: false,
            max_data_size: MAX_DATA_SIZE,
        }
    }
}

impl ServerConfig {
    /// `host:port`, as accepted by `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ProtocolConfig {
    pub fn codec(&self) -> PacketCodec {
        let format = if self.checksum {
            FrameFormat::Checksummed
        } else {
            FrameFormat::Plain
        };
        PacketCodec::new(format, self.max_data_size)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("kstor")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ExerciserConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            ExerciserConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("KSTOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("exerciser.toml"))
    }

    /// Reject settings the exerciser cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load.sessions == 0 {
            return Err(ConfigError::Invalid("load.sessions must be at least 1".into()));
        }
        if (self.protocol.max_data_size as usize) < CHUNK_WRITE_BODY_SIZE {
            return Err(ConfigError::Invalid(format!(
                "protocol.max_data_size {} cannot carry a chunk write ({} bytes)",
                self.protocol.max_data_size, CHUNK_WRITE_BODY_SIZE
            )));
        }
        Ok(())
    }

    /// Apply KSTOR_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KSTOR_SERVER__HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("KSTOR_SERVER__PORT") {
            if let Ok(p) = v.parse() {
                self.server.port = p;
            }
        }
        if let Ok(v) = std::env::var("KSTOR_LOAD__SESSIONS") {
            if let Ok(n) = v.parse() {
                self.load.sessions = n;
            }
        }
        if let Ok(v) = std::env::var("KSTOR_LOAD__ROUNDS") {
            if let Ok(n) = v.parse() {
                self.load.rounds = n;
            }
        }
        if let Ok(v) = std::env::var("KSTOR_PROTOCOL__CHECKSUM") {
            self.protocol.checksum = v == "true" || v == "1";
        }
    }
}
