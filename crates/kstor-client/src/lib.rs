//! kstor-client: transport, protocol client, and the concurrent exerciser
//! for the kstor chunk server.

pub mod client;
pub mod error;
pub mod exerciser;
pub mod report;
pub mod transport;

pub use client::{Client, SessionState};
pub use error::ClientError;
pub use exerciser::{Exerciser, RoundFailure};
pub use report::{RunReport, SessionFailure};
pub use transport::TransportSession;
