//! Exerciser: drives many independent sessions against one server.
//!
//! Every session owns its connection for the whole run and shares nothing
//! with the others. The JoinSet is the only synchronisation point: no
//! connection is closed until every session task has been joined.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;

use kstor_core::config::ExerciserConfig;
use kstor_core::wire::CHUNK_SIZE;
use kstor_core::{ChunkId, PacketType};

use crate::client::Client;
use crate::error::ClientError;
use crate::report::{RunReport, SessionFailure, SessionOutcome};

/// Why a round stopped.
#[derive(Debug, thiserror::Error)]
pub enum RoundFailure {
    #[error("{op}: {source}")]
    Operation {
        op: PacketType,
        #[source]
        source: ClientError,
    },

    #[error("read-back differs from written data at offset {offset}")]
    Mismatch { offset: usize },
}

fn failed(op: PacketType) -> impl FnOnce(ClientError) -> RoundFailure {
    move |source| RoundFailure::Operation { op, source }
}

pub struct Exerciser {
    config: ExerciserConfig,
}

impl Exerciser {
    pub fn new(config: ExerciserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExerciserConfig {
        &self.config
    }

    /// Open every session up front. The first failure aborts the run.
    pub async fn connect_all(&self) -> Result<Vec<Client>, ClientError> {
        let addr = self.config.server.addr();
        let codec = self.config.protocol.codec();
        let mut clients = Vec::with_capacity(self.config.load.sessions);

        for session in 0..self.config.load.sessions {
            match Client::connect(&addr, codec).await {
                Ok(client) => clients.push(client),
                Err(e) => {
                    tracing::error!(session, %addr, error = %e, "connect failed, aborting run");
                    return Err(e);
                }
            }
        }

        tracing::info!(
            sessions = clients.len(),
            %addr,
            format = ?codec.format(),
            "sessions connected"
        );
        Ok(clients)
    }

    /// Connect, drive every session to completion, then tear down.
    pub async fn run(&self) -> Result<RunReport, ClientError> {
        let clients = self.connect_all().await?;
        Ok(self.drive(clients).await)
    }

    /// Run the configured rounds on already-connected sessions.
    pub async fn drive<S>(&self, clients: Vec<Client<S>>) -> RunReport
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let started = Instant::now();
        let rounds = self.config.load.rounds;
        let mut report = RunReport::new(clients.len(), rounds);

        let mut tasks = JoinSet::new();
        for (session, client) in clients.into_iter().enumerate() {
            tasks.spawn(run_session(session, client, rounds));
        }

        let mut finished = Vec::with_capacity(report.sessions);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((outcome, client)) => {
                    report.record(outcome);
                    finished.push(client);
                }
                Err(e) => {
                    tracing::error!(error = %e, "session task did not complete");
                    report.record_failure(SessionFailure {
                        session: None,
                        round: None,
                        chunk_id: None,
                        error: e.to_string(),
                    });
                }
            }
        }

        for client in finished {
            let peer = client.peer().to_string();
            if let Err(e) = client.close().await {
                tracing::debug!(%peer, error = %e, "close failed");
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            sessions = report.sessions,
            completed_cycles = report.completed_cycles,
            failed_sessions = report.failed_sessions,
            elapsed_ms = report.elapsed_ms,
            "run finished"
        );
        report
    }
}

async fn run_session<S>(
    session: usize,
    mut client: Client<S>,
    rounds: u32,
) -> (SessionOutcome, Client<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut rng = StdRng::from_entropy();
    let mut data = vec![0u8; CHUNK_SIZE];

    for round in 0..rounds {
        let id = ChunkId::random(&mut rng);
        rng.fill_bytes(&mut data);

        if let Err(e) = run_round(&mut client, &id, &data).await {
            tracing::error!(
                session,
                round,
                chunk_id = %id,
                error = %e,
                "round failed, abandoning session"
            );
            let outcome = SessionOutcome {
                session,
                completed_rounds: round,
                failure: Some(SessionFailure {
                    session: Some(session),
                    round: Some(round),
                    chunk_id: Some(id.to_string()),
                    error: e.to_string(),
                }),
            };
            return (outcome, client);
        }
        tracing::trace!(session, round, chunk_id = %id, "round complete");
    }

    tracing::debug!(session, rounds, "session finished");
    let outcome = SessionOutcome {
        session,
        completed_rounds: rounds,
        failure: None,
    };
    (outcome, client)
}

/// create → write → read → verify → delete
async fn run_round<S>(
    client: &mut Client<S>,
    id: &ChunkId,
    data: &[u8],
) -> Result<(), RoundFailure>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = id.as_bytes();
    client
        .chunk_create(id)
        .await
        .map_err(failed(PacketType::ChunkCreate))?;
    client
        .chunk_write(id, data)
        .await
        .map_err(failed(PacketType::ChunkWrite))?;
    let read = client
        .chunk_read(id)
        .await
        .map_err(failed(PacketType::ChunkRead))?;

    if let Some(offset) = first_difference(data, &read) {
        return Err(RoundFailure::Mismatch { offset });
    }

    client
        .chunk_delete(id)
        .await
        .map_err(failed(PacketType::ChunkDelete))?;
    Ok(())
}

fn first_difference(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected
        .iter()
        .zip(actual)
        .position(|(a, b)| a != b)
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))
}
