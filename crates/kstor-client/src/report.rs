//! Run report: what the exerciser hands back once every session is joined.

use serde::Serialize;

/// One abandoned session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionFailure {
    /// `None` when the session task itself panicked and its index was lost.
    pub session: Option<usize>,
    pub round: Option<u32>,
    pub chunk_id: Option<String>,
    pub error: String,
}

/// Per-session result, produced inside the session task.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session: usize,
    pub completed_rounds: u32,
    pub failure: Option<SessionFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub sessions: usize,
    pub rounds_per_session: u32,
    pub completed_cycles: u64,
    pub failed_sessions: usize,
    pub failures: Vec<SessionFailure>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn new(sessions: usize, rounds_per_session: u32) -> Self {
        Self {
            sessions,
            rounds_per_session,
            completed_cycles: 0,
            failed_sessions: 0,
            failures: Vec::new(),
            elapsed_ms: 0,
        }
    }

    pub fn record(&mut self, outcome: SessionOutcome) {
        self.completed_cycles += u64::from(outcome.completed_rounds);
        tracing::debug!(
            session = outcome.session,
            completed_rounds = outcome.completed_rounds,
            failed = outcome.failure.is_some(),
            "session joined"
        );
        if let Some(mut failure) = outcome.failure {
            failure.session = Some(outcome.session);
            self.record_failure(failure);
        }
    }

    pub fn record_failure(&mut self, failure: SessionFailure) {
        self.failed_sessions += 1;
        self.failures.push(failure);
    }

    /// Cycles the run would complete with no failures.
    pub fn expected_cycles(&self) -> u64 {
        self.sessions as u64 * u64::from(self.rounds_per_session)
    }

    pub fn is_success(&self) -> bool {
        self.failed_sessions == 0 && self.completed_cycles == self.expected_cycles()
    }
}
