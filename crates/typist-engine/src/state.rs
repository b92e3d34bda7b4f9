//! Session control block and validated state transitions.
//!
//! The control block is the only session state touched by both the worker
//! and command callers. It lives behind a mutex; publishing an event while
//! holding that mutex is what keeps commands and worker events in one order.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use typist_core::error::{Result, TypistError};
use typist_core::types::{Profile, SessionState};

/// Validate a transition without applying it.
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<()> {
    if from.can_transition_to(&to) {
        Ok(())
    } else {
        Err(TypistError::Internal(format!(
            "Invalid session transition: {} -> {}",
            from, to
        )))
    }
}

/// Mutable control state shared between a session's worker and its callers.
#[derive(Debug)]
pub struct ControlBlock {
    pub state: SessionState,
    /// Set by `stop`; the worker exits at its next check.
    pub cancelled: bool,
    /// Live profile; `update_speed` retargets it in place.
    pub profile: Profile,
    /// Sequence number of the last published event.
    pub seq: u64,
    pub error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl ControlBlock {
    pub fn new(profile: Profile) -> Self {
        Self {
            state: SessionState::Idle,
            cancelled: false,
            profile,
            seq: 0,
            error: None,
            finished_at: None,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Move to `to`, keeping the paused-time ledger current.
    pub fn transition(&mut self, to: SessionState) -> Result<()> {
        validate_transition(self.state, to)?;
        debug!("Session state: {} -> {}", self.state, to);

        if let Some(since) = self.paused_at.take() {
            self.paused_total += since.elapsed();
        }
        if to == SessionState::Paused {
            self.paused_at = Some(Instant::now());
        }
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.state = to;
        Ok(())
    }

    /// Total time spent paused, including a pause still in progress.
    pub fn paused_duration(&self) -> Duration {
        self.paused_total + self.paused_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}
