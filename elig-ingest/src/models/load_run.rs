//! Load run state machine
//!
//! A run progresses strictly in order:
//! INITIATED → SCHEMA_READY → INGESTED → NORMALIZED → VALIDATED → COMPLETE
//!
//! Any stage may instead move the run to FAILED. Terminal runs never move again;
//! a failed run is re-executed under a new run id.

use chrono::{DateTime, Utc};
use elig_common::LoadRunId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{IngestError, IngestResult};

/// Pipeline run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Run id assigned, nothing written yet
    Initiated,
    /// Warehouse tables created and verified
    SchemaReady,
    /// Every vendor ingested into raw + payload
    Ingested,
    /// Silver rows written
    Normalized,
    /// Count, join and hash audits passed
    Validated,
    Complete,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Initiated => "INITIATED",
            RunState::SchemaReady => "SCHEMA_READY",
            RunState::Ingested => "INGESTED",
            RunState::Normalized => "NORMALIZED",
            RunState::Validated => "VALIDATED",
            RunState::Complete => "COMPLETE",
            RunState::Failed => "FAILED",
        }
    }

    /// The only non-failure successor of this state
    pub fn next(&self) -> Option<RunState> {
        match self {
            RunState::Initiated => Some(RunState::SchemaReady),
            RunState::SchemaReady => Some(RunState::Ingested),
            RunState::Ingested => Some(RunState::Normalized),
            RunState::Normalized => Some(RunState::Validated),
            RunState::Validated => Some(RunState::Complete),
            RunState::Complete | RunState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(RunState::Initiated),
            "SCHEMA_READY" => Ok(RunState::SchemaReady),
            "INGESTED" => Ok(RunState::Ingested),
            "NORMALIZED" => Ok(RunState::Normalized),
            "VALIDATED" => Ok(RunState::Validated),
            "COMPLETE" => Ok(RunState::Complete),
            "FAILED" => Ok(RunState::Failed),
            other => Err(IngestError::InvalidState(format!("unknown run state '{}'", other))),
        }
    }
}

/// State transition record, logged by the run controller
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub run_id: LoadRunId,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// One pipeline run as tracked in the `load_runs` ledger
#[derive(Debug, Clone, Serialize)]
pub struct LoadRun {
    pub run_id: LoadRunId,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    /// Set when the run reaches a terminal state
    pub ended_at: Option<DateTime<Utc>>,
    /// Reason the run failed
    pub error: Option<String>,
}

impl LoadRun {
    /// Start a run with a freshly generated id
    pub fn new() -> Self {
        Self::with_id(LoadRunId::generate())
    }

    pub fn with_id(run_id: LoadRunId) -> Self {
        Self {
            run_id,
            state: RunState::Initiated,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
        }
    }

    /// Advance to `new_state`, which must be the direct successor of the current state
    pub fn transition_to(&mut self, new_state: RunState) -> IngestResult<StateTransition> {
        if new_state == RunState::Failed || self.state.next() != Some(new_state) {
            return Err(IngestError::InvalidState(format!(
                "run {} cannot move from {} to {}",
                self.run_id, self.state, new_state
            )));
        }
        Ok(self.apply(new_state))
    }

    /// Move to FAILED, recording the reason
    pub fn fail(&mut self, reason: impl Into<String>) -> IngestResult<StateTransition> {
        if self.state.is_terminal() {
            return Err(IngestError::InvalidState(format!(
                "run {} is already {}",
                self.run_id, self.state
            )));
        }
        self.error = Some(reason.into());
        Ok(self.apply(RunState::Failed))
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn apply(&mut self, new_state: RunState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id.clone(),
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }
        transition
    }
}

impl Default for LoadRun {
    fn default() -> Self {
        Self::new()
    }
}
