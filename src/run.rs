//! Planning run lifecycle and the explicit context a run executes in.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PlanError, PlanFailure};

/// Stage of a planning run.
///
/// `Validating → Clustering → Assigning → Sequencing → Persisting → Completed`,
/// with `Failed` reachable from any stage that is not terminal. A run may
/// also complete straight from `Validating` (nothing to do) or from
/// `Sequencing` (dry run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Validating,
    Clustering,
    Assigning,
    Sequencing,
    Persisting,
    Completed,
    Failed,
}

impl RunStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Completed | RunStage::Failed)
    }

    pub fn can_advance_to(self, next: RunStage) -> bool {
        use RunStage::*;

        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Validating, Clustering | Completed) => true,
            (Clustering, Assigning) => true,
            (Assigning, Sequencing) => true,
            (Sequencing, Persisting | Completed) => true,
            (Persisting, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Validating => "validating",
            RunStage::Clustering => "clustering",
            RunStage::Assigning => "assigning",
            RunStage::Sequencing => "sequencing",
            RunStage::Persisting => "persisting",
            RunStage::Completed => "completed",
            RunStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the stage transitions of one run.
#[derive(Debug, Clone)]
pub struct PlanRun {
    stage: RunStage,
    history: Vec<RunStage>,
}

impl Default for PlanRun {
    fn default() -> Self {
        Self {
            stage: RunStage::Validating,
            history: vec![RunStage::Validating],
        }
    }
}

impl PlanRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn history(&self) -> &[RunStage] {
        &self.history
    }

    /// Moves to `next` if the transition is legal. Returns whether it moved.
    pub fn advance(&mut self, next: RunStage) -> bool {
        if !self.stage.can_advance_to(next) {
            warn!(from = %self.stage, to = %next, "rejected illegal run transition");
            return false;
        }
        info!(from = %self.stage, to = %next, "planning run advanced");
        self.stage = next;
        self.history.push(next);
        true
    }

    /// Records the failure and returns it tagged with the stage it happened in.
    pub fn fail(&mut self, error: PlanError) -> PlanFailure {
        let stage = self.stage;
        if self.stage.can_advance_to(RunStage::Failed) {
            self.stage = RunStage::Failed;
            self.history.push(RunStage::Failed);
        }
        warn!(%stage, %error, "planning run failed");
        PlanFailure { stage, error }
    }
}

/// Cooperative cancellation flag, cheap to clone across threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Explicit context for one invocation: cancellation and collaborator timeout.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub cancellation: CancellationToken,
    /// Upper bound for each collaborator call (load, commit).
    pub io_timeout: Duration,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            io_timeout: Duration::from_secs(10),
        }
    }
}

impl RunContext {
    pub fn new(io_timeout: Duration) -> Self {
        Self {
            io_timeout,
            ..Self::default()
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn check_cancelled(&self) -> Result<(), PlanError> {
        if self.cancellation.is_cancelled() {
            Err(PlanError::Cancelled)
        } else {
            Ok(())
        }
    }
}
