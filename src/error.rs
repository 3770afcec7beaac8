//! Error types for planning runs and storage collaborators.

use std::time::Duration;

use jiff::civil::Date;
use thiserror::Error;

use crate::models::UnassignedDelivery;
use crate::run::RunStage;

/// Whole-run failures. Per-delivery problems never end up here; they are
/// reported as [`UnassignedDelivery`] entries instead.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Every delivery failed validation or has no usable location. The
    /// per-item reasons are kept.
    #[error("invalid input: none of the {} deliveries can be routed", .unassigned.len())]
    InvalidDeliveries { unassigned: Vec<UnassignedDelivery> },

    #[error("no resource available: {0}")]
    NoResourceAvailable(String),

    #[error("no route could be planned, {} deliveries unassigned", .unassigned.len())]
    NothingPlanned { unassigned: Vec<UnassignedDelivery> },

    #[error("failed to load planning data: {0}")]
    Source(#[source] StoreError),

    #[error("failed to persist routes, nothing was committed (retry the run): {0}")]
    Persistence(#[source] StoreError),

    #[error("another planning run for {0} is in progress")]
    ConcurrentPlanning(Date),

    #[error("planning run cancelled")]
    Cancelled,

    #[error("{operation} exceeded the timeout of {timeout:?}")]
    Timeout { operation: &'static str, timeout: Duration },
}

impl PlanError {
    /// Per-delivery issues carried by the failure, empty for whole-run errors.
    pub fn unassigned(&self) -> &[UnassignedDelivery] {
        match self {
            PlanError::InvalidDeliveries { unassigned } | PlanError::NothingPlanned { unassigned } => unassigned,
            _ => &[],
        }
    }
}

/// A terminal failure together with the stage the run was in.
#[derive(Debug, Error)]
#[error("failed to plan during {stage}: {error}")]
pub struct PlanFailure {
    pub stage: RunStage,
    #[source]
    pub error: PlanError,
}

/// Failures reported by delivery, fleet and route collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown {kind} id {id}")]
    UnknownId { kind: &'static str, id: u64 },

    #[error("routes for {0} already exist")]
    AlreadyPlanned(Date),

    #[error("planning lock for {0} is held by another process")]
    Locked(Date),

    #[error("commit deadline exceeded")]
    DeadlineExceeded,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
