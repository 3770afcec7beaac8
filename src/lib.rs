//! delivery-planner core
//!
//! Daily delivery route planning: geographic clustering, capacity-bounded
//! vehicle assignment and nearest-neighbour stop sequencing, behind
//! collaborator traits for data access and persistence.

pub mod models;
pub mod error;
pub mod traits;
pub mod haversine;
pub mod cluster;
pub mod assign;
pub mod sequence;
pub mod pool;
pub mod lock;
pub mod run;
pub mod store;
pub mod planner;
pub mod report;

pub use cluster::ClusterRadius;
pub use error::{PlanError, PlanFailure, StoreError};
pub use planner::{PlanInput, PlanOptions, RoutePlanner, Selection, plan};
pub use report::{PlanOutcome, PlanReport};
pub use run::{CancellationToken, RunContext};
