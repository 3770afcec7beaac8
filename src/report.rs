//! Run summaries for operators.

use std::fmt;

use jiff::civil::Date;
use serde::Serialize;

use crate::models::{Route, UnassignedDelivery, UnassignedReason};
use crate::planner::Plan;
use crate::run::RunStage;

/// How a completed run turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutcome {
    /// Every delivery is on a route.
    FullyPlanned,
    /// Routes were produced, some deliveries are unassigned.
    PartiallyPlanned,
    /// Routes already existed for the date and no re-plan was forced.
    AlreadyPlanned,
    /// No deliveries were pending.
    NothingToPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub date: Date,
    pub outcome: PlanOutcome,
    pub routes: Vec<Route>,
    /// Sorted by delivery id.
    pub unassigned: Vec<UnassignedDelivery>,
    pub clusters: usize,
    pub total_distance_km: f64,
    /// False for dry runs and no-op runs.
    pub persisted: bool,
    pub stages: Vec<RunStage>,
}

impl PlanReport {
    pub(crate) fn planned(date: Date, plan: Plan, persisted: bool, stages: &[RunStage]) -> Self {
        let outcome = if plan.unassigned.is_empty() {
            PlanOutcome::FullyPlanned
        } else {
            PlanOutcome::PartiallyPlanned
        };
        let total_distance_km = plan.routes.iter().map(|route| route.total_distance_km).sum();

        Self {
            date,
            outcome,
            routes: plan.routes,
            unassigned: plan.unassigned,
            clusters: plan.clusters,
            total_distance_km,
            persisted,
            stages: stages.to_vec(),
        }
    }

    pub(crate) fn empty(date: Date, outcome: PlanOutcome, stages: &[RunStage]) -> Self {
        Self {
            date,
            outcome,
            routes: Vec::new(),
            unassigned: Vec::new(),
            clusters: 0,
            total_distance_km: 0.0,
            persisted: false,
            stages: stages.to_vec(),
        }
    }

    pub fn routes_created(&self) -> usize {
        self.routes.len()
    }

    pub fn deliveries_routed(&self) -> usize {
        self.routes.iter().map(|route| route.stops.len()).sum()
    }

    /// Unassigned counts per reason, in order of first appearance.
    pub fn issue_counts(&self) -> Vec<(UnassignedReason, usize)> {
        let mut counts: Vec<(UnassignedReason, usize)> = Vec::new();
        for issue in &self.unassigned {
            match counts.iter_mut().find(|(reason, _)| *reason == issue.reason) {
                Some((_, count)) => *count += 1,
                None => counts.push((issue.reason, 1)),
            }
        }
        counts
    }

    fn capacity_shortfall(&self) -> usize {
        self.unassigned
            .iter()
            .filter(|issue| issue.reason == UnassignedReason::InsufficientCapacity)
            .count()
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            PlanOutcome::AlreadyPlanned => return write!(f, "already planned {}, 0 new routes", self.date),
            PlanOutcome::NothingToPlan => return write!(f, "nothing to plan for {}, 0 new routes", self.date),
            PlanOutcome::FullyPlanned => write!(
                f,
                "fully planned {}: {} routes, {} deliveries, {:.2} km",
                self.date,
                self.routes_created(),
                self.deliveries_routed(),
                self.total_distance_km
            )?,
            PlanOutcome::PartiallyPlanned => {
                write!(
                    f,
                    "partially planned {}: {} routes, {} deliveries, {:.2} km, {} deliveries unassigned",
                    self.date,
                    self.routes_created(),
                    self.deliveries_routed(),
                    self.total_distance_km,
                    self.unassigned.len()
                )?;
                let shortfall = self.capacity_shortfall();
                if shortfall > 0 {
                    write!(f, " ({shortfall} need more vehicles/drivers)")?;
                }
            }
        }
        if !self.persisted {
            f.write_str(" [dry run, not persisted]")?;
        }
        Ok(())
    }
}
