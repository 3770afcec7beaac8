//! Route planning orchestrator.
//!
//! A run validates its input, clusters deliveries geographically, packs each
//! cluster into vehicles, pairs every opened vehicle with a driver, orders the
//! stops and commits the routes in one all-or-nothing write.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use jiff::civil::Date;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterRadius, cluster};
use crate::error::{PlanError, PlanFailure, StoreError};
use crate::haversine::HaversineMatrix;
use crate::lock::PlanningLocks;
use crate::models::{
    Coordinate, Delivery, DeliveryId, Driver, DriverId, Route, UnassignedDelivery, UnassignedReason, Vehicle,
    VehicleId,
};
use crate::pool::{Crew, ResourcePool};
use crate::report::{PlanOutcome, PlanReport};
use crate::run::{PlanRun, RunContext, RunStage};
use crate::sequence::sequence;
use crate::traits::{CommitMode, DeliverySource, DistanceMatrixProvider, FleetSource, RouteStore};

/// Most deliveries an ad-hoc selection may name.
pub const MAX_SELECTED_DELIVERIES: usize = 100;
/// Most vehicles, and most drivers, an ad-hoc selection may name.
pub const MAX_SELECTED_FLEET: usize = 20;

#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Where every route starts.
    pub depot: Coordinate,
    pub cluster_radius: ClusterRadius,
    /// Replace routes already stored for the date.
    pub force: bool,
    /// Compute and report without persisting.
    pub dry_run: bool,
    /// Sequence vehicles on the rayon pool.
    pub parallel: bool,
}

impl PlanOptions {
    pub fn new(depot: Coordinate) -> Self {
        Self {
            depot,
            cluster_radius: ClusterRadius::default(),
            force: false,
            dry_run: false,
            parallel: true,
        }
    }

    pub fn with_cluster_radius(mut self, radius: ClusterRadius) -> Self {
        self.cluster_radius = radius;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Everything a run plans over.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub date: Date,
    pub deliveries: &'a [Delivery],
    pub vehicles: &'a [Vehicle],
    pub drivers: &'a [Driver],
    /// Report deliveries scheduled for another date as `WrongDate`.
    pub enforce_date: bool,
}

impl<'a> PlanInput<'a> {
    pub fn new(date: Date, deliveries: &'a [Delivery], vehicles: &'a [Vehicle], drivers: &'a [Driver]) -> Self {
        Self {
            date,
            deliveries,
            vehicles,
            drivers,
            enforce_date: true,
        }
    }

    /// Accept deliveries regardless of their scheduled date.
    pub fn any_date(mut self) -> Self {
        self.enforce_date = false;
        self
    }
}

/// Computed routes before persistence.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub routes: Vec<Route>,
    /// Sorted by delivery id.
    pub unassigned: Vec<UnassignedDelivery>,
    pub clusters: usize,
}

/// An ad-hoc run over explicitly named deliveries and crew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub date: Date,
    pub delivery_ids: Vec<DeliveryId>,
    pub vehicle_ids: Vec<VehicleId>,
    pub driver_ids: Vec<DriverId>,
}

impl Selection {
    pub fn new(
        date: Date,
        delivery_ids: Vec<DeliveryId>,
        vehicle_ids: Vec<VehicleId>,
        driver_ids: Vec<DriverId>,
    ) -> Result<Self, PlanError> {
        check_selection_size("delivery", delivery_ids.len(), MAX_SELECTED_DELIVERIES)?;
        check_selection_size("vehicle", vehicle_ids.len(), MAX_SELECTED_FLEET)?;
        check_selection_size("driver", driver_ids.len(), MAX_SELECTED_FLEET)?;
        check_unique("delivery", &delivery_ids)?;
        check_unique("vehicle", &vehicle_ids)?;
        check_unique("driver", &driver_ids)?;

        Ok(Self {
            date,
            delivery_ids,
            vehicle_ids,
            driver_ids,
        })
    }
}

fn check_selection_size(kind: &str, len: usize, max: usize) -> Result<(), PlanError> {
    if len == 0 || len > max {
        return Err(PlanError::InvalidInput(format!(
            "expected 1 to {max} {kind} ids, got {len}"
        )));
    }
    Ok(())
}

fn check_unique<T>(kind: &str, ids: &[T]) -> Result<(), PlanError>
where
    T: Copy + Eq + std::hash::Hash + std::fmt::Display,
{
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|&&id| !seen.insert(id)) {
        Some(id) => Err(PlanError::InvalidInput(format!("{kind} id {id} listed twice"))),
        None => Ok(()),
    }
}

/// Plans `input` without touching any store.
///
/// The returned report is never marked persisted.
pub fn plan<M>(ctx: &RunContext, input: &PlanInput<'_>, options: &PlanOptions, matrix: &M) -> Result<PlanReport, PlanFailure>
where
    M: DistanceMatrixProvider + Sync + ?Sized,
{
    let mut run = PlanRun::new();
    if input.deliveries.is_empty() {
        run.advance(RunStage::Completed);
        return Ok(PlanReport::empty(input.date, PlanOutcome::NothingToPlan, run.history()));
    }

    let plan = compute(ctx, &mut run, input, options, matrix)?;
    run.advance(RunStage::Completed);
    Ok(PlanReport::planned(input.date, plan, false, run.history()))
}

/// Runs validation through sequencing, leaving `run` at `Sequencing`.
fn compute<M>(
    ctx: &RunContext,
    run: &mut PlanRun,
    input: &PlanInput<'_>,
    options: &PlanOptions,
    matrix: &M,
) -> Result<Plan, PlanFailure>
where
    M: DistanceMatrixProvider + Sync + ?Sized,
{
    if !options.depot.is_valid() {
        return Err(run.fail(PlanError::InvalidInput(format!("depot {} is not a valid coordinate", options.depot))));
    }

    let (valid, mut unassigned) = validate_deliveries(input);
    let vehicles: Vec<Vehicle> = input.vehicles.iter().filter(|vehicle| vehicle.is_assignable()).cloned().collect();
    let drivers: Vec<Driver> = input
        .drivers
        .iter()
        .filter(|driver| driver.is_assignable_on(input.date))
        .cloned()
        .collect();

    if vehicles.is_empty() {
        return Err(run.fail(PlanError::NoResourceAvailable(format!("no assignable vehicle on {}", input.date))));
    }
    if drivers.is_empty() {
        return Err(run.fail(PlanError::NoResourceAvailable(format!("no assignable driver on {}", input.date))));
    }
    info!(
        date = %input.date,
        deliveries = valid.len(),
        rejected = unassigned.len(),
        vehicles = vehicles.len(),
        drivers = drivers.len(),
        "validated planning input"
    );

    ctx.check_cancelled().map_err(|error| run.fail(error))?;
    run.advance(RunStage::Clustering);
    let clustered = cluster(&valid, options.cluster_radius);
    unassigned.extend(clustered.unroutable);
    if clustered.clusters.is_empty() {
        unassigned.sort_by_key(|issue| issue.delivery_id);
        return Err(run.fail(PlanError::InvalidDeliveries { unassigned }));
    }
    debug!(clusters = clustered.clusters.len(), radius_km = options.cluster_radius.km(), "clustered deliveries");

    ctx.check_cancelled().map_err(|error| run.fail(error))?;
    run.advance(RunStage::Assigning);
    let pool = ResourcePool::new(vehicles, drivers);
    let mut crews: Vec<Crew> = Vec::new();
    // Claims run in cluster order so identical input books identical crews.
    for (index, cluster) in clustered.clusters.iter().enumerate() {
        ctx.check_cancelled().map_err(|error| run.fail(error))?;
        let claim = pool.claim_for(cluster);
        debug!(
            cluster = index,
            deliveries = cluster.deliveries.len(),
            vehicles = claim.crews.len(),
            unassigned = claim.unassigned.len(),
            "assigned cluster"
        );
        crews.extend(claim.crews);
        unassigned.extend(claim.unassigned);
    }

    run.advance(RunStage::Sequencing);
    let route_for = |crew: &Crew| -> Result<Route, PlanError> {
        ctx.check_cancelled()?;
        Ok(sequence(&crew.assignment, &crew.driver, input.date, options.depot, matrix))
    };
    let routes: Result<Vec<Route>, PlanError> = if options.parallel {
        crews.par_iter().map(route_for).collect()
    } else {
        crews.iter().map(route_for).collect()
    };
    let routes = routes.map_err(|error| run.fail(error))?;

    unassigned.sort_by_key(|issue| issue.delivery_id);
    for issue in &unassigned {
        warn!(delivery = %issue.delivery_id, reason = %issue.reason, "delivery left unassigned");
    }
    if routes.is_empty() {
        return Err(run.fail(PlanError::NothingPlanned { unassigned }));
    }

    Ok(Plan {
        routes,
        unassigned,
        clusters: clustered.clusters.len(),
    })
}

/// Splits deliveries into those fit for clustering and per-item issues.
///
/// Checks run in a fixed order per delivery: duplicate id, scheduled date,
/// measurements, time window. Coordinates are left to the clusterer.
fn validate_deliveries(input: &PlanInput<'_>) -> (Vec<Delivery>, Vec<UnassignedDelivery>) {
    let mut deliveries: Vec<&Delivery> = input.deliveries.iter().collect();
    deliveries.sort_by_key(|delivery| delivery.id);

    let mut seen = HashSet::with_capacity(deliveries.len());
    let mut valid = Vec::with_capacity(deliveries.len());
    let mut issues = Vec::new();
    for delivery in deliveries {
        let reason = if !seen.insert(delivery.id) {
            Some(UnassignedReason::DuplicateId)
        } else if input.enforce_date && delivery.scheduled_date != input.date {
            Some(UnassignedReason::WrongDate)
        } else if !delivery.has_valid_measurements() {
            Some(UnassignedReason::InvalidMeasurements)
        } else if delivery.time_window.is_some_and(|window| !window.is_valid()) {
            Some(UnassignedReason::InvalidTimeWindow)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                warn!(delivery = %delivery.id, %reason, "rejected delivery");
                issues.push(UnassignedDelivery::new(delivery.id, reason));
            }
            None => valid.push(delivery.clone()),
        }
    }
    (valid, issues)
}

/// Plans against a store, guarding each date with an advisory lock.
///
/// The date is held in-process through [`PlanningLocks`] and, for stores
/// shared between processes, through [`RouteStore::lock_date`].
pub struct RoutePlanner<S, M = HaversineMatrix> {
    store: Arc<S>,
    matrix: M,
    locks: Arc<PlanningLocks>,
}

impl<S> RoutePlanner<S> {
    pub fn new(store: S) -> Self {
        Self::with_matrix(store, HaversineMatrix)
    }
}

impl<S, M> RoutePlanner<S, M> {
    pub fn with_matrix(store: S, matrix: M) -> Self {
        Self {
            store: Arc::new(store),
            matrix,
            locks: Arc::new(PlanningLocks::new()),
        }
    }

    /// Shares date locks with other planners over the same store.
    pub fn with_locks(mut self, locks: Arc<PlanningLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &Arc<PlanningLocks> {
        &self.locks
    }
}

struct Loaded {
    deliveries: Vec<Delivery>,
    vehicles: Vec<Vehicle>,
    drivers: Vec<Driver>,
}

impl<S, M> RoutePlanner<S, M>
where
    S: DeliverySource + FleetSource + RouteStore + Send + Sync + 'static,
    M: DistanceMatrixProvider + Sync,
{
    /// Plans every pending delivery scheduled for `date`.
    pub fn plan_day(&self, ctx: &RunContext, date: Date, options: &PlanOptions) -> Result<PlanReport, PlanFailure> {
        self.execute(ctx, date, true, options, move |store| {
            Ok(Loaded {
                deliveries: store.pending_deliveries(date)?,
                vehicles: store.vehicles(date)?,
                drivers: store.drivers(date)?,
            })
        })
    }

    /// Plans the named deliveries with the named vehicles and drivers only.
    pub fn plan_selection(
        &self,
        ctx: &RunContext,
        selection: &Selection,
        options: &PlanOptions,
    ) -> Result<PlanReport, PlanFailure> {
        let selection = selection.clone();
        self.execute(ctx, selection.date, false, options, move |store| {
            Ok(Loaded {
                deliveries: store.deliveries_by_ids(&selection.delivery_ids)?,
                vehicles: store.vehicles_by_ids(&selection.vehicle_ids)?,
                drivers: store.drivers_by_ids(&selection.driver_ids)?,
            })
        })
    }

    fn execute<L>(
        &self,
        ctx: &RunContext,
        date: Date,
        enforce_date: bool,
        options: &PlanOptions,
        load: L,
    ) -> Result<PlanReport, PlanFailure>
    where
        L: FnOnce(&S) -> Result<Loaded, StoreError> + Send + 'static,
    {
        let mut run = PlanRun::new();
        info!(%date, force = options.force, dry_run = options.dry_run, "planning run started");

        let _guard = self.locks.try_acquire(date).map_err(|error| run.fail(error))?;
        let _date_lock = self.store.lock_date(date).map_err(|error| {
            run.fail(match error {
                StoreError::Locked(date) => PlanError::ConcurrentPlanning(date),
                other => PlanError::Source(other),
            })
        })?;

        if !options.force && !options.dry_run {
            let planned = timed(ctx, "route lookup", &self.store, move |store| store.has_routes(date))
                .map_err(|error| run.fail(error))?;
            if planned {
                info!(%date, "routes already exist, nothing recomputed");
                run.advance(RunStage::Completed);
                return Ok(PlanReport::empty(date, PlanOutcome::AlreadyPlanned, run.history()));
            }
        }

        let loaded = timed(ctx, "loading planning data", &self.store, load).map_err(|error| run.fail(error))?;
        if loaded.deliveries.is_empty() {
            info!(%date, "no pending deliveries");
            run.advance(RunStage::Completed);
            return Ok(PlanReport::empty(date, PlanOutcome::NothingToPlan, run.history()));
        }

        let input = PlanInput {
            date,
            deliveries: &loaded.deliveries,
            vehicles: &loaded.vehicles,
            drivers: &loaded.drivers,
            enforce_date,
        };
        let plan = compute(ctx, &mut run, &input, options, &self.matrix)?;

        if options.dry_run {
            run.advance(RunStage::Completed);
            return Ok(PlanReport::planned(date, plan, false, run.history()));
        }

        run.advance(RunStage::Persisting);
        ctx.check_cancelled().map_err(|error| run.fail(error))?;
        let mode = if options.force { CommitMode::Replace } else { CommitMode::Insert };
        let deadline = Instant::now() + ctx.io_timeout;
        self.store
            .commit_routes(date, &plan.routes, mode, deadline)
            .map_err(|error| run.fail(PlanError::Persistence(error)))?;
        info!(%date, routes = plan.routes.len(), ?mode, "committed routes");

        run.advance(RunStage::Completed);
        Ok(PlanReport::planned(date, plan, true, run.history()))
    }
}

/// Calls a collaborator on its own thread and waits at most the run's I/O
/// timeout for the answer.
///
/// A call still running at the deadline is abandoned: the run fails with
/// [`PlanError::Timeout`] right away and the late result is dropped.
fn timed<S, T, F>(ctx: &RunContext, operation: &'static str, store: &Arc<S>, call: F) -> Result<T, PlanError>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let store = Arc::clone(store);
    thread::Builder::new()
        .name("planner-io".to_string())
        .spawn(move || {
            // Fails only when the caller already gave up.
            let _ = sender.send(call(&store));
        })
        .map_err(|err| PlanError::Source(StoreError::Io(err)))?;

    let value = match receiver.recv_timeout(ctx.io_timeout) {
        Ok(result) => result.map_err(PlanError::Source)?,
        Err(RecvTimeoutError::Timeout) => {
            warn!(operation, timeout = ?ctx.io_timeout, "collaborator call timed out");
            return Err(PlanError::Timeout {
                operation,
                timeout: ctx.io_timeout,
            });
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(PlanError::Source(StoreError::Unavailable(format!(
                "{operation} ended without a result"
            ))));
        }
    };
    ctx.check_cancelled()?;
    Ok(value)
}
