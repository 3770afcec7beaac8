//! Collaborator seams for the route planner.
//!
//! Deliveries, fleet data and route persistence live outside this crate.
//! Concrete apps implement these traits over their own storage;
//! [`crate::store`] ships an in-memory and a JSON file implementation.

use std::time::Instant;

use jiff::civil::Date;

use crate::error::StoreError;
use crate::lock::LockFile;
use crate::models::{Coordinate, Delivery, DeliveryId, Driver, DriverId, Route, Vehicle, VehicleId};

/// Reads deliveries awaiting a route.
pub trait DeliverySource {
    /// Deliveries scheduled for `date` that the planner should route.
    fn pending_deliveries(&self, date: Date) -> Result<Vec<Delivery>, StoreError>;

    /// An explicit subset. Unknown ids are an error.
    fn deliveries_by_ids(&self, ids: &[DeliveryId]) -> Result<Vec<Delivery>, StoreError>;
}

/// Reads vehicles and drivers. Availability filtering happens in the planner.
pub trait FleetSource {
    fn vehicles(&self, date: Date) -> Result<Vec<Vehicle>, StoreError>;

    fn drivers(&self, date: Date) -> Result<Vec<Driver>, StoreError>;

    fn vehicles_by_ids(&self, ids: &[VehicleId]) -> Result<Vec<Vehicle>, StoreError>;

    fn drivers_by_ids(&self, ids: &[DriverId]) -> Result<Vec<Driver>, StoreError>;
}

/// How a commit treats routes already stored for the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Fail with [`StoreError::AlreadyPlanned`] if the date has routes.
    Insert,
    /// Discard the date's routes and store the new set in their place.
    Replace,
}

/// Persists planned routes.
pub trait RouteStore {
    fn has_routes(&self, date: Date) -> Result<bool, StoreError>;

    /// Stores every route of a run or none of them.
    ///
    /// Implementations should refuse to start writing once `deadline` has
    /// passed.
    fn commit_routes(&self, date: Date, routes: &[Route], mode: CommitMode, deadline: Instant) -> Result<(), StoreError>;

    /// Holds `date` against runs in other processes that share this storage.
    ///
    /// Fails with [`StoreError::Locked`] while another holder has the date.
    /// Stores only reachable from one process return `Ok(None)`.
    fn lock_date(&self, _date: Date) -> Result<Option<LockFile>, StoreError> {
        Ok(None)
    }
}

/// Provides a distance matrix for a set of locations.
///
/// The matrix is indexed by the provided location order, values are kilometres.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, locations: &[Coordinate]) -> Vec<Vec<f64>>;
}
