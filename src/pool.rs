//! Shared vehicle/driver pool for one planning run.
//!
//! Vehicles and drivers live in fixed arenas; a claimed bitmap per arena,
//! guarded by a single lock, records which ones are already booked. A claim
//! packs a cluster and books the opened vehicles plus one driver each in one
//! critical section, so two clusters never share a vehicle or a driver.

use std::collections::HashMap;

use fixedbitset::FixedBitSet;
use parking_lot::Mutex;
use tracing::debug;

use crate::assign::{AssignmentOutcome, assign_bounded};
use crate::models::{Cluster, Driver, UnassignedDelivery, UnassignedReason, Vehicle, VehicleAssignment, VehicleId};

/// A loaded vehicle paired with the driver who will run it.
#[derive(Debug, Clone)]
pub struct Crew {
    pub assignment: VehicleAssignment,
    pub driver: Driver,
}

#[derive(Debug, Clone, Default)]
pub struct ClaimOutcome {
    pub crews: Vec<Crew>,
    pub unassigned: Vec<UnassignedDelivery>,
}

#[derive(Debug)]
struct Claims {
    vehicles: FixedBitSet,
    drivers: FixedBitSet,
}

#[derive(Debug)]
pub struct ResourcePool {
    vehicles: Vec<Vehicle>,
    /// Ascending id, so the first unclaimed driver is the lowest id.
    drivers: Vec<Driver>,
    vehicle_index: HashMap<VehicleId, usize>,
    claims: Mutex<Claims>,
}

impl ResourcePool {
    pub fn new(mut vehicles: Vec<Vehicle>, mut drivers: Vec<Driver>) -> Self {
        vehicles.sort_by_key(|vehicle| vehicle.id);
        vehicles.dedup_by_key(|vehicle| vehicle.id);
        drivers.sort_by_key(|driver| driver.id);
        drivers.dedup_by_key(|driver| driver.id);

        let vehicle_index = vehicles.iter().enumerate().map(|(index, vehicle)| (vehicle.id, index)).collect();
        let claims = Claims {
            vehicles: FixedBitSet::with_capacity(vehicles.len()),
            drivers: FixedBitSet::with_capacity(drivers.len()),
        };

        Self {
            vehicles,
            drivers,
            vehicle_index,
            claims: Mutex::new(claims),
        }
    }

    pub fn unclaimed_vehicles(&self) -> usize {
        let claims = self.claims.lock();
        claims.vehicles.zeroes().count()
    }

    pub fn unclaimed_drivers(&self) -> usize {
        let claims = self.claims.lock();
        claims.drivers.zeroes().count()
    }

    /// Packs `cluster` into the unclaimed vehicles and books what was used.
    ///
    /// At most as many vehicles are opened as there are unclaimed drivers.
    pub fn claim_for(&self, cluster: &Cluster) -> ClaimOutcome {
        self.claim_with(cluster, assign_bounded)
    }

    /// Same as [`ResourcePool::claim_for`] with a custom packing function.
    pub fn claim_with<F>(&self, cluster: &Cluster, pack: F) -> ClaimOutcome
    where
        F: FnOnce(&Cluster, &[Vehicle], usize) -> AssignmentOutcome,
    {
        let mut claims = self.claims.lock();

        let offered: Vec<Vehicle> = claims.vehicles.zeroes().map(|index| self.vehicles[index].clone()).collect();
        let mut free_drivers: Vec<usize> = claims.drivers.zeroes().collect();
        free_drivers.reverse();

        let packed = pack(cluster, &offered, free_drivers.len());

        let mut outcome = ClaimOutcome {
            crews: Vec::with_capacity(packed.assignments.len()),
            unassigned: packed.unassigned,
        };
        for assignment in packed.assignments {
            let vehicle = self
                .vehicle_index
                .get(&assignment.vehicle.id)
                .copied()
                .filter(|&index| !claims.vehicles.contains(index));
            let (Some(vehicle), Some(driver)) = (vehicle, free_drivers.pop()) else {
                // The packer used a vehicle outside the offer or ran past the
                // driver bound; its load goes back as unassigned.
                outcome.unassigned.extend(
                    assignment
                        .deliveries
                        .iter()
                        .map(|delivery| UnassignedDelivery::new(delivery.id(), UnassignedReason::InsufficientCapacity)),
                );
                continue;
            };

            claims.vehicles.insert(vehicle);
            claims.drivers.insert(driver);
            debug!(vehicle = %assignment.vehicle.id, driver = %self.drivers[driver].id, "claimed crew");
            outcome.crews.push(Crew {
                assignment,
                driver: self.drivers[driver].clone(),
            });
        }

        outcome
    }
}
