//! First-Fit-Decreasing packing of a cluster into vehicles.
//!
//! Ordering rules, fixed so identical inputs always pack identically:
//!
//! * deliveries: weight descending, then volume descending, then id ascending;
//! * vehicles: capacity weight ascending, then capacity volume ascending,
//!   then id ascending (smallest-fit-first).
//!
//! Each delivery goes into the first already opened vehicle, in opening
//! order, whose remaining weight and volume both accommodate it. Failing
//! that, the first unopened vehicle in sorted order that can carry it on its
//! own is opened. Failing that, the delivery is reported as unassigned with
//! [`UnassignedReason::InsufficientCapacity`].

use std::cmp::Ordering;

use tracing::debug;

use crate::models::{Cluster, RoutableDelivery, UnassignedDelivery, UnassignedReason, Vehicle, VehicleAssignment};

#[derive(Debug, Clone, Default)]
pub struct AssignmentOutcome {
    /// Loaded vehicles in opening order. Never contains an empty vehicle.
    pub assignments: Vec<VehicleAssignment>,
    pub unassigned: Vec<UnassignedDelivery>,
}

impl AssignmentOutcome {
    pub fn assigned_count(&self) -> usize {
        self.assignments.iter().map(|assignment| assignment.deliveries.len()).sum()
    }
}

/// Packs `cluster` into as many of `vehicles` as needed.
pub fn assign(cluster: &Cluster, vehicles: &[Vehicle]) -> AssignmentOutcome {
    assign_bounded(cluster, vehicles, vehicles.len())
}

/// Like [`assign`], but opens at most `max_vehicles` vehicles. The planner
/// uses the bound to never open more vehicles than it has drivers for.
pub fn assign_bounded(cluster: &Cluster, vehicles: &[Vehicle], max_vehicles: usize) -> AssignmentOutcome {
    let mut items: Vec<&RoutableDelivery> = cluster.deliveries.iter().collect();
    items.sort_by(|a, b| demand_order(a, b));

    let mut fleet: Vec<&Vehicle> = vehicles.iter().filter(|vehicle| vehicle.is_assignable()).collect();
    fleet.sort_by(|a, b| capacity_order(a, b));
    let mut opened_flags = vec![false; fleet.len()];

    let mut outcome = AssignmentOutcome::default();
    for item in items {
        if let Some(bin) = outcome.assignments.iter_mut().find(|bin| bin.accommodates(item)) {
            bin.load(item.clone());
            continue;
        }

        let fresh = if outcome.assignments.len() < max_vehicles {
            (0..fleet.len()).find(|&index| !opened_flags[index] && fleet[index].can_carry(item))
        } else {
            None
        };

        match fresh {
            Some(index) => {
                opened_flags[index] = true;
                debug!(vehicle = %fleet[index].id, delivery = %item.id(), "opened vehicle");
                let mut bin = VehicleAssignment::new(fleet[index].clone());
                bin.load(item.clone());
                outcome.assignments.push(bin);
            }
            None => outcome
                .unassigned
                .push(UnassignedDelivery::new(item.id(), UnassignedReason::InsufficientCapacity)),
        }
    }

    outcome
}

fn demand_order(a: &RoutableDelivery, b: &RoutableDelivery) -> Ordering {
    b.weight_kg()
        .total_cmp(&a.weight_kg())
        .then_with(|| b.volume_m3().total_cmp(&a.volume_m3()))
        .then_with(|| a.id().cmp(&b.id()))
}

fn capacity_order(a: &Vehicle, b: &Vehicle) -> Ordering {
    a.capacity_weight_kg
        .total_cmp(&b.capacity_weight_kg)
        .then_with(|| a.capacity_volume_m3.total_cmp(&b.capacity_volume_m3))
        .then_with(|| a.id.cmp(&b.id))
}
