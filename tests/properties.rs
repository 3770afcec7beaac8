//! Property tests for the planning invariants: partition, capacity, coverage.

mod fixtures;

use std::collections::HashMap;

use delivery_planner::assign::assign;
use delivery_planner::cluster::{ClusterRadius, cluster};
use delivery_planner::haversine::HaversineMatrix;
use delivery_planner::models::{Coordinate, Delivery, Driver, Vehicle};
use delivery_planner::{PlanError, PlanInput, PlanOptions, RunContext, plan};
use fixtures::{DEPOT, plan_date};
use proptest::prelude::*;

prop_compose! {
    fn arb_deliveries(max: usize)
    (specs in prop::collection::vec((-0.2f64..0.2, -0.2f64..0.2, 0.5f64..120.0, 0.01f64..2.0, prop::bool::weighted(0.05)), 1..max))
    -> Vec<Delivery> {
        specs
            .into_iter()
            .zip(1u64..)
            .map(|((dlat, dlon, weight, volume, unlocated), id)| {
                let location = (!unlocated).then(|| Coordinate::new(DEPOT.lat + dlat, DEPOT.lon + dlon));
                Delivery::new(id, location, weight, volume, plan_date())
            })
            .collect()
    }
}

prop_compose! {
    fn arb_fleet()
    (capacities in prop::collection::vec((20.0f64..300.0, 0.5f64..6.0), 1..8), drivers in 1u64..8)
    -> (Vec<Vehicle>, Vec<Driver>) {
        let vehicles = capacities
            .into_iter()
            .zip(1u64..)
            .map(|((weight, volume), id)| Vehicle::new(id, weight, volume))
            .collect();
        (vehicles, (1..=drivers).map(Driver::new).collect())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn clusters_partition_routable_deliveries(deliveries in arb_deliveries(80), radius in 0.5f64..10.0) {
        let outcome = cluster(&deliveries, ClusterRadius::new(radius).unwrap());

        let mut seen: HashMap<u64, usize> = HashMap::new();
        for group in &outcome.clusters {
            prop_assert!(!group.deliveries.is_empty());
            for member in &group.deliveries {
                *seen.entry(member.id().0).or_default() += 1;
            }
        }
        for issue in &outcome.unroutable {
            *seen.entry(issue.delivery_id.0).or_default() += 1;
        }

        prop_assert_eq!(seen.len(), deliveries.len());
        prop_assert!(seen.values().all(|&count| count == 1));
        prop_assert_eq!(
            outcome.unroutable.len(),
            deliveries.iter().filter(|d| d.location.is_none()).count()
        );
    }

    #[test]
    fn assignments_never_exceed_capacity(deliveries in arb_deliveries(40), (vehicles, _) in arb_fleet()) {
        let outcome = cluster(&deliveries, ClusterRadius::new(10.0).unwrap());

        for group in &outcome.clusters {
            let packed = assign(group, &vehicles);
            prop_assert_eq!(packed.assigned_count() + packed.unassigned.len(), group.deliveries.len());
            for bin in &packed.assignments {
                let weight: f64 = bin.deliveries.iter().map(|d| d.weight_kg()).sum();
                let volume: f64 = bin.deliveries.iter().map(|d| d.volume_m3()).sum();
                prop_assert!(weight <= bin.vehicle.capacity_weight_kg + 1e-9);
                prop_assert!(volume <= bin.vehicle.capacity_volume_m3 + 1e-9);
            }
            let mut opened: Vec<u64> = packed.assignments.iter().map(|bin| bin.vehicle.id.0).collect();
            let before = opened.len();
            opened.sort_unstable();
            opened.dedup();
            prop_assert_eq!(opened.len(), before, "a vehicle is opened at most once");
        }
    }

    #[test]
    fn every_delivery_is_routed_or_reported_once(
        deliveries in arb_deliveries(60),
        (vehicles, drivers) in arb_fleet(),
        radius in 0.5f64..10.0,
    ) {
        let input = PlanInput::new(plan_date(), &deliveries, &vehicles, &drivers);
        let options = PlanOptions::new(DEPOT.coordinate()).with_cluster_radius(ClusterRadius::new(radius).unwrap());

        let mut seen: HashMap<u64, usize> = HashMap::new();
        match plan(&RunContext::default(), &input, &options, &HaversineMatrix) {
            Ok(report) => {
                prop_assert!(report.routes.len() <= drivers.len());
                for route in &report.routes {
                    for id in route.delivery_ids() {
                        *seen.entry(id.0).or_default() += 1;
                    }
                    let legs: f64 = route.stops.iter().map(|stop| stop.leg_distance_km).sum();
                    prop_assert!((route.total_distance_km - legs).abs() < 1e-6);
                }
                for issue in &report.unassigned {
                    *seen.entry(issue.delivery_id.0).or_default() += 1;
                }
            }
            Err(failure) => match &failure.error {
                PlanError::NothingPlanned { .. } | PlanError::InvalidDeliveries { .. } => {
                    for issue in failure.error.unassigned() {
                        *seen.entry(issue.delivery_id.0).or_default() += 1;
                    }
                }
                other => return Err(TestCaseError::fail(format!("unexpected failure: {other}"))),
            },
        }

        prop_assert_eq!(seen.len(), deliveries.len());
        prop_assert!(seen.values().all(|&count| count == 1));
    }
}
