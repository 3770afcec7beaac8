//! Nearest-Neighbor stop sequencing.
//!
//! Starting at the depot, repeatedly drive to the closest unvisited
//! delivery; ties go to the lowest delivery id. This is a greedy O(n²)
//! construction: every leg respects the triangle inequality of the
//! underlying metric, but the resulting path is not guaranteed to be the
//! shortest one.

use jiff::civil::Date;
use tracing::debug;

use crate::haversine::haversine_km;
use crate::models::{Coordinate, Driver, RoutableDelivery, Route, Stop, VehicleAssignment};
use crate::traits::DistanceMatrixProvider;

/// Orders the assignment's deliveries into stops.
///
/// The path is open: it ends at the last delivery, with no return leg.
pub fn order_stops<M>(assignment: &VehicleAssignment, depot: Coordinate, matrix_provider: &M) -> Vec<Stop>
where
    M: DistanceMatrixProvider + ?Sized,
{
    let mut candidates: Vec<&RoutableDelivery> = assignment.deliveries.iter().collect();
    candidates.sort_by_key(|delivery| delivery.id());

    // Index 0 is the depot, index i + 1 is candidates[i].
    let mut locations = Vec::with_capacity(candidates.len() + 1);
    locations.push(depot);
    locations.extend(candidates.iter().map(|delivery| delivery.location));
    let matrix = matrix_provider.matrix_for(&locations);
    let distance = |from: usize, to: usize| -> f64 {
        matrix
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .filter(|km| km.is_finite())
            .unwrap_or_else(|| haversine_km(locations[from], locations[to]))
            .max(0.0)
    };

    let mut visited = vec![false; candidates.len()];
    let mut stops = Vec::with_capacity(candidates.len());
    let mut current = 0;
    let mut cumulative = 0.0;

    for sequence in 1..=candidates.len() {
        let mut best: Option<(usize, f64)> = None;
        for index in (0..candidates.len()).filter(|&index| !visited[index]) {
            let km = distance(current, index + 1);
            if best.is_none_or(|(_, best_km)| km < best_km) {
                best = Some((index, km));
            }
        }
        let Some((index, leg)) = best else {
            break;
        };

        visited[index] = true;
        cumulative += leg;
        let delivery = candidates[index];
        stops.push(Stop {
            delivery_id: delivery.id(),
            sequence,
            location: delivery.location,
            time_window: delivery.delivery.time_window,
            leg_distance_km: leg,
            cumulative_distance_km: cumulative,
        });
        current = index + 1;
    }

    stops
}

/// Sequences one vehicle's deliveries into a route for `driver` on `date`.
pub fn sequence<M>(assignment: &VehicleAssignment, driver: &Driver, date: Date, depot: Coordinate, matrix_provider: &M) -> Route
where
    M: DistanceMatrixProvider + ?Sized,
{
    let stops = order_stops(assignment, depot, matrix_provider);
    let total_distance_km: f64 = stops.iter().map(|stop| stop.leg_distance_km).sum();
    debug!(vehicle = %assignment.vehicle.id, stops = stops.len(), total_km = total_distance_km, "sequenced route");

    Route {
        date,
        vehicle_id: assignment.vehicle.id,
        driver_id: driver.id,
        stops,
        total_distance_km,
        total_weight_kg: assignment.total_weight_kg,
        total_volume_m3: assignment.total_volume_m3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haversine::HaversineMatrix;
    use crate::models::{Delivery, Vehicle};
    use jiff::civil::date;

    fn assignment_at(points: &[(u64, f64, f64)]) -> VehicleAssignment {
        let mut assignment = VehicleAssignment::new(Vehicle::new(1, 1000.0, 100.0));
        for &(id, lat, lon) in points {
            let delivery = Delivery::new(id, Some(Coordinate::new(lat, lon)), 1.0, 0.1, date(2026, 3, 2));
            assignment.load(RoutableDelivery::new(delivery).unwrap());
        }
        assignment
    }

    fn order(stops: &[Stop]) -> Vec<u64> {
        stops.iter().map(|stop| stop.delivery_id.0).collect()
    }

    #[test]
    fn test_nearest_neighbor_order_from_depot() {
        let depot = Coordinate::new(0.0, 0.0);
        let assignment = assignment_at(&[(1, 0.03, 0.04), (2, 0.01, 0.0), (3, 0.0, 0.05), (4, 0.02, 0.01)]);

        let stops = order_stops(&assignment, depot, &HaversineMatrix);

        // depot -> 2 (1.1 km) -> 4 (1.6 km) -> 1 (3.5 km) -> 3 (3.5 km)
        assert_eq!(order(&stops), vec![2, 4, 1, 3]);
        assert_eq!(stops.iter().map(|s| s.sequence).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    /// Reads coordinates as points on a plane measured in kilometres.
    struct PlaneKm;

    impl DistanceMatrixProvider for PlaneKm {
        fn matrix_for(&self, locations: &[Coordinate]) -> Vec<Vec<f64>> {
            locations
                .iter()
                .map(|from| locations.iter().map(|to| (from.lat - to.lat).hypot(from.lon - to.lon)).collect())
                .collect()
        }
    }

    #[test]
    fn test_three_stops_around_origin_depot() {
        let depot = Coordinate::new(0.0, 0.0);
        let assignment = assignment_at(&[(1, 3.0, 4.0), (2, 1.0, 0.0), (3, 0.0, 5.0)]);

        let stops = order_stops(&assignment, depot, &PlaneKm);

        // depot -> (1,0) 1 km -> (3,4) 4.47 km -> (0,5) 3.16 km
        assert_eq!(order(&stops), vec![2, 1, 3]);
        let legs: Vec<f64> = stops.iter().map(|stop| stop.leg_distance_km).collect();
        assert!((legs[0] - 1.0).abs() < 1e-12);
        assert!((legs[1] - 20f64.sqrt()).abs() < 1e-12);
        assert!((legs[2] - 10f64.sqrt()).abs() < 1e-12);
        assert!((stops[2].cumulative_distance_km - (1.0 + 20f64.sqrt() + 10f64.sqrt())).abs() < 1e-9);

        // Same points read as degrees on the globe.
        assert_eq!(order(&order_stops(&assignment, depot, &HaversineMatrix)), vec![2, 1, 3]);
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let depot = Coordinate::new(0.0, 0.0);
        let assignment = assignment_at(&[(7, 0.01, 0.0), (3, -0.01, 0.0)]);

        let stops = order_stops(&assignment, depot, &HaversineMatrix);

        assert_eq!(order(&stops), vec![3, 7]);
    }

    #[test]
    fn test_total_is_sum_of_legs() {
        let depot = Coordinate::new(36.1147, -115.1728);
        let assignment = assignment_at(&[(1, 36.1215, -115.1739), (2, 36.1727, -115.1580), (3, 36.1263, -115.1658)]);
        let driver = Driver::new(9);

        let route = sequence(&assignment, &driver, date(2026, 3, 2), depot, &HaversineMatrix);

        let legs: f64 = route.stops.iter().map(|s| s.leg_distance_km).sum();
        assert_eq!(route.total_distance_km, legs);
        assert_eq!(route.stops.last().unwrap().cumulative_distance_km, route.total_distance_km);
        assert!(route.stops.iter().all(|s| s.leg_distance_km >= 0.0));
        assert_eq!(route.driver_id.0, 9);
        assert_eq!(route.vehicle_id.0, 1);
    }

    #[test]
    fn test_first_leg_starts_at_depot() {
        let depot = Coordinate::new(0.0, 0.0);
        let assignment = assignment_at(&[(1, 1.0, 0.0)]);

        let stops = order_stops(&assignment, depot, &HaversineMatrix);

        assert_eq!(stops[0].leg_distance_km, haversine_km(depot, Coordinate::new(1.0, 0.0)));
    }

    #[test]
    fn test_greedy_path_is_not_always_shortest() {
        // Greedy takes 1 first, then 2 on the far side, then crosses back to 3.
        // Visiting 2, 1, 3 is shorter.
        let depot = Coordinate::new(0.0, 0.0);
        let p1 = Coordinate::new(0.0, 0.010);
        let p2 = Coordinate::new(0.0, -0.020);
        let p3 = Coordinate::new(0.0, 0.045);
        let assignment = assignment_at(&[(1, p1.lat, p1.lon), (2, p2.lat, p2.lon), (3, p3.lat, p3.lon)]);

        let stops = order_stops(&assignment, depot, &HaversineMatrix);
        assert_eq!(order(&stops), vec![1, 2, 3]);

        let greedy_total = stops.last().unwrap().cumulative_distance_km;
        let alternative = haversine_km(depot, p2) + haversine_km(p2, p1) + haversine_km(p1, p3);
        assert!(greedy_total > alternative);
    }

    struct BrokenMatrix;

    impl DistanceMatrixProvider for BrokenMatrix {
        fn matrix_for(&self, _locations: &[Coordinate]) -> Vec<Vec<f64>> {
            Vec::new()
        }
    }

    #[test]
    fn test_short_matrix_falls_back_to_haversine() {
        let depot = Coordinate::new(0.0, 0.0);
        let assignment = assignment_at(&[(1, 0.02, 0.0), (2, 0.01, 0.0)]);

        let stops = order_stops(&assignment, depot, &BrokenMatrix);

        assert_eq!(order(&stops), vec![2, 1]);
        assert!(stops[0].leg_distance_km > 1.0);
    }

    #[test]
    fn test_empty_assignment_yields_empty_route() {
        let assignment = VehicleAssignment::new(Vehicle::new(1, 10.0, 1.0));
        let route = sequence(&assignment, &Driver::new(1), date(2026, 3, 2), Coordinate::new(0.0, 0.0), &HaversineMatrix);
        assert!(route.stops.is_empty());
        assert_eq!(route.total_distance_km, 0.0);
    }
}
