//! Planning domain records.
//!
//! These are plain data structs handed to the planning stages by value or
//! reference. Loading and persisting them is the job of the collaborator
//! traits in [`crate::traits`].

use std::fmt;

use jiff::civil::{Date, Time};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a delivery. Orders numerically, which every tie-break relies on.
    DeliveryId
);
entity_id!(VehicleId);
entity_id!(DriverId);

/// A point on the earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Finite and within the latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// Customer delivery window. Informational for the execution side; the
/// sequencer does not schedule against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Time,
    pub end: Time,
}

impl TimeWindow {
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// A single shipment destined to a customer location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    /// `None` when the customer address was never geocoded.
    pub location: Option<Coordinate>,
    pub weight_kg: f64,
    pub volume_m3: f64,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    pub scheduled_date: Date,
}

impl Delivery {
    pub fn new(id: u64, location: Option<Coordinate>, weight_kg: f64, volume_m3: f64, scheduled_date: Date) -> Self {
        Self {
            id: DeliveryId(id),
            location,
            weight_kg,
            volume_m3,
            time_window: None,
            scheduled_date,
        }
    }

    /// The location, if present and geographically valid.
    pub fn routable_location(&self) -> Option<Coordinate> {
        self.location.filter(Coordinate::is_valid)
    }

    pub fn has_valid_measurements(&self) -> bool {
        self.weight_kg.is_finite() && self.weight_kg >= 0.0 && self.volume_m3.is_finite() && self.volume_m3 >= 0.0
    }
}

/// A delivery whose coordinates were checked by the clusterer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutableDelivery {
    pub delivery: Delivery,
    pub location: Coordinate,
}

impl RoutableDelivery {
    /// Returns `None` when the delivery has no valid coordinates.
    pub fn new(delivery: Delivery) -> Option<Self> {
        let location = delivery.routable_location()?;
        Some(Self { delivery, location })
    }

    pub fn id(&self) -> DeliveryId {
        self.delivery.id
    }

    pub fn weight_kg(&self) -> f64 {
        self.delivery.weight_kg
    }

    pub fn volume_m3(&self) -> f64 {
        self.delivery.volume_m3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    Unavailable,
}

/// A fleet unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub capacity_weight_kg: f64,
    pub capacity_volume_m3: f64,
    pub status: VehicleStatus,
}

impl Vehicle {
    pub fn new(id: u64, capacity_weight_kg: f64, capacity_volume_m3: f64) -> Self {
        Self {
            id: VehicleId(id),
            capacity_weight_kg,
            capacity_volume_m3,
            status: VehicleStatus::Available,
        }
    }

    pub fn is_assignable(&self) -> bool {
        self.status == VehicleStatus::Available
            && self.capacity_weight_kg.is_finite()
            && self.capacity_weight_kg >= 0.0
            && self.capacity_volume_m3.is_finite()
            && self.capacity_volume_m3 >= 0.0
    }

    /// Whether an empty vehicle could carry the delivery.
    pub fn can_carry(&self, delivery: &RoutableDelivery) -> bool {
        delivery.weight_kg() <= self.capacity_weight_kg && delivery.volume_m3() <= self.capacity_volume_m3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Active,
    Inactive,
}

/// A person eligible to operate a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub status: DriverStatus,
    /// Last day the license is valid. `None` means no expiry on record.
    #[serde(default)]
    pub license_expires: Option<Date>,
}

impl Driver {
    pub fn new(id: u64) -> Self {
        Self {
            id: DriverId(id),
            status: DriverStatus::Active,
            license_expires: None,
        }
    }

    pub fn is_assignable_on(&self, date: Date) -> bool {
        self.status == DriverStatus::Active && self.license_expires.is_none_or(|expires| expires >= date)
    }
}

/// Deliveries grouped around a centroid, handled by one or more vehicles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub centroid: Coordinate,
    /// Members in ascending id order.
    pub deliveries: Vec<RoutableDelivery>,
}

/// Deliveries packed into one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleAssignment {
    pub vehicle: Vehicle,
    pub deliveries: Vec<RoutableDelivery>,
    pub total_weight_kg: f64,
    pub total_volume_m3: f64,
}

impl VehicleAssignment {
    pub fn new(vehicle: Vehicle) -> Self {
        Self {
            vehicle,
            deliveries: Vec::new(),
            total_weight_kg: 0.0,
            total_volume_m3: 0.0,
        }
    }

    pub fn remaining_weight_kg(&self) -> f64 {
        self.vehicle.capacity_weight_kg - self.total_weight_kg
    }

    pub fn remaining_volume_m3(&self) -> f64 {
        self.vehicle.capacity_volume_m3 - self.total_volume_m3
    }

    /// Inclusive fit check on both weight and volume.
    pub fn accommodates(&self, delivery: &RoutableDelivery) -> bool {
        self.total_weight_kg + delivery.weight_kg() <= self.vehicle.capacity_weight_kg
            && self.total_volume_m3 + delivery.volume_m3() <= self.vehicle.capacity_volume_m3
    }

    pub fn load(&mut self, delivery: RoutableDelivery) {
        self.total_weight_kg += delivery.weight_kg();
        self.total_volume_m3 += delivery.volume_m3();
        self.deliveries.push(delivery);
    }
}

/// One point in a route's sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub delivery_id: DeliveryId,
    /// 1-based; sequence 0 is the depot.
    pub sequence: usize,
    pub location: Coordinate,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    /// Distance from the previous stop (or the depot for the first stop).
    pub leg_distance_km: f64,
    pub cumulative_distance_km: f64,
}

/// The ordered deliveries of one vehicle and driver on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub date: Date,
    pub vehicle_id: VehicleId,
    pub driver_id: DriverId,
    pub stops: Vec<Stop>,
    pub total_distance_km: f64,
    pub total_weight_kg: f64,
    pub total_volume_m3: f64,
}

impl Route {
    pub fn delivery_ids(&self) -> impl Iterator<Item = DeliveryId> + '_ {
        self.stops.iter().map(|stop| stop.delivery_id)
    }
}

/// Why a delivery did not end up on a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// Missing or out-of-range coordinates.
    InvalidCoordinates,
    /// Negative or non-finite weight/volume.
    InvalidMeasurements,
    InvalidTimeWindow,
    /// Scheduled for a different date than the one being planned.
    WrongDate,
    DuplicateId,
    /// No remaining vehicle (with a driver) could take it. This is the
    /// capacity-exhausted error, reported per delivery rather than failing the run.
    InsufficientCapacity,
}

impl fmt::Display for UnassignedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnassignedReason::InvalidCoordinates => "unroutable: missing or invalid coordinates",
            UnassignedReason::InvalidMeasurements => "invalid weight or volume",
            UnassignedReason::InvalidTimeWindow => "time window ends before it starts",
            UnassignedReason::WrongDate => "scheduled for another date",
            UnassignedReason::DuplicateId => "duplicate delivery id",
            UnassignedReason::InsufficientCapacity => "insufficient capacity",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnassignedDelivery {
    pub delivery_id: DeliveryId,
    pub reason: UnassignedReason,
}

impl UnassignedDelivery {
    pub fn new(delivery_id: DeliveryId, reason: UnassignedReason) -> Self {
        Self { delivery_id, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(36.1, -115.1).is_valid());
        assert!(Coordinate::new(90.0, 180.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_routable_delivery_requires_location() {
        let day = date(2026, 3, 2);
        assert!(RoutableDelivery::new(Delivery::new(1, None, 1.0, 1.0, day)).is_none());
        assert!(RoutableDelivery::new(Delivery::new(2, Some(Coordinate::new(100.0, 0.0)), 1.0, 1.0, day)).is_none());
        assert!(RoutableDelivery::new(Delivery::new(3, Some(Coordinate::new(1.0, 1.0)), 1.0, 1.0, day)).is_some());
    }

    #[test]
    fn test_driver_license_expiry_is_inclusive() {
        let mut driver = Driver::new(1);
        driver.license_expires = Some(date(2026, 3, 2));
        assert!(driver.is_assignable_on(date(2026, 3, 2)));
        assert!(!driver.is_assignable_on(date(2026, 3, 3)));

        driver.status = DriverStatus::Inactive;
        assert!(!driver.is_assignable_on(date(2026, 3, 1)));
    }

    #[test]
    fn test_assignment_accommodates_inclusive_capacity() {
        let day = date(2026, 3, 2);
        let mut assignment = VehicleAssignment::new(Vehicle::new(1, 90.0, 10.0));
        let at = Some(Coordinate::new(0.0, 0.0));
        assignment.load(RoutableDelivery::new(Delivery::new(1, at, 50.0, 1.0, day)).unwrap());

        let exact = RoutableDelivery::new(Delivery::new(2, at, 40.0, 1.0, day)).unwrap();
        let over = RoutableDelivery::new(Delivery::new(3, at, 41.0, 1.0, day)).unwrap();
        assert!(assignment.accommodates(&exact));
        assert!(!assignment.accommodates(&over));
        assert_eq!(assignment.remaining_weight_kg(), 40.0);
    }

    #[test]
    fn test_unavailable_vehicle_is_not_assignable() {
        let mut vehicle = Vehicle::new(1, 100.0, 5.0);
        assert!(vehicle.is_assignable());
        vehicle.status = VehicleStatus::Unavailable;
        assert!(!vehicle.is_assignable());
        assert!(!Vehicle::new(2, -1.0, 5.0).is_assignable());
    }
}
