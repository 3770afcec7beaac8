//! Test fixtures for delivery-planner.
//!
//! Provides:
//! - Real Las Vegas / Henderson delivery sites
//! - Builders for deliveries, fleet and datasets

#![allow(dead_code)]

pub mod las_vegas;

use delivery_planner::models::{Coordinate, Delivery, Driver, DriverStatus, TimeWindow, Vehicle, VehicleStatus};
use delivery_planner::store::{Dataset, MemoryStore};
use jiff::civil::{Date, date, time};

pub use las_vegas::*;

/// The date every fixture is scheduled for unless told otherwise.
pub fn plan_date() -> Date {
    date(2026, 3, 2)
}

/// Builder for test deliveries with sensible defaults.
#[derive(Clone, Debug)]
pub struct DeliveryBuilder {
    delivery: Delivery,
}

impl DeliveryBuilder {
    pub fn new(id: u64) -> Self {
        Self {
            delivery: Delivery::new(id, Some(DEPOT.coordinate()), 10.0, 0.1, plan_date()),
        }
    }

    pub fn at(mut self, site: &Site) -> Self {
        self.delivery.location = Some(site.coordinate());
        self
    }

    pub fn at_coordinate(mut self, lat: f64, lon: f64) -> Self {
        self.delivery.location = Some(Coordinate::new(lat, lon));
        self
    }

    pub fn unlocated(mut self) -> Self {
        self.delivery.location = None;
        self
    }

    pub fn weight(mut self, kg: f64) -> Self {
        self.delivery.weight_kg = kg;
        self
    }

    pub fn volume(mut self, m3: f64) -> Self {
        self.delivery.volume_m3 = m3;
        self
    }

    pub fn scheduled(mut self, day: Date) -> Self {
        self.delivery.scheduled_date = day;
        self
    }

    pub fn window(mut self, start_hour: i8, end_hour: i8) -> Self {
        self.delivery.time_window = Some(TimeWindow {
            start: time(start_hour, 0, 0, 0),
            end: time(end_hour, 0, 0, 0),
        });
        self
    }

    pub fn build(self) -> Delivery {
        self.delivery
    }
}

pub fn delivery(id: u64) -> DeliveryBuilder {
    DeliveryBuilder::new(id)
}

/// One delivery per site, ids starting at `first_id`.
pub fn deliveries_at(first_id: u64, sites: &[Site]) -> Vec<Delivery> {
    sites
        .iter()
        .zip(first_id..)
        .map(|(site, id)| delivery(id).at(site).build())
        .collect()
}

pub fn vehicle(id: u64, capacity_kg: f64, capacity_m3: f64) -> Vehicle {
    Vehicle::new(id, capacity_kg, capacity_m3)
}

/// A delivery van roomy enough for any fixture neighbourhood.
pub fn van(id: u64) -> Vehicle {
    vehicle(id, 500.0, 8.0)
}

pub fn unavailable(mut vehicle: Vehicle) -> Vehicle {
    vehicle.status = VehicleStatus::Unavailable;
    vehicle
}

pub fn driver(id: u64) -> Driver {
    Driver::new(id)
}

pub fn inactive(mut driver: Driver) -> Driver {
    driver.status = DriverStatus::Inactive;
    driver
}

pub fn license_expiring(mut driver: Driver, expires: Date) -> Driver {
    driver.license_expires = Some(expires);
    driver
}

/// Builder for a dataset behind a [`MemoryStore`].
#[derive(Clone, Debug, Default)]
pub struct DatasetBuilder {
    dataset: Dataset,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self {
            dataset: Dataset {
                depot: Some(DEPOT.coordinate()),
                ..Dataset::default()
            },
        }
    }

    pub fn deliveries(mut self, deliveries: impl IntoIterator<Item = Delivery>) -> Self {
        self.dataset.deliveries.extend(deliveries);
        self
    }

    pub fn vehicles(mut self, vehicles: impl IntoIterator<Item = Vehicle>) -> Self {
        self.dataset.vehicles.extend(vehicles);
        self
    }

    pub fn drivers(mut self, drivers: impl IntoIterator<Item = Driver>) -> Self {
        self.dataset.drivers.extend(drivers);
        self
    }

    pub fn build(self) -> Dataset {
        self.dataset
    }

    pub fn store(self) -> MemoryStore {
        MemoryStore::new(self.dataset)
    }
}
