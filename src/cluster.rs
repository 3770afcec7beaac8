//! Geographic clustering of deliveries.
//!
//! Greedy radius grouping: take the lowest unclustered delivery id as a
//! seed, absorb every unclustered delivery within the radius of the
//! running centroid, recompute the centroid, and repeat until a pass
//! absorbs nothing. Then move to the next seed.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PlanError;
use crate::haversine::haversine_km;
use crate::models::{Cluster, Coordinate, Delivery, RoutableDelivery, UnassignedDelivery, UnassignedReason};

/// Cluster radius in kilometres, bounded to `0.5..=10`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ClusterRadius(f64);

impl ClusterRadius {
    pub const MIN_KM: f64 = 0.5;
    pub const MAX_KM: f64 = 10.0;
    pub const DEFAULT_KM: f64 = 2.0;

    pub fn new(km: f64) -> Result<Self, PlanError> {
        if (Self::MIN_KM..=Self::MAX_KM).contains(&km) {
            Ok(Self(km))
        } else {
            Err(PlanError::InvalidInput(format!(
                "cluster radius {km} km is outside {}..={} km",
                Self::MIN_KM,
                Self::MAX_KM
            )))
        }
    }

    pub fn km(&self) -> f64 {
        self.0
    }
}

impl Default for ClusterRadius {
    fn default() -> Self {
        Self(Self::DEFAULT_KM)
    }
}

impl TryFrom<f64> for ClusterRadius {
    type Error = PlanError;

    fn try_from(km: f64) -> Result<Self, Self::Error> {
        Self::new(km)
    }
}

impl From<ClusterRadius> for f64 {
    fn from(radius: ClusterRadius) -> Self {
        radius.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterOutcome {
    pub clusters: Vec<Cluster>,
    /// Deliveries without valid coordinates, in ascending id order.
    pub unroutable: Vec<UnassignedDelivery>,
}

pub fn cluster(deliveries: &[Delivery], radius: ClusterRadius) -> ClusterOutcome {
    let mut outcome = ClusterOutcome::default();

    let mut pending: Vec<RoutableDelivery> = Vec::with_capacity(deliveries.len());
    for delivery in deliveries {
        match RoutableDelivery::new(delivery.clone()) {
            Some(routable) => pending.push(routable),
            None => {
                warn!(delivery = %delivery.id, "delivery has no valid coordinates, excluded from clustering");
                outcome
                    .unroutable
                    .push(UnassignedDelivery::new(delivery.id, UnassignedReason::InvalidCoordinates));
            }
        }
    }
    pending.sort_by_key(RoutableDelivery::id);
    outcome.unroutable.sort_by_key(|issue| issue.delivery_id);

    let mut clustered = vec![false; pending.len()];
    for seed in 0..pending.len() {
        if clustered[seed] {
            continue;
        }
        clustered[seed] = true;

        let mut members = vec![seed];
        let mut centroid = pending[seed].location;
        loop {
            let before = members.len();
            for candidate in 0..pending.len() {
                if clustered[candidate] {
                    continue;
                }
                if haversine_km(centroid, pending[candidate].location) <= radius.km() {
                    clustered[candidate] = true;
                    members.push(candidate);
                }
            }
            if members.len() == before {
                break;
            }
            centroid = centroid_of(members.iter().map(|&index| pending[index].location));
        }

        members.sort_unstable();
        debug!(seed = %pending[seed].id(), size = members.len(), %centroid, "formed cluster");
        outcome.clusters.push(Cluster {
            centroid,
            deliveries: members.into_iter().map(|index| pending[index].clone()).collect(),
        });
    }

    outcome
}

/// Arithmetic mean of the coordinates. Adequate at cluster scale.
fn centroid_of(points: impl Iterator<Item = Coordinate>) -> Coordinate {
    let (mut lat, mut lon, mut count) = (0.0, 0.0, 0usize);
    for point in points {
        lat += point.lat;
        lon += point.lon;
        count += 1;
    }
    if count == 0 {
        return Coordinate::new(0.0, 0.0);
    }
    Coordinate::new(lat / count as f64, lon / count as f64)
}
