use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{DistanceEstimatorKind, DistancePolicy};
use crate::domain::{Address, GeoPoint};

const EARTH_RADIUS_KM: f64 = 6371.0088;
const NEARBY_PROXY: f64 = 5.0;
const DISTANT_PROXY: f64 = 15.0;

/// Travel estimate between a client and a caregiver, with the score penalty it implies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    /// Kilometers for geodesic estimates; a unitless proxy otherwise.
    pub distance: f64,
    pub penalty: i32,
    /// True when the value is a textual heuristic rather than a measured distance.
    pub estimated: bool,
}

/// Capability that turns two addresses into a proximity penalty.
pub trait DistanceEstimator: Send + Sync {
    fn estimate(&self, client: &Address, caregiver: &Address) -> DistanceEstimate;
}

/// Placeholder estimator: addresses whose normalized text contains the other are "near" (5),
/// anything else is "far" (15). Not a distance metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressProximity;

impl DistanceEstimator for AddressProximity {
    fn estimate(&self, client: &Address, caregiver: &Address) -> DistanceEstimate {
        let client = client.normalized();
        let caregiver = caregiver.normalized();
        let near = !client.is_empty()
            && !caregiver.is_empty()
            && (client.contains(&caregiver) || caregiver.contains(&client));
        let distance = if near { NEARBY_PROXY } else { DISTANT_PROXY };

        DistanceEstimate {
            distance,
            penalty: distance as i32,
            estimated: true,
        }
    }
}

/// Great-circle distance between geocoded addresses. Falls back to [`AddressProximity`] when
/// either side has no coordinates.
#[derive(Debug, Clone, Copy)]
pub struct HaversineDistance {
    penalty_per_km: f64,
    max_penalty: i32,
}

impl HaversineDistance {
    pub fn new(penalty_per_km: f64, max_penalty: i32) -> Self {
        Self {
            penalty_per_km: if penalty_per_km.is_finite() && penalty_per_km >= 0.0 {
                penalty_per_km
            } else {
                1.0
            },
            max_penalty: max_penalty.max(0),
        }
    }
}

impl DistanceEstimator for HaversineDistance {
    fn estimate(&self, client: &Address, caregiver: &Address) -> DistanceEstimate {
        match (client.location, caregiver.location) {
            (Some(from), Some(to)) if haversine_km(from, to).is_finite() => {
                let km = haversine_km(from, to);
                let penalty = (km * self.penalty_per_km).round().min(self.max_penalty as f64);
                DistanceEstimate {
                    distance: (km * 100.0).round() / 100.0,
                    penalty: penalty as i32,
                    estimated: false,
                }
            }
            _ => AddressProximity.estimate(client, caregiver),
        }
    }
}

pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn estimator_for(policy: &DistancePolicy) -> Arc<dyn DistanceEstimator> {
    match policy.estimator {
        DistanceEstimatorKind::NoOp => Arc::new(AddressProximity),
        DistanceEstimatorKind::Haversine => Arc::new(HaversineDistance::new(
            policy.penalty_per_km,
            policy.max_penalty,
        )),
    }
}
