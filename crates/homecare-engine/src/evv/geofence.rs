use crate::config::EvvPolicy;
use crate::domain::{Client, GeofenceStatus, GpsReading};
use crate::scheduling::haversine_km;

use super::EvvError;

/// Accept a device fix only if it is present, physically plausible, and no coarser than
/// `max_accuracy_meters`.
pub(crate) fn usable_reading(
    gps: Option<GpsReading>,
    max_accuracy_meters: f64,
) -> Result<GpsReading, EvvError> {
    let reading = gps.ok_or(EvvError::LocationUnavailable)?;
    let plausible = reading.latitude.is_finite()
        && reading.longitude.is_finite()
        && reading.accuracy.is_finite()
        && (-90.0..=90.0).contains(&reading.latitude)
        && (-180.0..=180.0).contains(&reading.longitude)
        && (0.0..=max_accuracy_meters).contains(&reading.accuracy);
    if plausible {
        Ok(reading)
    } else {
        Err(EvvError::LocationUnavailable)
    }
}

/// Compare a fix against the client's registered coordinates. The reported accuracy is credited
/// against the distance, so a fix is in range when `distance - accuracy <= radius`. A fix coarser
/// than the policy's accuracy ceiling is never in range; it comes back `Unverified`.
pub fn assess(client: &Client, reading: &GpsReading, policy: &EvvPolicy) -> GeofenceStatus {
    let Some(home) = client.address.location else {
        return GeofenceStatus::Unverified;
    };
    if !reading.accuracy.is_finite()
        || reading.accuracy < 0.0
        || reading.accuracy > policy.max_accuracy_meters
    {
        return GeofenceStatus::Unverified;
    }

    let meters = haversine_km(home, reading.point()) * 1000.0;
    if !meters.is_finite() {
        return GeofenceStatus::Unverified;
    }
    let distance_m = (meters * 10.0).round() / 10.0;
    if (meters - reading.accuracy).max(0.0) <= policy.geofence_radius_meters {
        GeofenceStatus::InRange { distance_m }
    } else {
        GeofenceStatus::OutOfRange { distance_m }
    }
}
