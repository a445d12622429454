use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::domain::{AvailabilityWindow, Caregiver};

/// Whether a caregiver with the given weekly availability can start work at `start` on `weekday`.
///
/// An empty availability list means no preference was declared and the caregiver is treated as
/// always available. Otherwise the first window declared for `weekday` decides, and only the
/// starting hour is compared: `window.start.hour() <= start.hour() < window.end.hour()`. The
/// candidate `end` is not evaluated.
pub fn is_available(
    availability: &[AvailabilityWindow],
    weekday: Weekday,
    start: NaiveTime,
    _end: NaiveTime,
) -> bool {
    if availability.is_empty() {
        return true;
    }

    let Some(window) = availability.iter().find(|window| window.weekday == weekday) else {
        return false;
    };

    let hour = start.hour();
    window.start_time.hour() <= hour && hour < window.end_time.hour()
}

/// Convenience over [`is_available`] for a concrete start/end pair.
pub fn available_for(caregiver: &Caregiver, start: NaiveDateTime, end: NaiveDateTime) -> bool {
    is_available(
        &caregiver.availability,
        start.weekday(),
        start.time(),
        end.time(),
    )
}
