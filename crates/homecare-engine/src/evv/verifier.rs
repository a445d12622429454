use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::geofence::{assess, usable_reading};
use crate::config::EvvPolicy;
use crate::domain::{ClientId, Client, ClockEvent, EvvStatus, GpsReading, Shift, ShiftStatus};

pub const GEOFENCE_EXCEPTION: &str = "Location outside geofence";
pub const DURATION_MISMATCH_EXCEPTION: &str = "Duration mismatch with authorization";

/// Transitions a shift can be asked to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftAction {
    ClockIn,
    ClockOut,
    MarkMissed,
    Cancel,
}

impl ShiftAction {
    pub const fn label(self) -> &'static str {
        match self {
            ShiftAction::ClockIn => "clock_in",
            ShiftAction::ClockOut => "clock_out",
            ShiftAction::MarkMissed => "mark_missed",
            ShiftAction::Cancel => "cancel",
        }
    }

    /// Status the shift must be in for this action to apply.
    pub const fn required_status(self) -> ShiftStatus {
        match self {
            ShiftAction::ClockOut => ShiftStatus::InProgress,
            ShiftAction::ClockIn | ShiftAction::MarkMissed | ShiftAction::Cancel => {
                ShiftStatus::Scheduled
            }
        }
    }
}

impl fmt::Display for ShiftAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvvError {
    #[error("GPS location unavailable")]
    LocationUnavailable,
    #[error("cannot {action} a shift that is {from}")]
    InvalidStateTransition { from: ShiftStatus, action: ShiftAction },
    #[error("check-out at {check_out} precedes check-in at {check_in}")]
    CheckOutBeforeCheckIn {
        check_in: NaiveDateTime,
        check_out: NaiveDateTime,
    },
    #[error("shift belongs to client {expected}, not {found}")]
    ClientMismatch { expected: ClientId, found: ClientId },
}

/// Pure electronic-visit-verification state machine. Every method returns an updated copy and
/// leaves the input untouched on error.
#[derive(Debug, Clone, Default)]
pub struct EvvVerifier {
    policy: EvvPolicy,
}

impl EvvVerifier {
    pub fn new(policy: EvvPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EvvPolicy {
        &self.policy
    }

    pub fn clock_in(
        &self,
        shift: &Shift,
        client: &Client,
        gps: Option<GpsReading>,
        at: NaiveDateTime,
    ) -> Result<Shift, EvvError> {
        ensure_status(shift, ShiftAction::ClockIn)?;
        ensure_client(shift, client)?;
        let reading = usable_reading(gps, self.policy.max_accuracy_meters)?;

        let mut updated = shift.clone();
        updated.check_in = Some(ClockEvent {
            time: at,
            gps: reading,
            geofence: assess(client, &reading, &self.policy),
        });
        updated.status = ShiftStatus::InProgress;
        updated.evv_status = EvvStatus::Pending;
        Ok(updated)
    }

    pub fn clock_out(
        &self,
        shift: &Shift,
        client: &Client,
        gps: Option<GpsReading>,
        at: NaiveDateTime,
    ) -> Result<Shift, EvvError> {
        ensure_status(shift, ShiftAction::ClockOut)?;
        ensure_client(shift, client)?;
        let check_in = shift.check_in.ok_or(EvvError::InvalidStateTransition {
            from: shift.status,
            action: ShiftAction::ClockOut,
        })?;
        let reading = usable_reading(gps, self.policy.max_accuracy_meters)?;
        if at < check_in.time {
            return Err(EvvError::CheckOutBeforeCheckIn {
                check_in: check_in.time,
                check_out: at,
            });
        }

        let check_out = ClockEvent {
            time: at,
            gps: reading,
            geofence: assess(client, &reading, &self.policy),
        };
        let actual_hours = round_hours((at - check_in.time).num_seconds() as f64 / 3600.0);
        let late_arrival_minutes = (check_in.time - shift.scheduled_start).num_minutes().max(0);
        let early_departure_minutes = (shift.scheduled_end - at).num_minutes().max(0);

        let mut exceptions = shift.evv_exceptions.clone();
        if late_arrival_minutes > self.policy.late_arrival_grace_minutes {
            exceptions.push(format!(
                "Late arrival (>{} min)",
                self.policy.late_arrival_grace_minutes
            ));
        }
        if early_departure_minutes > self.policy.early_departure_grace_minutes {
            exceptions.push(format!(
                "Early departure (>{} min)",
                self.policy.early_departure_grace_minutes
            ));
        }
        if let Some(authorized) = shift.authorized_hours {
            if (actual_hours - authorized).abs() > self.policy.duration_tolerance_hours {
                exceptions.push(DURATION_MISMATCH_EXCEPTION.to_string());
            }
        }
        if self.policy.flag_geofence
            && (check_in.geofence.is_out_of_range() || check_out.geofence.is_out_of_range())
        {
            exceptions.push(GEOFENCE_EXCEPTION.to_string());
        }

        let mut updated = shift.clone();
        updated.check_out = Some(check_out);
        updated.actual_hours = Some(actual_hours);
        updated.evv_status = if exceptions.is_empty() {
            EvvStatus::Verified
        } else {
            EvvStatus::Exception
        };
        updated.evv_exceptions = exceptions;
        updated.status = ShiftStatus::Completed;
        Ok(updated)
    }

    pub fn mark_missed(&self, shift: &Shift) -> Result<Shift, EvvError> {
        ensure_status(shift, ShiftAction::MarkMissed)?;
        let mut updated = shift.clone();
        updated.status = ShiftStatus::Missed;
        Ok(updated)
    }

    pub fn cancel(&self, shift: &Shift) -> Result<Shift, EvvError> {
        ensure_status(shift, ShiftAction::Cancel)?;
        let mut updated = shift.clone();
        updated.status = ShiftStatus::Cancelled;
        Ok(updated)
    }
}

fn ensure_status(shift: &Shift, action: ShiftAction) -> Result<(), EvvError> {
    if shift.status == action.required_status() {
        Ok(())
    } else {
        Err(EvvError::InvalidStateTransition {
            from: shift.status,
            action,
        })
    }
}

fn ensure_client(shift: &Shift, client: &Client) -> Result<(), EvvError> {
    if shift.client_id == client.id {
        Ok(())
    } else {
        Err(EvvError::ClientMismatch {
            expected: shift.client_id.clone(),
            found: client.id.clone(),
        })
    }
}

fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}
