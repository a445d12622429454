use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use super::verifier::{EvvError, EvvVerifier};
use crate::domain::{Client, EvvStatus, GpsReading, Shift, ShiftId};
use crate::repository::{RepositoryError, ShiftRepository};

/// Source of the agency-local wall-clock time stamped on check-in and check-out.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Loads shifts, applies verifier transitions, and writes them back conditionally so concurrent
/// clock requests for one shift cannot both succeed.
pub struct VisitVerificationService<R, C> {
    repository: Arc<R>,
    clock: Arc<C>,
    verifier: EvvVerifier,
}

impl<R, C> VisitVerificationService<R, C>
where
    R: ShiftRepository + 'static,
    C: Clock + 'static,
{
    pub fn new(repository: Arc<R>, clock: Arc<C>, verifier: EvvVerifier) -> Self {
        Self {
            repository,
            clock,
            verifier,
        }
    }

    pub fn clock_in(
        &self,
        shift_id: &ShiftId,
        client: &Client,
        gps: Option<GpsReading>,
    ) -> Result<Shift, VerificationServiceError> {
        let shift = self.load(shift_id)?;
        let updated = self
            .verifier
            .clock_in(&shift, client, gps, self.clock.now())
            .inspect_err(|error| warn!(shift_id = %shift_id, %error, "clock-in rejected"))?;
        let stored = self.repository.compare_and_swap(updated, shift.status)?;

        info!(
            shift_id = %stored.id,
            caregiver_id = %stored.caregiver_id,
            geofence = stored.check_in.map(|event| event.geofence.label()).unwrap_or("none"),
            "caregiver clocked in"
        );
        Ok(stored)
    }

    pub fn clock_out(
        &self,
        shift_id: &ShiftId,
        client: &Client,
        gps: Option<GpsReading>,
    ) -> Result<Shift, VerificationServiceError> {
        let shift = self.load(shift_id)?;
        let updated = self
            .verifier
            .clock_out(&shift, client, gps, self.clock.now())
            .inspect_err(|error| warn!(shift_id = %shift_id, %error, "clock-out rejected"))?;
        let stored = self.repository.compare_and_swap(updated, shift.status)?;

        if stored.evv_status == EvvStatus::Exception {
            warn!(
                shift_id = %stored.id,
                exceptions = ?stored.evv_exceptions,
                "visit completed with verification exceptions"
            );
        } else {
            info!(
                shift_id = %stored.id,
                actual_hours = stored.actual_hours.unwrap_or_default(),
                "visit verified"
            );
        }
        Ok(stored)
    }

    pub fn mark_missed(&self, shift_id: &ShiftId) -> Result<Shift, VerificationServiceError> {
        let shift = self.load(shift_id)?;
        let updated = self.verifier.mark_missed(&shift)?;
        let stored = self.repository.compare_and_swap(updated, shift.status)?;
        warn!(shift_id = %stored.id, caregiver_id = %stored.caregiver_id, "shift marked missed");
        Ok(stored)
    }

    pub fn cancel(&self, shift_id: &ShiftId) -> Result<Shift, VerificationServiceError> {
        let shift = self.load(shift_id)?;
        let updated = self.verifier.cancel(&shift)?;
        let stored = self.repository.compare_and_swap(updated, shift.status)?;
        info!(shift_id = %stored.id, "shift cancelled");
        Ok(stored)
    }

    fn load(&self, shift_id: &ShiftId) -> Result<Shift, VerificationServiceError> {
        self.repository
            .fetch(shift_id)?
            .ok_or_else(|| VerificationServiceError::ShiftNotFound(shift_id.clone()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationServiceError {
    #[error("shift {0} not found")]
    ShiftNotFound(ShiftId),
    #[error(transparent)]
    Evv(#[from] EvvError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
