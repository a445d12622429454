mod geofence;
mod service;
mod verifier;

pub use geofence::assess;
pub use service::{Clock, SystemClock, VerificationServiceError, VisitVerificationService};
pub use verifier::{
    EvvError, EvvVerifier, ShiftAction, DURATION_MISMATCH_EXCEPTION, GEOFENCE_EXCEPTION,
};
