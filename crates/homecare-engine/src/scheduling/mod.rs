//! Caregiver ranking for open client needs and horizon-wide conflict detection.

mod conflicts;
pub mod distance;
mod scorer;


pub use conflicts::{
    ConflictDetector, ConflictReport, CoverageGap, DateRange, GapSeverity, OverlapConflict,
    ScheduleHorizon, ServiceRequirement, WorkloadFinding, WorkloadFlag,
};
pub use distance::{
    estimator_for, haversine_km, AddressProximity, DistanceEstimate, DistanceEstimator,
    HaversineDistance,
};
pub use scorer::{
    ClientNeed, ScheduleFactor, ScheduleScoreComponent, ScheduleScorer, ScheduleSuggestion,
    SchedulingError,
};
