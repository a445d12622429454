//! Caregiver-to-task fit: skill scoring, weekly availability, and automatic task assignment.

mod assignment;
pub mod availability;
mod skills;


pub use assignment::{AssignmentError, AssignmentOutcome, AssignmentService, AssignmentWindow};
pub use availability::{available_for, is_available};
pub use skills::{
    SkillMapping, SkillMatch, SkillMatcher, SkillRequirement, SkillScoreComponent,
    SkillScoreReason,
};
