use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::distance::{estimator_for, DistanceEstimator};
use crate::config::{EngineConfig, SchedulingPolicy};
use crate::domain::{Caregiver, CaregiverId, Client, Shift, ShiftStatus};
use crate::matching::is_available;

/// An unscheduled block of care a client needs covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientNeed {
    pub client: Client,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFactor {
    Base,
    Unavailable,
    Proximity,
    SameDayShift,
    SkillsListed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleScoreComponent {
    pub factor: ScheduleFactor,
    pub points: i32,
}

/// Ranked caregiver candidate for a client need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSuggestion {
    pub caregiver_id: CaregiverId,
    pub score: i32,
    pub distance: f64,
    pub distance_estimated: bool,
    pub components: Vec<ScheduleScoreComponent>,
}

/// Combines availability, proximity, existing workload, and skills into a ranked shortlist.
#[derive(Clone)]
pub struct ScheduleScorer {
    policy: SchedulingPolicy,
    distance: Arc<dyn DistanceEstimator>,
}

impl ScheduleScorer {
    pub fn new(policy: SchedulingPolicy, distance: Arc<dyn DistanceEstimator>) -> Self {
        Self { policy, distance }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.scheduling.clone(), estimator_for(&config.distance))
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    pub fn score(&self, need: &ClientNeed, caregiver: &Caregiver, shifts: &[Shift]) -> ScheduleSuggestion {
        let mut components = vec![ScheduleScoreComponent {
            factor: ScheduleFactor::Base,
            points: self.policy.base_score,
        }];

        if !is_available(
            &caregiver.availability,
            need.start.weekday(),
            need.start.time(),
            need.end.time(),
        ) {
            components.push(ScheduleScoreComponent {
                factor: ScheduleFactor::Unavailable,
                points: -self.policy.unavailable_penalty,
            });
        }

        let estimate = self.distance.estimate(&need.client.address, &caregiver.address);
        components.push(ScheduleScoreComponent {
            factor: ScheduleFactor::Proximity,
            points: -estimate.penalty,
        });

        let need_date = need.start.date();
        let busy_that_day = shifts.iter().any(|shift| {
            shift.caregiver_id == caregiver.id
                && shift.status != ShiftStatus::Cancelled
                && shift.scheduled_start.date() == need_date
        });
        if busy_that_day {
            components.push(ScheduleScoreComponent {
                factor: ScheduleFactor::SameDayShift,
                points: -self.policy.same_day_penalty,
            });
        }

        if !caregiver.skills.is_empty() {
            components.push(ScheduleScoreComponent {
                factor: ScheduleFactor::SkillsListed,
                points: self.policy.skilled_bonus,
            });
        }

        ScheduleSuggestion {
            caregiver_id: caregiver.id.clone(),
            score: components.iter().map(|component| component.points).sum(),
            distance: estimate.distance,
            distance_estimated: estimate.estimated,
            components,
        }
    }

    /// Top candidates among active caregivers, best first with ties broken by caregiver id.
    /// Fails with [`SchedulingError::NoEligibleCaregiver`] unless the best score clears the
    /// suggestion threshold.
    pub fn suggest(
        &self,
        need: &ClientNeed,
        caregivers: &[Caregiver],
        shifts: &[Shift],
    ) -> Result<Vec<ScheduleSuggestion>, SchedulingError> {
        let mut ranked: Vec<ScheduleSuggestion> = caregivers
            .iter()
            .filter(|caregiver| caregiver.is_active())
            .map(|caregiver| self.score(need, caregiver, shifts))
            .collect();
        ranked.sort_by(|left, right| {
            right
                .score
                .cmp(&left.score)
                .then_with(|| left.caregiver_id.cmp(&right.caregiver_id))
        });

        let best_score = ranked.first().map(|suggestion| suggestion.score);
        match best_score {
            Some(score) if score > self.policy.suggestion_threshold => {
                ranked.truncate(self.policy.max_suggestions);
                debug!(
                    client_id = %need.client.id,
                    best_score = score,
                    suggestions = ranked.len(),
                    "ranked caregivers for client need"
                );
                Ok(ranked)
            }
            _ => {
                debug!(
                    client_id = %need.client.id,
                    best_score = ?best_score,
                    threshold = self.policy.suggestion_threshold,
                    "no caregiver cleared the suggestion threshold"
                );
                Err(SchedulingError::NoEligibleCaregiver {
                    best_score,
                    threshold: self.policy.suggestion_threshold,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("no caregiver scored above {threshold} (best: {best_score:?})")]
    NoEligibleCaregiver {
        best_score: Option<i32>,
        threshold: i32,
    },
}
