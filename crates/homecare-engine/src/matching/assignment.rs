use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::availability::available_for;
use super::skills::{SkillMatch, SkillMatcher};
use crate::domain::{AssignmentStatus, CareTask, Caregiver, TaskAssignment, TaskId};
use crate::repository::{AssignmentRepository, RepositoryError};

/// Optional time slot the assignee must be available for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub assignment: TaskAssignment,
    pub skill_match: SkillMatch,
}

/// Service pairing care tasks with the best-fitting active caregiver.
pub struct AssignmentService<R> {
    repository: Arc<R>,
    matcher: Arc<SkillMatcher>,
}

impl<R> AssignmentService<R>
where
    R: AssignmentRepository + 'static,
{
    pub fn new(repository: Arc<R>, matcher: SkillMatcher) -> Self {
        Self {
            repository,
            matcher: Arc::new(matcher),
        }
    }

    /// Pick the top skill match among active (and, when a window is given, available)
    /// caregivers and persist an auto-assignment for them.
    pub fn auto_assign(
        &self,
        task: &CareTask,
        caregivers: &[Caregiver],
        window: Option<AssignmentWindow>,
    ) -> Result<AssignmentOutcome, AssignmentError> {
        if self.repository.fetch(&task.id)?.is_some() {
            return Err(AssignmentError::AlreadyAssigned(task.id.clone()));
        }

        let eligible: Vec<Caregiver> = caregivers
            .iter()
            .filter(|caregiver| caregiver.is_active())
            .filter(|caregiver| {
                window
                    .map(|slot| available_for(caregiver, slot.start, slot.end))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        let Some(skill_match) = self.matcher.best_match(task, &eligible) else {
            warn!(task_id = %task.id, candidates = caregivers.len(), "no eligible caregiver for task");
            return Err(AssignmentError::NoEligibleCaregiver(task.id.clone()));
        };

        let assignment = TaskAssignment {
            task_id: task.id.clone(),
            client_id: task.client_id.clone(),
            caregiver_id: skill_match.caregiver_id.clone(),
            task_name: task.task_name.clone(),
            auto_assigned: true,
            status: AssignmentStatus::Assigned,
        };
        let assignment = self.repository.insert(assignment)?;

        info!(
            task_id = %assignment.task_id,
            caregiver_id = %assignment.caregiver_id,
            score = skill_match.score,
            "auto-assigned care task"
        );

        Ok(AssignmentOutcome {
            assignment,
            skill_match,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("no eligible caregiver for task {0}")]
    NoEligibleCaregiver(TaskId),
    #[error("task {0} is already assigned")]
    AlreadyAssigned(TaskId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
