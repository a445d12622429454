use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::{CareTask, Caregiver, CaregiverId};

const DIRECT_MATCH_POINTS: f32 = 10.0;
const KEYWORD_MATCH_POINTS: f32 = 8.0;
const POINTS_PER_SKILL: f32 = 0.5;
const NO_SKILLS_PENALTY: f32 = -5.0;

/// One keyword rule: a task whose name contains `keyword` calls for any of `skills`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub keyword: String,
    pub skills: Vec<String>,
}

impl SkillRequirement {
    pub fn new(keyword: &str, skills: &[&str]) -> Self {
        Self {
            keyword: keyword.to_string(),
            skills: skills.iter().map(|skill| skill.to_string()).collect(),
        }
    }
}

/// Keyword to required-skill table consulted by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMapping {
    entries: Vec<SkillRequirement>,
}

impl SkillMapping {
    pub fn new(entries: Vec<SkillRequirement>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SkillRequirement] {
        &self.entries
    }

    /// Requirements whose keyword appears (case-insensitively) in `task_name`.
    pub fn requirements_for<'a>(
        &'a self,
        task_name: &'a str,
    ) -> impl Iterator<Item = &'a SkillRequirement> + 'a {
        let task = task_name.to_lowercase();
        self.entries
            .iter()
            .filter(move |entry| task.contains(&entry.keyword.to_lowercase()))
    }
}

impl Default for SkillMapping {
    fn default() -> Self {
        Self::new(vec![
            SkillRequirement::new("bathing", &["Personal Care", "ADL Assistance"]),
            SkillRequirement::new("dressing", &["Personal Care", "ADL Assistance"]),
            SkillRequirement::new("grooming", &["Personal Care", "ADL Assistance"]),
            SkillRequirement::new("toileting", &["Personal Care", "Incontinence Care"]),
            SkillRequirement::new("feeding", &["Feeding Assistance", "ADL Assistance"]),
            SkillRequirement::new(
                "medication",
                &["Medication Management", "Medication Administration"],
            ),
            SkillRequirement::new("meal", &["Meal Preparation", "Nutrition"]),
            SkillRequirement::new("mobility", &["Mobility Assistance", "Transfer Assistance"]),
            SkillRequirement::new("transfer", &["Transfer Assistance", "Mobility Assistance"]),
            SkillRequirement::new("housekeeping", &["Housekeeping", "Light Housekeeping"]),
            SkillRequirement::new("laundry", &["Housekeeping", "Light Housekeeping"]),
            SkillRequirement::new("shopping", &["Errands", "Transportation"]),
            SkillRequirement::new("transportation", &["Transportation"]),
            SkillRequirement::new("companionship", &["Companionship"]),
            SkillRequirement::new("dementia", &["Dementia Care", "Alzheimer's Care"]),
        ])
    }
}

/// Reason a caregiver gained or lost points against a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkillScoreReason {
    DirectMatch { skill: String },
    KeywordMatch { keyword: String },
    SkillBreadth { skills: usize },
    NoSkillsListed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillScoreComponent {
    pub reason: SkillScoreReason,
    pub points: f32,
}

/// Skill fit of one caregiver for one task, with the audit trail behind the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub caregiver_id: CaregiverId,
    pub score: f32,
    pub components: Vec<SkillScoreComponent>,
}

/// Stateless scorer of caregiver skills against care-task names.
#[derive(Debug, Clone, Default)]
pub struct SkillMatcher {
    mapping: SkillMapping,
}

impl SkillMatcher {
    pub fn new(mapping: SkillMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &SkillMapping {
        &self.mapping
    }

    pub fn score(&self, task: &CareTask, caregiver: &Caregiver) -> SkillMatch {
        self.score_task_name(&task.task_name, caregiver)
    }

    pub fn score_task_name(&self, task_name: &str, caregiver: &Caregiver) -> SkillMatch {
        let mut components = Vec::new();

        if caregiver.skills.is_empty() {
            components.push(SkillScoreComponent {
                reason: SkillScoreReason::NoSkillsListed,
                points: NO_SKILLS_PENALTY,
            });
            return SkillMatch {
                caregiver_id: caregiver.id.clone(),
                score: NO_SKILLS_PENALTY,
                components,
            };
        }

        let task = task_name.to_lowercase();
        let direct = caregiver.skills.iter().find(|skill| {
            let skill = skill.trim().to_lowercase();
            !skill.is_empty() && !task.is_empty() && (task.contains(&skill) || skill.contains(&task))
        });
        if let Some(skill) = direct {
            components.push(SkillScoreComponent {
                reason: SkillScoreReason::DirectMatch {
                    skill: skill.clone(),
                },
                points: DIRECT_MATCH_POINTS,
            });
        }

        for requirement in self.mapping.requirements_for(task_name) {
            let holds_required = requirement.skills.iter().any(|required| {
                caregiver
                    .skills
                    .iter()
                    .any(|skill| skill.trim().eq_ignore_ascii_case(required.trim()))
            });
            if holds_required {
                components.push(SkillScoreComponent {
                    reason: SkillScoreReason::KeywordMatch {
                        keyword: requirement.keyword.clone(),
                    },
                    points: KEYWORD_MATCH_POINTS,
                });
            }
        }

        components.push(SkillScoreComponent {
            reason: SkillScoreReason::SkillBreadth {
                skills: caregiver.skills.len(),
            },
            points: POINTS_PER_SKILL * caregiver.skills.len() as f32,
        });

        let score = components.iter().map(|component| component.points).sum();
        SkillMatch {
            caregiver_id: caregiver.id.clone(),
            score,
            components,
        }
    }

    /// Every caregiver scored and ordered best first. Equal scores fall back to ascending
    /// caregiver id so the ranking never depends on input order.
    pub fn rank(&self, task_name: &str, caregivers: &[Caregiver]) -> Vec<SkillMatch> {
        let mut matches: Vec<SkillMatch> = caregivers
            .iter()
            .map(|caregiver| self.score_task_name(task_name, caregiver))
            .collect();
        matches.sort_by(compare_matches);
        matches
    }

    pub fn best_match(&self, task: &CareTask, caregivers: &[Caregiver]) -> Option<SkillMatch> {
        self.rank(&task.task_name, caregivers).into_iter().next()
    }
}

fn compare_matches(left: &SkillMatch, right: &SkillMatch) -> Ordering {
    right
        .score
        .partial_cmp(&left.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| left.caregiver_id.cmp(&right.caregiver_id))
}
