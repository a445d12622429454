use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::{CoveragePolicy, EngineConfig, WorkloadPolicy};
use crate::domain::{Caregiver, CaregiverId, ClientId, Shift, ShiftId, ShiftStatus};
use crate::matching::{available_for, SkillMatch, SkillMatcher};

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

/// Recurring weekly window during which a client must have a caregiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequirement {
    pub client_id: ClientId,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub task_name: String,
}

impl ServiceRequirement {
    /// Concrete window starting on `day`. An end time at or before the start time runs past
    /// midnight into the next day.
    pub fn window_on(&self, day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = day.and_time(self.start_time);
        let mut end = day.and_time(self.end_time);
        if end <= start {
            end += Duration::days(1);
        }
        (start, end)
    }
}

/// Snapshot of everything the detector looks at for one horizon.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleHorizon<'a> {
    pub range: DateRange,
    pub shifts: &'a [Shift],
    pub caregivers: &'a [Caregiver],
    pub requirements: &'a [ServiceRequirement],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapConflict {
    pub caregiver_id: CaregiverId,
    pub first_shift: ShiftId,
    pub second_shift: ShiftId,
    pub overlap_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSeverity {
    Low,
    Medium,
    High,
}

impl GapSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            GapSeverity::Low => "low",
            GapSeverity::Medium => "medium",
            GapSeverity::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub client_id: ClientId,
    pub task_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub severity: GapSeverity,
    pub candidates: Vec<SkillMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadFlag {
    Overloaded,
    Underutilized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadFinding {
    pub caregiver_id: CaregiverId,
    pub scheduled_hours: f64,
    pub mean_hours: f64,
    pub flag: WorkloadFlag,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConflictReport {
    pub overlaps: Vec<OverlapConflict>,
    pub coverage_gaps: Vec<CoverageGap>,
    pub workload: Vec<WorkloadFinding>,
}

impl ConflictReport {
    pub fn is_clear(&self) -> bool {
        self.overlaps.is_empty() && self.coverage_gaps.is_empty() && self.workload.is_empty()
    }
}

/// Read-only scan of a scheduling horizon for double bookings, uncovered client windows, and
/// uneven caregiver workload. Cancelled shifts are ignored throughout.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    matcher: SkillMatcher,
    coverage: CoveragePolicy,
    workload: WorkloadPolicy,
}

impl ConflictDetector {
    pub fn new(matcher: SkillMatcher, coverage: CoveragePolicy, workload: WorkloadPolicy) -> Self {
        Self {
            matcher,
            coverage,
            workload,
        }
    }

    pub fn from_config(matcher: SkillMatcher, config: &EngineConfig) -> Self {
        Self::new(matcher, config.coverage.clone(), config.workload.clone())
    }

    pub fn detect(&self, horizon: &ScheduleHorizon<'_>, now: NaiveDateTime) -> ConflictReport {
        let live: Vec<&Shift> = horizon
            .shifts
            .iter()
            .filter(|shift| shift.status != ShiftStatus::Cancelled)
            .filter(|shift| horizon.range.contains(shift.service_date()))
            .collect();

        ConflictReport {
            overlaps: overlaps(&live),
            coverage_gaps: self.coverage_gaps(horizon, &live, now),
            workload: self.workload_findings(horizon.caregivers, &live),
        }
    }

    fn coverage_gaps(
        &self,
        horizon: &ScheduleHorizon<'_>,
        live: &[&Shift],
        now: NaiveDateTime,
    ) -> Vec<CoverageGap> {
        let mut gaps = Vec::new();

        for day in horizon.range.days() {
            for requirement in horizon
                .requirements
                .iter()
                .filter(|requirement| requirement.weekday == day.weekday())
            {
                let (start, end) = requirement.window_on(day);
                if end <= now {
                    continue;
                }

                let covered = live.iter().any(|shift| {
                    shift.client_id == requirement.client_id
                        && shift.scheduled_start < end
                        && start < shift.scheduled_end
                });
                if covered {
                    continue;
                }

                gaps.push(CoverageGap {
                    client_id: requirement.client_id.clone(),
                    task_name: requirement.task_name.clone(),
                    start,
                    end,
                    severity: self.severity(start, now),
                    candidates: self.gap_candidates(requirement, start, end, horizon.caregivers, live),
                });
            }
        }

        gaps
    }

    fn severity(&self, start: NaiveDateTime, now: NaiveDateTime) -> GapSeverity {
        let lead = start - now;
        if lead < Duration::hours(self.coverage.high_severity_hours) {
            GapSeverity::High
        } else if lead < Duration::hours(self.coverage.medium_severity_hours) {
            GapSeverity::Medium
        } else {
            GapSeverity::Low
        }
    }

    fn gap_candidates(
        &self,
        requirement: &ServiceRequirement,
        start: NaiveDateTime,
        end: NaiveDateTime,
        caregivers: &[Caregiver],
        live: &[&Shift],
    ) -> Vec<SkillMatch> {
        let free: Vec<Caregiver> = caregivers
            .iter()
            .filter(|caregiver| caregiver.is_active())
            .filter(|caregiver| available_for(caregiver, start, end))
            .filter(|caregiver| {
                !live.iter().any(|shift| {
                    shift.caregiver_id == caregiver.id
                        && shift.scheduled_start < end
                        && start < shift.scheduled_end
                })
            })
            .cloned()
            .collect();

        let mut ranked = self.matcher.rank(&requirement.task_name, &free);
        ranked.truncate(self.coverage.max_candidates);
        ranked
    }

    fn workload_findings(&self, caregivers: &[Caregiver], live: &[&Shift]) -> Vec<WorkloadFinding> {
        let mut hours: BTreeMap<CaregiverId, f64> = caregivers
            .iter()
            .filter(|caregiver| caregiver.is_active())
            .map(|caregiver| (caregiver.id.clone(), 0.0))
            .collect();
        for shift in live {
            *hours.entry(shift.caregiver_id.clone()).or_insert(0.0) += shift.scheduled_hours();
        }

        if hours.is_empty() {
            return Vec::new();
        }
        let mean = hours.values().sum::<f64>() / hours.len() as f64;
        if mean <= 0.0 {
            return Vec::new();
        }

        let overload_limit = mean * (1.0 + self.workload.overload_tolerance);
        let underuse_limit = mean * (1.0 - self.workload.underutilization_tolerance);

        hours
            .into_iter()
            .filter_map(|(caregiver_id, scheduled_hours)| {
                let flag = if scheduled_hours > overload_limit {
                    WorkloadFlag::Overloaded
                } else if scheduled_hours < underuse_limit {
                    WorkloadFlag::Underutilized
                } else {
                    return None;
                };
                Some(WorkloadFinding {
                    caregiver_id,
                    scheduled_hours,
                    mean_hours: mean,
                    flag,
                })
            })
            .collect()
    }
}

fn overlaps(live: &[&Shift]) -> Vec<OverlapConflict> {
    let mut by_caregiver: BTreeMap<&CaregiverId, Vec<&Shift>> = BTreeMap::new();
    for shift in live.iter().copied() {
        by_caregiver.entry(&shift.caregiver_id).or_default().push(shift);
    }

    let mut conflicts = Vec::new();
    for (caregiver_id, mut shifts) in by_caregiver {
        shifts.sort_by(|left, right| {
            left.scheduled_start
                .cmp(&right.scheduled_start)
                .then_with(|| left.id.cmp(&right.id))
        });

        for (index, first) in shifts.iter().enumerate() {
            for second in &shifts[index + 1..] {
                if second.scheduled_start >= first.scheduled_end {
                    break;
                }
                if !first.overlaps(second) {
                    continue;
                }
                let overlap = first.scheduled_end.min(second.scheduled_end)
                    - first.scheduled_start.max(second.scheduled_start);
                conflicts.push(OverlapConflict {
                    caregiver_id: caregiver_id.clone(),
                    first_shift: first.id.clone(),
                    second_shift: second.id.clone(),
                    overlap_minutes: overlap.num_minutes(),
                });
            }
        }
    }

    conflicts
}
