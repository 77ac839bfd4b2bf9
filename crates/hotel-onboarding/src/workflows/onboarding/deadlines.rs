//! Federal I-9 deadline arithmetic and urgency classification.
//!
//! Section 1 is due on the first day of employment; Section 2 within three business days of
//! it. Business days skip weekends only, holidays are not modeled. A deadline day ends at
//! 23:59:59 UTC.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::domain::{EmployeeI9Projection, EmployeeId};

pub const SECTION2_BUSINESS_DAYS: u32 = 3;
pub const DEFAULT_APPROACHING_WINDOW_HOURS: i64 = 24;
pub const MAX_APPROACHING_WINDOW_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum I9Section {
    Section1,
    Section2,
}

impl I9Section {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Section1 => "Section 1",
            Self::Section2 => "Section 2",
        }
    }
}

impl fmt::Display for I9Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Urgency tier. Variant order is urgency order: the most urgent sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeadlineStatus {
    Overdue,
    DueToday,
    Approaching,
    OnTrack,
    Completed,
}

impl DeadlineStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::DueToday => "due_today",
            Self::Approaching => "approaching",
            Self::OnTrack => "on_track",
            Self::Completed => "completed",
        }
    }
}

/// Per-section compliance judgment used by the workflow gate and audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionCompliance {
    Compliant,
    NonCompliant,
    OnTrack,
    Warning,
    Overdue,
}

impl SectionCompliance {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::OnTrack => "on_track",
            Self::Warning => "warning",
            Self::Overdue => "overdue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDeadlines {
    pub section1: NaiveDate,
    pub section2: NaiveDate,
}

impl SectionDeadlines {
    pub fn for_section(&self, section: I9Section) -> NaiveDate {
        match section {
            I9Section::Section1 => self.section1,
            I9Section::Section2 => self.section2,
        }
    }
}

/// Status plus, for completed sections, whether completion landed on time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeadlineAssessment {
    pub status: DeadlineStatus,
    pub completed_on_time: Option<bool>,
}

/// Computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlineClassification {
    pub employee_id: EmployeeId,
    pub section: I9Section,
    pub deadline: NaiveDate,
    pub status: DeadlineStatus,
    pub completed_on_time: Option<bool>,
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Count forward `days` weekdays from `start`, not counting `start` itself.
pub fn add_business_days(start: NaiveDate, days: u32) -> NaiveDate {
    let mut date = start;
    let mut remaining = days;
    while remaining > 0 {
        let Some(next) = date.succ_opt() else {
            break;
        };
        date = next;
        if is_business_day(date) {
            remaining -= 1;
        }
    }
    date
}

/// Last second of the deadline day.
pub fn deadline_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN + Duration::seconds(86_399)).and_utc()
}

#[derive(Debug, Clone, Copy)]
pub struct DeadlineEngine {
    approaching_window: Duration,
    section2_business_days: u32,
}

impl Default for DeadlineEngine {
    fn default() -> Self {
        Self::new(DEFAULT_APPROACHING_WINDOW_HOURS)
    }
}

impl DeadlineEngine {
    /// Non-positive windows fall back to the default; larger ones are capped at a year.
    pub fn new(approaching_window_hours: i64) -> Self {
        let hours = if approaching_window_hours > 0 {
            approaching_window_hours.min(MAX_APPROACHING_WINDOW_HOURS)
        } else {
            DEFAULT_APPROACHING_WINDOW_HOURS
        };

        Self {
            approaching_window: Duration::try_hours(hours)
                .unwrap_or_else(|| Duration::hours(DEFAULT_APPROACHING_WINDOW_HOURS)),
            section2_business_days: SECTION2_BUSINESS_DAYS,
        }
    }

    pub fn compute_deadlines(&self, start_date: NaiveDate) -> SectionDeadlines {
        SectionDeadlines {
            section1: start_date,
            section2: add_business_days(start_date, self.section2_business_days),
        }
    }

    pub fn classify(
        &self,
        deadline: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DeadlineAssessment {
        if let Some(completed_at) = completed_at {
            return DeadlineAssessment {
                status: DeadlineStatus::Completed,
                completed_on_time: Some(completed_at <= deadline),
            };
        }

        let status = if now > deadline {
            DeadlineStatus::Overdue
        } else if now.date_naive() == deadline.date_naive() {
            DeadlineStatus::DueToday
        } else if deadline.signed_duration_since(now) < self.approaching_window {
            DeadlineStatus::Approaching
        } else {
            DeadlineStatus::OnTrack
        };

        DeadlineAssessment {
            status,
            completed_on_time: None,
        }
    }

    pub fn compliance_status(
        &self,
        section: I9Section,
        start_date: NaiveDate,
        completed_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> SectionCompliance {
        let deadline = deadline_instant(self.compute_deadlines(start_date).for_section(section));
        let assessment = self.classify(deadline, completed_at, now);

        match (assessment.status, assessment.completed_on_time) {
            (DeadlineStatus::Completed, Some(false)) => SectionCompliance::NonCompliant,
            (DeadlineStatus::Completed, _) => SectionCompliance::Compliant,
            (DeadlineStatus::Overdue, _) => SectionCompliance::Overdue,
            (DeadlineStatus::DueToday | DeadlineStatus::Approaching, _) => {
                SectionCompliance::Warning
            }
            (DeadlineStatus::OnTrack, _) => SectionCompliance::OnTrack,
        }
    }

    /// Deadlines for an employee, preferring the stored values over recomputation.
    pub fn deadlines_for(&self, employee: &EmployeeI9Projection) -> Option<SectionDeadlines> {
        let computed = employee
            .start_date
            .map(|start_date| self.compute_deadlines(start_date));

        match (
            employee.i9_section1_deadline,
            employee.i9_section2_deadline,
            computed,
        ) {
            (Some(section1), Some(section2), _) => Some(SectionDeadlines { section1, section2 }),
            (section1, section2, Some(computed)) => Some(SectionDeadlines {
                section1: section1.unwrap_or(computed.section1),
                section2: section2.unwrap_or(computed.section2),
            }),
            (_, _, None) => None,
        }
    }

    /// Classify both sections for an employee, or `None` when no start date is known.
    pub fn classify_employee(
        &self,
        employee: &EmployeeI9Projection,
        now: DateTime<Utc>,
    ) -> Option<(DeadlineClassification, DeadlineClassification)> {
        let deadlines = self.deadlines_for(employee)?;

        let classify_section = |section: I9Section, completed_at: Option<DateTime<Utc>>| {
            let deadline = deadlines.for_section(section);
            let assessment = self.classify(deadline_instant(deadline), completed_at, now);
            DeadlineClassification {
                employee_id: employee.id.clone(),
                section,
                deadline,
                status: assessment.status,
                completed_on_time: assessment.completed_on_time,
            }
        };

        Some((
            classify_section(I9Section::Section1, employee.i9_section1_completed_at),
            classify_section(I9Section::Section2, employee.i9_section2_completed_at),
        ))
    }
}
