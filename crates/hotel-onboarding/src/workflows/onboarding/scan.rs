use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::deadlines::{DeadlineClassification, DeadlineEngine, DeadlineStatus, I9Section};
use super::domain::{EmployeeId, ManagerId, PropertyId, UserId};
use super::error::OnboardingError;
use super::repository::{
    Notification, NotificationKind, NotificationPriority, NotificationSink, OnboardingRepository,
};

/// Both section classifications for one employee with an open I-9.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDeadline {
    pub employee_id: EmployeeId,
    pub property_id: PropertyId,
    pub start_date: Option<NaiveDate>,
    pub assigned_manager_id: Option<ManagerId>,
    pub section1: DeadlineClassification,
    pub section2: DeadlineClassification,
}

impl PendingDeadline {
    pub fn most_urgent(&self) -> DeadlineStatus {
        self.section1.status.min(self.section2.status)
    }

    pub fn is_overdue(&self) -> bool {
        self.section1.status == DeadlineStatus::Overdue
            || self.section2.status == DeadlineStatus::Overdue
    }

    fn earliest_open_deadline(&self) -> Option<NaiveDate> {
        [&self.section1, &self.section2]
            .into_iter()
            .filter(|classification| classification.status != DeadlineStatus::Completed)
            .map(|classification| classification.deadline)
            .min()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationFailure {
    pub recipient: UserId,
    pub employee_id: EmployeeId,
    pub section: I9Section,
    pub error: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub evaluated: usize,
    pub employee_notifications: usize,
    pub manager_notifications: usize,
    /// Employees with an urgent Section 2 but no assigned manager to tell.
    pub unassigned: Vec<EmployeeId>,
    pub failures: Vec<NotificationFailure>,
}

/// Periodic I-9 deadline sweep. Holds no state between runs, so a still-urgent deadline is
/// notified again on the next sweep.
pub struct DeadlineMonitor<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
    deadlines: DeadlineEngine,
}

impl<R, N> DeadlineMonitor<R, N>
where
    R: OnboardingRepository + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(repository: Arc<R>, notifications: Arc<N>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            notifications,
            clock,
            deadlines: DeadlineEngine::default(),
        }
    }

    pub fn with_deadline_engine(mut self, deadlines: DeadlineEngine) -> Self {
        self.deadlines = deadlines;
        self
    }

    /// Classify every employee with an open Section 1 or 2, most urgent first.
    ///
    /// With `include_overdue` unset, employees with either section overdue are left out.
    pub fn pending_deadlines(
        &self,
        property_id: Option<&PropertyId>,
        include_overdue: bool,
    ) -> Result<Vec<PendingDeadline>, OnboardingError> {
        let now = self.clock.now();
        let employees = self.repository.employees_with_pending_i9(property_id)?;

        let mut pending: Vec<PendingDeadline> = employees
            .into_iter()
            .filter_map(|employee| {
                let Some((section1, section2)) = self.deadlines.classify_employee(&employee, now)
                else {
                    debug!(employee_id = %employee.id, "no deadlines known, skipping classification");
                    return None;
                };
                Some(PendingDeadline {
                    start_date: employee.start_date,
                    employee_id: employee.id,
                    property_id: employee.property_id,
                    assigned_manager_id: employee.i9_assigned_manager_id,
                    section1,
                    section2,
                })
            })
            .filter(|entry| include_overdue || !entry.is_overdue())
            .collect();

        pending.sort_by(|left, right| {
            left.most_urgent()
                .cmp(&right.most_urgent())
                .then_with(|| left.earliest_open_deadline().cmp(&right.earliest_open_deadline()))
                .then_with(|| left.employee_id.cmp(&right.employee_id))
        });

        Ok(pending)
    }

    /// Notify employees about an imminent Section 1 and managers about an urgent Section 2.
    ///
    /// Delivery failures are logged and reported per recipient without aborting the sweep.
    pub fn scan_and_notify(&self) -> Result<ScanReport, OnboardingError> {
        let pending = self.pending_deadlines(None, true)?;
        let mut report = ScanReport {
            evaluated: pending.len(),
            ..ScanReport::default()
        };

        for entry in &pending {
            if matches!(
                entry.section1.status,
                DeadlineStatus::Approaching | DeadlineStatus::DueToday
            ) {
                let notification =
                    section_notification(UserId::from(&entry.employee_id), entry, &entry.section1);
                if self.deliver(notification, entry, I9Section::Section1, &mut report) {
                    report.employee_notifications += 1;
                }
            }

            if matches!(
                entry.section2.status,
                DeadlineStatus::Approaching | DeadlineStatus::DueToday | DeadlineStatus::Overdue
            ) {
                let Some(manager_id) = entry.assigned_manager_id.as_ref() else {
                    warn!(
                        employee_id = %entry.employee_id,
                        status = ?entry.section2.status,
                        "urgent I-9 Section 2 has no assigned manager"
                    );
                    report.unassigned.push(entry.employee_id.clone());
                    continue;
                };
                let notification =
                    section_notification(UserId::from(manager_id), entry, &entry.section2);
                if self.deliver(notification, entry, I9Section::Section2, &mut report) {
                    report.manager_notifications += 1;
                }
            }
        }

        info!(
            evaluated = report.evaluated,
            employee_notifications = report.employee_notifications,
            manager_notifications = report.manager_notifications,
            unassigned = report.unassigned.len(),
            failures = report.failures.len(),
            "I-9 deadline sweep finished"
        );

        Ok(report)
    }

    fn deliver(
        &self,
        notification: Notification,
        entry: &PendingDeadline,
        section: I9Section,
        report: &mut ScanReport,
    ) -> bool {
        let recipient = notification.recipient.clone();
        match self.notifications.notify(notification) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    recipient = %recipient,
                    employee_id = %entry.employee_id,
                    section = %section,
                    error = %err,
                    "failed to send I-9 deadline notification"
                );
                report.failures.push(NotificationFailure {
                    recipient,
                    employee_id: entry.employee_id.clone(),
                    section,
                    error: err.to_string(),
                });
                false
            }
        }
    }
}

pub fn priority_for(status: DeadlineStatus) -> NotificationPriority {
    match status {
        DeadlineStatus::Overdue => NotificationPriority::Urgent,
        DeadlineStatus::DueToday => NotificationPriority::High,
        DeadlineStatus::Approaching => NotificationPriority::Normal,
        DeadlineStatus::OnTrack | DeadlineStatus::Completed => NotificationPriority::Low,
    }
}

fn section_notification(
    recipient: UserId,
    entry: &PendingDeadline,
    classification: &DeadlineClassification,
) -> Notification {
    let (kind, title) = match classification.section {
        I9Section::Section1 => (
            NotificationKind::I9Section1Deadline,
            "Complete your I-9 Section 1",
        ),
        I9Section::Section2 => (
            NotificationKind::I9Section2Deadline,
            "I-9 Section 2 verification due",
        ),
    };
    let timing = match classification.status {
        DeadlineStatus::Overdue => format!("was due on {}", classification.deadline),
        DeadlineStatus::DueToday => "is due today".to_string(),
        _ => format!("is due on {}", classification.deadline),
    };

    let mut metadata = BTreeMap::new();
    metadata.insert("employee_id".to_string(), entry.employee_id.to_string());
    metadata.insert("property_id".to_string(), entry.property_id.to_string());
    metadata.insert("deadline".to_string(), classification.deadline.to_string());
    metadata.insert(
        "status".to_string(),
        classification.status.label().to_string(),
    );

    Notification {
        recipient,
        kind,
        title: title.to_string(),
        message: format!(
            "I-9 {} for employee {} {timing}.",
            classification.section, entry.employee_id
        ),
        priority: priority_for(classification.status),
        metadata,
    }
}
