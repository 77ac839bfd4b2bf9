use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::documents::I9Document;
use super::domain::{
    EmployeeI9Projection, EmployeeId, ManagerId, ManagerProfile, OnboardingSession, PropertyId,
    SessionId, StepSubmission, UserId,
};
use super::error::OnboardingError;

/// Persistence contract for sessions, the employee I-9 projection, managers, and documents.
///
/// Saves of sessions and employees are compare-and-swap writes: the store accepts the write only
/// when its current `version` equals `expected_version`, bumps the version, and returns the stored
/// copy. A mismatch is reported as [`RepositoryError::StaleWrite`].
pub trait OnboardingRepository: Send + Sync {
    /// Insert a freshly created session. Fails with `Conflict` when the token is already issued
    /// or the employee already holds an active session.
    fn insert_session(&self, session: OnboardingSession)
        -> Result<OnboardingSession, RepositoryError>;
    fn session_by_id(&self, id: &SessionId) -> Result<Option<OnboardingSession>, RepositoryError>;
    fn session_by_token(&self, token: &str) -> Result<Option<OnboardingSession>, RepositoryError>;
    fn active_session_for_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Option<OnboardingSession>, RepositoryError>;
    fn save_session(
        &self,
        session: OnboardingSession,
        expected_version: u64,
    ) -> Result<OnboardingSession, RepositoryError>;
    fn save_step_submission(&self, submission: StepSubmission) -> Result<(), RepositoryError>;

    fn employee(&self, id: &EmployeeId) -> Result<Option<EmployeeI9Projection>, RepositoryError>;
    fn save_employee(
        &self,
        employee: EmployeeI9Projection,
        expected_version: u64,
    ) -> Result<EmployeeI9Projection, RepositoryError>;
    /// Employees whose Section 1 or Section 2 is still open, optionally limited to one property.
    fn employees_with_pending_i9(
        &self,
        property_id: Option<&PropertyId>,
    ) -> Result<Vec<EmployeeI9Projection>, RepositoryError>;

    /// Active managers of a property in a stable order.
    fn active_managers(&self, property_id: &PropertyId)
        -> Result<Vec<ManagerProfile>, RepositoryError>;
    /// Employees assigned to the manager whose Section 2 is not yet completed.
    fn count_active_assignments(&self, manager_id: &ManagerId) -> Result<usize, RepositoryError>;
    /// Manager of the most recently assigned employee within the property.
    fn most_recent_assignment(
        &self,
        property_id: &PropertyId,
    ) -> Result<Option<ManagerId>, RepositoryError>;

    fn i9_documents(&self, employee_id: &EmployeeId) -> Result<Vec<I9Document>, RepositoryError>;
    fn save_i9_document(&self, document: I9Document) -> Result<I9Document, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} {id} changed since it was read")]
    StaleWrite { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (e-mail, in-app inbox, SMS adapters).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ManagerAssignment,
    I9Section1Deadline,
    I9Section2Deadline,
    OnboardingApproved,
    OnboardingRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Best-effort audit trail. Failures are logged by callers and never fail the workflow.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SessionCreated,
    StepAdvanced,
    PhaseCompleted,
    SessionExpired,
    SessionApproved,
    SessionRejected,
    ManagerAssigned,
    DocumentSubmitted,
    DocumentReviewed,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SessionCreated => "session_created",
            Self::StepAdvanced => "step_advanced",
            Self::PhaseCompleted => "phase_completed",
            Self::SessionExpired => "session_expired",
            Self::SessionApproved => "session_approved",
            Self::SessionRejected => "session_rejected",
            Self::ManagerAssigned => "manager_assigned",
            Self::DocumentSubmitted => "document_submitted",
            Self::DocumentReviewed => "document_reviewed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub actor_id: Option<UserId>,
    pub metadata: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

/// Read-modify-write of an employee projection with a single retry on a stale version.
///
/// `apply` returns `false` when the projection already holds the desired values, in which case
/// nothing is written.
pub(crate) fn update_employee<R, F>(
    repository: &R,
    employee_id: &EmployeeId,
    mut apply: F,
) -> Result<EmployeeI9Projection, OnboardingError>
where
    R: OnboardingRepository + ?Sized,
    F: FnMut(&mut EmployeeI9Projection) -> bool,
{
    let mut retried = false;
    loop {
        let current = repository
            .employee(employee_id)?
            .ok_or_else(|| OnboardingError::not_found("employee", employee_id))?;
        let mut next = current.clone();
        if !apply(&mut next) {
            return Ok(current);
        }

        match repository.save_employee(next, current.version) {
            Ok(saved) => return Ok(saved),
            Err(RepositoryError::StaleWrite { .. }) if !retried => {
                warn!(employee_id = %employee_id, "employee projection changed concurrently, retrying");
                retried = true;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
