use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::workflows::onboarding::clock::{FixedClock, TokenGenerator};
use crate::workflows::onboarding::documents::{DocumentType, DocumentUpload, I9Document};
use crate::workflows::onboarding::domain::{
    EmployeeI9Projection, EmployeeId, ManagerId, ManagerProfile, OnboardingSession,
    OnboardingStep, Phase, PropertyId, SessionId, StepPayload, StepSubmission,
};
use crate::workflows::onboarding::error::OnboardingError;
use crate::workflows::onboarding::memory::InMemoryOnboardingRepository;
use crate::workflows::onboarding::repository::{
    AuditEntry, AuditError, AuditSink, Notification, NotificationError, NotificationSink,
    OnboardingRepository, RepositoryError,
};
use crate::workflows::onboarding::session::{NewSession, SessionLifecycleManager};

pub(super) const PROPERTY: &str = "hotel-downtown";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn instant(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// Monday 2025-01-06 09:00 UTC.
pub(super) fn monday_morning() -> DateTime<Utc> {
    instant("2025-01-06T09:00:00Z")
}

pub(super) fn property() -> PropertyId {
    PropertyId::new(PROPERTY)
}

#[derive(Default)]
pub(super) struct SequentialTokens {
    next: AtomicU64,
}

impl TokenGenerator for SequentialTokens {
    fn new_token(&self) -> String {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("token-{id:06}")
    }
}

/// Issues the same token every time.
pub(super) struct RepeatingTokens;

impl TokenGenerator for RepeatingTokens {
    fn new_token(&self) -> String {
        "token-repeated".to_string()
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifications {
    events: Mutex<Vec<Notification>>,
    failing_recipient: Option<String>,
}

impl RecordingNotifications {
    pub(super) fn failing_for(recipient: &str) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing_recipient: Some(recipient.to_string()),
        }
    }

    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationSink for RecordingNotifications {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.failing_recipient.as_deref() == Some(notification.recipient.as_str()) {
            return Err(NotificationError::Transport("smtp relay refused".to_string()));
        }
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().expect("audit mutex poisoned").push(entry);
        Ok(())
    }
}

pub(super) struct UnavailableAudit;

impl AuditSink for UnavailableAudit {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("audit store offline".to_string()))
    }
}

/// Delegates to the in-memory store but reports `StaleWrite` for the first `n` session saves.
pub(super) struct StaleSessionRepository {
    pub(super) inner: InMemoryOnboardingRepository,
    stale_saves: AtomicUsize,
}

impl StaleSessionRepository {
    pub(super) fn new(inner: InMemoryOnboardingRepository, stale_saves: usize) -> Self {
        Self {
            inner,
            stale_saves: AtomicUsize::new(stale_saves),
        }
    }

    pub(super) fn arm(&self, stale_saves: usize) {
        self.stale_saves.store(stale_saves, Ordering::SeqCst);
    }
}

impl OnboardingRepository for StaleSessionRepository {
    fn insert_session(
        &self,
        session: OnboardingSession,
    ) -> Result<OnboardingSession, RepositoryError> {
        self.inner.insert_session(session)
    }

    fn session_by_id(&self, id: &SessionId) -> Result<Option<OnboardingSession>, RepositoryError> {
        self.inner.session_by_id(id)
    }

    fn session_by_token(&self, token: &str) -> Result<Option<OnboardingSession>, RepositoryError> {
        self.inner.session_by_token(token)
    }

    fn active_session_for_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Option<OnboardingSession>, RepositoryError> {
        self.inner.active_session_for_employee(employee_id)
    }

    fn save_session(
        &self,
        session: OnboardingSession,
        expected_version: u64,
    ) -> Result<OnboardingSession, RepositoryError> {
        let remaining = self.stale_saves.load(Ordering::SeqCst);
        if remaining > 0 {
            self.stale_saves.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::StaleWrite {
                entity: "session",
                id: session.id.to_string(),
            });
        }
        self.inner.save_session(session, expected_version)
    }

    fn save_step_submission(&self, submission: StepSubmission) -> Result<(), RepositoryError> {
        self.inner.save_step_submission(submission)
    }

    fn employee(&self, id: &EmployeeId) -> Result<Option<EmployeeI9Projection>, RepositoryError> {
        self.inner.employee(id)
    }

    fn save_employee(
        &self,
        employee: EmployeeI9Projection,
        expected_version: u64,
    ) -> Result<EmployeeI9Projection, RepositoryError> {
        self.inner.save_employee(employee, expected_version)
    }

    fn employees_with_pending_i9(
        &self,
        property_id: Option<&PropertyId>,
    ) -> Result<Vec<EmployeeI9Projection>, RepositoryError> {
        self.inner.employees_with_pending_i9(property_id)
    }

    fn active_managers(
        &self,
        property_id: &PropertyId,
    ) -> Result<Vec<ManagerProfile>, RepositoryError> {
        self.inner.active_managers(property_id)
    }

    fn count_active_assignments(&self, manager_id: &ManagerId) -> Result<usize, RepositoryError> {
        self.inner.count_active_assignments(manager_id)
    }

    fn most_recent_assignment(
        &self,
        property_id: &PropertyId,
    ) -> Result<Option<ManagerId>, RepositoryError> {
        self.inner.most_recent_assignment(property_id)
    }

    fn i9_documents(&self, employee_id: &EmployeeId) -> Result<Vec<I9Document>, RepositoryError> {
        self.inner.i9_documents(employee_id)
    }

    fn save_i9_document(&self, document: I9Document) -> Result<I9Document, RepositoryError> {
        self.inner.save_i9_document(document)
    }
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl OnboardingRepository for UnavailableRepository {
    fn insert_session(
        &self,
        _session: OnboardingSession,
    ) -> Result<OnboardingSession, RepositoryError> {
        offline()
    }

    fn session_by_id(&self, _id: &SessionId) -> Result<Option<OnboardingSession>, RepositoryError> {
        offline()
    }

    fn session_by_token(&self, _token: &str) -> Result<Option<OnboardingSession>, RepositoryError> {
        offline()
    }

    fn active_session_for_employee(
        &self,
        _employee_id: &EmployeeId,
    ) -> Result<Option<OnboardingSession>, RepositoryError> {
        offline()
    }

    fn save_session(
        &self,
        _session: OnboardingSession,
        _expected_version: u64,
    ) -> Result<OnboardingSession, RepositoryError> {
        offline()
    }

    fn save_step_submission(&self, _submission: StepSubmission) -> Result<(), RepositoryError> {
        offline()
    }

    fn employee(&self, _id: &EmployeeId) -> Result<Option<EmployeeI9Projection>, RepositoryError> {
        offline()
    }

    fn save_employee(
        &self,
        _employee: EmployeeI9Projection,
        _expected_version: u64,
    ) -> Result<EmployeeI9Projection, RepositoryError> {
        offline()
    }

    fn employees_with_pending_i9(
        &self,
        _property_id: Option<&PropertyId>,
    ) -> Result<Vec<EmployeeI9Projection>, RepositoryError> {
        offline()
    }

    fn active_managers(
        &self,
        _property_id: &PropertyId,
    ) -> Result<Vec<ManagerProfile>, RepositoryError> {
        offline()
    }

    fn count_active_assignments(&self, _manager_id: &ManagerId) -> Result<usize, RepositoryError> {
        offline()
    }

    fn most_recent_assignment(
        &self,
        _property_id: &PropertyId,
    ) -> Result<Option<ManagerId>, RepositoryError> {
        offline()
    }

    fn i9_documents(&self, _employee_id: &EmployeeId) -> Result<Vec<I9Document>, RepositoryError> {
        offline()
    }

    fn save_i9_document(&self, _document: I9Document) -> Result<I9Document, RepositoryError> {
        offline()
    }
}

pub(super) fn seed_employee(
    repository: &InMemoryOnboardingRepository,
    id: &str,
    start_date: Option<NaiveDate>,
) -> EmployeeId {
    let employee = EmployeeI9Projection::new(EmployeeId::new(id), property(), start_date);
    repository
        .insert_employee(employee)
        .expect("employee seeded")
        .id
}

pub(super) fn seed_manager(repository: &InMemoryOnboardingRepository, id: &str) -> ManagerId {
    let manager = ManagerProfile {
        id: ManagerId::new(id),
        property_id: property(),
        display_name: format!("Manager {id}"),
        active: true,
    };
    repository.insert_manager(manager).expect("manager seeded");
    ManagerId::new(id)
}

pub(super) fn new_session(employee_id: &EmployeeId) -> NewSession {
    NewSession {
        employee_id: employee_id.clone(),
        property_id: property(),
        application_id: None,
        manager_id: None,
        ttl: Duration::hours(72),
    }
}

pub(super) fn upload(
    document_type: DocumentType,
    number: &str,
    expiration_date: Option<NaiveDate>,
) -> DocumentUpload {
    DocumentUpload {
        document_type,
        document_number: Some(number.to_string()),
        issuing_authority: Some("U.S. Department of State".to_string()),
        issue_date: Some(date(2020, 3, 1)),
        expiration_date,
    }
}

pub(super) struct Harness {
    pub(super) repository: Arc<InMemoryOnboardingRepository>,
    pub(super) notifications: Arc<RecordingNotifications>,
    pub(super) audit: Arc<RecordingAudit>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) sessions: SessionLifecycleManager<InMemoryOnboardingRepository, RecordingNotifications>,
}

impl Harness {
    pub(super) fn new() -> Self {
        let repository = Arc::new(InMemoryOnboardingRepository::new());
        let notifications = Arc::new(RecordingNotifications::default());
        let audit = Arc::new(RecordingAudit::default());
        let clock = Arc::new(FixedClock::new(monday_morning()));
        let sessions = SessionLifecycleManager::new(
            repository.clone(),
            notifications.clone(),
            clock.clone(),
            Arc::new(SequentialTokens::default()),
        )
        .with_audit(audit.clone());

        Self {
            repository,
            notifications,
            audit,
            clock,
            sessions,
        }
    }

    /// Seed an employee starting today and open a session for them.
    pub(super) fn start(&self, employee: &str) -> OnboardingSession {
        let employee_id = seed_employee(&self.repository, employee, Some(date(2025, 1, 6)));
        self.sessions
            .create_session(new_session(&employee_id))
            .expect("session created")
    }

    pub(super) fn walk_employee_phase(&self, id: &SessionId) -> OnboardingSession {
        walk_steps(&self.sessions, id, Phase::Employee)
    }

    pub(super) fn walk_manager_phase(
        &self,
        id: &SessionId,
    ) -> Result<OnboardingSession, OnboardingError> {
        let mut last = None;
        for step in Phase::Manager.steps() {
            last = Some(self.sessions.advance_step(id, *step, StepPayload::default())?);
        }
        last.ok_or_else(|| OnboardingError::InvalidInput("no manager steps".to_string()))
    }

    /// Passport plus the documents for a clean Section 2.
    pub(super) fn submit_passport(&self, id: &SessionId) -> I9Document {
        self.sessions
            .submit_document(
                id,
                upload(DocumentType::UsPassport, "X1234567", Some(date(2030, 5, 1))),
            )
            .expect("passport accepted")
    }
}

pub(super) fn walk_steps<R, N>(
    sessions: &SessionLifecycleManager<R, N>,
    id: &SessionId,
    phase: Phase,
) -> OnboardingSession
where
    R: OnboardingRepository + 'static,
    N: NotificationSink + 'static,
{
    let mut last = None;
    for step in phase.steps() {
        let payload = StepPayload {
            form_data: Some(serde_json::json!({ "step": step.key() })),
            signature_data: None,
        };
        last = Some(
            sessions
                .advance_step(id, *step, payload)
                .unwrap_or_else(|err| panic!("advance to {step} failed: {err}")),
        );
    }
    last.expect("phase has steps")
}

pub(super) fn employee_steps() -> &'static [OnboardingStep] {
    Phase::Employee.steps()
}
