use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::clock::{Clock, TokenGenerator};
use super::deadlines::{DeadlineEngine, I9Section, SectionCompliance};
use super::documents::{
    review_section2, validate_document_number, DocumentUpload, I9Document, Section2Review,
    VerificationStatus, EXPIRY_WARNING_DAYS, MAX_EXPIRY_WARNING_DAYS,
};
use super::domain::{
    ApplicationId, DocumentId, EmployeeI9Projection, EmployeeId, ManagerId, OnboardingSession,
    OnboardingStep, Phase, PropertyId, SessionId, SessionStatus, StepPayload, StepSubmission,
    UserId,
};
use super::error::OnboardingError;
use super::repository::{
    update_employee, AuditAction, AuditEntry, AuditSink, Notification, NotificationKind,
    NotificationPriority, NotificationSink, OnboardingRepository, RepositoryError,
};

/// Input for [`SessionLifecycleManager::create_session`], raised by an external approval event.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub employee_id: EmployeeId,
    pub property_id: PropertyId,
    pub application_id: Option<ApplicationId>,
    pub manager_id: Option<ManagerId>,
    pub ttl: Duration,
}

/// Owns every session write: creation, step progress, phase gates, terminal decisions and
/// lazy expiry.
///
/// Writes are optimistic. Each read-modify-write carries the version it read and is retried
/// once when the repository reports a stale version.
pub struct SessionLifecycleManager<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenGenerator>,
    audit: Option<Arc<dyn AuditSink>>,
    deadlines: DeadlineEngine,
    expiry_warning_days: i64,
}

impl<R, N> SessionLifecycleManager<R, N>
where
    R: OnboardingRepository + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifications: Arc<N>,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenGenerator>,
    ) -> Self {
        Self {
            repository,
            notifications,
            clock,
            tokens,
            audit: None,
            deadlines: DeadlineEngine::default(),
            expiry_warning_days: EXPIRY_WARNING_DAYS,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_deadline_engine(mut self, deadlines: DeadlineEngine) -> Self {
        self.deadlines = deadlines;
        self
    }

    pub fn with_expiry_warning_days(mut self, days: i64) -> Self {
        self.expiry_warning_days = days.clamp(0, MAX_EXPIRY_WARNING_DAYS);
        self
    }

    pub fn create_session(&self, request: NewSession) -> Result<OnboardingSession, OnboardingError> {
        if request.ttl <= Duration::zero() {
            return Err(OnboardingError::InvalidInput(
                "session ttl must be positive".to_string(),
            ));
        }

        let employee = self
            .repository
            .employee(&request.employee_id)?
            .ok_or_else(|| OnboardingError::not_found("employee", &request.employee_id))?;
        if employee.property_id != request.property_id {
            return Err(OnboardingError::InvalidInput(format!(
                "employee {} belongs to property {}, not {}",
                employee.id, employee.property_id, request.property_id
            )));
        }

        if let Some(existing) = self
            .repository
            .active_session_for_employee(&request.employee_id)?
        {
            match self.enforce_expiry(existing) {
                Ok(active) => {
                    return Err(OnboardingError::InvalidTransition(format!(
                        "employee {} already has active session {}",
                        request.employee_id, active.id
                    )))
                }
                Err(OnboardingError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        let now = self.clock.now();
        let expires_at = now.checked_add_signed(request.ttl).ok_or_else(|| {
            OnboardingError::InvalidInput("session ttl is out of range".to_string())
        })?;
        let session = OnboardingSession {
            id: SessionId::generate(),
            employee_id: request.employee_id,
            application_id: request.application_id,
            property_id: request.property_id,
            manager_id: request.manager_id,
            token: self.tokens.new_token(),
            status: SessionStatus::NotStarted,
            phase: Phase::Employee,
            current_step: Phase::Employee.first_step(),
            created_at: now,
            updated_at: now,
            expires_at,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejection_reason: None,
            rejected_at: None,
            version: 0,
        };

        let stored = self.repository.insert_session(session)?;
        self.mirror_status(&stored.employee_id, stored.status)?;

        info!(
            session_id = %stored.id,
            employee_id = %stored.employee_id,
            property_id = %stored.property_id,
            expires_at = %stored.expires_at,
            "created onboarding session"
        );
        self.audit(
            AuditAction::SessionCreated,
            &stored,
            None,
            BTreeMap::from([("expires_at".to_string(), stored.expires_at.to_rfc3339())]),
        );

        Ok(stored)
    }

    /// Resolve a session from its opaque token. Expired sessions are reported as `NotFound`.
    pub fn get_by_token(&self, token: &str) -> Result<OnboardingSession, OnboardingError> {
        let session = self
            .repository
            .session_by_token(token)?
            .ok_or_else(|| OnboardingError::not_found("session", "for token"))?;
        self.enforce_expiry(session)
    }

    pub fn get_by_id(&self, id: &SessionId) -> Result<OnboardingSession, OnboardingError> {
        let session = self
            .repository
            .session_by_id(id)?
            .ok_or_else(|| OnboardingError::not_found("session", id))?;
        self.enforce_expiry(session)
    }

    /// Record progress on `step`, which must be the current step or the one right after it.
    ///
    /// Reaching the last employee or manager step completes that phase in the same call. When
    /// the phase gate refuses, the step stays recorded and the gate's error is returned.
    pub fn advance_step(
        &self,
        id: &SessionId,
        step: OnboardingStep,
        payload: StepPayload,
    ) -> Result<OnboardingSession, OnboardingError> {
        // The employee signature and the manager handoff land in one write.
        let hands_off = step == Phase::Employee.last_step();
        let (session, _) = self.update_session(id, |session, _| {
            ensure_open(session)?;
            if step.phase() != session.phase {
                return Err(OnboardingError::InvalidTransition(format!(
                    "step {step} belongs to the {} phase, session is in the {} phase",
                    step.phase(),
                    session.phase
                )));
            }

            let current = session.phase.position(session.current_step).unwrap_or(0);
            let requested = session.phase.position(step).unwrap_or(0);
            if requested != current && requested != current + 1 {
                return Err(OnboardingError::InvalidTransition(format!(
                    "cannot move from {} to {step}",
                    session.current_step
                )));
            }

            session.current_step = step;
            if session.status == SessionStatus::NotStarted {
                session.status = SessionStatus::InProgress;
            }
            if hands_off {
                self.hand_to_manager(session)?;
            }
            Ok(true)
        })?;

        let now = self.clock.now();
        self.repository.save_step_submission(StepSubmission {
            session_id: session.id.clone(),
            step,
            payload,
            submitted_at: now,
        })?;
        self.mirror_status(&session.employee_id, session.status)?;

        info!(
            session_id = %session.id,
            step = %step,
            status = %session.status,
            "advanced onboarding step"
        );
        self.audit(
            AuditAction::StepAdvanced,
            &session,
            Some(UserId::from(&session.employee_id)),
            BTreeMap::from([("step".to_string(), step.to_string())]),
        );

        if hands_off {
            return self.finish_employee_phase(session);
        }
        match session.phase {
            Phase::Manager if step == Phase::Manager.last_step() => self.complete_manager_phase(id),
            _ => Ok(session),
        }
    }

    /// Hand the session to the manager once the employee signed the last step.
    pub fn complete_employee_phase(
        &self,
        id: &SessionId,
    ) -> Result<OnboardingSession, OnboardingError> {
        let (session, _) = self.update_session(id, |session, _| {
            ensure_open(session)?;
            self.hand_to_manager(session)?;
            Ok(true)
        })?;

        self.finish_employee_phase(session)
    }

    fn hand_to_manager(&self, session: &mut OnboardingSession) -> Result<(), OnboardingError> {
        ensure_phase_finished(session, Phase::Employee)?;

        if session.manager_id.is_none() {
            session.manager_id = self
                .repository
                .employee(&session.employee_id)?
                .and_then(|employee| employee.i9_assigned_manager_id);
        }
        session.phase = Phase::Manager;
        session.status = SessionStatus::ManagerReview;
        session.current_step = Phase::Manager.first_step();
        Ok(())
    }

    /// Section 1 stamps, deadlines and audit that follow a saved handoff.
    fn finish_employee_phase(
        &self,
        session: OnboardingSession,
    ) -> Result<OnboardingSession, OnboardingError> {
        let now = self.clock.now();
        let deadlines = self.deadlines;
        let employee = update_employee(self.repository.as_ref(), &session.employee_id, |employee| {
            let mut changed = false;
            if employee.i9_section1_completed_at.is_none() {
                employee.i9_section1_completed_at = Some(now);
                changed = true;
            }
            if let Some(start_date) = employee.start_date {
                let computed = deadlines.compute_deadlines(start_date);
                if employee.i9_section1_deadline.is_none() {
                    employee.i9_section1_deadline = Some(computed.section1);
                    changed = true;
                }
                if employee.i9_section2_deadline.is_none() {
                    employee.i9_section2_deadline = Some(computed.section2);
                    changed = true;
                }
            }
            if employee.onboarding_status != session.status {
                employee.onboarding_status = session.status;
                changed = true;
            }
            changed
        })?;

        let compliance = self.section_compliance(&employee, I9Section::Section1, now);
        info!(
            session_id = %session.id,
            employee_id = %session.employee_id,
            manager_id = ?session.manager_id,
            "employee phase completed, awaiting manager review"
        );
        self.audit(
            AuditAction::PhaseCompleted,
            &session,
            Some(UserId::from(&session.employee_id)),
            phase_metadata(Phase::Employee, compliance),
        );

        Ok(session)
    }

    /// Hand the session to HR once Section 2 documents pass review.
    pub fn complete_manager_phase(
        &self,
        id: &SessionId,
    ) -> Result<OnboardingSession, OnboardingError> {
        let current = self.get_by_id(id)?;
        ensure_open(&current)?;
        ensure_phase_finished(&current, Phase::Manager)?;

        let now = self.clock.now();
        let review = self.section2_review_for(&current.employee_id, now)?;
        if !review.passed() {
            warn!(
                session_id = %current.id,
                employee_id = %current.employee_id,
                violations = review.violations.len(),
                "section 2 document review failed"
            );
            return Err(OnboardingError::ComplianceViolation(review.violations));
        }
        for warning in &review.warnings {
            warn!(
                employee_id = %current.employee_id,
                document_type = %warning.document_type,
                expires_on = %warning.expires_on,
                days_remaining = warning.days_remaining,
                "I-9 document expires soon"
            );
        }

        let (session, _) = self.update_session(id, |session, _| {
            ensure_open(session)?;
            ensure_phase_finished(session, Phase::Manager)?;
            session.phase = Phase::Hr;
            session.status = SessionStatus::HrApproval;
            session.current_step = Phase::Hr.first_step();
            Ok(true)
        })?;

        let employee = update_employee(self.repository.as_ref(), &session.employee_id, |employee| {
            let mut changed = false;
            if employee.i9_section2_completed_at.is_none() {
                employee.i9_section2_completed_at = Some(now);
                changed = true;
            }
            if employee.onboarding_status != session.status {
                employee.onboarding_status = session.status;
                changed = true;
            }
            changed
        })?;

        let compliance = self.section_compliance(&employee, I9Section::Section2, now);
        info!(
            session_id = %session.id,
            employee_id = %session.employee_id,
            "manager phase completed, awaiting HR approval"
        );
        let actor = session.manager_id.as_ref().map(UserId::from);
        self.audit(
            AuditAction::PhaseCompleted,
            &session,
            actor,
            phase_metadata(Phase::Manager, compliance),
        );

        Ok(session)
    }

    /// Approve a session in HR review. A session already decided is returned untouched.
    pub fn approve(
        &self,
        id: &SessionId,
        approver: &UserId,
    ) -> Result<OnboardingSession, OnboardingError> {
        let (session, changed) = self.update_session(id, |session, now| {
            match session.status {
                SessionStatus::Approved | SessionStatus::Rejected => return Ok(false),
                SessionStatus::HrApproval if session.phase == Phase::Hr => {}
                other => {
                    return Err(OnboardingError::InvalidTransition(format!(
                        "cannot approve a session that is {other}"
                    )))
                }
            }
            session.status = SessionStatus::Approved;
            session.approved_by = Some(approver.clone());
            session.approved_at = Some(now);
            Ok(true)
        })?;

        if !changed {
            debug!(session_id = %session.id, status = ?session.status, "session already decided");
            return Ok(session);
        }

        self.mirror_status(&session.employee_id, session.status)?;
        info!(session_id = %session.id, approver = %approver, "onboarding approved");
        self.audit(
            AuditAction::SessionApproved,
            &session,
            Some(approver.clone()),
            BTreeMap::new(),
        );
        self.notifications.notify(Notification {
            recipient: UserId::from(&session.employee_id),
            kind: NotificationKind::OnboardingApproved,
            title: "Onboarding approved".to_string(),
            message: "Your onboarding paperwork has been approved.".to_string(),
            priority: NotificationPriority::Normal,
            metadata: BTreeMap::from([("session_id".to_string(), session.id.to_string())]),
        })?;

        Ok(session)
    }

    /// Reject a session in HR review. A session already decided is returned untouched.
    pub fn reject(
        &self,
        id: &SessionId,
        rejecter: &UserId,
        reason: &str,
    ) -> Result<OnboardingSession, OnboardingError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OnboardingError::InvalidInput(
                "rejection reason is required".to_string(),
            ));
        }

        let (session, changed) = self.update_session(id, |session, now| {
            match session.status {
                SessionStatus::Approved | SessionStatus::Rejected => return Ok(false),
                SessionStatus::HrApproval if session.phase == Phase::Hr => {}
                other => {
                    return Err(OnboardingError::InvalidTransition(format!(
                        "cannot reject a session that is {other}"
                    )))
                }
            }
            session.status = SessionStatus::Rejected;
            session.rejected_by = Some(rejecter.clone());
            session.rejection_reason = Some(reason.to_string());
            session.rejected_at = Some(now);
            Ok(true)
        })?;

        if !changed {
            debug!(session_id = %session.id, status = ?session.status, "session already decided");
            return Ok(session);
        }

        self.mirror_status(&session.employee_id, session.status)?;
        info!(session_id = %session.id, rejecter = %rejecter, "onboarding rejected");
        self.audit(
            AuditAction::SessionRejected,
            &session,
            Some(rejecter.clone()),
            BTreeMap::from([("reason".to_string(), reason.to_string())]),
        );
        self.notifications.notify(Notification {
            recipient: UserId::from(&session.employee_id),
            kind: NotificationKind::OnboardingRejected,
            title: "Onboarding needs attention".to_string(),
            message: format!("Your onboarding paperwork was returned: {reason}"),
            priority: NotificationPriority::High,
            metadata: BTreeMap::from([("session_id".to_string(), session.id.to_string())]),
        })?;

        Ok(session)
    }

    /// Bind the reviewing manager to the session, typically the scheduler's pick.
    pub fn assign_manager(
        &self,
        id: &SessionId,
        manager_id: &ManagerId,
    ) -> Result<OnboardingSession, OnboardingError> {
        let current = self.get_by_id(id)?;
        let managers = self.repository.active_managers(&current.property_id)?;
        if !managers.iter().any(|manager| &manager.id == manager_id) {
            return Err(OnboardingError::InvalidInput(format!(
                "manager {manager_id} is not active at property {}",
                current.property_id
            )));
        }

        let (session, changed) = self.update_session(id, |session, _| {
            ensure_open(session)?;
            if session.manager_id.as_ref() == Some(manager_id) {
                return Ok(false);
            }
            session.manager_id = Some(manager_id.clone());
            Ok(true)
        })?;

        if changed {
            info!(session_id = %session.id, manager_id = %manager_id, "manager bound to session");
            self.audit(
                AuditAction::ManagerAssigned,
                &session,
                None,
                BTreeMap::from([("manager_id".to_string(), manager_id.to_string())]),
            );
        }
        Ok(session)
    }

    /// Store an uploaded I-9 document for the session's employee with status `uploaded`.
    pub fn submit_document(
        &self,
        id: &SessionId,
        upload: DocumentUpload,
    ) -> Result<I9Document, OnboardingError> {
        let session = self.get_by_id(id)?;
        ensure_open(&session)?;

        let document_number = upload
            .document_number
            .map(|number| number.trim().to_string())
            .filter(|number| !number.is_empty());
        if let Some(number) = document_number.as_deref() {
            validate_document_number(upload.document_type, number)
                .map_err(|code| OnboardingError::ComplianceViolation(vec![code]))?;
        }

        let document = I9Document {
            id: DocumentId::generate(),
            employee_id: session.employee_id.clone(),
            document_type: upload.document_type,
            document_number,
            issuing_authority: upload.issuing_authority,
            issue_date: upload.issue_date,
            expiration_date: upload.expiration_date,
            verification_status: VerificationStatus::Uploaded,
            uploaded_at: self.clock.now(),
        };
        let stored = self.repository.save_i9_document(document)?;

        info!(
            session_id = %session.id,
            document_id = %stored.id,
            document_type = %stored.document_type,
            list = stored.document_list().label(),
            "I-9 document submitted"
        );
        self.audit(
            AuditAction::DocumentSubmitted,
            &session,
            Some(UserId::from(&session.employee_id)),
            BTreeMap::from([
                ("document_id".to_string(), stored.id.to_string()),
                ("document_type".to_string(), stored.document_type.to_string()),
            ]),
        );

        Ok(stored)
    }

    /// Manager verdict on a submitted document.
    pub fn review_document(
        &self,
        id: &SessionId,
        document_id: &DocumentId,
        status: VerificationStatus,
        reviewer: &UserId,
    ) -> Result<I9Document, OnboardingError> {
        if status == VerificationStatus::Uploaded {
            return Err(OnboardingError::InvalidInput(
                "a review cannot reset a document to uploaded".to_string(),
            ));
        }

        let session = self.get_by_id(id)?;
        ensure_open(&session)?;

        let mut document = self
            .repository
            .i9_documents(&session.employee_id)?
            .into_iter()
            .find(|document| &document.id == document_id)
            .ok_or_else(|| OnboardingError::not_found("document", document_id))?;
        if document.verification_status == status {
            return Ok(document);
        }

        document.verification_status = status;
        let stored = self.repository.save_i9_document(document)?;

        info!(
            session_id = %session.id,
            document_id = %stored.id,
            status = ?status,
            reviewer = %reviewer,
            "I-9 document reviewed"
        );
        self.audit(
            AuditAction::DocumentReviewed,
            &session,
            Some(reviewer.clone()),
            BTreeMap::from([
                ("document_id".to_string(), stored.id.to_string()),
                ("status".to_string(), format!("{status:?}").to_ascii_lowercase()),
            ]),
        );

        Ok(stored)
    }

    /// Preview of the Section 2 gate for the session's current documents.
    pub fn section2_review(&self, id: &SessionId) -> Result<Section2Review, OnboardingError> {
        let session = self.get_by_id(id)?;
        self.section2_review_for(&session.employee_id, self.clock.now())
    }

    fn section2_review_for(
        &self,
        employee_id: &EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<Section2Review, OnboardingError> {
        let documents = self.repository.i9_documents(employee_id)?;
        Ok(review_section2(
            &documents,
            now.date_naive(),
            self.expiry_warning_days,
        ))
    }

    /// Expire an active session whose lifetime elapsed. Concurrent readers race on the same
    /// version, so exactly one EXPIRED write lands and every caller sees `NotFound`.
    fn enforce_expiry(
        &self,
        session: OnboardingSession,
    ) -> Result<OnboardingSession, OnboardingError> {
        let now = self.clock.now();
        let mut current = session;
        let mut retried = false;

        loop {
            if current.status == SessionStatus::Expired {
                return Err(OnboardingError::not_found("session", &current.id));
            }
            if !current.is_expired_at(now) {
                return Ok(current);
            }

            debug!(session_id = %current.id, expires_at = %current.expires_at, "session lifetime elapsed");
            let mut expired = current.clone();
            expired.status = SessionStatus::Expired;
            expired.updated_at = now;

            match self.repository.save_session(expired, current.version) {
                Ok(saved) => {
                    info!(session_id = %saved.id, employee_id = %saved.employee_id, "session expired");
                    self.mirror_status(&saved.employee_id, SessionStatus::Expired)?;
                    self.audit(AuditAction::SessionExpired, &saved, None, BTreeMap::new());
                    return Err(OnboardingError::not_found("session", &saved.id));
                }
                Err(RepositoryError::StaleWrite { .. }) if !retried => {
                    retried = true;
                    current = self
                        .repository
                        .session_by_id(&current.id)?
                        .ok_or_else(|| OnboardingError::not_found("session", &current.id))?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Read-modify-write of a live session with a single retry on a stale version.
    ///
    /// `apply` returns `Ok(false)` when the session already holds the requested state; the
    /// stored copy is then returned without a write.
    fn update_session<F>(
        &self,
        id: &SessionId,
        mut apply: F,
    ) -> Result<(OnboardingSession, bool), OnboardingError>
    where
        F: FnMut(&mut OnboardingSession, DateTime<Utc>) -> Result<bool, OnboardingError>,
    {
        let mut retried = false;
        loop {
            let current = self.get_by_id(id)?;
            let now = self.clock.now();
            let mut next = current.clone();
            if !apply(&mut next, now)? {
                return Ok((current, false));
            }
            next.updated_at = now;

            match self.repository.save_session(next, current.version) {
                Ok(saved) => return Ok((saved, true)),
                Err(RepositoryError::StaleWrite { .. }) if !retried => {
                    warn!(session_id = %id, "session changed concurrently, retrying");
                    retried = true;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn mirror_status(
        &self,
        employee_id: &EmployeeId,
        status: SessionStatus,
    ) -> Result<(), OnboardingError> {
        let result = update_employee(self.repository.as_ref(), employee_id, |employee| {
            if employee.onboarding_status == status {
                return false;
            }
            employee.onboarding_status = status;
            true
        });

        match result {
            Ok(_) => Ok(()),
            Err(OnboardingError::NotFound { .. }) => {
                warn!(employee_id = %employee_id, status = %status, "no employee record to mirror status");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn section_compliance(
        &self,
        employee: &EmployeeI9Projection,
        section: I9Section,
        now: DateTime<Utc>,
    ) -> Option<SectionCompliance> {
        let start_date = employee.start_date?;
        let completed_at = match section {
            I9Section::Section1 => employee.i9_section1_completed_at,
            I9Section::Section2 => employee.i9_section2_completed_at,
        };
        let compliance = self
            .deadlines
            .compliance_status(section, start_date, completed_at, now);
        if compliance == SectionCompliance::NonCompliant {
            warn!(
                employee_id = %employee.id,
                section = %section,
                "I-9 section completed after its federal deadline"
            );
        }
        Some(compliance)
    }

    fn audit(
        &self,
        action: AuditAction,
        session: &OnboardingSession,
        actor_id: Option<UserId>,
        metadata: BTreeMap<String, String>,
    ) {
        let Some(sink) = &self.audit else {
            return;
        };

        let entry = AuditEntry {
            action,
            entity_type: "onboarding_session",
            entity_id: session.id.to_string(),
            actor_id,
            metadata,
            recorded_at: self.clock.now(),
        };
        if let Err(err) = sink.record(entry) {
            warn!(action = %action, session_id = %session.id, error = %err, "failed to record audit entry");
        }
    }
}

fn ensure_open(session: &OnboardingSession) -> Result<(), OnboardingError> {
    if session.status.is_active() {
        Ok(())
    } else {
        Err(OnboardingError::InvalidTransition(format!(
            "session {} is {}",
            session.id, session.status
        )))
    }
}

fn ensure_phase_finished(session: &OnboardingSession, phase: Phase) -> Result<(), OnboardingError> {
    if session.phase != phase {
        return Err(OnboardingError::InvalidTransition(format!(
            "session {} is in the {} phase, not the {phase} phase",
            session.id, session.phase
        )));
    }
    if session.current_step != phase.last_step() {
        return Err(OnboardingError::InvalidTransition(format!(
            "the {phase} phase ends at {}, session is at {}",
            phase.last_step(),
            session.current_step
        )));
    }
    Ok(())
}

fn phase_metadata(phase: Phase, compliance: Option<SectionCompliance>) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::from([("phase".to_string(), phase.to_string())]);
    if let Some(compliance) = compliance {
        metadata.insert("i9_compliance".to_string(), compliance.label().to_string());
    }
    metadata
}
