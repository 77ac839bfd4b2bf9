use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::documents::I9Document;
use super::domain::{
    EmployeeI9Projection, EmployeeId, ManagerId, ManagerProfile, OnboardingSession, PropertyId,
    SessionId, StepSubmission,
};
use super::repository::{OnboardingRepository, RepositoryError};

#[derive(Debug, Default)]
struct MemoryState {
    sessions: HashMap<SessionId, OnboardingSession>,
    tokens: HashMap<String, SessionId>,
    session_writes: HashMap<SessionId, usize>,
    submissions: Vec<StepSubmission>,
    employees: BTreeMap<EmployeeId, EmployeeI9Projection>,
    assignment_sequence: HashMap<EmployeeId, u64>,
    next_assignment: u64,
    managers: Vec<ManagerProfile>,
    documents: HashMap<EmployeeId, Vec<I9Document>>,
}

impl MemoryState {
    fn track_assignment(&mut self, previous: Option<&ManagerId>, employee: &EmployeeI9Projection) {
        if employee.i9_assigned_manager_id.is_some()
            && employee.i9_assigned_manager_id.as_ref() != previous
        {
            self.next_assignment += 1;
            self.assignment_sequence
                .insert(employee.id.clone(), self.next_assignment);
        }
    }
}

/// Process-local repository with compare-and-swap saves, used by tests and the operator binary.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOnboardingRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryOnboardingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    /// Seed or replace an employee projection as-is.
    pub fn insert_employee(
        &self,
        employee: EmployeeI9Projection,
    ) -> Result<EmployeeI9Projection, RepositoryError> {
        let mut state = self.lock()?;
        state.track_assignment(None, &employee);
        state
            .employees
            .insert(employee.id.clone(), employee.clone());
        Ok(employee)
    }

    /// Register a manager; the position among a property's managers follows insertion order.
    pub fn insert_manager(&self, manager: ManagerProfile) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.managers.iter().any(|existing| existing.id == manager.id) {
            return Err(RepositoryError::Conflict(format!(
                "manager {} already registered",
                manager.id
            )));
        }
        state.managers.push(manager);
        Ok(())
    }

    /// Number of accepted `save_session` writes for the session.
    pub fn session_write_count(&self, id: &SessionId) -> Result<usize, RepositoryError> {
        let state = self.lock()?;
        Ok(state.session_writes.get(id).copied().unwrap_or(0))
    }

    pub fn step_submissions(&self, id: &SessionId) -> Result<Vec<StepSubmission>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .submissions
            .iter()
            .filter(|submission| &submission.session_id == id)
            .cloned()
            .collect())
    }
}

impl OnboardingRepository for InMemoryOnboardingRepository {
    fn insert_session(
        &self,
        mut session: OnboardingSession,
    ) -> Result<OnboardingSession, RepositoryError> {
        let mut state = self.lock()?;
        if state.tokens.contains_key(&session.token) {
            return Err(RepositoryError::Conflict("session token already issued".to_string()));
        }
        if state.sessions.contains_key(&session.id) {
            return Err(RepositoryError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }
        if state.sessions.values().any(|existing| {
            existing.employee_id == session.employee_id && existing.status.is_active()
        }) {
            return Err(RepositoryError::Conflict(format!(
                "employee {} already has an active session",
                session.employee_id
            )));
        }

        session.version = 1;
        state
            .tokens
            .insert(session.token.clone(), session.id.clone());
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn session_by_id(&self, id: &SessionId) -> Result<Option<OnboardingSession>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.sessions.get(id).cloned())
    }

    fn session_by_token(&self, token: &str) -> Result<Option<OnboardingSession>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tokens
            .get(token)
            .and_then(|id| state.sessions.get(id))
            .cloned())
    }

    fn active_session_for_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Option<OnboardingSession>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .sessions
            .values()
            .find(|session| &session.employee_id == employee_id && session.status.is_active())
            .cloned())
    }

    fn save_session(
        &self,
        mut session: OnboardingSession,
        expected_version: u64,
    ) -> Result<OnboardingSession, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .sessions
            .get(&session.id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "session",
                id: session.id.to_string(),
            })?;
        if stored.version != expected_version {
            return Err(RepositoryError::StaleWrite {
                entity: "session",
                id: session.id.to_string(),
            });
        }
        if stored.token != session.token {
            return Err(RepositoryError::Conflict("session token is immutable".to_string()));
        }

        session.version = expected_version + 1;
        *state.session_writes.entry(session.id.clone()).or_default() += 1;
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn save_step_submission(&self, submission: StepSubmission) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.submissions.push(submission);
        Ok(())
    }

    fn employee(&self, id: &EmployeeId) -> Result<Option<EmployeeI9Projection>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.employees.get(id).cloned())
    }

    fn save_employee(
        &self,
        mut employee: EmployeeI9Projection,
        expected_version: u64,
    ) -> Result<EmployeeI9Projection, RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .employees
            .get(&employee.id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "employee",
                id: employee.id.to_string(),
            })?;
        if stored.version != expected_version {
            return Err(RepositoryError::StaleWrite {
                entity: "employee",
                id: employee.id.to_string(),
            });
        }

        let previous = stored.i9_assigned_manager_id.clone();
        employee.version = expected_version + 1;
        state.track_assignment(previous.as_ref(), &employee);
        state
            .employees
            .insert(employee.id.clone(), employee.clone());
        Ok(employee)
    }

    fn employees_with_pending_i9(
        &self,
        property_id: Option<&PropertyId>,
    ) -> Result<Vec<EmployeeI9Projection>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .employees
            .values()
            .filter(|employee| employee.has_pending_i9())
            .filter(|employee| property_id.map_or(true, |property| &employee.property_id == property))
            .cloned()
            .collect())
    }

    fn active_managers(
        &self,
        property_id: &PropertyId,
    ) -> Result<Vec<ManagerProfile>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .managers
            .iter()
            .filter(|manager| manager.active && &manager.property_id == property_id)
            .cloned()
            .collect())
    }

    fn count_active_assignments(&self, manager_id: &ManagerId) -> Result<usize, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .employees
            .values()
            .filter(|employee| {
                employee.i9_assigned_manager_id.as_ref() == Some(manager_id)
                    && employee.i9_section2_completed_at.is_none()
            })
            .count())
    }

    fn most_recent_assignment(
        &self,
        property_id: &PropertyId,
    ) -> Result<Option<ManagerId>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .employees
            .values()
            .filter(|employee| &employee.property_id == property_id)
            .filter_map(|employee| {
                let manager_id = employee.i9_assigned_manager_id.as_ref()?;
                let sequence = state.assignment_sequence.get(&employee.id).copied();
                Some(((employee.i9_manager_assigned_at, sequence), manager_id))
            })
            .max_by(|left, right| left.0.cmp(&right.0))
            .map(|(_, manager_id)| manager_id.clone()))
    }

    fn i9_documents(&self, employee_id: &EmployeeId) -> Result<Vec<I9Document>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.documents.get(employee_id).cloned().unwrap_or_default())
    }

    fn save_i9_document(&self, document: I9Document) -> Result<I9Document, RepositoryError> {
        let mut state = self.lock()?;
        let documents = state
            .documents
            .entry(document.employee_id.clone())
            .or_default();
        match documents.iter_mut().find(|existing| existing.id == document.id) {
            Some(existing) => *existing = document.clone(),
            None => documents.push(document.clone()),
        }
        Ok(document)
    }
}
