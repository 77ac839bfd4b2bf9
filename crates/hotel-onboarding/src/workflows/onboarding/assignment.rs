use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::clock::Clock;
use super::deadlines::DeadlineEngine;
use super::domain::{EmployeeI9Projection, EmployeeId, ManagerId, ManagerProfile, PropertyId};
use super::error::OnboardingError;
use super::repository::{
    update_employee, Notification, NotificationKind, NotificationPriority, NotificationSink,
    OnboardingRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    #[default]
    LeastWorkload,
    RoundRobin,
}

impl AssignmentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::LeastWorkload => "least_workload",
            Self::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for AssignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssignmentMethod {
    type Err = OnboardingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "least_workload" => Ok(Self::LeastWorkload),
            "round_robin" => Ok(Self::RoundRobin),
            other => Err(OnboardingError::InvalidInput(format!(
                "unknown assignment method '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerAssignment {
    pub employee_id: EmployeeId,
    pub property_id: PropertyId,
    pub manager_id: ManagerId,
    pub method: AssignmentMethod,
    /// False when the employee already had an active manager and nothing was written.
    pub newly_assigned: bool,
}

/// Distributes Section 2 verification work across a property's managers.
///
/// Calls for the same property are serialized so the workload read and the assignment write
/// happen atomically per property within this process.
pub struct ManagerAssignmentScheduler<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
    deadlines: DeadlineEngine,
    /// One lock per property seen, kept for the scheduler's lifetime. Entries are never evicted.
    property_locks: Mutex<HashMap<PropertyId, Arc<Mutex<()>>>>,
}

impl<R, N> ManagerAssignmentScheduler<R, N>
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
            property_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_deadline_engine(mut self, deadlines: DeadlineEngine) -> Self {
        self.deadlines = deadlines;
        self
    }

    pub fn auto_assign(
        &self,
        property_id: &PropertyId,
        employee_id: &EmployeeId,
        method: AssignmentMethod,
    ) -> Result<ManagerAssignment, OnboardingError> {
        let lock = self.property_lock(property_id);
        let _serialized = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let employee = self
            .repository
            .employee(employee_id)?
            .ok_or_else(|| OnboardingError::not_found("employee", employee_id))?;

        if &employee.property_id != property_id {
            return Err(OnboardingError::InvalidInput(format!(
                "employee {employee_id} belongs to property {}, not {property_id}",
                employee.property_id
            )));
        }
        if employee.i9_section2_completed_at.is_some() {
            return Err(OnboardingError::InvalidTransition(format!(
                "employee {employee_id} already completed I-9 Section 2"
            )));
        }

        let managers = self.repository.active_managers(property_id)?;
        if managers.is_empty() {
            warn!(property_id = %property_id, "no active managers for I-9 assignment");
            return Err(OnboardingError::NoManagerAvailable {
                property_id: property_id.clone(),
            });
        }

        if let Some(current) = employee
            .i9_assigned_manager_id
            .as_ref()
            .filter(|current| managers.iter().any(|manager| &manager.id == *current))
        {
            return Ok(ManagerAssignment {
                employee_id: employee_id.clone(),
                property_id: property_id.clone(),
                manager_id: current.clone(),
                method,
                newly_assigned: false,
            });
        }

        let manager = match method {
            AssignmentMethod::LeastWorkload => self.least_loaded(&managers)?,
            AssignmentMethod::RoundRobin => self.next_in_rotation(property_id, &managers)?,
        };

        let now = self.clock.now();
        let assigned = update_employee(self.repository.as_ref(), employee_id, |employee| {
            employee.i9_assigned_manager_id = Some(manager.id.clone());
            employee.i9_manager_assigned_at = Some(now);
            true
        })?;

        info!(
            property_id = %property_id,
            employee_id = %employee_id,
            manager_id = %manager.id,
            method = %method,
            "assigned I-9 Section 2 verification"
        );

        self.notifications
            .notify(self.assignment_notification(&assigned, manager, method))?;

        Ok(ManagerAssignment {
            employee_id: employee_id.clone(),
            property_id: property_id.clone(),
            manager_id: manager.id.clone(),
            method,
            newly_assigned: true,
        })
    }

    fn property_lock(&self, property_id: &PropertyId) -> Arc<Mutex<()>> {
        let mut locks = self
            .property_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(property_id.clone()).or_default().clone()
    }

    /// Strict minimum of open assignments; ties keep the earlier manager in list order.
    fn least_loaded<'m>(
        &self,
        managers: &'m [ManagerProfile],
    ) -> Result<&'m ManagerProfile, OnboardingError> {
        let mut best: Option<(&ManagerProfile, usize)> = None;
        for manager in managers {
            let workload = self.repository.count_active_assignments(&manager.id)?;
            match best {
                Some((_, lowest)) if workload >= lowest => {}
                _ => best = Some((manager, workload)),
            }
        }

        best.map(|(manager, _)| manager)
            .ok_or_else(|| OnboardingError::InvalidInput("manager list is empty".to_string()))
    }

    fn next_in_rotation<'m>(
        &self,
        property_id: &PropertyId,
        managers: &'m [ManagerProfile],
    ) -> Result<&'m ManagerProfile, OnboardingError> {
        let previous = self.repository.most_recent_assignment(property_id)?;
        let index = previous
            .and_then(|previous| managers.iter().position(|manager| manager.id == previous))
            .map(|position| (position + 1) % managers.len())
            .unwrap_or(0);
        Ok(&managers[index])
    }

    fn assignment_notification(
        &self,
        employee: &EmployeeI9Projection,
        manager: &ManagerProfile,
        method: AssignmentMethod,
    ) -> Notification {
        let deadlines = self.deadlines.deadlines_for(employee);
        let message = match (employee.start_date, deadlines) {
            (Some(start_date), Some(deadlines)) => format!(
                "Employee {} starts on {start_date}. Complete I-9 Section 2 by {}.",
                employee.id, deadlines.section2
            ),
            _ => format!(
                "Employee {} needs I-9 Section 2 verification once a start date is set.",
                employee.id
            ),
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("employee_id".to_string(), employee.id.to_string());
        metadata.insert("property_id".to_string(), employee.property_id.to_string());
        metadata.insert("method".to_string(), method.to_string());
        if let Some(deadlines) = deadlines {
            metadata.insert("section2_deadline".to_string(), deadlines.section2.to_string());
        }

        Notification {
            recipient: (&manager.id).into(),
            kind: NotificationKind::ManagerAssignment,
            title: "New I-9 verification assignment".to_string(),
            message,
            priority: NotificationPriority::High,
            metadata,
        }
    }
}
