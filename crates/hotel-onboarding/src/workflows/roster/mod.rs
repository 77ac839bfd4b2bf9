//! CSV roster import used to seed the in-memory repository for operator runs.
//!
//! The employee roster carries `Employee ID`, `Property ID`, `Start Date`, `Assigned Manager`,
//! `Section 1 Completed At` and `Section 2 Completed At` columns; the manager roster carries
//! `Manager ID`, `Property ID`, `Name` and `Active`.

mod parser;

use std::io::Read;
use std::path::Path;

use crate::workflows::onboarding::{
    EmployeeI9Projection, EmployeeId, InMemoryOnboardingRepository, ManagerId, ManagerProfile,
    PropertyId, RepositoryError,
};
use parser::{EmployeeRow, ManagerRow};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { row: usize, message: String },
    Repository(RepositoryError),
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::InvalidRow { row, message } => {
                write!(f, "roster row {}: {}", row, message)
            }
            RosterImportError::Repository(err) => {
                write!(f, "could not load roster into repository: {}", err)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::InvalidRow { .. } => None,
            RosterImportError::Repository(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RepositoryError> for RosterImportError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

/// Employees and managers read from roster exports.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    pub employees: Vec<EmployeeI9Projection>,
    pub managers: Vec<ManagerProfile>,
}

impl RosterSnapshot {
    /// Seed a fresh in-memory repository with the roster.
    pub fn into_repository(self) -> Result<InMemoryOnboardingRepository, RosterImportError> {
        let repository = InMemoryOnboardingRepository::new();
        for manager in self.managers {
            repository.insert_manager(manager)?;
        }
        for employee in self.employees {
            repository.insert_employee(employee)?;
        }
        Ok(repository)
    }
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        employees: P,
        managers: Q,
    ) -> Result<RosterSnapshot, RosterImportError> {
        let employees = Self::employees_from_reader(std::fs::File::open(employees)?)?;
        let managers = Self::managers_from_reader(std::fs::File::open(managers)?)?;
        Ok(RosterSnapshot {
            employees,
            managers,
        })
    }

    pub fn employees_from_reader<R: Read>(
        reader: R,
    ) -> Result<Vec<EmployeeI9Projection>, RosterImportError> {
        parser::parse_rows::<_, EmployeeRow>(reader)?
            .into_iter()
            .enumerate()
            .map(|(index, row)| employee_from_row(index + 1, row))
            .collect()
    }

    pub fn managers_from_reader<R: Read>(
        reader: R,
    ) -> Result<Vec<ManagerProfile>, RosterImportError> {
        parser::parse_rows::<_, ManagerRow>(reader)?
            .into_iter()
            .enumerate()
            .map(|(index, row)| manager_from_row(index + 1, row))
            .collect()
    }
}

fn employee_from_row(
    row_number: usize,
    row: EmployeeRow,
) -> Result<EmployeeI9Projection, RosterImportError> {
    let invalid = |message: String| RosterImportError::InvalidRow {
        row: row_number,
        message,
    };

    if row.employee_id.is_empty() || row.property_id.is_empty() {
        return Err(invalid("employee and property ids are required".to_string()));
    }

    let start_date = row
        .start_date
        .as_deref()
        .map(|raw| {
            parser::parse_date(raw).ok_or_else(|| invalid(format!("invalid start date '{raw}'")))
        })
        .transpose()?;
    let timestamp = |raw: Option<&str>, column: &str| {
        raw.map(|value| {
            parser::parse_timestamp(value)
                .ok_or_else(|| invalid(format!("invalid {column} '{value}'")))
        })
        .transpose()
    };

    let mut employee = EmployeeI9Projection::new(
        EmployeeId::new(row.employee_id),
        PropertyId::new(row.property_id),
        start_date,
    );
    employee.i9_section1_completed_at =
        timestamp(row.section1_completed_at.as_deref(), "section 1 completion")?;
    employee.i9_section2_completed_at =
        timestamp(row.section2_completed_at.as_deref(), "section 2 completion")?;
    employee.i9_assigned_manager_id = row.assigned_manager.map(ManagerId::new);

    Ok(employee)
}

fn manager_from_row(
    row_number: usize,
    row: ManagerRow,
) -> Result<ManagerProfile, RosterImportError> {
    if row.manager_id.is_empty() || row.property_id.is_empty() {
        return Err(RosterImportError::InvalidRow {
            row: row_number,
            message: "manager and property ids are required".to_string(),
        });
    }

    Ok(ManagerProfile {
        display_name: row.name.unwrap_or_else(|| row.manager_id.clone()),
        id: ManagerId::new(row.manager_id),
        property_id: PropertyId::new(row.property_id),
        active: parser::parse_active(row.active.as_deref()),
    })
}
