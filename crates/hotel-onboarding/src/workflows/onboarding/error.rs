use super::documents::{ComplianceCode, DocumentError};
use super::domain::PropertyId;
use super::repository::{NotificationError, RepositoryError};

/// Error raised by the onboarding workflow components.
///
/// Business-rule outcomes (`InvalidInput`, `InvalidTransition`, `ComplianceViolation`,
/// `NoManagerAvailable`) are expected results the request layer renders to users.
/// `Repository` and `Notification` wrap collaborator failures and are never retried here.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("compliance violation: {}", summarize(.0))]
    ComplianceViolation(Vec<ComplianceCode>),
    #[error("{entity} {id} was modified concurrently")]
    StaleWrite { entity: &'static str, id: String },
    #[error("no active manager available for property {property_id}")]
    NoManagerAvailable { property_id: PropertyId },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl OnboardingError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Violation codes carried by a compliance failure, empty for every other kind.
    pub fn violations(&self) -> &[ComplianceCode] {
        match self {
            Self::ComplianceViolation(codes) => codes,
            _ => &[],
        }
    }
}

impl From<RepositoryError> for OnboardingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::StaleWrite { entity, id } => Self::StaleWrite { entity, id },
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repository(other),
        }
    }
}

impl From<DocumentError> for OnboardingError {
    fn from(value: DocumentError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

fn summarize(codes: &[ComplianceCode]) -> String {
    codes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
