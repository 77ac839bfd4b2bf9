use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::onboarding::OnboardingError;
use crate::workflows::roster::RosterImportError;
use std::fmt;

/// Process exit codes reported by the operator binaries.
pub mod exit_code {
    pub const FAILURE: i32 = 1;
    /// The workflow refused the request (rule violation, missing record, bad input).
    pub const REJECTED: i32 = 2;
    /// Configuration or roster input could not be used.
    pub const INVALID_INPUT: i32 = 3;
    /// A concurrent writer won; rerunning the command is safe.
    pub const RETRY: i32 = 75;
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Roster(RosterImportError),
    Onboarding(OnboardingError),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Onboarding(OnboardingError::StaleWrite { .. }) => exit_code::RETRY,
            AppError::Onboarding(
                OnboardingError::Repository(_) | OnboardingError::Notification(_),
            ) => exit_code::FAILURE,
            AppError::Onboarding(_) => exit_code::REJECTED,
            AppError::Config(_) | AppError::Roster(RosterImportError::InvalidRow { .. }) => {
                exit_code::INVALID_INPUT
            }
            AppError::Roster(_) | AppError::Telemetry(_) | AppError::Io(_) => exit_code::FAILURE,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {err}"),
            AppError::Telemetry(err) => write!(f, "telemetry error: {err}"),
            AppError::Io(err) => write!(f, "io error: {err}"),
            AppError::Roster(err) => write!(f, "roster import failed: {err}"),
            AppError::Onboarding(err) => write!(f, "onboarding request failed: {err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Roster(err) => Some(err),
            AppError::Onboarding(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<RosterImportError> for AppError {
    fn from(value: RosterImportError) -> Self {
        Self::Roster(value)
    }
}

impl From<OnboardingError> for AppError {
    fn from(value: OnboardingError) -> Self {
        Self::Onboarding(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::onboarding::{NotificationError, PropertyId, RepositoryError};

    #[test]
    fn workflow_refusals_map_to_rejected() {
        let refusals = [
            OnboardingError::InvalidTransition("already approved".to_string()),
            OnboardingError::NoManagerAvailable {
                property_id: PropertyId::new("hotel-harbor"),
            },
            OnboardingError::NotFound {
                entity: "employee",
                id: "emp-1".to_string(),
            },
        ];

        for refusal in refusals {
            assert_eq!(AppError::from(refusal).exit_code(), exit_code::REJECTED);
        }
    }

    #[test]
    fn collaborator_failures_and_conflicts_are_distinguished() {
        let stale = AppError::from(OnboardingError::StaleWrite {
            entity: "session",
            id: "s-1".to_string(),
        });
        assert_eq!(stale.exit_code(), exit_code::RETRY);

        let outage = AppError::from(OnboardingError::Repository(RepositoryError::Unavailable(
            "pool exhausted".to_string(),
        )));
        assert_eq!(outage.exit_code(), exit_code::FAILURE);

        let undelivered = AppError::from(OnboardingError::Notification(
            NotificationError::Transport("smtp timeout".to_string()),
        ));
        assert_eq!(undelivered.exit_code(), exit_code::FAILURE);
    }

    #[test]
    fn bad_roster_rows_are_input_errors() {
        let err = AppError::from(RosterImportError::InvalidRow {
            row: 3,
            message: "missing start date".to_string(),
        });
        assert_eq!(err.exit_code(), exit_code::INVALID_INPUT);
        assert!(err.to_string().starts_with("roster import failed:"));
    }
}
