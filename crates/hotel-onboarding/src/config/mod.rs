use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::workflows::onboarding::{
    AssignmentMethod, DeadlineEngine, MAX_APPROACHING_WINDOW_HOURS, MAX_EXPIRY_WARNING_DAYS,
};

pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
pub const MAX_SCAN_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub onboarding: OnboardingConfig,
    pub scan: ScanConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let session_ttl_hours = bounded_var(
            "ONBOARDING_SESSION_TTL_HOURS",
            72,
            1..=MAX_SESSION_TTL_HOURS,
            ConfigError::InvalidSessionTtl,
        )?;
        let approaching_window_hours = bounded_var(
            "ONBOARDING_APPROACHING_WINDOW_HOURS",
            24,
            1..=MAX_APPROACHING_WINDOW_HOURS,
            ConfigError::InvalidApproachingWindow,
        )?;
        let expiry_warning_days = bounded_var(
            "ONBOARDING_EXPIRY_WARNING_DAYS",
            30,
            0..=MAX_EXPIRY_WARNING_DAYS,
            ConfigError::InvalidExpiryWarningDays,
        )?;
        let assignment_method = match env::var("ONBOARDING_ASSIGNMENT_METHOD") {
            Ok(value) => value
                .parse::<AssignmentMethod>()
                .map_err(|_| ConfigError::InvalidAssignmentMethod { value })?,
            Err(_) => AssignmentMethod::LeastWorkload,
        };
        let interval_minutes = bounded_var(
            "ONBOARDING_SCAN_INTERVAL_MINUTES",
            60,
            1..=MAX_SCAN_INTERVAL_MINUTES,
            ConfigError::InvalidScanInterval,
        )?;

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            onboarding: OnboardingConfig {
                session_ttl_hours,
                approaching_window_hours,
                expiry_warning_days,
                assignment_method,
            },
            scan: ScanConfig {
                interval_minutes,
            },
        })
    }
}

fn bounded_var<T>(
    name: &str,
    default: T,
    range: RangeInclusive<T>,
    error: ConfigError,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .filter(|value| range.contains(value))
            .ok_or(error),
        Err(_) => Ok(default),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Workflow tunables.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    pub session_ttl_hours: i64,
    pub approaching_window_hours: i64,
    pub expiry_warning_days: i64,
    pub assignment_method: AssignmentMethod,
}

impl OnboardingConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::try_hours(self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS))
            .unwrap_or_else(|| Duration::hours(72))
    }

    pub fn deadline_engine(&self) -> DeadlineEngine {
        DeadlineEngine::new(self.approaching_window_hours)
    }
}

/// Cadence of the background deadline sweep.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub interval_minutes: u64,
}

impl ScanConfig {
    pub fn interval(&self) -> StdDuration {
        interval_from_minutes(self.interval_minutes)
    }
}

/// Sweep cadence for a minute count, clamped to one minute through one week.
pub fn interval_from_minutes(minutes: u64) -> StdDuration {
    StdDuration::from_secs(minutes.clamp(1, MAX_SCAN_INTERVAL_MINUTES) * 60)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSessionTtl,
    InvalidApproachingWindow,
    InvalidExpiryWarningDays,
    InvalidAssignmentMethod { value: String },
    InvalidScanInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSessionTtl => write!(
                f,
                "ONBOARDING_SESSION_TTL_HOURS must be between 1 and {} hours",
                MAX_SESSION_TTL_HOURS
            ),
            ConfigError::InvalidApproachingWindow => write!(
                f,
                "ONBOARDING_APPROACHING_WINDOW_HOURS must be between 1 and {} hours",
                MAX_APPROACHING_WINDOW_HOURS
            ),
            ConfigError::InvalidExpiryWarningDays => write!(
                f,
                "ONBOARDING_EXPIRY_WARNING_DAYS must be between 0 and {} days",
                MAX_EXPIRY_WARNING_DAYS
            ),
            ConfigError::InvalidAssignmentMethod { value } => write!(
                f,
                "ONBOARDING_ASSIGNMENT_METHOD must be least_workload or round_robin, got '{}'",
                value
            ),
            ConfigError::InvalidScanInterval => write!(
                f,
                "ONBOARDING_SCAN_INTERVAL_MINUTES must be between 1 and {} minutes",
                MAX_SCAN_INTERVAL_MINUTES
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
