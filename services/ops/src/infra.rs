use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Args;
use hotel_onboarding::error::AppError;
use hotel_onboarding::workflows::onboarding::{
    AuditEntry, AuditError, AuditSink, Clock, FixedClock, InMemoryOnboardingRepository,
    Notification, NotificationError, NotificationSink, SystemClock,
};
use hotel_onboarding::workflows::roster::RosterImporter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Roster exports shared by every roster-driven command.
#[derive(Args, Debug, Clone)]
pub(crate) struct RosterArgs {
    /// Employee roster CSV export
    #[arg(long)]
    pub(crate) employees: PathBuf,
    /// Manager roster CSV export
    #[arg(long)]
    pub(crate) managers: PathBuf,
    /// Evaluate as of this instant (RFC 3339 or YYYY-MM-DD for 09:00 UTC). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

impl RosterArgs {
    pub(crate) fn load(&self) -> Result<Arc<InMemoryOnboardingRepository>, AppError> {
        let snapshot = RosterImporter::from_paths(&self.employees, &self.managers)?;
        info!(
            employees = snapshot.employees.len(),
            managers = snapshot.managers.len(),
            "loaded roster"
        );
        Ok(Arc::new(snapshot.into_repository()?))
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        clock_at(self.as_of)
    }
}

pub(crate) fn clock_at(instant: Option<DateTime<Utc>>) -> Arc<dyn Clock> {
    match instant {
        Some(instant) => Arc::new(FixedClock::new(instant)),
        None => Arc::new(SystemClock),
    }
}

/// Delivers notifications into the log stream. Stands in for the e-mail and inbox adapters.
#[derive(Default)]
pub(crate) struct TracingNotificationSink {
    delivered: AtomicUsize,
}

impl TracingNotificationSink {
    pub(crate) fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            priority = ?notification.priority,
            title = %notification.title,
            "notification delivered"
        );
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            action = %entry.action,
            entity_type = entry.entity_type,
            entity_id = %entry.entity_id,
            actor = ?entry.actor_id,
            "audit"
        );
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = parse_date(raw)?;
    Ok(morning_of(date))
}

/// 09:00 UTC on the given day.
pub(crate) fn morning_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN + chrono::Duration::hours(9))
        .and_utc()
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
