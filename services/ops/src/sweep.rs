use crate::infra::{
    clock_at, parse_date, parse_instant, print_json, RosterArgs, TracingNotificationSink,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use hotel_onboarding::config::{interval_from_minutes, AppConfig, MAX_SCAN_INTERVAL_MINUTES};
use hotel_onboarding::error::AppError;
use hotel_onboarding::workflows::onboarding::{
    deadline_instant, AssignmentMethod, Clock, DeadlineMonitor, DeadlineStatus, EmployeeId,
    InMemoryOnboardingRepository, ManagerAssignmentScheduler, PropertyId,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Args, Debug)]
pub(crate) struct DueDatesArgs {
    /// Employee start date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) start_date: NaiveDate,
    /// Classify as of this instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) as_of: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct DueDate {
    deadline: NaiveDate,
    status: DeadlineStatus,
}

#[derive(Serialize)]
struct DueDates {
    start_date: NaiveDate,
    section1: DueDate,
    section2: DueDate,
}

#[derive(Args, Debug)]
pub(crate) struct DeadlinesArgs {
    #[command(flatten)]
    pub(crate) roster: RosterArgs,
    /// Limit the listing to one property
    #[arg(long)]
    pub(crate) property: Option<String>,
    /// Leave out employees with an overdue section
    #[arg(long)]
    pub(crate) exclude_overdue: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScanArgs {
    #[command(flatten)]
    pub(crate) roster: RosterArgs,
}

#[derive(Args, Debug)]
pub(crate) struct WatchArgs {
    #[command(flatten)]
    pub(crate) roster: RosterArgs,
    /// Override ONBOARDING_SCAN_INTERVAL_MINUTES (1 to 10080)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_SCAN_INTERVAL_MINUTES))]
    pub(crate) interval_minutes: Option<u64>,
}

#[derive(Args, Debug)]
pub(crate) struct AssignArgs {
    #[command(flatten)]
    pub(crate) roster: RosterArgs,
    /// Property the employee belongs to
    #[arg(long)]
    pub(crate) property: String,
    /// Employee to assign a Section 2 verifier to
    #[arg(long)]
    pub(crate) employee: String,
    /// least_workload or round_robin; defaults to ONBOARDING_ASSIGNMENT_METHOD
    #[arg(long)]
    pub(crate) method: Option<AssignmentMethod>,
}

type Monitor = DeadlineMonitor<InMemoryOnboardingRepository, TracingNotificationSink>;

fn monitor(roster: &RosterArgs, config: &AppConfig) -> Result<Monitor, AppError> {
    let repository = roster.load()?;
    Ok(DeadlineMonitor::new(
        repository,
        Arc::new(TracingNotificationSink::default()),
        roster.clock(),
    )
    .with_deadline_engine(config.onboarding.deadline_engine()))
}

pub(crate) fn run_due_dates(args: DueDatesArgs, config: &AppConfig) -> Result<(), AppError> {
    let engine = config.onboarding.deadline_engine();
    let now = clock_at(args.as_of).now();
    let deadlines = engine.compute_deadlines(args.start_date);
    let due = |deadline: NaiveDate| DueDate {
        deadline,
        status: engine.classify(deadline_instant(deadline), None, now).status,
    };

    print_json(&DueDates {
        start_date: args.start_date,
        section1: due(deadlines.section1),
        section2: due(deadlines.section2),
    })
}

pub(crate) fn run_deadlines(args: DeadlinesArgs, config: &AppConfig) -> Result<(), AppError> {
    let monitor = monitor(&args.roster, config)?;
    let property = args.property.map(PropertyId::new);
    let pending = monitor.pending_deadlines(property.as_ref(), !args.exclude_overdue)?;
    print_json(&pending)
}

pub(crate) fn run_scan(args: ScanArgs, config: &AppConfig) -> Result<(), AppError> {
    let monitor = monitor(&args.roster, config)?;
    let report = monitor.scan_and_notify()?;
    print_json(&report)
}

pub(crate) async fn run_watch(args: WatchArgs, config: &AppConfig) -> Result<(), AppError> {
    let monitor = monitor(&args.roster, config)?;
    let interval = args
        .interval_minutes
        .map(interval_from_minutes)
        .unwrap_or_else(|| config.scan.interval());

    info!(
        environment = ?config.environment,
        interval_secs = interval.as_secs(),
        "deadline watch started"
    );

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A failed sweep is retried on the next tick.
                if let Err(err) = monitor.scan_and_notify() {
                    error!(error = %err, "deadline sweep failed");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("deadline watch stopped");
                return Ok(());
            }
        }
    }
}

pub(crate) fn run_assign(args: AssignArgs, config: &AppConfig) -> Result<(), AppError> {
    let repository = args.roster.load()?;
    let scheduler = ManagerAssignmentScheduler::new(
        repository,
        Arc::new(TracingNotificationSink::default()),
        args.roster.clock(),
    )
    .with_deadline_engine(config.onboarding.deadline_engine());

    let method = args.method.unwrap_or(config.onboarding.assignment_method);
    let assignment = scheduler.auto_assign(
        &PropertyId::new(args.property),
        &EmployeeId::new(args.employee),
        method,
    )?;
    print_json(&assignment)
}
