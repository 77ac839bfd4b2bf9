use crate::demo::{run_demo, DemoArgs};
use crate::sweep::{
    run_assign, run_deadlines, run_due_dates, run_scan, run_watch, AssignArgs, DeadlinesArgs,
    DueDatesArgs, ScanArgs, WatchArgs,
};
use clap::{Parser, Subcommand};
use hotel_onboarding::config::AppConfig;
use hotel_onboarding::error::AppError;
use hotel_onboarding::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "Hotel Onboarding Ops",
    about = "Operate the hotel onboarding and I-9 compliance workflow from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the Section 1 and Section 2 deadlines for a start date
    DueDates(DueDatesArgs),
    /// List open I-9 deadlines from a roster export, most urgent first
    Deadlines(DeadlinesArgs),
    /// Run one deadline sweep and print the report
    Scan(ScanArgs),
    /// Run the deadline sweep on the configured interval until interrupted
    Watch(WatchArgs),
    /// Assign a Section 2 verifier to an employee from the roster
    Assign(AssignArgs),
    /// Walk one employee through the full onboarding workflow (default command)
    Demo(DemoArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let command = cli
        .command
        .unwrap_or_else(|| Command::Demo(DemoArgs::default()));

    match command {
        Command::DueDates(args) => run_due_dates(args, &config),
        Command::Deadlines(args) => run_deadlines(args, &config),
        Command::Scan(args) => run_scan(args, &config),
        Command::Watch(args) => run_watch(args, &config).await,
        Command::Assign(args) => run_assign(args, &config),
        Command::Demo(args) => run_demo(args, &config),
    }
}
