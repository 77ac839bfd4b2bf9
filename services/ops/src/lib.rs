mod cli;
mod demo;
mod infra;
mod sweep;

use hotel_onboarding::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
