mod cli;
mod demo;
mod infra;
mod routes;
mod sample;
mod server;

use homecare_engine::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
