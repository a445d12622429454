use crate::demo::{run_demo, run_rate_check, DemoArgs, RateCheckArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use homecare_engine::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Home Care Engine",
    about = "Run the caregiver matching, visit verification, and billing engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect billing rate sheets
    Rates {
        #[command(subcommand)]
        command: RatesCommand,
    },
    /// Walk a sample agency week through scheduling, EVV, and billing
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RatesCommand {
    /// Parse a rate sheet CSV and list the active rates it defines
    Check(RateCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Rate sheet CSV to price invoices with (defaults to the built-in sample rates)
    #[arg(long)]
    pub(crate) rate_sheet: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rates {
            command: RatesCommand::Check(args),
        } => run_rate_check(args),
        Command::Demo(args) => run_demo(args),
    }
}
