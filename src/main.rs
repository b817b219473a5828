use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fundval::core::history::DEFAULT_HISTORY_DAYS;
use fundval::core::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fundval::AppCommand {
    fn from(cmd: Commands) -> fundval::AppCommand {
        match cmd {
            Commands::Summary => fundval::AppCommand::Summary,
            Commands::Snapshot => fundval::AppCommand::Snapshot,
            Commands::History { days } => fundval::AppCommand::History { days },
            Commands::Quote { codes } => fundval::AppCommand::Quote { codes },
            Commands::Search { fragment } => fundval::AppCommand::Search { fragment },
            Commands::Enrich { file } => fundval::AppCommand::Enrich { path: file },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display real-time valuation of every portfolio
    Summary,
    /// Record today's snapshot for every portfolio
    Snapshot,
    /// Display recorded daily history
    History {
        /// Number of most recent days to show (1-365)
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: usize,
    },
    /// Display current quotes for fund codes
    Quote {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Find the fund best matching a name fragment
    Search { fragment: String },
    /// Complete extracted holding records from a YAML or JSON file
    Enrich { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fundval::cli::setup::setup(),
        Some(cmd) => fundval::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
