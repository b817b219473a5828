pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

pub use crate::core::config;

use crate::core::FundEngine;
use crate::core::clock::SystemClock;
use crate::core::history::HistoryRecorder;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Summary,
    Snapshot,
    History { days: usize },
    Quote { codes: Vec<String> },
    Search { fragment: String },
    Enrich { path: PathBuf },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fundval starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let engine = FundEngine::from_config(&config)?;

    match command {
        AppCommand::Summary => cli::summary::run(&config.portfolios, &engine).await,
        AppCommand::Snapshot => {
            let recorder = history_recorder(&config)?;
            cli::history::snapshot(&config.portfolios, &engine, &recorder).await
        }
        AppCommand::History { days } => {
            let recorder = history_recorder(&config)?;
            cli::history::history(&config.portfolios, &recorder, days).await
        }
        AppCommand::Quote { codes } => cli::lookup::quote(&engine, &codes).await,
        AppCommand::Search { fragment } => cli::lookup::search(&engine, &fragment).await,
        AppCommand::Enrich { path } => cli::lookup::enrich(&engine, &path).await,
    }
}

fn history_recorder(config: &config::AppConfig) -> Result<HistoryRecorder> {
    let store = store::open_snapshot_store(config)?;
    Ok(HistoryRecorder::new(store, Arc::new(SystemClock)))
}
