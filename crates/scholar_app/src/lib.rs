//! Terminal front-end for the scholar reader: a one-shot CLI plus an
//! interactive shell, both driving the core state machine through the engine.
mod cli;
mod commands;
mod config;
mod persistence;
mod render;
mod runner;

pub use cli::{Cli, Command};
pub use config::{load_config, FileConfig, SettingsOverrides};
pub use persistence::{load_last_workspace, save_last_workspace, STATE_FILENAME};
pub use render::{document_text, sessions_text, transcript_text, workspaces_text, JobEcho};
pub use runner::{event_to_msg, Session};

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, LogDestination};
use scholar_engine::EngineHandle;

const LOG_FILENAME: &str = "scholar.log";

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let destination = if cli.verbose {
        LogDestination::Both
    } else {
        LogDestination::File
    };
    let file_config = load_config(&cli.config)?;
    engine_logging::initialize(
        destination,
        file_config.log_level(),
        Path::new(".").join(LOG_FILENAME).as_path(),
    );

    let settings = file_config.client_settings(&cli.overrides());
    engine_info!(
        "Starting scholar against {} (user: {})",
        settings.base_url,
        settings.username.as_deref().unwrap_or("-")
    );
    let engine = EngineHandle::new(settings).context("failed to start the engine")?;
    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    commands::execute(cli.command, Session::new(engine), state_dir)
}
