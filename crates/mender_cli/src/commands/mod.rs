//! CLI command definitions and shared wiring.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::warn;

use mender_core::config::Settings;
use mender_llm::OpenAiEmbedder;
use mender_memory::{JsonlStore, MemoryBridge};
use mender_team::DebugTeam;
use mender_tools::docker::DockerSandbox;

pub mod server;
pub mod solve;
pub mod status;

/// BugMender: autonomous AI-powered debugging system.
#[derive(Parser)]
#[command(name = "mender", version, about)]
pub struct Cli {
    /// Path to a TOML settings file
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Solve a bug report with the debug team
    Solve(solve::SolveArgs),
    /// Show system status
    Status(status::StatusArgs),
    /// Run the HTTP API server
    Server(server::ServerArgs),
}

/// Load settings: defaults, then optional TOML file, then env overrides.
pub fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    settings.apply_env();
    Ok(settings)
}

/// Wire up a debug team from settings.
///
/// The sandbox and memory subsystems degrade gracefully: without Docker
/// the executor simply has no test tool, without an embedding key the
/// memory bridge stays off. Model bindings are validated here and fail
/// fast.
pub async fn build_team(settings: &Settings) -> anyhow::Result<Arc<DebugTeam>> {
    let mut builder = DebugTeam::builder(settings.clone());

    match DockerSandbox::new(settings.sandbox.clone()).await {
        Ok(sandbox) => builder = builder.sandbox(Arc::new(sandbox)),
        Err(e) => warn!("Sandbox unavailable, test execution disabled: {}", e),
    }

    if settings.memory.enabled {
        match OpenAiEmbedder::from_env(&settings.memory.embedding_model) {
            Some(embedder) => match JsonlStore::open(&settings.memory.data_dir) {
                Ok(store) => {
                    builder = builder.memory(Arc::new(MemoryBridge::new(
                        Arc::new(embedder),
                        Arc::new(store),
                        settings.memory.clone(),
                    )));
                }
                Err(e) => warn!("Memory store unavailable: {}", e),
            },
            None => warn!("Memory disabled: no OPENAI_API_KEY for embeddings"),
        }
    }

    let team = builder.build().context("failed to assemble debug team")?;
    Ok(Arc::new(team))
}
