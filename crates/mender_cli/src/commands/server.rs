//! `mender server` - run the HTTP API server.

use anyhow::bail;
use clap::Args;

use mender_api::AppState;
use mender_core::config::Settings;

#[derive(Args)]
pub struct ServerArgs {
    /// Override the bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    pub port: Option<u16>,
}

pub async fn execute(args: ServerArgs, mut settings: Settings) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let team = super::build_team(&settings).await?;
    let state = AppState::new(team);

    tokio::select! {
        result = mender_api::run_server(&settings.server, state) => {
            result?;
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            bail!("interrupted by user");
        }
    }
}
