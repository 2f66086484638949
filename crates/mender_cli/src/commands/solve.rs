//! `mender solve` - run the debug team against a bug report.

use std::path::PathBuf;

use anyhow::{bail, Context as _};
use clap::Args;
use tokio_util::sync::CancellationToken;

use mender_core::config::Settings;
use mender_core::task::StopReason;
use mender_team::SolveRequest;

#[derive(Args)]
pub struct SolveArgs {
    /// Bug report text, or a file path with --file
    #[arg(long, short = 'b')]
    pub bug_report: String,

    /// Treat --bug-report as a file path
    #[arg(long, short = 'f')]
    pub file: bool,

    /// Disable streaming extraction (batch mode)
    #[arg(long)]
    pub no_stream: bool,

    /// Write the result JSON to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Additional context as a JSON object
    #[arg(long, short = 'c')]
    pub context: Option<String>,
}

pub async fn execute(args: SolveArgs, settings: Settings) -> anyhow::Result<()> {
    let bug_report = if args.file {
        std::fs::read_to_string(&args.bug_report)
            .with_context(|| format!("bug report file not found: {}", args.bug_report))?
    } else {
        args.bug_report.clone()
    };

    let context = match &args.context {
        Some(raw) => Some(
            serde_json::from_str::<serde_json::Value>(raw).context("invalid JSON in --context")?,
        ),
        None => None,
    };

    let team = super::build_team(&settings).await?;

    // Ctrl-C cancels the in-flight run instead of killing the process.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let mut request = SolveRequest::new(bug_report).with_cancellation(cancel);
    if let Some(context) = context {
        request = request.with_context(context);
    }
    if args.no_stream {
        request = request.batch();
    }

    let result = team.solve(request).await;
    let json = serde_json::to_string_pretty(&result)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write results to {}", path.display()))?;
            println!("Results written to: {}", path.display());
        }
        None => {
            println!("\n=== RESULTS ===");
            println!("{}", json);
        }
    }

    if result.stop_reason == Some(StopReason::Cancelled) {
        bail!("interrupted by user");
    }

    Ok(())
}
