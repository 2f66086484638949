//! `mender status` - print system status as JSON.
//!
//! Status works without provider API keys: the team graph is assembled
//! for inspection only, no model clients are built.

use clap::Args;

use mender_core::config::Settings;
use mender_memory::{JsonlStore, RecordStore as _};
use mender_team::Team;

#[derive(Args)]
pub struct StatusArgs {}

pub async fn execute(_args: StatusArgs, settings: Settings) -> anyhow::Result<()> {
    let team = Team::assemble(&settings.team, settings.memory.enabled)?;

    let memory_records = if settings.memory.enabled {
        match JsonlStore::open(&settings.memory.data_dir) {
            Ok(store) => store.count().await.unwrap_or(0),
            Err(_) => 0,
        }
    } else {
        0
    };

    let status = serde_json::json!({
        "system": "ready",
        "settings": {
            "memory_enabled": settings.memory.enabled,
            "coordination_mode": settings.team.coordination_mode,
            "max_iterations": settings.team.max_rounds,
        },
        "roles": team
            .roles()
            .iter()
            .map(|role| serde_json::json!({
                "name": role.name(),
                "description": role.kind.description(),
                "tools": role.tools,
            }))
            .collect::<Vec<_>>(),
        "memory": {
            "total_memories": memory_records,
            "data_dir": settings.memory.data_dir,
        },
    });

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
