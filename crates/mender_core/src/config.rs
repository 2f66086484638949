//! Application configuration.
//!
//! All tunables live in a single [`Settings`] tree constructed once at
//! process start (defaults, then optional TOML file, then environment
//! overrides) and passed by reference into every component. There is no
//! process-wide settings singleton.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Chat model binding for one role family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider name: "openai" or "anthropic"
    pub provider: String,
    /// Model name
    pub model: String,
    /// API key; falls back to the provider env var when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens per completion
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ModelConfig {
    /// OpenAI-backed config with the given model name.
    pub fn openai(model: impl Into<String>) -> Self {
        Self {
            provider: "openai".to_string(),
            model: model.into(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 4096,
            timeout_secs: 300,
        }
    }

    /// Anthropic-backed config with the given model name.
    pub fn anthropic(model: impl Into<String>) -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: model.into(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 8192,
            timeout_secs: 300,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// How the team decides which role acts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationMode {
    /// The acting role's output designates the next role explicitly.
    Handoff,
    /// Roles act in a fixed cyclic order, hand-off text is ignored.
    RoundRobin,
}

impl Default for CoordinationMode {
    fn default() -> Self {
        Self::Handoff
    }
}

/// Team assembly and turn-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Maximum conversation rounds before an inconclusive stop
    pub max_rounds: u32,
    /// Include the critic role in the team
    pub enable_critic: bool,
    /// Include the reviewer role in the team
    pub enable_reviewer: bool,
    /// Coordination mode
    pub coordination_mode: CoordinationMode,
    /// Maximum tool invocations within a single role turn
    pub max_tool_iterations: u32,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            max_rounds: 20,
            enable_critic: true,
            enable_reviewer: true,
            coordination_mode: CoordinationMode::Handoff,
            max_tool_iterations: 4,
        }
    }
}

/// Solution memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Whether the memory bridge is consulted at all
    pub enabled: bool,
    /// Directory holding the persisted record log
    pub data_dir: PathBuf,
    /// Embedding model name
    pub embedding_model: String,
    /// Results below this cosine similarity are excluded
    pub similarity_threshold: f32,
    /// Cap on results returned by a search
    pub max_results: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: PathBuf::from("./mender_memory"),
            embedding_model: "text-embedding-3-small".to_string(),
            similarity_threshold: 0.7,
            max_results: 5,
        }
    }
}

/// Docker sandbox limits for test execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Container image
    pub image: String,
    /// Image tag
    pub tag: String,
    /// Memory limit in bytes
    pub memory_limit_bytes: i64,
    /// CPU limit in cores
    pub cpu_limit: f64,
    /// PIDs limit
    pub pids_limit: i64,
    /// Execution timeout in seconds
    pub timeout_secs: u64,
    /// Working directory inside the container
    pub work_dir: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "mender-sandbox".to_string(),
            tag: "latest".to_string(),
            memory_limit_bytes: 512 * 1024 * 1024,
            cpu_limit: 0.5,
            pids_limit: 100,
            timeout_secs: 120,
            work_dir: "/workspace".to_string(),
        }
    }
}

/// HTTP server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub planner_model: ModelConfig,
    pub locator_model: ModelConfig,
    pub coder_model: ModelConfig,
    pub executor_model: ModelConfig,
    pub critic_model: ModelConfig,
    pub reviewer_model: ModelConfig,
    pub team: TeamConfig,
    pub memory: MemoryConfig,
    pub sandbox: SandboxConfig,
    pub server: ServerConfig,
    /// Largest file the read tool will open, in megabytes
    pub max_file_size_mb: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            planner_model: ModelConfig::openai("gpt-4o").temperature(0.1),
            locator_model: ModelConfig::openai("gpt-4o"),
            coder_model: ModelConfig::anthropic("claude-sonnet-4.5"),
            executor_model: ModelConfig::openai("gpt-4o"),
            critic_model: ModelConfig::openai("gpt-4o").temperature(0.1),
            reviewer_model: ModelConfig::anthropic("claude-sonnet-4.5"),
            team: TeamConfig::default(),
            memory: MemoryConfig::default(),
            sandbox: SandboxConfig::default(),
            server: ServerConfig::default(),
            max_file_size_mb: 10,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults for
    /// missing sections.
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Build settings from defaults plus environment overrides.
    ///
    /// Checked variables: `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`,
    /// `MENDER_PLANNER_MODEL`, `MENDER_CODER_MODEL`, `MENDER_MAX_ROUNDS`,
    /// `MENDER_COORDINATION_MODE`, `MENDER_MEMORY_DIR`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env();
        settings
    }

    /// Apply environment overrides to an existing settings tree.
    pub fn apply_env(&mut self) {
        let openai_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let anthropic_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        for model in [
            &mut self.planner_model,
            &mut self.locator_model,
            &mut self.coder_model,
            &mut self.executor_model,
            &mut self.critic_model,
            &mut self.reviewer_model,
        ] {
            if model.api_key.is_none() {
                model.api_key = match model.provider.as_str() {
                    "anthropic" => anthropic_key.clone(),
                    _ => openai_key.clone(),
                };
            }
        }

        if let Ok(model) = std::env::var("MENDER_PLANNER_MODEL") {
            self.planner_model.model = model;
        }
        if let Ok(model) = std::env::var("MENDER_CODER_MODEL") {
            self.coder_model.model = model;
        }
        if let Ok(rounds) = std::env::var("MENDER_MAX_ROUNDS") {
            if let Ok(rounds) = rounds.parse() {
                self.team.max_rounds = rounds;
            }
        }
        if let Ok(mode) = std::env::var("MENDER_COORDINATION_MODE") {
            match mode.as_str() {
                "round_robin" => self.team.coordination_mode = CoordinationMode::RoundRobin,
                "handoff" => self.team.coordination_mode = CoordinationMode::Handoff,
                other => tracing::warn!("Ignoring unknown coordination mode: {}", other),
            }
        }
        if let Ok(dir) = std::env::var("MENDER_MEMORY_DIR") {
            self.memory.data_dir = PathBuf::from(dir);
        }
    }

    /// Look up the model binding for a role family by name.
    ///
    /// Unknown names fall back to the planner binding; role names are
    /// validated at team assembly, not here.
    pub fn model_for(&self, role: &str) -> &ModelConfig {
        match role {
            "locator" => &self.locator_model,
            "coder" => &self.coder_model,
            "executor" => &self.executor_model,
            "critic" => &self.critic_model,
            "reviewer" => &self.reviewer_model,
            _ => &self.planner_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.team.max_rounds, 20);
        assert!(settings.team.enable_critic);
        assert_eq!(settings.team.coordination_mode, CoordinationMode::Handoff);
        assert_eq!(settings.memory.similarity_threshold, 0.7);
        assert_eq!(settings.planner_model.provider, "openai");
        assert_eq!(settings.coder_model.provider, "anthropic");
    }

    #[test]
    fn test_model_lookup() {
        let settings = Settings::default();
        assert_eq!(settings.model_for("coder").provider, "anthropic");
        assert_eq!(settings.model_for("planner").provider, "openai");
        // Unknown names fall back to the planner binding.
        assert_eq!(
            settings.model_for("nonexistent").model,
            settings.planner_model.model
        );
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mender.toml");
        std::fs::write(
            &path,
            "[team]\nmax_rounds = 7\nenable_critic = false\nenable_reviewer = true\ncoordination_mode = \"round_robin\"\nmax_tool_iterations = 2\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.team.max_rounds, 7);
        assert!(!settings.team.enable_critic);
        assert_eq!(
            settings.team.coordination_mode,
            CoordinationMode::RoundRobin
        );
        // Untouched sections keep their defaults.
        assert_eq!(settings.server.port, 8000);
    }
}
