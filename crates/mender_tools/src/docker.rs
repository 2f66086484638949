//! Docker implementation of the sandbox runner.
//!
//! Containers run with no network, a PIDs limit and no-new-privileges so a
//! misbehaving patch cannot reach out of the test environment.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::service::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use mender_core::config::SandboxConfig;

use crate::error::{ToolError, ToolResult};
use crate::sandbox::{SandboxOutput, SandboxRequest, SandboxRunner};

/// Docker-backed sandbox.
pub struct DockerSandbox {
    client: Docker,
    config: SandboxConfig,
}

impl DockerSandbox {
    /// Connect to the local Docker daemon and verify it responds.
    pub async fn new(config: SandboxConfig) -> ToolResult<Self> {
        let client = Docker::connect_with_local_defaults()?;
        client
            .ping()
            .await
            .map_err(|e| ToolError::SandboxUnavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn container_name() -> String {
        format!("mender-{}", &Uuid::new_v4().to_string()[..8])
    }
}

#[async_trait]
impl SandboxRunner for DockerSandbox {
    async fn is_available(&self) -> ToolResult<bool> {
        Ok(self.client.ping().await.is_ok())
    }

    async fn run(&self, request: &SandboxRequest) -> ToolResult<SandboxOutput> {
        let full_image = format!("{}:{}", self.config.image, self.config.tag);
        let container_name = Self::container_name();
        let started_at = Utc::now();

        debug!(container = %container_name, image = %full_image, command = %request.command, "Running sandboxed command");

        let mounts = vec![Mount {
            target: Some(self.config.work_dir.clone()),
            source: Some(request.host_dir.to_string_lossy().to_string()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(false),
            ..Default::default()
        }];

        let env: Vec<String> = request
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let host_config = HostConfig {
            mounts: Some(mounts),
            memory: Some(self.config.memory_limit_bytes),
            nano_cpus: Some((self.config.cpu_limit * 1_000_000_000.0) as i64),
            pids_limit: Some(self.config.pids_limit),
            network_mode: Some("none".to_string()),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(full_image),
            cmd: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                request.command.clone(),
            ]),
            working_dir: Some(self.config.work_dir.clone()),
            env: Some(env),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: &container_name,
            platform: None,
        };

        let container = self
            .client
            .create_container(Some(create_options), container_config)
            .await?;
        let container_id = container.id;

        self.client
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await?;

        let wait_future = async {
            let mut wait_stream = self
                .client
                .wait_container(&container_id, None::<WaitContainerOptions<String>>);
            if let Some(result) = wait_stream.next().await {
                return match result {
                    Ok(exit) => Ok(exit.status_code),
                    Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
                };
            }
            Err(ToolError::ExecutionFailed("container wait failed".into()))
        };

        let timeout_secs = if request.timeout_secs > 0 {
            request.timeout_secs
        } else {
            self.config.timeout_secs
        };

        let exit_code = match timeout(Duration::from_secs(timeout_secs), wait_future).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = self.client.stop_container(&container_id, None).await;
                let _ = self
                    .client
                    .remove_container(
                        &container_id,
                        Some(RemoveContainerOptions {
                            force: true,
                            ..Default::default()
                        }),
                    )
                    .await;
                return Err(ToolError::Timeout(timeout_secs));
            }
        };

        let log_options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut log_stream = self.client.logs(&container_id, Some(log_options));
        while let Some(result) = log_stream.next().await {
            match result {
                Ok(LogOutput::StdOut { message }) => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                _ => {}
            }
        }

        let _ = self
            .client
            .remove_container(
                &container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;

        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds() as u64;

        Ok(SandboxOutput {
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at,
            duration_ms,
        })
    }
}
