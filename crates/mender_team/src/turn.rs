//! Single-role turn execution.
//!
//! A turn is one or more model calls: the role may invoke its declared
//! tools through `TOOL_CALL:` directives, each observation is fed back,
//! and the loop is bounded by `max_tool_iterations`. The final model
//! output becomes the role's transcript message.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use mender_core::task::Message;
use mender_llm::{ChatClient, ChatTurn};
use mender_tools::ToolRegistry;

use crate::error::{TeamError, TeamResult};
use crate::events::TeamEvent;
use crate::roles::RoleSpec;

/// Directive marker a role uses to invoke a tool.
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";

#[derive(Debug, Deserialize)]
struct ToolCall {
    tool: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Parse a `TOOL_CALL: {"tool": ..., "args": {...}}` directive.
///
/// Roles emit free text; a malformed directive is treated as none at all
/// rather than an error.
fn parse_tool_call(output: &str) -> Option<ToolCall> {
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(TOOL_CALL_MARKER) {
            match serde_json::from_str(rest.trim()) {
                Ok(call) => return Some(call),
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed tool call directive");
                    return None;
                }
            }
        }
    }
    None
}

/// Build the provider input for a role: its instructions as the system
/// turn, then the transcript with the role's own messages as assistant
/// turns and everything else attributed inline.
fn build_turns(role: &RoleSpec, registry: &ToolRegistry, transcript: &[Message]) -> Vec<ChatTurn> {
    let mut system = role.instructions.clone();

    let available: Vec<&String> = role
        .tools
        .iter()
        .filter(|name| registry.contains(name))
        .collect();
    if !available.is_empty() {
        system.push_str("\n\nAvailable tools: ");
        system.push_str(
            &available
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );
        system.push_str(
            "\nInvoke a tool with a line: TOOL_CALL: {\"tool\": \"<name>\", \"args\": {...}}",
        );
    }

    let mut turns = vec![ChatTurn::system(system)];
    for message in transcript {
        if message.source == role.name() {
            turns.push(ChatTurn::assistant(message.content.clone()));
        } else {
            turns.push(ChatTurn::user(format!(
                "[{}] {}",
                message.source, message.content
            )));
        }
    }
    turns
}

/// Token usage of one completed turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Run one role turn to completion.
///
/// Tool failures propagate: retries belong to the tool and model layers,
/// and the driver converts any error into a failed run result.
pub async fn take_turn(
    role: &RoleSpec,
    client: &Arc<dyn ChatClient>,
    registry: &ToolRegistry,
    transcript: &[Message],
    max_tool_iterations: u32,
    events: Option<&tokio::sync::mpsc::UnboundedSender<TeamEvent>>,
) -> TeamResult<(String, TurnUsage)> {
    let mut turns = build_turns(role, registry, transcript);
    let mut usage = TurnUsage::default();

    for _ in 0..=max_tool_iterations {
        let response = client.complete(&turns).await?;
        usage.input_tokens += response.input_tokens;
        usage.output_tokens += response.output_tokens;
        let output = response.content;

        let Some(call) = parse_tool_call(&output) else {
            return Ok((output, usage));
        };

        if !role.tools.iter().any(|t| t == &call.tool) {
            return Err(TeamError::UndeclaredTool {
                role: role.name().to_string(),
                tool: call.tool,
            });
        }

        debug!(role = role.name(), tool = %call.tool, "Tool invocation");
        if let Some(tx) = events {
            let _ = tx.send(TeamEvent::ToolInvoked {
                role: role.kind,
                tool: call.tool.clone(),
            });
        }

        let observation = registry.run(&call.tool, call.args).await?;

        turns.push(ChatTurn::assistant(output));
        turns.push(ChatTurn::user(format!(
            "Observation from {}: {}",
            call.tool, observation
        )));
    }

    // Tool budget exhausted: ask for a final answer without tools.
    turns.push(ChatTurn::user(
        "Tool budget exhausted. Summarize your findings and hand off.".to_string(),
    ));
    let response = client.complete(&turns).await?;
    usage.input_tokens += response.input_tokens;
    usage.output_tokens += response.output_tokens;
    Ok((response.content, usage))
}
