//! Team assembly and the hand-off router.

use tracing::{debug, warn};

use mender_core::config::{CoordinationMode, TeamConfig};
use mender_core::extract::markers;

use crate::error::{TeamError, TeamResult};
use crate::roles::{HandoffTarget, RoleKind, RoleSpec};

/// Which role acts next, as decided by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRole {
    Role(RoleKind),
    /// Hand-off targeted the human sentinel
    Escalate,
}

/// An assembled, validated team of roles.
#[derive(Debug, Clone)]
pub struct Team {
    roles: Vec<RoleSpec>,
    mode: CoordinationMode,
}

impl Team {
    /// Assemble the team in the fixed order: planner, locator, coder,
    /// executor, then critic and reviewer when enabled.
    ///
    /// Fails fast when any role declares a hand-off to an absent role;
    /// this is a configuration error and the run never starts.
    pub fn assemble(config: &TeamConfig, memory_enabled: bool) -> TeamResult<Self> {
        let mut roles = vec![
            RoleSpec::planner(),
            RoleSpec::locator(memory_enabled),
            RoleSpec::coder(),
            RoleSpec::executor(config.enable_critic, config.enable_reviewer),
        ];
        if config.enable_critic {
            roles.push(RoleSpec::critic());
        }
        if config.enable_reviewer {
            roles.push(RoleSpec::reviewer());
        }

        Self::validate(&roles)?;

        debug!(
            roles = roles.len(),
            mode = ?config.coordination_mode,
            "Assembled debug team"
        );

        Ok(Self {
            roles,
            mode: config.coordination_mode,
        })
    }

    /// Check that every declared role hand-off names a present role.
    fn validate(roles: &[RoleSpec]) -> TeamResult<()> {
        for role in roles {
            for target in &role.handoffs {
                if let HandoffTarget::Role(kind) = target {
                    if !roles.iter().any(|r| r.kind == *kind) {
                        return Err(TeamError::UndeclaredHandoff {
                            role: role.name().to_string(),
                            target: kind.as_str().to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn mode(&self) -> CoordinationMode {
        self.mode
    }

    /// All roles in assembly order.
    pub fn roles(&self) -> &[RoleSpec] {
        &self.roles
    }

    /// Look up a role by kind.
    pub fn role(&self, kind: RoleKind) -> TeamResult<&RoleSpec> {
        self.roles
            .iter()
            .find(|r| r.kind == kind)
            .ok_or_else(|| TeamError::UnknownRole(kind.as_str().to_string()))
    }

    /// The role that opens every run.
    pub fn first(&self) -> &RoleSpec {
        &self.roles[0]
    }

    /// Parse the hand-off designation from a role's output, if any.
    pub fn parse_handoff(output: &str) -> Option<HandoffTarget> {
        for line in output.lines() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix(markers::HANDOFF) {
                return HandoffTarget::parse(rest).ok();
            }
        }
        None
    }

    /// Decide which role acts after `current` produced `output`.
    ///
    /// Hand-off mode follows the role's designation, falling back to its
    /// first declared target for missing or undeclared designations.
    /// Round-robin ignores the output entirely and cycles the assembly
    /// order.
    pub fn next_role(&self, current: RoleKind, output: &str) -> NextRole {
        match self.mode {
            CoordinationMode::RoundRobin => {
                let index = self
                    .roles
                    .iter()
                    .position(|r| r.kind == current)
                    .unwrap_or(0);
                NextRole::Role(self.roles[(index + 1) % self.roles.len()].kind)
            }
            CoordinationMode::Handoff => {
                let role = match self.role(current) {
                    Ok(role) => role,
                    Err(_) => return NextRole::Role(self.first().kind),
                };

                match Self::parse_handoff(output) {
                    Some(HandoffTarget::Human) => NextRole::Escalate,
                    Some(target @ HandoffTarget::Role(kind)) => {
                        if role.declares(target) {
                            NextRole::Role(kind)
                        } else {
                            // Undeclared at run time: assembly already proved
                            // the declared graph is closed, so fall back
                            // instead of aborting on one malformed line.
                            let fallback = role.default_next().unwrap_or(self.first().kind);
                            warn!(
                                role = role.name(),
                                requested = kind.as_str(),
                                fallback = fallback.as_str(),
                                "Hand-off to undeclared role, using fallback"
                            );
                            NextRole::Role(fallback)
                        }
                    }
                    None => NextRole::Role(role.default_next().unwrap_or(self.first().kind)),
                }
            }
        }
    }
}
