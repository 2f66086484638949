//! Debug role team orchestration for BugMender.
//!
//! This crate is the coordination core: it assembles the fixed role
//! pipeline (planner, locator, coder, executor, optional critic and
//! reviewer), sequences turns under a hand-off or round-robin router,
//! evaluates termination conditions, extracts structured task state from
//! each turn, and bridges to the solution memory.

pub mod driver;
pub mod error;
pub mod events;
pub mod metrics;
pub mod roles;
pub mod solver;
pub mod team;
pub mod termination;
pub mod turn;

pub use driver::TeamRunner;
pub use error::{TeamError, TeamResult};
pub use events::TeamEvent;
pub use metrics::{MetricsCollector, SystemMetrics};
pub use roles::{HandoffTarget, RoleKind, RoleSpec};
pub use solver::{DebugTeam, DebugTeamBuilder, SolveRequest, TeamStatus};
pub use team::{NextRole, Team};
pub use termination::TerminationEvaluator;
