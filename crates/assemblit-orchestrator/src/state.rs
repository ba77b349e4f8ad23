// crates/assemblit-orchestrator/src/state.rs
// ============================================================================
// Module: Run States
// Description: Display statuses for orchestration server run states.
// Purpose: Map server state types onto a fixed set of statuses.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The server reports a state type per run. Several types collapse onto one
//! status (`AWAITINGRETRY` is shown as retrying, `COMPLETED` as succeeded).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Run State
// ============================================================================

/// Display status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Waiting for its scheduled time.
    Scheduled,
    /// Past its scheduled time without starting.
    Late,
    /// Accepted, not yet running.
    Pending,
    /// Executing.
    Running,
    /// Failed once and waiting to retry.
    Retrying,
    /// Suspended.
    Paused,
    /// Cancelled or cancelling.
    Cancelled,
    /// Completed successfully.
    Succeeded,
    /// Completed with an error.
    Failed,
    /// Infrastructure failure.
    Crashed,
}

impl RunState {
    /// Maps a server state type (case-insensitive) to a status.
    #[must_use]
    pub fn from_state_type(state_type: &str) -> Option<Self> {
        let normalized: String =
            state_type.chars().filter(|ch| ch.is_ascii_alphanumeric()).collect();
        match normalized.to_ascii_uppercase().as_str() {
            "SCHEDULED" => Some(Self::Scheduled),
            "LATE" => Some(Self::Late),
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "RETRYING" | "AWAITINGRETRY" => Some(Self::Retrying),
            "PAUSED" => Some(Self::Paused),
            "CANCELLED" | "CANCELLING" => Some(Self::Cancelled),
            "COMPLETED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CRASHED" => Some(Self::Crashed),
            _ => None,
        }
    }

    /// Returns the display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Late => "Late",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Retrying => "Retrying",
            Self::Paused => "Paused",
            Self::Cancelled => "Cancelled",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Crashed => "Crashed",
        }
    }

    /// Returns true once the run can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Failed | Self::Crashed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
