//! Fetch lifecycle of a single request
//!
//! ```text
//! Pending -> Fetching -> Succeeded
//!               |
//!               +------> Pending (retry, attempt + 1)
//!               +------> Failed  (retry budget spent)
//! ```

use std::fmt;

/// Represents where a fetch request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    // ===== Active States =====
    /// Queued in the frontier, waiting for a fetch slot
    Pending,

    /// Currently being rendered
    Fetching,

    // ===== Terminal States =====
    /// Page was fetched and expanded
    Succeeded,

    /// Every attempt failed; the request was dropped
    Failed,
}

impl FetchState {
    /// Returns true if no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetching" => Some(Self::Fetching),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible states
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::Fetching, Self::Succeeded, Self::Failed]
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
