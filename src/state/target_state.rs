/// Target status definitions for tracking crawl progress
///
/// This module defines all possible statuses a target can be in during a crawl.
use std::fmt;

/// Represents the current status of a crawl target
///
/// A target has exactly one status at any time. Terminal statuses are never
/// re-selected unless a caller explicitly forces re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetStatus {
    // ===== Active Statuses =====
    /// Target has never been attempted, or was reset for another attempt
    Pending,

    /// Target is claimed by a worker and currently being processed
    InFlight,

    /// Target failed transiently and is waiting for its next-eligible time
    RetryPending,

    // ===== Terminal Statuses =====
    /// Target was fetched and its derived entity persisted
    Succeeded,

    /// Target is confirmed absent upstream or exhausted its retry budget
    PermanentlyFailed,
}

impl TargetStatus {
    /// Returns true if this is a terminal status (no further automatic processing)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::PermanentlyFailed)
    }

    /// Returns true if this status may still lead to an attempt
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::RetryPending => "retry_pending",
            Self::Succeeded => "succeeded",
            Self::PermanentlyFailed => "permanently_failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "retry_pending" => Some(Self::RetryPending),
            "succeeded" => Some(Self::Succeeded),
            "permanently_failed" => Some(Self::PermanentlyFailed),
            _ => None,
        }
    }

    /// Returns all possible target statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::InFlight,
            Self::RetryPending,
            Self::Succeeded,
            Self::PermanentlyFailed,
        ]
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// The two kinds of crawlable work tracked in the status table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A numeric recipe identifier fetched from the remote recipe API
    Recipe,

    /// A recipe's source URL checked for liveness
    SourceUrl,
}

impl TargetKind {
    /// Converts the kind to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Recipe => "recipe",
            Self::SourceUrl => "source_url",
        }
    }

    /// Parses a kind from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "recipe" => Some(Self::Recipe),
            "source_url" => Some(Self::SourceUrl),
            _ => None,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
