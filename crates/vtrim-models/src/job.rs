//! Job identity and lifecycle shared by frame extraction and trimming.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a single request-scoped job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in log lines and artifact names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of media job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Timeline thumbnail extraction
    Frames,
    /// Trim and re-encode
    Trim,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Frames => "frames",
            JobKind::Trim => "trim",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one job.
///
/// `Created -> Validating -> Rejected`, or
/// `Validating -> Running -> Completed | ToolFailed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Created,
    Validating,
    /// Input failed validation; nothing was spawned
    Rejected,
    Running,
    Completed,
    ToolFailed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Validating => "validating",
            JobState::Rejected => "rejected",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::ToolFailed => "tool_failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Rejected | JobState::Completed | JobState::ToolFailed | JobState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Created, JobState::Validating)
                | (JobState::Validating, JobState::Rejected)
                | (JobState::Validating, JobState::Running)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::ToolFailed)
                | (JobState::Running, JobState::Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Rejected.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::ToolFailed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Created.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(JobState::Created.can_transition_to(JobState::Validating));
        assert!(JobState::Validating.can_transition_to(JobState::Rejected));
        assert!(JobState::Running.can_transition_to(JobState::Cancelled));
        // No retries: terminal states never move again
        assert!(!JobState::ToolFailed.can_transition_to(JobState::Running));
        assert!(!JobState::Created.can_transition_to(JobState::Running));
    }

    #[test]
    fn test_job_id_short() {
        let id = JobId::from_string("0123456789abcdef");
        assert_eq!(id.short(), "01234567");
        assert_eq!(JobId::new().as_str().len(), 32);
    }
}
