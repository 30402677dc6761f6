// src/agent/mod.rs — Hosted agent service layer

pub mod openai;
pub mod retry;
pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::Turn;
use crate::infra::errors::ParleyError;

pub use session::{AgentSession, TurnEvent, TurnOutcome};

/// Operations consumed from the hosted agent. The agent does the thinking;
/// parley only posts messages, starts runs and reads results back.
#[async_trait]
pub trait AgentService: Send + Sync {
    fn id(&self) -> &str;

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantInfo, ParleyError>;

    /// Create a new conversation thread and return its id.
    async fn create_thread(&self) -> Result<String, ParleyError>;

    /// Append a user message to a thread.
    async fn add_message(&self, thread_id: &str, content: &str) -> Result<(), ParleyError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ParleyError>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ParleyError>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ParleyError>;

    /// Full thread history, oldest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Turn>, ParleyError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantInfo {
    pub id: String,
    pub name: Option<String>,
}

impl AssistantInfo {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// One unit of agent work for a submitted turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    pub last_error: Option<String>,
}

impl Run {
    pub fn new(id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            id: id.into(),
            status,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Cancelling,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
}

impl RunStatus {
    /// Still waiting on the agent.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(RunStatus::Queued),
            "in_progress" => Some(RunStatus::InProgress),
            "cancelling" => Some(RunStatus::Cancelling),
            "requires_action" => Some(RunStatus::RequiresAction),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            "expired" => Some(RunStatus::Expired),
            "incomplete" => Some(RunStatus::Incomplete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Cancelling => "cancelling",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_statuses() {
        assert!(RunStatus::Queued.is_pending());
        assert!(RunStatus::InProgress.is_pending());
        assert!(RunStatus::Cancelling.is_pending());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::RequiresAction.is_terminal());
    }

    #[test]
    fn test_parse_matches_as_str() {
        for status in [
            RunStatus::Queued,
            RunStatus::InProgress,
            RunStatus::Cancelling,
            RunStatus::RequiresAction,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Expired,
            RunStatus::Incomplete,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("bogus"), None);
    }

    #[test]
    fn test_assistant_display_name_falls_back_to_id() {
        let a = AssistantInfo {
            id: "asst_1".into(),
            name: None,
        };
        assert_eq!(a.display_name(), "asst_1");
    }
}
