//! Task plan domain model.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a single planned task.
///
/// Statuses only move forward (see [`TaskStatus::can_advance_to`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// Waiting on a dependency.
    Blocked,
    /// Currently being executed by an agent.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Blocked => 1,
            Self::InProgress => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true when `next` is strictly further along than `self` and
    /// `self` is not terminal.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// Priority assigned by the planner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A task exactly as it arrives inside a `todo_list` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A task as tracked by the client.
///
/// Only a truncated preview of the result is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub dependencies: Vec<String>,
    pub assigned_agent: Option<String>,
    pub status: TaskStatus,
    pub result_preview: Option<String>,
    pub error: Option<String>,
}

/// Aggregate progress of one plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanProgress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl PlanProgress {
    pub fn is_done(&self) -> bool {
        self.completed + self.failed >= self.total
    }
}

impl fmt::Display for PlanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} completed", self.completed, self.total)
    }
}

/// Lifecycle phase of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanPhase {
    /// Planning indicator shown, no task list yet. Holds the latest status
    /// line reported by the backend.
    Planning { status: Option<String> },
    /// Task list received.
    Ready,
}

/// Truncates `text` to `max_chars` characters, appending `...` when cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(max_chars).collect();
    preview.push_str("...");
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_advances() {
        assert!(TaskStatus::Pending.can_advance_to(TaskStatus::InProgress));
        assert!(TaskStatus::Pending.can_advance_to(TaskStatus::Completed));
        assert!(TaskStatus::Blocked.can_advance_to(TaskStatus::InProgress));
        assert!(!TaskStatus::InProgress.can_advance_to(TaskStatus::Pending));
        assert!(!TaskStatus::InProgress.can_advance_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Completed.can_advance_to(TaskStatus::Failed));
        assert!(!TaskStatus::Failed.can_advance_to(TaskStatus::Completed));
    }

    #[test]
    fn test_truncate_preview_counts_chars() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("abcdef", 3), "abc...");
        // multi-byte characters are not split
        assert_eq!(truncate_preview("任务执行完成", 2), "任务...");
    }

    #[test]
    fn test_task_spec_defaults() {
        let spec: TaskSpec = serde_json::from_str(r#"{"id":"t1","title":"Read"}"#).unwrap();
        assert_eq!(spec.status, TaskStatus::Pending);
        assert_eq!(spec.priority, TaskPriority::Medium);
        assert_eq!(spec.dependencies, None);
    }

    #[test]
    fn test_progress_display() {
        let progress = PlanProgress {
            completed: 1,
            failed: 0,
            total: 2,
        };
        assert_eq!(progress.to_string(), "1/2 completed");
        assert!(!progress.is_done());
    }
}
