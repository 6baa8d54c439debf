//! Remote task handles and their observed states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a remote asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote task state. Only `Success` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum TaskState {
    #[serde(rename = "PENDING", alias = "queued")]
    Queued,
    #[serde(rename = "RUNNING", alias = "running")]
    Running,
    #[serde(rename = "SUCCEEDED", alias = "success")]
    Success,
    #[serde(rename = "FAILED", alias = "error")]
    Error,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskError {
    pub message: String,
    #[serde(default)]
    pub fault_messages: Vec<String>,
}

/// One poll of a task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaskInfo {
    #[serde(rename = "status")]
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    /// Operation-specific result, such as the reference of a created clone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl TaskInfo {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            error: None,
            result: None,
        }
    }

    pub fn failed(message: impl Into<String>, faults: Vec<String>) -> Self {
        Self {
            state: TaskState::Error,
            error: Some(TaskError {
                message: message.into(),
                fault_messages: faults,
            }),
            result: None,
        }
    }
}

/// Final status observed by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    Error { message: String, faults: Vec<String> },
    /// The budget ran out; the remote operation may still complete.
    TimedOut { last_state: TaskState },
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Success => f.write_str("Task completed successfully"),
            TaskStatus::Error { message, faults } if faults.is_empty() => {
                write!(f, "Task failed: {}", message)
            }
            TaskStatus::Error { message, faults } => {
                write!(f, "Task failed: {} ({})", message, faults.join("; "))
            }
            TaskStatus::TimedOut { last_state } => {
                write!(f, "Task still {} after the wait budget, outcome unknown", last_state)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: TaskHandle,
    pub status: TaskStatus,
    pub elapsed: Duration,
    /// Extra information produced on success, e.g. the `bus:unit` of a new disk.
    pub payload: Option<String>,
}

impl TaskReport {
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        if self.status.is_success() {
            self.payload = Some(payload.into());
        }
        self
    }
}
