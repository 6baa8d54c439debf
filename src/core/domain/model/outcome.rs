//! Per-object results of a batch.
//!
//! Nothing in here is an error: a batch keeps going after a skipped object or
//! a failed task, and the caller decides how to render each outcome.

use crate::{
    VcliResult,
    core::domain::model::{inventory_object::ManagedObjectRef, task::TaskReport},
};
use std::fmt;
use tracing::warn;

/// Why nothing was submitted for an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Zero or several candidates where exactly one was needed.
    Resolution(String),
    /// The object's current state forbids the change.
    Precondition(String),
    /// The object already is in the requested state.
    NoChange(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Resolution(message)
            | SkipReason::Precondition(message)
            | SkipReason::NoChange(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted(TaskReport),
    /// Applied synchronously, without a remote task (tag associations).
    Applied(String),
    /// A synchronous change the remote side refused.
    Failed(String),
    Skipped(SkipReason),
}

impl Outcome {
    pub fn resolution(message: impl Into<String>) -> Self {
        Outcome::Skipped(SkipReason::Resolution(message.into()))
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Outcome::Skipped(SkipReason::Precondition(message.into()))
    }

    pub fn no_change(message: impl Into<String>) -> Self {
        Outcome::Skipped(SkipReason::NoChange(message.into()))
    }

    /// Turns an error that concerns only one object into `Failed`.
    ///
    /// Fatal errors are passed through and end the batch.
    pub fn settle(result: VcliResult<Outcome>) -> VcliResult<Outcome> {
        match result {
            Err(error) if !error.is_fatal() => {
                warn!(%error, "Operation rejected");
                Ok(Outcome::Failed(error.to_string()))
            }
            other => other,
        }
    }

    /// Something reached the remote side.
    pub fn is_submitted(&self) -> bool {
        matches!(self, Outcome::Submitted(_) | Outcome::Applied(_) | Outcome::Failed(_))
    }

    /// The change took effect on the remote side.
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Submitted(report) => report.status.is_success(),
            Outcome::Applied(_) => true,
            Outcome::Failed(_) | Outcome::Skipped(_) => false,
        }
    }

    pub fn report(&self) -> Option<&TaskReport> {
        match self {
            Outcome::Submitted(report) => Some(report),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Outcome of one action against one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectOutcome {
    pub object: String,
    pub reference: Option<ManagedObjectRef>,
    pub action: String,
    pub outcome: Outcome,
}

impl ObjectOutcome {
    pub fn new(
        object: impl Into<String>,
        reference: Option<ManagedObjectRef>,
        action: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            object: object.into(),
            reference,
            action: action.into(),
            outcome,
        }
    }
}
