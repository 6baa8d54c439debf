//! Supervises remote tasks until they finish or the wait budget runs out.
//!
//! ```text
//! Submitted -> Polling -> Success
//!                      -> Error
//!                      -> TimedOut   (remote operation left running)
//! ```

use crate::{
    VcliContext, VcliResult,
    core::domain::model::{
        inventory_object::ManagedObjectRef,
        operation::OperationSpec,
        task::{TaskHandle, TaskReport, TaskState, TaskStatus},
    },
};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

pub struct TaskSupervisor<'a> {
    ctx: &'a VcliContext,
}

impl<'a> TaskSupervisor<'a> {
    pub fn new(ctx: &'a VcliContext) -> Self {
        Self { ctx }
    }

    /// Submits `operation` against `reference` and waits for it.
    ///
    /// A submission is never retried.
    ///
    /// # Errors
    /// Only transport and session failures are returned as `Err`; a failed or
    /// timed-out task is a [`TaskStatus`] in the report.
    pub async fn run(
        &self,
        reference: &ManagedObjectRef,
        operation: OperationSpec,
        budget: Duration,
    ) -> VcliResult<TaskReport> {
        let action = operation.name();
        let handle = self
            .ctx
            .client()
            .submit_operation(reference, operation)
            .await?;
        info!(
            object = %reference,
            action,
            task = %handle,
            "Waiting {} seconds for task to complete",
            budget.as_secs()
        );
        self.wait(handle, budget).await
    }

    /// Polls `handle` once per poll interval until a terminal state or the budget expires.
    pub async fn wait(&self, handle: TaskHandle, budget: Duration) -> VcliResult<TaskReport> {
        let interval = self.ctx.config().poll_interval;
        let started = Instant::now();
        let deadline = started + budget;

        loop {
            sleep(interval).await;
            let info = self.ctx.client().poll_task(&handle).await?;
            debug!(task = %handle, state = %info.state, "poll");

            let status = match info.state {
                TaskState::Success => {
                    info!(task = %handle, "Task completed successfully");
                    Some(TaskStatus::Success)
                }
                TaskState::Error => {
                    let error = info.error.clone().unwrap_or_default();
                    let message = if error.message.is_empty() {
                        "unknown error".to_string()
                    } else {
                        error.message
                    };
                    warn!(task = %handle, faults = ?error.fault_messages, "Task failed -- {}", message);
                    Some(TaskStatus::Error {
                        message,
                        faults: error.fault_messages,
                    })
                }
                state if Instant::now() >= deadline => {
                    warn!(task = %handle, %state, "Task still {} after {} seconds", state, budget.as_secs());
                    Some(TaskStatus::TimedOut { last_state: state })
                }
                _ => None,
            };

            if let Some(status) = status {
                let payload = if status.is_success() {
                    info.result
                } else {
                    None
                };
                return Ok(TaskReport {
                    task: handle,
                    status,
                    elapsed: started.elapsed(),
                    payload,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        VcliConfig, VcliError,
        core::{
            domain::model::{inventory_object::ObjectKind, task::TaskInfo},
            infrastructure::inventory_client::MockInventoryClient,
        },
    };
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn context(mock: MockInventoryClient) -> VcliContext {
        VcliContext::new(Arc::new(mock), VcliConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_third_poll() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let mut mock = MockInventoryClient::new();
        mock.expect_poll_task().times(3).returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TaskInfo::new(if n < 3 {
                TaskState::Running
            } else {
                TaskState::Success
            }))
        });
        let ctx = context(mock);

        let report = TaskSupervisor::new(&ctx)
            .wait(TaskHandle::new("task-1"), Duration::from_secs(42))
            .await
            .unwrap();

        assert_eq!(report.status, TaskStatus::Success);
        assert!(report.elapsed >= Duration::from_secs(3));
        assert!(report.elapsed < Duration::from_secs(4));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_budget_not_earlier() {
        let mut mock = MockInventoryClient::new();
        mock.expect_poll_task()
            .returning(|_| Ok(TaskInfo::new(TaskState::Running)));
        let ctx = context(mock);

        let report = TaskSupervisor::new(&ctx)
            .wait(TaskHandle::new("task-2"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(
            report.status,
            TaskStatus::TimedOut {
                last_state: TaskState::Running
            }
        );
        assert!(report.elapsed >= Duration::from_secs(5));
        assert!(report.elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_surfaces_faults() {
        let mut mock = MockInventoryClient::new();
        mock.expect_poll_task().times(1).returning(|_| {
            Ok(TaskInfo::failed(
                "A specified parameter was not correct",
                vec!["spec.deviceChange.device".to_string()],
            ))
        });
        let ctx = context(mock);

        let report = TaskSupervisor::new(&ctx)
            .wait(TaskHandle::new("task-3"), Duration::from_secs(42))
            .await
            .unwrap();

        assert_eq!(
            report.status,
            TaskStatus::Error {
                message: "A specified parameter was not correct".to_string(),
                faults: vec!["spec.deviceChange.device".to_string()],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_submits_once_and_returns_result() {
        let mut mock = MockInventoryClient::new();
        mock.expect_submit_operation()
            .times(1)
            .returning(|_, _| Ok(TaskHandle::new("task-4")));
        mock.expect_poll_task().times(1).returning(|_| {
            Ok(TaskInfo {
                result: Some("vm-99".to_string()),
                ..TaskInfo::new(TaskState::Success)
            })
        });
        let ctx = context(mock);

        let reference = ManagedObjectRef::new(ObjectKind::VirtualMachine, "vm-1");
        let report = TaskSupervisor::new(&ctx)
            .run(&reference, OperationSpec::PowerOn, Duration::from_secs(42))
            .await
            .unwrap();

        assert_eq!(report.task, TaskHandle::new("task-4"));
        assert_eq!(report.payload.as_deref(), Some("vm-99"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submission_is_not_retried() {
        let mut mock = MockInventoryClient::new();
        mock.expect_submit_operation()
            .times(1)
            .returning(|_, _| Err(VcliError::Connection("reset".to_string())));
        mock.expect_poll_task().never();
        let ctx = context(mock);

        let reference = ManagedObjectRef::new(ObjectKind::VirtualMachine, "vm-1");
        let result = TaskSupervisor::new(&ctx)
            .run(&reference, OperationSpec::Reset, Duration::from_secs(42))
            .await;
        assert!(matches!(result, Err(VcliError::Connection(_))));
    }
}
