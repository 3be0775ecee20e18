use tracing::{debug, warn};

use crate::config::PollConfig;
use crate::contract::{TaskResult, TaskStatus, WikiApi};
use crate::error::{ImportError, Result};

/// Poll an export task until it completes or fails.
///
/// Only "still pending" answers are retried; an API error ends polling at
/// once. Returns [`ImportError::PollTimeout`] after `max_attempts` pending
/// answers. A `Failed` task is returned as-is, the caller decides what it means.
pub async fn poll_crawler_results<A>(api: &A, task_id: &str, config: &PollConfig) -> Result<TaskResult>
where
    A: WikiApi + ?Sized,
{
    for attempt in 1..=config.max_attempts {
        let results = api.poll_results(vec![task_id.to_string()]).await?;

        let current = results
            .list
            .into_iter()
            .find(|r| r.task_id.is_empty() || r.task_id == task_id);

        match current {
            Some(result) if result.status.is_terminal() => {
                debug!(task_id, attempt, status = ?result.status, "[POLL] Task reached terminal status");
                return Ok(result);
            }
            Some(_) | None => {
                debug!(task_id, attempt, "[POLL] Task still pending");
            }
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval()).await;
        }
    }

    warn!(task_id, attempts = config.max_attempts, "[POLL] Gave up waiting for task");
    Err(ImportError::PollTimeout {
        task_id: task_id.to_string(),
        attempts: config.max_attempts,
    })
}

/// Same as [`poll_crawler_results`], but a `Failed` task becomes an error.
pub async fn wait_for_completion<A>(api: &A, task_id: &str, config: &PollConfig) -> Result<String>
where
    A: WikiApi + ?Sized,
{
    let result = poll_crawler_results(api, task_id, config).await?;
    match result.status {
        TaskStatus::Completed => Ok(result.content),
        _ => Err(ImportError::TaskFailed {
            task_id: task_id.to_string(),
            message: if result.content.is_empty() {
                "export task failed".to_string()
            } else {
                result.content
            },
        }),
    }
}
