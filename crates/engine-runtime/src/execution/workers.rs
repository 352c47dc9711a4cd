use engine_core::{
    context::{ExecSession, TaskContext},
    error::PluginError,
};
use engine_processing::{TaskOutcome, TaskProcessor};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::Semaphore,
    task::{self, Id, JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the given partition tasks on the blocking pool, at most
/// `max_threads` at a time, and waits for all of them. A failure never stops
/// the others; cancellation only stops launching new ones.
///
/// Outcomes are returned in ascending task order.
pub async fn spawn(
    processor: Arc<TaskProcessor>,
    session: Arc<ExecSession>,
    indices: Vec<usize>,
    cancel: &CancellationToken,
) -> Vec<TaskOutcome> {
    info!(tasks = indices.len(), max_threads = session.max_threads(), "Launching tasks");

    let semaphore = Arc::new(Semaphore::new(session.max_threads()));
    let mut set = JoinSet::new();
    let mut launched = HashMap::new();
    let mut outcomes = Vec::with_capacity(indices.len());

    for index in indices {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            warn!(task_index = index, "Shutdown requested, task not launched");
            outcomes.push(failed(index, PluginError::Cancelled));
            continue;
        };

        let processor = processor.clone();
        let ctx = TaskContext::new(session.clone(), index);
        let handle = set.spawn(async move {
            let _permit = permit;
            let result = task::spawn_blocking(move || processor.process(&ctx)).await;
            (index, result)
        });
        launched.insert(handle.id(), index);
    }

    while let Some(joined) = set.join_next_with_id().await {
        outcomes.extend(settle(joined, &mut launched));
    }
    for (_, index) in launched.drain() {
        outcomes.push(failed(index, PluginError::other("task did not complete")));
    }

    let metrics = session.metrics();
    for outcome in &outcomes {
        if outcome.is_committed() {
            metrics.increment_committed(1);
        } else {
            metrics.increment_failures(1);
        }
    }

    outcomes.sort_by_key(|outcome| outcome.index);
    outcomes
}

type Joined = Result<(Id, (usize, Result<TaskOutcome, JoinError>)), JoinError>;

/// Turns one joined supervisor into the outcome of its task. Every error is
/// kept against the task index it was launched for.
fn settle(joined: Joined, launched: &mut HashMap<Id, usize>) -> Option<TaskOutcome> {
    match joined {
        Ok((id, (_, Ok(outcome)))) => {
            launched.remove(&id);
            Some(outcome)
        }
        Ok((id, (index, Err(err)))) => {
            launched.remove(&id);
            error!(task_index = index, error = %err, "Task panicked");
            Some(failed(index, PluginError::other(format!("task panicked: {err}"))))
        }
        Err(err) => {
            let index = launched.remove(&err.id())?;
            error!(task_index = index, error = %err, "Task supervisor failed");
            Some(failed(
                index,
                PluginError::other(format!("task supervisor failed: {err}")),
            ))
        }
    }
}

fn failed(index: usize, error: PluginError) -> TaskOutcome {
    TaskOutcome {
        index,
        input_report: None,
        output_report: None,
        error: Some(error),
    }
}
