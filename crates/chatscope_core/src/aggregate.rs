use crate::{Task, TaskId, TaskStatus};

pub const DEFAULT_FAILURE_MESSAGE: &str = "A task failed.";

/// A single progress view synthesized from the tasks of one workflow phase.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTask {
    /// Member the status and error were taken from.
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Mean of the members' normalized progress, 0..=100.
    pub progress: f64,
    pub stage: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub member_count: usize,
    pub active_count: usize,
}

/// Reduces concurrent tasks into one view. Returns `None` for an empty set.
///
/// A failed or timed-out member wins immediately; the aggregate only
/// completes once every member has completed.
pub fn aggregate(tasks: &[Task]) -> Option<AggregatedTask> {
    let first = tasks.first()?;
    let member_count = tasks.len();
    let progress =
        tasks.iter().map(Task::normalized_progress).sum::<f64>() / member_count as f64;
    let active: Vec<&Task> = tasks.iter().filter(|task| task.status.is_active()).collect();
    let active_count = active.len();

    if let Some(failed) = tasks.iter().find(|task| task.status.is_failure()) {
        return Some(AggregatedTask {
            task_id: failed.task_id.clone(),
            status: failed.status,
            progress,
            stage: failed.stage.clone(),
            message: failed.message.clone(),
            error: Some(
                failed
                    .error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            ),
            member_count,
            active_count,
        });
    }

    if tasks.iter().all(|task| task.status == TaskStatus::Completed) {
        return Some(AggregatedTask {
            task_id: first.task_id.clone(),
            status: TaskStatus::Completed,
            progress,
            stage: first.stage.clone(),
            message: first.message.clone(),
            error: None,
            member_count,
            active_count,
        });
    }

    if let Some(lead) = active.first() {
        let status = if active.iter().any(|task| task.status == TaskStatus::Running) {
            TaskStatus::Running
        } else {
            TaskStatus::Pending
        };
        let stage = if active_count > 1 {
            Some(format!("Processing {active_count} files..."))
        } else {
            lead.stage.clone()
        };
        return Some(AggregatedTask {
            task_id: lead.task_id.clone(),
            status,
            progress,
            stage,
            message: lead.message.clone(),
            error: None,
            member_count,
            active_count,
        });
    }

    // Everything is terminal, nothing failed, and not everything completed.
    let cancelled = tasks
        .iter()
        .find(|task| task.status == TaskStatus::Cancelled)
        .unwrap_or(first);
    Some(AggregatedTask {
        task_id: cancelled.task_id.clone(),
        status: TaskStatus::Cancelled,
        progress,
        stage: cancelled.stage.clone(),
        message: cancelled.message.clone(),
        error: cancelled.error.clone(),
        member_count,
        active_count,
    })
}
