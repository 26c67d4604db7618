//! JSON shapes exchanged with the backend and their validation into core types.
use serde::Deserialize;

use chatscope_core::{Task, TaskId, TaskKind, TaskResult, TaskStatus};

#[derive(Debug, Deserialize)]
pub(crate) struct RawTask {
    task_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: TaskStatus,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

impl RawTask {
    pub(crate) fn inferred_kind(&self) -> TaskKind {
        self.name
            .as_deref()
            .map_or(TaskKind::Upload, TaskKind::from_worker_name)
    }

    /// Converts into a core task, validating the result against `kind`.
    ///
    /// A completed task whose result is missing or has the wrong shape is
    /// reported as failed instead of being trusted.
    pub(crate) fn into_task(self, kind: TaskKind) -> Task {
        let mut task = Task {
            status: self.status,
            progress: self.progress.unwrap_or_default(),
            stage: self.stage,
            message: self.message,
            error: self.error,
            ..Task::new(TaskId::new(self.task_id), kind)
        };
        if task.status != TaskStatus::Completed {
            return task;
        }

        match self.result.filter(|value| !value.is_null()) {
            Some(value) => match TaskResult::decode(kind, value) {
                Ok(result) => task.result = Some(result),
                Err(err) => {
                    task.status = TaskStatus::Failed;
                    task.error = Some(format!("malformed {kind} result: {err}"));
                }
            },
            None => {
                task.status = TaskStatus::Failed;
                task.error = Some(format!("{kind} task completed without a result"));
            }
        }
        task
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub(crate) message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionTasks {
    #[serde(default)]
    pub(crate) tasks: Vec<RawTask>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawTask {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepted_analysis_body_decodes_as_pending() {
        let task = raw(json!({
            "message": "Analysis of 10 messages has started in the background.",
            "task_id": "abc",
            "session_id": "s1"
        }))
        .into_task(TaskKind::Analysis);

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.task_id.as_str(), "abc");
        assert_eq!(task.progress, 0.0);
    }

    #[test]
    fn completed_upload_keeps_senders() {
        let task = raw(json!({
            "task_id": "t",
            "status": "completed",
            "progress": 100.0,
            "result": { "message": "ok", "unique_senders": ["a", "b"] }
        }))
        .into_task(TaskKind::Upload);

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.unwrap().unique_senders(), ["a", "b"]);
    }

    #[test]
    fn completed_task_with_wrong_result_shape_fails() {
        let task = raw(json!({
            "task_id": "t",
            "status": "completed",
            "result": { "unique_senders": ["a"] }
        }))
        .into_task(TaskKind::Analysis);

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("malformed analysis result"));
    }

    #[test]
    fn running_task_ignores_partial_result() {
        let task = raw(json!({
            "task_id": "t",
            "status": "running",
            "progress": 40.0,
            "stage": "Parsing",
            "result": null
        }))
        .into_task(TaskKind::Upload);

        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.stage.as_deref(), Some("Parsing"));
        assert!(task.result.is_none());
    }
}
