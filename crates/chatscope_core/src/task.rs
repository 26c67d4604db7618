use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::AnalysisReport;

/// Backend-assigned identifier of an asynchronous task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl TaskStatus {
    /// Terminal statuses never change again once observed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Timeout
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Statuses that make an aggregate fail fast.
    pub fn is_failure(self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which request created a task; decides the shape of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Upload,
    Analysis,
}

impl TaskKind {
    /// Best guess from the backend's worker name, used when listing session tasks.
    pub fn from_worker_name(name: &str) -> Self {
        if name.contains("analy") {
            TaskKind::Analysis
        } else {
            TaskKind::Upload
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Upload => f.write_str("upload"),
            TaskKind::Analysis => f.write_str("analysis"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(default)]
    pub message: Option<String>,
    pub unique_senders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub message: Option<String>,
    pub analysis_report: AnalysisReport,
}

/// Result payload of a completed task, one variant per [`TaskKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Upload(UploadResult),
    Analysis(AnalysisResult),
}

impl TaskResult {
    /// Validates a raw result payload against the shape expected for `kind`.
    pub fn decode(kind: TaskKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        match kind {
            TaskKind::Upload => serde_json::from_value(value).map(TaskResult::Upload),
            TaskKind::Analysis => serde_json::from_value(value).map(TaskResult::Analysis),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskResult::Upload(_) => TaskKind::Upload,
            TaskResult::Analysis(_) => TaskKind::Analysis,
        }
    }

    pub fn unique_senders(&self) -> &[String] {
        match self {
            TaskResult::Upload(upload) => &upload.unique_senders,
            TaskResult::Analysis(_) => &[],
        }
    }

    pub fn analysis_report(&self) -> Option<&AnalysisReport> {
        match self {
            TaskResult::Upload(_) => None,
            TaskResult::Analysis(analysis) => Some(&analysis.analysis_report),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Raw progress as reported; either a fraction or a percentage.
    pub progress: f64,
    pub stage: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub result: Option<TaskResult>,
}

impl Task {
    pub fn new(task_id: impl Into<TaskId>, kind: TaskKind) -> Self {
        Self {
            task_id: task_id.into(),
            kind,
            status: TaskStatus::Pending,
            progress: 0.0,
            stage: None,
            message: None,
            error: None,
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn normalized_progress(&self) -> f64 {
        normalize_progress(self.progress)
    }
}

/// Maps a raw progress value onto 0..=100.
///
/// Values up to 1 are fractions, anything above 1 is a percentage capped at 100.
pub fn normalize_progress(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    if raw <= 1.0 {
        (raw * 100.0).max(0.0)
    } else {
        raw.min(100.0)
    }
}
