use chatscope_core::{DataKind, SearchResult, SessionData, Task, TaskId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
    #[error("{message} (http status {status})")]
    HttpStatus { status: u16, message: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("could not read {path}: {message}")]
    ReadFile { path: String, message: String },
}

impl ApiError {
    /// Text meant for the user; backend error bodies are shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::HttpStatus { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Everything the engine reports back to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    UploadAccepted(Vec<Task>),
    UploadRejected(ApiError),
    /// One poll tick; tasks that were outstanding when the tick started.
    PollSnapshot(Vec<Task>),
    PollError { task_id: TaskId, error: ApiError },
    PollFinished,
    CancelAcknowledged { task_id: TaskId },
    CancelFailed { task_id: TaskId, error: ApiError },
    FilterApplied(String),
    FilterRejected(ApiError),
    AnalysisAccepted(Task),
    AnalysisRejected(ApiError),
    DataLoaded(SessionData),
    DataLoadFailed { kind: DataKind, error: ApiError },
    SessionCleared(String),
    SessionClearFailed(ApiError),
    TaskLoaded(Task),
    TaskLoadFailed { task_id: TaskId, error: ApiError },
    SessionTasksLoaded(Vec<Task>),
    SessionTasksFailed(ApiError),
    SearchCompleted(SearchResult),
    SearchFailed(ApiError),
}
