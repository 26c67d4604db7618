use crate::{
    DataKind, FilterConfig, SearchQuery, SearchResult, SelectedFile, SessionData, Task, TaskId,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked the chat exports to upload (possibly none).
    FilesSelected(Vec<SelectedFile>),
    /// User confirmed the upload.
    ProcessClicked,
    /// Backend accepted the upload; one task per file.
    UploadAccepted(Vec<Task>),
    /// Backend refused the upload request itself.
    UploadRejected(String),
    /// One poll tick worth of task snapshots, applied as a unit.
    TasksPolled(Vec<Task>),
    /// A status request failed during a poll tick; polling continues.
    PollFailed(String),
    /// User cancelled one task.
    CancelTaskClicked(TaskId),
    CancelFailed { task_id: TaskId, error: String },
    /// User edited the sender grouping.
    FilterEdited(FilterEdit),
    FilterClicked,
    /// Filter endpoint confirmed, with its message.
    FilterApplied(String),
    FilterRejected(String),
    /// User started an analysis; `None` runs every module.
    AnalyzeClicked { modules: Option<Vec<String>> },
    AnalysisAccepted(Task),
    AnalysisRejected(String),
    /// User searched the filtered messages.
    SearchClicked(SearchQuery),
    SearchCompleted(SearchResult),
    SearchFailed(String),
    /// User asked for a fresh copy of backend data.
    DownloadClicked(DataKind),
    DataLoaded(SessionData),
    DataLoadFailed { kind: DataKind, error: String },
    /// User asked to save session data as JSON.
    ExportClicked(DataKind),
    /// User restored session data from a previously exported file.
    ImportFile {
        kind: DataKind,
        source: String,
        contents: String,
    },
    DashboardToggled(bool),
    /// User cleared the whole session.
    ClearClicked,
    Tick,
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEdit {
    Assign { sender: String, group: String },
    Unassign { sender: String },
    Remove { sender: String },
    Restore { sender: String },
    SetOtherLabel(String),
    Replace(FilterConfig),
}
