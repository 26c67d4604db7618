use crate::{DataKind, FilterConfig, SearchQuery, SelectedFile, TaskId, TaskKind};

/// Side effects requested by [`crate::update`]; executed outside the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    UploadFiles {
        files: Vec<SelectedFile>,
    },
    PollTasks {
        kind: TaskKind,
        task_ids: Vec<TaskId>,
    },
    StopPolling,
    CancelTask {
        task_id: TaskId,
    },
    ApplyFilter {
        config: FilterConfig,
    },
    StartAnalysis {
        modules: Option<Vec<String>>,
    },
    FetchData {
        kind: DataKind,
    },
    Search {
        query: SearchQuery,
    },
    WriteExport {
        kind: DataKind,
        filename: String,
        contents: String,
    },
    ClearSession,
}
