use crate::{
    AggregatedTask, DataKind, FilterConfig, SearchResult, TaskId, TaskStatus, WorkflowState,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub workflow: WorkflowState,
    pub selected_files: Vec<String>,
    pub tasks: Vec<TaskRowView>,
    pub aggregated: Option<AggregatedTask>,
    pub available_senders: Vec<String>,
    pub filter: FilterConfig,
    pub processed_count: usize,
    pub filtered_count: usize,
    pub report_modules: Vec<String>,
    /// Latest search over the filtered messages.
    pub search: Option<SearchResult>,
    pub error: Option<String>,
    /// Transient polling problem; cleared by the next good tick.
    pub poll_warning: Option<String>,
    pub import_errors: Vec<(DataKind, String)>,
    pub loading: bool,
    pub show_dashboard: bool,
    pub can_process: bool,
    pub can_filter: bool,
    pub can_analyze: bool,
    pub can_search: bool,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRowView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: f64,
    pub stage: Option<String>,
}
