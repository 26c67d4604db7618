//! Chatscope core: pure workflow state machine, task aggregation and session data.
mod aggregate;
mod data;
mod effect;
mod msg;
mod search;
mod session_io;
mod state;
mod task;
mod update;
mod view_model;

pub use aggregate::{aggregate, AggregatedTask, DEFAULT_FAILURE_MESSAGE};
pub use data::{
    is_known_module, AnalysisReport, ChatMessage, FilterConfig, FilterMetadata, FilterSettings,
    FilteredData, ProcessedData, ANALYSIS_MODULES, DEFAULT_OTHER_LABEL,
};
pub use effect::Effect;
pub use msg::{FilterEdit, Msg};
pub use search::{
    FuzzyMatches, KeywordCount, SearchQuery, SearchResult, DEFAULT_FUZZY_CUTOFF,
};
pub use session_io::{DataKind, ExportError, ImportError, SessionData};
pub use state::{AppState, SelectedFile, WorkflowState, ACCEPTED_EXTENSIONS, MAX_UPLOAD_BYTES};
pub use task::{
    normalize_progress, AnalysisResult, Task, TaskId, TaskKind, TaskResult, TaskStatus,
    UploadResult,
};
pub use update::{
    update, CANCELLED_MESSAGE, EMPTY_FILTER_MESSAGE, NO_FILTERED_DOWNLOAD, NO_PROCESSED_DOWNLOAD,
    NO_REPORT_DOWNLOAD, NO_REPORT_MESSAGE, NO_SENDERS_MESSAGE,
};
pub use view_model::{AppViewModel, TaskRowView};
