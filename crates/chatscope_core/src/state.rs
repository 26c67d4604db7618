use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::view_model::{AppViewModel, TaskRowView};
use crate::{
    AggregatedTask, AnalysisReport, DataKind, FilterConfig, FilteredData, ProcessedData,
    SearchResult, Task,
};

/// Largest chat export accepted for upload.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["json", "html", "zip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    FilesSelected,
    Processing,
    Processed,
    Filtered,
    Analyzing,
    Analyzed,
}

impl WorkflowState {
    /// A backend task is in flight for this state.
    pub fn is_busy(self) -> bool {
        matches!(self, WorkflowState::Processing | WorkflowState::Analyzing)
    }

    /// Processed data exists and can be filtered.
    pub fn has_processed(self) -> bool {
        matches!(
            self,
            WorkflowState::Processed | WorkflowState::Filtered | WorkflowState::Analyzed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::FilesSelected => "files_selected",
            WorkflowState::Processing => "processing",
            WorkflowState::Processed => "processed",
            WorkflowState::Filtered => "filtered",
            WorkflowState::Analyzing => "analyzing",
            WorkflowState::Analyzed => "analyzed",
        }
    }
}

/// A local chat export chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !has_accepted_extension(&self.path) {
            return Err(format!(
                "{} is not a supported chat export (expected .json, .html or .zip)",
                self.file_name()
            ));
        }
        if self.size_bytes > MAX_UPLOAD_BYTES {
            return Err(format!(
                "{} is {} bytes, above the {} byte limit",
                self.file_name(),
                self.size_bytes,
                MAX_UPLOAD_BYTES
            ));
        }
        Ok(())
    }
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(ext))
        })
}

/// The client session: the single owner of workflow data and task tracking.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub(crate) workflow: WorkflowState,
    pub(crate) selected_files: Vec<SelectedFile>,
    pub(crate) tasks: Vec<Task>,
    pub(crate) aggregated: Option<AggregatedTask>,
    pub(crate) available_senders: Vec<String>,
    pub(crate) filter: FilterConfig,
    pub(crate) processed: Option<ProcessedData>,
    pub(crate) filtered: Option<FilteredData>,
    pub(crate) report: Option<AnalysisReport>,
    pub(crate) search: Option<SearchResult>,
    pub(crate) error: Option<String>,
    pub(crate) poll_warning: Option<String>,
    pub(crate) import_errors: BTreeMap<DataKind, String>,
    pub(crate) loading: bool,
    pub(crate) awaiting_filtered: bool,
    pub(crate) show_dashboard: bool,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(&self) -> WorkflowState {
        self.workflow
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn aggregated(&self) -> Option<&AggregatedTask> {
        self.aggregated.as_ref()
    }

    pub fn available_senders(&self) -> &[String] {
        &self.available_senders
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    pub fn processed(&self) -> Option<&ProcessedData> {
        self.processed.as_ref()
    }

    pub fn filtered(&self) -> Option<&FilteredData> {
        self.filtered.as_ref()
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    pub fn search(&self) -> Option<&SearchResult> {
        self.search.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn can_process(&self) -> bool {
        self.workflow == WorkflowState::FilesSelected
            && !self.selected_files.is_empty()
            && !self.loading
    }

    pub fn can_filter(&self) -> bool {
        self.workflow.has_processed() && !self.available_senders.is_empty() && !self.loading
    }

    pub fn can_analyze(&self) -> bool {
        matches!(
            self.workflow,
            WorkflowState::Filtered | WorkflowState::Analyzed
        ) && self.filtered.as_ref().is_some_and(|data| !data.is_empty())
            && !self.loading
    }

    /// The backend only searches filtered messages.
    pub fn can_search(&self) -> bool {
        matches!(
            self.workflow,
            WorkflowState::Filtered | WorkflowState::Analyzed
        ) && self.filtered.as_ref().is_some_and(|data| !data.is_empty())
            && !self.loading
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            workflow: self.workflow,
            selected_files: self.selected_files.iter().map(SelectedFile::file_name).collect(),
            tasks: self
                .tasks
                .iter()
                .map(|task| TaskRowView {
                    task_id: task.task_id.clone(),
                    status: task.status,
                    progress: task.normalized_progress(),
                    stage: task.stage.clone(),
                })
                .collect(),
            aggregated: self.aggregated.clone(),
            available_senders: self.available_senders.clone(),
            filter: self.filter.clone(),
            processed_count: self.processed.as_ref().map_or(0, ProcessedData::len),
            filtered_count: self.filtered.as_ref().map_or(0, FilteredData::len),
            report_modules: self
                .report
                .as_ref()
                .map(|report| report.modules().map(ToOwned::to_owned).collect())
                .unwrap_or_default(),
            search: self.search.clone(),
            error: self.error.clone(),
            poll_warning: self.poll_warning.clone(),
            import_errors: self
                .import_errors
                .iter()
                .map(|(kind, message)| (*kind, message.clone()))
                .collect(),
            loading: self.loading,
            show_dashboard: self.show_dashboard,
            can_process: self.can_process(),
            can_filter: self.can_filter(),
            can_analyze: self.can_analyze(),
            can_search: self.can_search(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Drops everything derived from processed data.
    pub(crate) fn invalidate_processed(&mut self) {
        self.processed = None;
        self.available_senders.clear();
        self.invalidate_filtered();
    }

    pub(crate) fn invalidate_filtered(&mut self) {
        self.filtered = None;
        self.search = None;
        self.awaiting_filtered = false;
        self.invalidate_report();
    }

    pub(crate) fn invalidate_report(&mut self) {
        self.report = None;
        self.show_dashboard = false;
    }

    pub(crate) fn clear_tasks(&mut self) {
        self.tasks.clear();
        self.aggregated = None;
        self.poll_warning = None;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self {
            dirty: true,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_file_accepts_known_extensions() {
        assert!(SelectedFile::new("chat.JSON", 10).validate().is_ok());
        assert!(SelectedFile::new("export.zip", 10).validate().is_ok());
        assert!(SelectedFile::new("notes.txt", 10).validate().is_err());
        assert!(SelectedFile::new("noext", 10).validate().is_err());
    }

    #[test]
    fn selected_file_rejects_oversized() {
        let err = SelectedFile::new("big.html", MAX_UPLOAD_BYTES + 1)
            .validate()
            .unwrap_err();
        assert!(err.contains("big.html"));
    }
}
