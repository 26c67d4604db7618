use std::collections::BTreeSet;

use crate::{
    aggregate, is_known_module, AppState, DataKind, Effect, FilterEdit, Msg, SearchQuery,
    SelectedFile, SessionData, Task, TaskId, TaskKind, TaskStatus, WorkflowState,
};

pub const NO_SENDERS_MESSAGE: &str = "Upload finished but no senders were found.";
pub const NO_REPORT_MESSAGE: &str = "Analysis finished without a report.";
pub const CANCELLED_MESSAGE: &str = "Task was cancelled.";
pub const EMPTY_FILTER_MESSAGE: &str = "Filtering removed every message.";
pub const NO_PROCESSED_DOWNLOAD: &str = "Nothing has been processed in this session yet.";
pub const NO_FILTERED_DOWNLOAD: &str = "No filter has been applied in this session yet.";
pub const NO_REPORT_DOWNLOAD: &str = "No analysis has finished in this session yet.";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FilesSelected(files) => select_files(&mut state, files),
        Msg::ProcessClicked => {
            if !state.can_process() {
                return (state, Vec::new());
            }
            state.error = None;
            state.clear_tasks();
            state.workflow = WorkflowState::Processing;
            state.loading = true;
            state.mark_dirty();
            vec![Effect::UploadFiles {
                files: state.selected_files.clone(),
            }]
        }
        Msg::UploadAccepted(tasks) => {
            if state.workflow != WorkflowState::Processing {
                return (state, Vec::new());
            }
            state.loading = false;
            // The backend replaces its session data once it takes the upload.
            state.invalidate_processed();
            track_tasks(&mut state, TaskKind::Upload, tasks)
        }
        Msg::UploadRejected(error) => {
            if state.workflow != WorkflowState::Processing {
                return (state, Vec::new());
            }
            state.loading = false;
            state.workflow = WorkflowState::FilesSelected;
            state.error = Some(error);
            state.mark_dirty();
            Vec::new()
        }
        Msg::TasksPolled(snapshots) => {
            if !state.workflow.is_busy() || state.tasks.is_empty() {
                return (state, Vec::new());
            }
            let mut replaced = false;
            for snapshot in snapshots {
                if let Some(slot) = state
                    .tasks
                    .iter_mut()
                    .find(|task| task.task_id == snapshot.task_id)
                {
                    // Terminal statuses are final, even against a late poll response.
                    if !slot.is_terminal() {
                        *slot = snapshot;
                        replaced = true;
                    }
                }
            }
            if !replaced {
                return (state, Vec::new());
            }
            state.poll_warning = None;
            state.mark_dirty();
            reconcile(&mut state)
        }
        Msg::PollFailed(error) => {
            if !state.workflow.is_busy() {
                return (state, Vec::new());
            }
            state.poll_warning = Some(error);
            state.mark_dirty();
            Vec::new()
        }
        Msg::CancelTaskClicked(task_id) => cancel_task(&mut state, task_id),
        Msg::CancelFailed { task_id, error } => {
            state.error = Some(format!("Could not cancel task {task_id}: {error}"));
            state.mark_dirty();
            Vec::new()
        }
        Msg::FilterEdited(edit) => {
            apply_filter_edit(&mut state, edit);
            state.mark_dirty();
            Vec::new()
        }
        Msg::FilterClicked => {
            if !state.can_filter() {
                return (state, Vec::new());
            }
            state.error = None;
            state.loading = true;
            state.mark_dirty();
            vec![Effect::ApplyFilter {
                config: state.filter.clone(),
            }]
        }
        Msg::FilterApplied(_message) => {
            if !state.workflow.has_processed() {
                return (state, Vec::new());
            }
            // The previous filtering and anything analyzed from it are stale now.
            state.invalidate_filtered();
            state.workflow = WorkflowState::Processed;
            state.awaiting_filtered = true;
            state.mark_dirty();
            vec![Effect::FetchData {
                kind: DataKind::Filtered,
            }]
        }
        Msg::FilterRejected(error) => {
            state.loading = false;
            state.error = Some(error);
            state.mark_dirty();
            Vec::new()
        }
        Msg::AnalyzeClicked { modules } => start_analysis(&mut state, modules),
        Msg::AnalysisAccepted(task) => {
            if state.workflow != WorkflowState::Analyzing {
                return (state, Vec::new());
            }
            state.loading = false;
            track_tasks(&mut state, TaskKind::Analysis, vec![task])
        }
        Msg::AnalysisRejected(error) => {
            if state.workflow != WorkflowState::Analyzing {
                return (state, Vec::new());
            }
            state.loading = false;
            state.workflow = WorkflowState::Filtered;
            state.error = Some(error);
            state.mark_dirty();
            Vec::new()
        }
        Msg::SearchClicked(query) => start_search(&mut state, query),
        Msg::SearchCompleted(result) => {
            state.loading = false;
            if state.filtered.is_some() {
                state.search = Some(result);
            }
            state.mark_dirty();
            Vec::new()
        }
        Msg::SearchFailed(error) => {
            state.loading = false;
            state.error = Some(format!("Search failed: {error}"));
            state.mark_dirty();
            Vec::new()
        }
        Msg::DownloadClicked(kind) => {
            if state.workflow.is_busy() {
                return (state, Vec::new());
            }
            if let Some(reason) = download_refusal(state.workflow, kind) {
                state.error = Some(reason.to_string());
                state.mark_dirty();
                return (state, Vec::new());
            }
            state.error = None;
            state.loading = true;
            state.mark_dirty();
            vec![Effect::FetchData { kind }]
        }
        Msg::DataLoaded(data) => {
            data_loaded(&mut state, data);
            Vec::new()
        }
        Msg::DataLoadFailed { kind, error } => {
            state.loading = false;
            if kind == DataKind::Filtered {
                state.awaiting_filtered = false;
            }
            state.error = Some(format!("Could not load {kind}: {error}"));
            state.mark_dirty();
            Vec::new()
        }
        Msg::ExportClicked(kind) => export(&mut state, kind),
        Msg::ImportFile {
            kind,
            source,
            contents,
        } => {
            import(&mut state, kind, &source, &contents);
            Vec::new()
        }
        Msg::DashboardToggled(show) => {
            let show = show && state.report.is_some();
            if show != state.show_dashboard {
                state.show_dashboard = show;
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ClearClicked => {
            state.reset();
            vec![Effect::StopPolling, Effect::ClearSession]
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn select_files(state: &mut AppState, files: Vec<SelectedFile>) -> Vec<Effect> {
    if state.workflow.is_busy() {
        return Vec::new();
    }
    if let Some(problem) = files.iter().find_map(|file| file.validate().err()) {
        state.error = Some(problem);
        state.mark_dirty();
        return Vec::new();
    }

    state.error = None;
    if files.is_empty() {
        if state.workflow == WorkflowState::FilesSelected {
            state.workflow = WorkflowState::Idle;
        }
    } else {
        state.workflow = WorkflowState::FilesSelected;
    }
    state.selected_files = files;
    state.mark_dirty();
    Vec::new()
}

fn track_tasks(state: &mut AppState, kind: TaskKind, tasks: Vec<Task>) -> Vec<Effect> {
    let mut seen = BTreeSet::new();
    state.tasks = tasks
        .into_iter()
        .filter(|task| seen.insert(task.task_id.clone()))
        .collect();
    state.mark_dirty();

    let task_ids: Vec<TaskId> = state
        .tasks
        .iter()
        .filter(|task| !task.is_terminal())
        .map(|task| task.task_id.clone())
        .collect();

    let mut effects = Vec::new();
    if !task_ids.is_empty() {
        effects.push(Effect::PollTasks { kind, task_ids });
    }
    effects.extend(reconcile(state));
    effects
}

/// Recomputes the aggregate and advances or reverts the workflow on a terminal outcome.
fn reconcile(state: &mut AppState) -> Vec<Effect> {
    state.aggregated = aggregate(&state.tasks);
    let Some(aggregated) = state.aggregated.clone() else {
        return Vec::new();
    };

    match aggregated.status {
        TaskStatus::Failed | TaskStatus::Timeout => {
            state.error = aggregated.error;
            revert_phase(state);
            vec![Effect::StopPolling]
        }
        TaskStatus::Cancelled => {
            state.error = Some(
                aggregated
                    .error
                    .unwrap_or_else(|| CANCELLED_MESSAGE.to_string()),
            );
            revert_phase(state);
            vec![Effect::StopPolling]
        }
        TaskStatus::Completed => match state.workflow {
            WorkflowState::Processing => finish_upload(state),
            WorkflowState::Analyzing => finish_analysis(state),
            _ => Vec::new(),
        },
        TaskStatus::Pending | TaskStatus::Running => Vec::new(),
    }
}

fn revert_phase(state: &mut AppState) {
    state.workflow = match state.workflow {
        WorkflowState::Processing => WorkflowState::FilesSelected,
        WorkflowState::Analyzing => WorkflowState::Filtered,
        other => other,
    };
    state.tasks.clear();
    state.loading = false;
    state.mark_dirty();
}

fn finish_upload(state: &mut AppState) -> Vec<Effect> {
    let senders: Vec<String> = state
        .tasks
        .iter()
        .filter_map(|task| task.result.as_ref())
        .flat_map(|result| result.unique_senders().iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if senders.is_empty() {
        state.error = Some(NO_SENDERS_MESSAGE.to_string());
        revert_phase(state);
        return vec![Effect::StopPolling];
    }

    state.filter.retain_senders(&senders);
    state.available_senders = senders;
    state.selected_files.clear();
    state.tasks.clear();
    state.workflow = WorkflowState::Processed;
    state.loading = true;
    state.mark_dirty();
    vec![Effect::FetchData {
        kind: DataKind::Processed,
    }]
}

fn finish_analysis(state: &mut AppState) -> Vec<Effect> {
    let report = state
        .tasks
        .iter()
        .find_map(|task| task.result.as_ref().and_then(|result| result.analysis_report()))
        .cloned();

    match report {
        Some(report) => {
            state.report = Some(report);
            state.tasks.clear();
            state.workflow = WorkflowState::Analyzed;
            state.mark_dirty();
            Vec::new()
        }
        None => {
            state.error = Some(NO_REPORT_MESSAGE.to_string());
            revert_phase(state);
            Vec::new()
        }
    }
}

fn cancel_task(state: &mut AppState, task_id: TaskId) -> Vec<Effect> {
    let Some(task) = state
        .tasks
        .iter_mut()
        .find(|task| task.task_id == task_id && !task.is_terminal())
    else {
        return Vec::new();
    };
    task.status = TaskStatus::Cancelled;
    state.mark_dirty();

    let mut effects = vec![Effect::CancelTask { task_id }];
    effects.extend(reconcile(state));
    effects
}

fn apply_filter_edit(state: &mut AppState, edit: FilterEdit) {
    let filter = &mut state.filter;
    match edit {
        FilterEdit::Assign { sender, group } => filter.assign(&sender, &group),
        FilterEdit::Unassign { sender } => filter.unassign(&sender),
        FilterEdit::Remove { sender } => filter.mark_removed(&sender),
        FilterEdit::Restore { sender } => filter.restore(&sender),
        FilterEdit::SetOtherLabel(label) => filter.set_other_label(&label),
        FilterEdit::Replace(config) => *filter = config,
    }
}

fn start_analysis(state: &mut AppState, modules: Option<Vec<String>>) -> Vec<Effect> {
    if !state.can_analyze() {
        return Vec::new();
    }
    if let Some(modules) = &modules {
        if modules.is_empty() {
            state.error = Some("Select at least one analysis module.".to_string());
            state.mark_dirty();
            return Vec::new();
        }
        if let Some(unknown) = modules.iter().find(|module| !is_known_module(module)) {
            state.error = Some(format!("Unknown analysis module: {unknown}"));
            state.mark_dirty();
            return Vec::new();
        }
    }

    state.error = None;
    state.clear_tasks();
    state.invalidate_report();
    state.workflow = WorkflowState::Analyzing;
    state.loading = true;
    state.mark_dirty();
    vec![Effect::StartAnalysis { modules }]
}

fn start_search(state: &mut AppState, query: SearchQuery) -> Vec<Effect> {
    if !state.can_search() {
        return Vec::new();
    }
    let query = match query.normalized() {
        Ok(query) => query,
        Err(problem) => {
            state.error = Some(problem);
            state.mark_dirty();
            return Vec::new();
        }
    };
    state.error = None;
    state.search = None;
    state.loading = true;
    state.mark_dirty();
    vec![Effect::Search { query }]
}

/// Why a download of `kind` would be discarded in `workflow`, if it would.
fn download_refusal(workflow: WorkflowState, kind: DataKind) -> Option<&'static str> {
    let accepted = match kind {
        DataKind::Processed => workflow.has_processed(),
        DataKind::Filtered => matches!(
            workflow,
            WorkflowState::Filtered | WorkflowState::Analyzed
        ),
        DataKind::Report => workflow == WorkflowState::Analyzed,
    };
    if accepted {
        return None;
    }
    Some(match kind {
        DataKind::Processed => NO_PROCESSED_DOWNLOAD,
        DataKind::Filtered => NO_FILTERED_DOWNLOAD,
        DataKind::Report => NO_REPORT_DOWNLOAD,
    })
}

fn data_loaded(state: &mut AppState, data: SessionData) {
    state.loading = false;
    state.mark_dirty();
    match data {
        SessionData::Processed(processed) => {
            if !state.workflow.has_processed() {
                return;
            }
            if state.available_senders.is_empty() {
                state.available_senders = processed.unique_senders();
            }
            state.processed = Some(processed);
        }
        SessionData::Filtered(filtered) => {
            if state.awaiting_filtered {
                state.awaiting_filtered = false;
                if filtered.is_empty() {
                    state.error = Some(EMPTY_FILTER_MESSAGE.to_string());
                    return;
                }
                state.filtered = Some(filtered);
                state.workflow = WorkflowState::Filtered;
            } else if matches!(
                state.workflow,
                WorkflowState::Filtered | WorkflowState::Analyzed
            ) && !filtered.is_empty()
            {
                state.filtered = Some(filtered);
            }
        }
        SessionData::Report(report) => {
            if state.workflow == WorkflowState::Analyzed && !report.is_empty() {
                state.report = Some(report);
            }
        }
    }
}

fn export(state: &mut AppState, kind: DataKind) -> Vec<Effect> {
    let data = match kind {
        DataKind::Processed => state.processed.clone().map(SessionData::Processed),
        DataKind::Filtered => state.filtered.clone().map(SessionData::Filtered),
        DataKind::Report => state.report.clone().map(SessionData::Report),
    };
    let result = data
        .ok_or(crate::ExportError::Missing(kind))
        .and_then(|data| data.to_json());

    match result {
        Ok(contents) => vec![Effect::WriteExport {
            kind,
            filename: kind.default_filename().to_string(),
            contents,
        }],
        Err(err) => {
            state.error = Some(err.to_string());
            state.mark_dirty();
            Vec::new()
        }
    }
}

fn import(state: &mut AppState, kind: DataKind, source: &str, contents: &str) {
    state.mark_dirty();
    if state.workflow.is_busy() {
        state.import_errors.insert(
            kind,
            format!("Cannot restore {source} while a task is running."),
        );
        return;
    }
    let data = match SessionData::from_json(kind, contents) {
        Ok(data) => data,
        Err(err) => {
            state
                .import_errors
                .insert(kind, format!("Error restoring {source}: {err}"));
            return;
        }
    };
    state.import_errors.remove(&kind);
    state.clear_tasks();

    match data {
        SessionData::Processed(processed) => {
            let senders = processed.unique_senders();
            state.invalidate_processed();
            state.filter.retain_senders(&senders);
            state.available_senders = senders;
            state.processed = Some(processed);
            state.workflow = WorkflowState::Processed;
        }
        SessionData::Filtered(filtered) => {
            state.invalidate_filtered();
            state.filtered = Some(filtered);
            state.workflow = WorkflowState::Filtered;
        }
        SessionData::Report(report) => {
            state.report = Some(report);
            state.workflow = WorkflowState::Analyzed;
        }
    }
}
