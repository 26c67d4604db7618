use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chatscope_core::{
    is_known_module, update, AnalysisReport, AppState, DataKind, FilterEdit, Msg, SearchQuery,
    SearchResult, SelectedFile, Task, TaskId, TaskKind, TaskResult, WorkflowState,
};
use chatscope_engine::{
    kind_from_filename, read_export, ApiError, EngineEvent, EngineHandle, ExportWriter,
};
use chrono::Utc;
use engine_logging::{engine_info, engine_warn};
use serde_json::Value;

use super::app::Session;
use super::config::AppConfig;
use super::effects::EffectRunner;
use crate::cli::RunArgs;

/// How long one-shot commands wait for the backend's answer.
const REQUEST_WAIT: Duration = Duration::from_secs(130);

/// Uploads the files, applies the grouping, runs the analysis and exports every result.
pub(crate) fn run_workflow(
    config: &AppConfig,
    session_cookie: Option<String>,
    args: &RunArgs,
) -> Result<()> {
    let modules = args.modules();
    if let Some(unknown) = modules
        .iter()
        .flatten()
        .find(|module| !is_known_module(module))
    {
        bail!("unknown analysis module `{unknown}`");
    }
    let files = args
        .files
        .iter()
        .map(|path| selected_file(path.as_path()))
        .collect::<Result<Vec<_>>>()?;

    let run_dir = config.run_dir(Utc::now());
    let engine = EngineHandle::new(config.backend_settings(session_cookie))?;
    let mut session = Session::new(EffectRunner::new(engine, ExportWriter::new(&run_dir)));
    let timeout = config.phase_timeout();

    session.dispatch(Msg::FilesSelected(files));
    if let Some(error) = session.state().error() {
        bail!("{error}");
    }
    session.dispatch(Msg::ProcessClicked);
    session.settle(WorkflowState::Processed, timeout)?;
    session.warn_on_error();

    let mut filter = args.filter_config();
    let known = session.state().available_senders().to_vec();
    for sender in unknown_senders(args, &known) {
        engine_warn!("Sender `{sender}` is not in the uploaded chats; ignoring it");
        eprintln!("Warning: sender `{sender}` is not in the uploaded chats");
    }
    filter.retain_senders(&known);
    session.dispatch(Msg::FilterEdited(FilterEdit::Replace(filter)));
    session.dispatch(Msg::FilterClicked);
    session.settle(WorkflowState::Filtered, timeout)?;

    for keyword in &args.keywords {
        session.dispatch(Msg::SearchClicked(SearchQuery::Keyword(keyword.clone())));
        session.settle(WorkflowState::Filtered, timeout)?;
        let Some(result) = session.state().search() else {
            session.warn_on_error();
            continue;
        };
        for line in search_lines(result) {
            println!("{line}");
        }
    }

    session.dispatch(Msg::AnalyzeClicked { modules });
    session.settle(WorkflowState::Analyzed, timeout)?;

    for kind in DataKind::ALL {
        let outcomes = session.dispatch(Msg::ExportClicked(kind));
        if outcomes.is_empty() {
            session.warn_on_error();
        }
        for (kind, result) in outcomes {
            match result {
                Ok(path) => println!("Wrote {kind} to {}", path.display()),
                Err(err) => eprintln!("Could not write {kind}: {err}"),
            }
        }
    }

    if args.dashboard {
        session.dispatch(Msg::DashboardToggled(true));
        if let Some(report) = session.state().report() {
            for line in report_summary(report) {
                println!("{line}");
            }
        }
    }
    if let Some(cookie) = session.runner().engine().session_cookie() {
        println!("Session: {cookie}");
    }
    Ok(())
}

pub(crate) fn show_status(engine: &EngineHandle, task_id: &str, analysis: bool) -> Result<()> {
    let kind = if analysis {
        TaskKind::Analysis
    } else {
        TaskKind::Upload
    };
    engine.query_task(TaskId::new(task_id), kind);
    let task = wait_for(engine, |event| match event {
        EngineEvent::TaskLoaded(task) => Some(Ok(task)),
        EngineEvent::TaskLoadFailed { error, .. } => Some(Err(error)),
        _ => None,
    })??;
    for line in task_lines(&task) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn list_tasks(engine: &EngineHandle) -> Result<()> {
    engine.list_tasks();
    let tasks = wait_for(engine, |event| match event {
        EngineEvent::SessionTasksLoaded(tasks) => Some(Ok(tasks)),
        EngineEvent::SessionTasksFailed(error) => Some(Err(error)),
        _ => None,
    })??;
    if tasks.is_empty() {
        println!("No tasks in this session.");
    }
    for task in &tasks {
        println!("{}", task_lines(task).join("\n  "));
    }
    Ok(())
}

pub(crate) fn cancel_task(engine: &EngineHandle, task_id: &str) -> Result<()> {
    engine.cancel(TaskId::new(task_id));
    wait_for(engine, |event| match event {
        EngineEvent::CancelAcknowledged { .. } => Some(Ok(())),
        EngineEvent::CancelFailed { error, .. } => Some(Err(error)),
        _ => None,
    })??;
    println!("Cancellation requested for task {task_id}.");
    Ok(())
}

pub(crate) fn fetch_data(engine: &EngineHandle, kind: DataKind, out_dir: &Path) -> Result<()> {
    engine.fetch(kind);
    let data = wait_for(engine, |event| match event {
        EngineEvent::DataLoaded(data) => Some(Ok(data)),
        EngineEvent::DataLoadFailed { error, .. } => Some(Err(error)),
        _ => None,
    })??;
    let contents = data.to_json()?;
    let path = ExportWriter::new(out_dir).write(kind.default_filename(), &contents)?;
    println!("Wrote {kind} to {}", path.display());
    Ok(())
}

pub(crate) fn search(engine: &EngineHandle, query: SearchQuery) -> Result<()> {
    let query = match query.normalized() {
        Ok(query) => query,
        Err(problem) => bail!("{problem}"),
    };
    engine.search(query);
    let result = wait_for(engine, |event| match event {
        EngineEvent::SearchCompleted(result) => Some(Ok(result)),
        EngineEvent::SearchFailed(error) => Some(Err(error)),
        _ => None,
    })??;
    for line in search_lines(&result) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn clear_session(engine: &EngineHandle) -> Result<()> {
    engine.clear_session();
    let message = wait_for(engine, |event| match event {
        EngineEvent::SessionCleared(message) => Some(Ok(message)),
        EngineEvent::SessionClearFailed(error) => Some(Err(error)),
        _ => None,
    })??;
    println!("{message}");
    Ok(())
}

/// Restores an exported file into a fresh session and prints what it holds.
pub(crate) fn inspect(file: &Path, kind: Option<DataKind>) -> Result<()> {
    let Some(kind) = kind.or_else(|| kind_from_filename(file)) else {
        bail!(
            "cannot tell what {} contains; pass --kind",
            file.display()
        );
    };
    let contents = read_export(file)?;
    for line in inspect_contents(kind, &file.display().to_string(), contents)? {
        println!("{line}");
    }
    Ok(())
}

fn inspect_contents(kind: DataKind, source: &str, contents: String) -> Result<Vec<String>> {
    let (state, _effects) = update(
        AppState::new(),
        Msg::ImportFile {
            kind,
            source: source.to_string(),
            contents,
        },
    );
    if let Some((_, error)) = state.view().import_errors.into_iter().next() {
        bail!("{error}");
    }
    engine_info!("Inspected {source} as {kind}");
    Ok(session_summary(&state))
}

fn session_summary(state: &AppState) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(processed) = state.processed() {
        lines.push(format!("{} processed messages", processed.len()));
        lines.push(format!("Senders: {}", state.available_senders().join(", ")));
    }
    if let Some(filtered) = state.filtered() {
        match filtered.metadata.messages_total {
            Some(total) => lines.push(format!("{} of {total} messages kept", filtered.len())),
            None => lines.push(format!("{} messages kept", filtered.len())),
        }
        for (group, members) in filtered.filter_settings.groups() {
            lines.push(format!("Group {group}: {}", members.join(", ")));
        }
        if !filtered.filter_settings.removed_senders.is_empty() {
            lines.push(format!(
                "Removed: {}",
                filtered.filter_settings.removed_senders.join(", ")
            ));
        }
    }
    if let Some(report) = state.report() {
        lines.extend(report_summary(report));
    }
    lines
}

fn report_summary(report: &AnalysisReport) -> Vec<String> {
    report
        .modules()
        .map(|name| match report.module(name) {
            Some(Value::Object(fields)) => format!("{name}: {} entries", fields.len()),
            Some(Value::Array(items)) => format!("{name}: {} items", items.len()),
            Some(Value::Null) | None => format!("{name}: empty"),
            Some(other) => format!("{name}: {other}"),
        })
        .collect()
}

fn search_lines(result: &SearchResult) -> Vec<String> {
    match result {
        SearchResult::Keyword { keyword, count } => {
            let mut lines = vec![format!(
                "`{keyword}`: {} matches in {} messages",
                count.total_matches, count.message_count
            )];
            lines.extend(
                count
                    .ranked()
                    .into_iter()
                    .map(|(sender, matches)| format!("  {sender}: {matches}")),
            );
            lines
        }
        SearchResult::Fuzzy(found) => {
            let mut lines = vec![format!(
                "{} of {} messages match `{}` (cutoff {}%)",
                found.match_count,
                found.total_messages_searched,
                found.query,
                found.similarity_cutoff
            )];
            lines.extend(found.scored().map(|(score, message)| {
                let when = message
                    .timestamp()
                    .map(|timestamp| format!(" [{timestamp}]"))
                    .unwrap_or_default();
                format!("  {score:>3}% {}{when}: {}", message.sender(), message.message())
            }));
            lines
        }
    }
}

fn task_lines(task: &Task) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} {} {:.0}%{}",
        task.task_id,
        task.kind,
        task.status,
        task.normalized_progress(),
        task.stage
            .as_deref()
            .map(|stage| format!(" {stage}"))
            .unwrap_or_default()
    )];
    if let Some(error) = &task.error {
        lines.push(format!("error: {error}"));
    }
    match &task.result {
        Some(TaskResult::Upload(result)) => {
            lines.push(format!("senders: {}", result.unique_senders.join(", ")));
        }
        Some(TaskResult::Analysis(result)) => {
            let modules: Vec<&str> = result.analysis_report.modules().collect();
            lines.push(format!("modules: {}", modules.join(", ")));
        }
        None => {}
    }
    lines
}

fn selected_file(path: &Path) -> Result<SelectedFile> {
    let meta = std::fs::metadata(path).with_context(|| format!("cannot read {}", path.display()))?;
    if !meta.is_file() {
        bail!("{} is not a file", path.display());
    }
    Ok(SelectedFile::new(PathBuf::from(path), meta.len()))
}

fn unknown_senders<'a>(args: &'a RunArgs, known: &[String]) -> Vec<&'a str> {
    args.groups
        .iter()
        .flat_map(|group| group.senders.iter())
        .chain(args.removed.iter())
        .map(String::as_str)
        .filter(|sender| !known.iter().any(|name| name == *sender))
        .collect()
}

/// Blocks until `pick` accepts an engine event; other events are dropped.
fn wait_for<T>(
    engine: &EngineHandle,
    mut pick: impl FnMut(EngineEvent) -> Option<Result<T, ApiError>>,
) -> Result<Result<T, ApiError>> {
    let deadline = Instant::now() + REQUEST_WAIT;
    while Instant::now() < deadline {
        if let Some(event) = engine.recv_timeout(Duration::from_millis(200)) {
            if let Some(answer) = pick(event) {
                return Ok(answer);
            }
        }
    }
    bail!("no answer from the backend after {}s", REQUEST_WAIT.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatscope_core::TaskStatus;
    use pretty_assertions::assert_eq;

    const FILTERED: &str = r#"{
  "messages": [
    { "sender": "Family", "message": "hi", "timestamp": "2024-01-01T10:00:00" }
  ],
  "metadata": { "participants": {}, "messages_total": 3, "filtered_messages": 1 },
  "filter_settings": {
    "group_mappings": { "Family": ["Mum", "Dad"] },
    "unassigned_label": "Other",
    "removed_senders": ["Bot"]
  },
  "timestamp": "2024-01-02T00:00:00",
  "count": 1
}"#;

    #[test]
    fn inspect_summarizes_filtered_export() {
        let lines =
            inspect_contents(DataKind::Filtered, "filtered.json", FILTERED.to_string()).unwrap();
        assert_eq!(
            lines,
            vec![
                "1 of 3 messages kept".to_string(),
                "Group Family: Mum, Dad".to_string(),
                "Removed: Bot".to_string(),
            ]
        );
    }

    #[test]
    fn inspect_summarizes_processed_export() {
        let contents = r#"[
  { "sender": "Bob", "message": "yo" },
  { "sender": "Alice", "message": "hi" }
]"#;
        let lines =
            inspect_contents(DataKind::Processed, "p.json", contents.to_string()).unwrap();
        assert_eq!(lines, vec!["2 processed messages", "Senders: Alice, Bob"]);
    }

    #[test]
    fn inspect_rejects_wrong_shape() {
        let err = inspect_contents(DataKind::Processed, "p.json", "{}".to_string()).unwrap_err();
        assert!(err.to_string().starts_with("Error restoring p.json"));
    }

    #[test]
    fn report_summary_counts_module_entries() {
        let report: AnalysisReport = serde_json::from_str(
            r#"{ "emoji_analysis": { "top": [], "total": 4 }, "ghost_periods": [1, 2, 3], "topic_modeling": null }"#,
        )
        .unwrap();
        assert_eq!(
            report_summary(&report),
            vec![
                "emoji_analysis: 2 entries",
                "ghost_periods: 3 items",
                "topic_modeling: empty",
            ]
        );
    }

    #[test]
    fn task_lines_show_progress_and_senders() {
        let task = Task {
            status: TaskStatus::Completed,
            progress: 1.0,
            stage: Some("Done".to_string()),
            result: Some(
                TaskResult::decode(
                    TaskKind::Upload,
                    serde_json::json!({ "unique_senders": ["A", "B"] }),
                )
                .unwrap(),
            ),
            ..Task::new("t1", TaskKind::Upload)
        };
        assert_eq!(task_lines(&task), vec!["t1 upload completed 100% Done", "senders: A, B"]);
    }

    #[test]
    fn keyword_lines_rank_senders() {
        let count = serde_json::from_value(serde_json::json!({
            "counts": { "Mum": 1, "Dad": 3 },
            "total_matches": 4,
            "message_count": 50
        }))
        .unwrap();
        let result = SearchResult::Keyword {
            keyword: "dinner".to_string(),
            count,
        };
        assert_eq!(
            search_lines(&result),
            vec!["`dinner`: 4 matches in 50 messages", "  Dad: 3", "  Mum: 1"]
        );
    }

    #[test]
    fn fuzzy_lines_show_score_and_timestamp() {
        let found = serde_json::from_value(serde_json::json!({
            "matches": [
                { "sender": "Mum", "message": "see you at 6", "timestamp": "2024-01-01 17:00:00", "match_score": 88 },
                { "sender": "Dad", "message": "see ya", "match_score": 76 }
            ],
            "match_count": 2,
            "total_messages_searched": 50,
            "query": "see you",
            "similarity_cutoff": 75
        }))
        .unwrap();
        assert_eq!(
            search_lines(&SearchResult::Fuzzy(found)),
            vec![
                "2 of 50 messages match `see you` (cutoff 75%)",
                "   88% Mum [2024-01-01 17:00:00]: see you at 6",
                "   76% Dad: see ya",
            ]
        );
    }
}
