use std::path::PathBuf;

use chatscope_core::{DataKind, Effect, Msg};
use chatscope_engine::{EngineEvent, EngineHandle, ExportWriter, PersistError};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};

/// One finished export: where it went, or why it did not.
pub(crate) type ExportOutcome = (DataKind, Result<PathBuf, PersistError>);

/// Executes core effects against the engine and the export directory.
pub(crate) struct EffectRunner {
    engine: EngineHandle,
    writer: ExportWriter,
}

impl EffectRunner {
    pub(crate) fn new(engine: EngineHandle, writer: ExportWriter) -> Self {
        Self { engine, writer }
    }

    pub(crate) fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Starts every effect; file exports finish before this returns.
    pub(crate) fn run(&self, effects: Vec<Effect>) -> Vec<ExportOutcome> {
        let mut exports = Vec::new();
        for effect in effects {
            match effect {
                Effect::UploadFiles { files } => {
                    engine_info!("Uploading {} file(s)", files.len());
                    self.engine.upload(files);
                }
                Effect::PollTasks { kind, task_ids } => {
                    engine_debug!("Polling {} {kind} task(s)", task_ids.len());
                    self.engine.poll(kind, task_ids);
                }
                Effect::StopPolling => self.engine.stop_polling(),
                Effect::CancelTask { task_id } => {
                    engine_info!("Cancelling task {task_id}");
                    self.engine.cancel(task_id);
                }
                Effect::ApplyFilter { config } => self.engine.apply_filter(config),
                Effect::StartAnalysis { modules } => self.engine.start_analysis(modules),
                Effect::FetchData { kind } => self.engine.fetch(kind),
                Effect::Search { query } => {
                    engine_debug!("Searching filtered messages for `{}`", query.text());
                    self.engine.search(query);
                }
                Effect::WriteExport {
                    kind,
                    filename,
                    contents,
                } => {
                    let result = self.writer.write(&filename, &contents);
                    if let Err(err) = &result {
                        engine_error!("Failed to export {kind} to {filename}: {err}");
                    }
                    exports.push((kind, result));
                }
                Effect::ClearSession => self.engine.clear_session(),
            }
        }
        exports
    }
}

/// Translates an engine report into the message the state machine expects.
pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::UploadAccepted(tasks) => Msg::UploadAccepted(tasks),
        EngineEvent::UploadRejected(error) => Msg::UploadRejected(error.user_message()),
        EngineEvent::PollSnapshot(tasks) => Msg::TasksPolled(tasks),
        EngineEvent::PollError { task_id, error } => Msg::PollFailed(format!(
            "Status check for task {task_id} failed: {}",
            error.user_message()
        )),
        EngineEvent::CancelFailed { task_id, error } => Msg::CancelFailed {
            task_id,
            error: error.user_message(),
        },
        EngineEvent::FilterApplied(message) => Msg::FilterApplied(message),
        EngineEvent::FilterRejected(error) => Msg::FilterRejected(error.user_message()),
        EngineEvent::AnalysisAccepted(task) => Msg::AnalysisAccepted(task),
        EngineEvent::AnalysisRejected(error) => Msg::AnalysisRejected(error.user_message()),
        EngineEvent::DataLoaded(data) => Msg::DataLoaded(data),
        EngineEvent::DataLoadFailed { kind, error } => Msg::DataLoadFailed {
            kind,
            error: error.user_message(),
        },
        EngineEvent::SearchCompleted(result) => Msg::SearchCompleted(result),
        EngineEvent::SearchFailed(error) => Msg::SearchFailed(error.user_message()),
        EngineEvent::SessionClearFailed(error) => {
            engine_warn!("Backend session was not cleared: {error}");
            Msg::NoOp
        }
        EngineEvent::PollFinished
        | EngineEvent::CancelAcknowledged { .. }
        | EngineEvent::SessionCleared(_)
        | EngineEvent::TaskLoaded(_)
        | EngineEvent::TaskLoadFailed { .. }
        | EngineEvent::SessionTasksLoaded(_)
        | EngineEvent::SessionTasksFailed(_) => Msg::NoOp,
    }
}
