use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use chatscope_core::{
    DataKind, FilterConfig, SearchQuery, SearchResult, SelectedFile, TaskId, TaskKind,
};
use engine_logging::{engine_error, engine_info, engine_warn};

use crate::backend::{Backend, ReqwestBackend};
use crate::poller::{PollControl, PollEvent, PollOutcome, PollSink, TaskPoller};
use crate::settings::{BackendSettings, RECOMMENDED_POLL_INTERVAL};
use crate::{ApiError, EngineEvent};

enum EngineCommand {
    Poll { kind: TaskKind, task_ids: Vec<TaskId> },
    StopPolling,
    Cancel { task_id: TaskId },
    Request(Request),
}

/// One-shot backend calls that answer with a single event.
enum Request {
    Upload { files: Vec<SelectedFile> },
    Filter { config: FilterConfig },
    Analyze { modules: Option<Vec<String>> },
    Fetch { kind: DataKind },
    QueryTask { task_id: TaskId, kind: TaskKind },
    ListTasks,
    ClearSession,
    Search { query: SearchQuery },
}

/// Runs backend requests on a background runtime and reports [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    backend: Arc<dyn Backend>,
}

impl EngineHandle {
    pub fn new(settings: BackendSettings) -> Result<Self, ApiError> {
        let backend = Arc::new(ReqwestBackend::new(&settings)?);
        Ok(Self::with_backend(backend, settings.poll_interval))
    }

    pub fn with_backend(backend: Arc<dyn Backend>, poll_interval: Duration) -> Self {
        if !RECOMMENDED_POLL_INTERVAL.contains(&poll_interval) {
            engine_warn!(
                "Poll interval of {} ms is outside the recommended range",
                poll_interval.as_millis()
            );
        }

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let worker_backend = backend.clone();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    engine_error!("Could not start the engine runtime: {err}");
                    return;
                }
            };
            let poller = Arc::new(TaskPoller::new(worker_backend.clone(), poll_interval));
            let mut poll_control = PollControl::new();

            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Poll { kind, task_ids } => {
                        // Only one poll runs at a time; a new request replaces the old one.
                        poll_control.stop();
                        poll_control = PollControl::new();
                        let control = poll_control.clone();
                        let poller = poller.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let sink = ChannelPollSink::new(event_tx.clone());
                            let outcome = poller.run(kind, task_ids, &control, &sink).await;
                            if let PollOutcome::Completed { .. } = outcome {
                                let _ = event_tx.send(EngineEvent::PollFinished);
                            }
                        });
                    }
                    EngineCommand::StopPolling => poll_control.stop(),
                    EngineCommand::Cancel { task_id } => {
                        poll_control.exclude(task_id.clone());
                        let backend = worker_backend.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let event = match backend.cancel_task(&task_id).await {
                                Ok(_) => EngineEvent::CancelAcknowledged { task_id },
                                Err(error) => EngineEvent::CancelFailed { task_id, error },
                            };
                            let _ = event_tx.send(event);
                        });
                    }
                    EngineCommand::Request(request) => {
                        let backend = worker_backend.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let event = handle_request(backend.as_ref(), request).await;
                            let _ = event_tx.send(event);
                        });
                    }
                }
            }
            poll_control.stop();
        });

        Self {
            cmd_tx,
            event_rx,
            backend,
        }
    }

    pub fn upload(&self, files: Vec<SelectedFile>) {
        self.request(Request::Upload { files });
    }

    pub fn poll(&self, kind: TaskKind, task_ids: Vec<TaskId>) {
        self.send(EngineCommand::Poll { kind, task_ids });
    }

    pub fn stop_polling(&self) {
        self.send(EngineCommand::StopPolling);
    }

    pub fn cancel(&self, task_id: TaskId) {
        self.send(EngineCommand::Cancel { task_id });
    }

    pub fn apply_filter(&self, config: FilterConfig) {
        self.request(Request::Filter { config });
    }

    pub fn start_analysis(&self, modules: Option<Vec<String>>) {
        self.request(Request::Analyze { modules });
    }

    pub fn fetch(&self, kind: DataKind) {
        self.request(Request::Fetch { kind });
    }

    pub fn query_task(&self, task_id: TaskId, kind: TaskKind) {
        self.request(Request::QueryTask { task_id, kind });
    }

    pub fn list_tasks(&self) {
        self.request(Request::ListTasks);
    }

    pub fn clear_session(&self) {
        self.request(Request::ClearSession);
    }

    pub fn search(&self, query: SearchQuery) {
        self.request(Request::Search { query });
    }

    pub fn session_cookie(&self) -> Option<String> {
        self.backend.session_cookie()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn request(&self, request: Request) {
        self.send(EngineCommand::Request(request));
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            engine_error!("Engine worker is gone; command dropped");
        }
    }
}

struct ChannelPollSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelPollSink {
    fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl PollSink for ChannelPollSink {
    fn emit(&self, event: PollEvent) {
        let event = match event {
            PollEvent::Snapshot(tasks) => EngineEvent::PollSnapshot(tasks),
            PollEvent::TransientError { task_id, error } => {
                EngineEvent::PollError { task_id, error }
            }
        };
        let _ = self.tx.send(event);
    }
}

async fn handle_request(backend: &dyn Backend, request: Request) -> EngineEvent {
    match request {
        Request::Upload { files } => upload_all(backend, &files).await,
        Request::Filter { config } => match backend.apply_filter(&config).await {
            Ok(message) => EngineEvent::FilterApplied(message),
            Err(error) => EngineEvent::FilterRejected(error),
        },
        Request::Analyze { modules } => {
            match backend.start_analysis(modules.as_deref()).await {
                Ok(task) => EngineEvent::AnalysisAccepted(task),
                Err(error) => EngineEvent::AnalysisRejected(error),
            }
        }
        Request::Fetch { kind } => match backend.fetch_data(kind).await {
            Ok(data) => EngineEvent::DataLoaded(data),
            Err(error) => EngineEvent::DataLoadFailed { kind, error },
        },
        Request::QueryTask { task_id, kind } => {
            match backend.task_status(&task_id, kind).await {
                Ok(task) => EngineEvent::TaskLoaded(task),
                Err(error) => EngineEvent::TaskLoadFailed { task_id, error },
            }
        }
        Request::ListTasks => match backend.session_tasks().await {
            Ok(tasks) => EngineEvent::SessionTasksLoaded(tasks),
            Err(error) => EngineEvent::SessionTasksFailed(error),
        },
        Request::ClearSession => match backend.clear_session().await {
            Ok(message) => EngineEvent::SessionCleared(message),
            Err(error) => EngineEvent::SessionClearFailed(error),
        },
        Request::Search { query } => search(backend, query).await,
    }
}

async fn search(backend: &dyn Backend, query: SearchQuery) -> EngineEvent {
    let result = match query {
        SearchQuery::Keyword(keyword) => backend
            .count_keyword(&keyword)
            .await
            .map(|count| SearchResult::Keyword { keyword, count }),
        SearchQuery::Fuzzy { query, cutoff } => backend
            .fuzzy_search(&query, cutoff)
            .await
            .map(SearchResult::Fuzzy),
    };
    match result {
        Ok(result) => EngineEvent::SearchCompleted(result),
        Err(error) => EngineEvent::SearchFailed(error),
    }
}

/// Uploads files one by one. On the first rejection the tasks already
/// accepted are cancelled and the whole upload is reported as rejected.
async fn upload_all(backend: &dyn Backend, files: &[SelectedFile]) -> EngineEvent {
    let mut accepted = Vec::with_capacity(files.len());
    for file in files {
        match backend.process_file(file).await {
            Ok(task) => {
                engine_info!("{} accepted as task {}", file.file_name(), task.task_id);
                accepted.push(task);
            }
            Err(error) => {
                engine_warn!("Upload of {} rejected: {error}", file.file_name());
                for task in &accepted {
                    if let Err(cancel_error) = backend.cancel_task(&task.task_id).await {
                        engine_warn!(
                            "Could not cancel task {} after a failed upload: {cancel_error}",
                            task.task_id
                        );
                    }
                }
                return EngineEvent::UploadRejected(error);
            }
        }
    }
    EngineEvent::UploadAccepted(accepted)
}
