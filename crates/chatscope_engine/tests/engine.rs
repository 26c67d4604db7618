use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatscope_core::{
    DataKind, FilterConfig, FuzzyMatches, KeywordCount, SearchQuery, SearchResult, SelectedFile,
    SessionData, Task, TaskId, TaskKind, TaskStatus,
};
use chatscope_engine::{ApiError, Backend, EngineEvent, EngineHandle};
use pretty_assertions::assert_eq;

const WAIT: Duration = Duration::from_secs(5);

/// Accepts every upload except files whose name starts with `bad`, and
/// reports every task as completed.
#[derive(Default)]
struct FakeBackend {
    cancelled: Mutex<Vec<TaskId>>,
}

impl FakeBackend {
    fn cancelled(&self) -> Vec<TaskId> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Backend for FakeBackend {
    async fn process_file(&self, file: &SelectedFile) -> Result<Task, ApiError> {
        let name = file.file_name();
        if name.starts_with("bad") {
            return Err(ApiError::HttpStatus {
                status: 400,
                message: format!("Unsupported file: {name}"),
            });
        }
        Ok(Task::new(format!("task-{name}"), TaskKind::Upload))
    }

    async fn task_status(&self, task_id: &TaskId, kind: TaskKind) -> Result<Task, ApiError> {
        Ok(Task {
            status: TaskStatus::Completed,
            progress: 100.0,
            ..Task::new(task_id.clone(), kind)
        })
    }

    async fn session_tasks(&self) -> Result<Vec<Task>, ApiError> {
        Ok(Vec::new())
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<String, ApiError> {
        self.cancelled.lock().unwrap().push(task_id.clone());
        Ok("cancelled".to_string())
    }

    async fn apply_filter(&self, _config: &FilterConfig) -> Result<String, ApiError> {
        Ok("Filtered".to_string())
    }

    async fn start_analysis(&self, _modules: Option<&[String]>) -> Result<Task, ApiError> {
        Ok(Task::new("analysis", TaskKind::Analysis))
    }

    async fn fetch_data(&self, _kind: DataKind) -> Result<SessionData, ApiError> {
        Err(ApiError::HttpStatus {
            status: 404,
            message: "No report found".to_string(),
        })
    }

    async fn clear_session(&self) -> Result<String, ApiError> {
        Ok("Session cleared".to_string())
    }

    async fn count_keyword(&self, _keyword: &str) -> Result<KeywordCount, ApiError> {
        Ok(KeywordCount {
            counts: [("Me".to_string(), 2)].into_iter().collect(),
            total_matches: 2,
            message_count: 40,
        })
    }

    async fn fuzzy_search(&self, _query: &str, _cutoff: u8) -> Result<FuzzyMatches, ApiError> {
        Err(ApiError::HttpStatus {
            status: 400,
            message: "No filtered messages found.".to_string(),
        })
    }
}

fn engine(backend: &Arc<FakeBackend>) -> EngineHandle {
    EngineHandle::with_backend(backend.clone(), Duration::from_millis(10))
}

#[test]
fn upload_reports_one_task_per_file() {
    let backend = Arc::new(FakeBackend::default());
    let engine = engine(&backend);

    engine.upload(vec![
        SelectedFile::new("a.json", 1),
        SelectedFile::new("b.html", 1),
    ]);

    let event = engine.recv_timeout(WAIT).expect("upload event");
    let EngineEvent::UploadAccepted(tasks) = event else {
        panic!("unexpected event: {event:?}");
    };
    let ids: Vec<&str> = tasks.iter().map(|task| task.task_id.as_str()).collect();
    assert_eq!(ids, ["task-a.json", "task-b.html"]);
}

#[test]
fn partial_upload_cancels_accepted_tasks() {
    let backend = Arc::new(FakeBackend::default());
    let engine = engine(&backend);

    engine.upload(vec![
        SelectedFile::new("a.json", 1),
        SelectedFile::new("bad.zip", 1),
    ]);

    let event = engine.recv_timeout(WAIT).expect("upload event");
    assert_eq!(
        event,
        EngineEvent::UploadRejected(ApiError::HttpStatus {
            status: 400,
            message: "Unsupported file: bad.zip".to_string(),
        })
    );
    assert_eq!(backend.cancelled(), vec![TaskId::new("task-a.json")]);
}

#[test]
fn poll_reports_snapshot_then_finishes() {
    let backend = Arc::new(FakeBackend::default());
    let engine = engine(&backend);

    engine.poll(TaskKind::Upload, vec![TaskId::new("t1")]);

    let snapshot = engine.recv_timeout(WAIT).expect("snapshot");
    let EngineEvent::PollSnapshot(tasks) = snapshot else {
        panic!("unexpected event: {snapshot:?}");
    };
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(engine.recv_timeout(WAIT), Some(EngineEvent::PollFinished));
}

#[test]
fn cancel_is_acknowledged() {
    let backend = Arc::new(FakeBackend::default());
    let engine = engine(&backend);

    engine.cancel(TaskId::new("t9"));

    assert_eq!(
        engine.recv_timeout(WAIT),
        Some(EngineEvent::CancelAcknowledged {
            task_id: TaskId::new("t9")
        })
    );
    assert_eq!(backend.cancelled(), vec![TaskId::new("t9")]);
}

#[test]
fn fetch_failure_names_the_data_kind() {
    let backend = Arc::new(FakeBackend::default());
    let engine = engine(&backend);

    engine.fetch(DataKind::Report);

    let event = engine.recv_timeout(WAIT).expect("fetch event");
    let EngineEvent::DataLoadFailed { kind, error } = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(kind, DataKind::Report);
    assert_eq!(error.user_message(), "No report found");
}

#[test]
fn one_shot_requests_answer_with_their_events() {
    let backend = Arc::new(FakeBackend::default());
    let engine = engine(&backend);

    engine.clear_session();
    assert_eq!(
        engine.recv_timeout(WAIT),
        Some(EngineEvent::SessionCleared("Session cleared".to_string()))
    );

    engine.list_tasks();
    assert_eq!(
        engine.recv_timeout(WAIT),
        Some(EngineEvent::SessionTasksLoaded(Vec::new()))
    );

    engine.start_analysis(None);
    let event = engine.recv_timeout(WAIT).expect("analysis event");
    assert!(matches!(event, EngineEvent::AnalysisAccepted(task) if task.kind == TaskKind::Analysis));
}

#[test]
fn searches_answer_with_results_or_backend_errors() {
    let backend = Arc::new(FakeBackend::default());
    let engine = engine(&backend);

    engine.search(SearchQuery::Keyword("pizza".to_string()));
    let event = engine.recv_timeout(WAIT).expect("keyword event");
    let EngineEvent::SearchCompleted(SearchResult::Keyword { keyword, count }) = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(keyword, "pizza");
    assert_eq!(count.ranked(), vec![("Me", 2)]);

    engine.search(SearchQuery::fuzzy("see you"));
    let event = engine.recv_timeout(WAIT).expect("fuzzy event");
    let EngineEvent::SearchFailed(error) = event else {
        panic!("unexpected event: {event:?}");
    };
    assert_eq!(error.user_message(), "No filtered messages found.");
}
