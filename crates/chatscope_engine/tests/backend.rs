use std::fs;
use std::time::Duration;

use chatscope_core::{DataKind, FilterConfig, SelectedFile, SessionData, TaskId, TaskKind, TaskStatus};
use chatscope_engine::{ApiError, Backend, BackendSettings, ReqwestBackend};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> ReqwestBackend {
    let settings = BackendSettings {
        base_url: format!("{}/api", server.uri()),
        ..BackendSettings::default()
    };
    ReqwestBackend::new(&settings).unwrap()
}

#[tokio::test]
async fn process_file_uploads_and_returns_pending_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/process"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "File processing started",
            "task_id": "up-1",
            "session_id": "s"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let export = temp.path().join("chat.json");
    fs::write(&export, r#"{"messages": []}"#).unwrap();

    let backend = backend_for(&server);
    let task = backend
        .process_file(&SelectedFile::new(&export, 16))
        .await
        .unwrap();

    assert_eq!(task.task_id, TaskId::new("up-1"));
    assert_eq!(task.kind, TaskKind::Upload);
    assert_eq!(task.status, TaskStatus::Pending);
}

#[tokio::test]
async fn process_file_reports_missing_file_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend
        .process_file(&SelectedFile::new("/definitely/not/here.json", 1))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ReadFile { .. }));
}

#[tokio::test]
async fn error_body_message_is_shown_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/filter"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "No processed data found" })),
        )
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend
        .apply_filter(&FilterConfig::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::HttpStatus {
            status: 400,
            message: "No processed data found".to_string()
        }
    );
    assert_eq!(err.user_message(), "No processed data found");
}

#[tokio::test]
async fn error_without_body_falls_back_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/status/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend
        .task_status(&TaskId::new("gone"), TaskKind::Upload)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::HttpStatus {
            status: 404,
            message: "request failed with status 404".to_string()
        }
    );
}

#[tokio::test]
async fn task_status_decodes_completed_upload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/status/up-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": "up-1",
            "status": "completed",
            "progress": 100,
            "stage": "Done",
            "result": { "message": "ok", "unique_senders": ["Alice", "Bob"] }
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let task = backend
        .task_status(&TaskId::new("up-1"), TaskKind::Upload)
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.unwrap().unique_senders(), ["Alice", "Bob"]);
}

#[tokio::test]
async fn filter_posts_group_mappings_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/filter"))
        .and(body_json(json!({
            "group_mappings": { "Family": ["Mum"] },
            "remove": ["Spam"],
            "unassigned_label": "Other"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Filtered 3 messages" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = FilterConfig::default();
    config.assign("Mum", "Family");
    config.mark_removed("Spam");

    let backend = backend_for(&server);
    let message = backend.apply_filter(&config).await.unwrap();
    assert_eq!(message, "Filtered 3 messages");
}

#[tokio::test]
async fn analyze_sends_null_modules_to_run_everything() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analyze"))
        .and(body_json(json!({ "modules_to_run": null })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "Analysis started",
            "task_id": "an-1",
            "session_id": "s"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let task = backend.start_analysis(None).await.unwrap();
    assert_eq!(task.kind, TaskKind::Analysis);
    assert_eq!(task.task_id.as_str(), "an-1");
}

#[tokio::test]
async fn count_keyword_posts_keyword_and_decodes_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/count_keyword"))
        .and(body_json(json!({ "keyword": "pizza" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "counts": { "Family": 1, "Other": 4 },
            "total_matches": 5,
            "message_count": 120
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let count = backend.count_keyword("pizza").await.unwrap();
    assert_eq!(count.total_matches, 5);
    assert_eq!(count.message_count, 120);
    assert_eq!(count.ranked(), vec![("Other", 4), ("Family", 1)]);
}

#[tokio::test]
async fn fuzzy_search_sends_cutoff_and_keeps_match_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fuzzy"))
        .and(body_json(json!({ "query": "see you", "cutoff": 75 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                { "sender": "Family", "message": "see you soon", "source": "WhatsApp", "match_score": 100 },
                { "sender": "Other", "message": "see ya", "match_score": 77 }
            ],
            "match_count": 2,
            "total_messages_searched": 120,
            "query": "see you",
            "similarity_cutoff": 75
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let found = backend.fuzzy_search("see you", 75).await.unwrap();
    assert_eq!(found.match_count, 2);
    assert_eq!(found.similarity_cutoff, 75);
    let scored: Vec<(u64, &str)> = found
        .scored()
        .map(|(score, message)| (score, message.sender()))
        .collect();
    assert_eq!(scored, vec![(100, "Family"), (77, "Other")]);
    assert_eq!(found.matches[0].source(), Some("WhatsApp"));
}

#[tokio::test]
async fn search_without_filtered_data_surfaces_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/fuzzy"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "No filtered messages found. Please filter messages before searching."
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend.fuzzy_search("hello", 90).await.unwrap_err();
    assert_eq!(
        err.user_message(),
        "No filtered messages found. Please filter messages before searching."
    );
}

#[tokio::test]
async fn fetch_report_returns_session_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/data/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dataset_overview": { "total_messages": 12 }
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let data = backend.fetch_data(DataKind::Report).await.unwrap();
    let SessionData::Report(report) = data else {
        panic!("expected a report");
    };
    assert_eq!(report.modules().collect::<Vec<_>>(), ["dataset_overview"]);
}

#[tokio::test]
async fn session_cookie_is_replayed_on_later_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analyze"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Set-Cookie", "session=abc123; Path=/")
                .set_body_json(json!({ "task_id": "an-1", "message": "started" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/session"))
        .and(header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s",
            "tasks": [
                { "task_id": "an-1", "name": "run_analysis_worker", "status": "running", "progress": 0.5 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    backend.start_analysis(None).await.unwrap();
    assert_eq!(backend.session_cookie().as_deref(), Some("session=abc123"));

    let tasks = backend.session_tasks().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Analysis);
    assert_eq!(tasks[0].normalized_progress(), 50.0);
}

#[tokio::test]
async fn configured_session_cookie_resumes_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks/session/clear"))
        .and(header("cookie", "session=resume"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": "Session cleared" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let settings = BackendSettings {
        base_url: format!("{}/api", server.uri()),
        session_cookie: Some("session=resume".to_string()),
        ..BackendSettings::default()
    };
    let backend = ReqwestBackend::new(&settings).unwrap();
    assert_eq!(backend.clear_session().await.unwrap(), "Session cleared");
}

#[tokio::test]
async fn slow_backend_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks/cancel/t1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({ "message": "cancelled" })),
        )
        .mount(&server)
        .await;

    let settings = BackendSettings {
        base_url: format!("{}/api", server.uri()),
        request_timeout: Duration::from_millis(50),
        ..BackendSettings::default()
    };
    let backend = ReqwestBackend::new(&settings).unwrap();
    let err = backend.cancel_task(&TaskId::new("t1")).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout(_)));
}

#[test]
fn rejects_unparseable_base_url() {
    let settings = BackendSettings {
        base_url: "not a url".to_string(),
        ..BackendSettings::default()
    };
    assert!(matches!(
        ReqwestBackend::new(&settings),
        Err(ApiError::InvalidUrl(_))
    ));
}
