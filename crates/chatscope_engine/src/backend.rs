use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use chatscope_core::{
    DataKind, FilterConfig, FuzzyMatches, KeywordCount, SelectedFile, SessionData, Task, TaskId,
    TaskKind,
};
use engine_logging::{engine_debug, engine_info};

use crate::settings::BackendSettings;
use crate::wire::{ErrorBody, MessageBody, RawTask, SessionTasks};
use crate::ApiError;

/// The remote analysis backend, one method per endpoint the client uses.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Uploads one chat export; the returned task tracks its processing.
    async fn process_file(&self, file: &SelectedFile) -> Result<Task, ApiError>;

    async fn task_status(&self, task_id: &TaskId, kind: TaskKind) -> Result<Task, ApiError>;

    async fn session_tasks(&self) -> Result<Vec<Task>, ApiError>;

    async fn cancel_task(&self, task_id: &TaskId) -> Result<String, ApiError>;

    /// Synchronous on the backend side; no task is created.
    async fn apply_filter(&self, config: &FilterConfig) -> Result<String, ApiError>;

    async fn start_analysis(&self, modules: Option<&[String]>) -> Result<Task, ApiError>;

    async fn fetch_data(&self, kind: DataKind) -> Result<SessionData, ApiError>;

    async fn clear_session(&self) -> Result<String, ApiError>;

    /// Counts whole-word matches of `keyword` in the session's filtered messages.
    async fn count_keyword(&self, keyword: &str) -> Result<KeywordCount, ApiError>;

    async fn fuzzy_search(&self, query: &str, cutoff: u8) -> Result<FuzzyMatches, ApiError>;

    /// Cookie identifying the backend session, once the backend has set one.
    fn session_cookie(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    base_url: Url,
    cookies: Arc<Jar>,
}

impl ReqwestBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, ApiError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", settings.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(settings.base_url.clone()));
        }

        // The backend keys its session on a cookie, so the jar must persist across calls.
        let cookies = Arc::new(Jar::default());
        if let Some(cookie) = settings.session_cookie.as_deref() {
            cookies.add_cookie_str(cookie, &base_url);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .cookie_provider(cookies.clone())
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            cookies,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let body = self.send_text(request).await?;
        serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn send_text(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn process_file(&self, file: &SelectedFile) -> Result<Task, ApiError> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|err| ApiError::ReadFile {
                path: file.path.display().to_string(),
                message: err.to_string(),
            })?;
        engine_info!(
            "Uploading {} ({} bytes)",
            file.file_name(),
            bytes.len()
        );

        let part = Part::bytes(bytes).file_name(file.file_name());
        let form = Form::new().part("file", part);
        let url = self.endpoint(&["process"])?;
        let raw: RawTask = self.send(self.client.post(url).multipart(form)).await?;
        Ok(raw.into_task(TaskKind::Upload))
    }

    async fn task_status(&self, task_id: &TaskId, kind: TaskKind) -> Result<Task, ApiError> {
        let url = self.endpoint(&["tasks", "status", task_id.as_str()])?;
        let raw: RawTask = self.send(self.client.get(url)).await?;
        let task = raw.into_task(kind);
        engine_debug!(
            "Task {} is {} at {:.1}",
            task.task_id,
            task.status,
            task.normalized_progress()
        );
        Ok(task)
    }

    async fn session_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let url = self.endpoint(&["tasks", "session"])?;
        let listing: SessionTasks = self.send(self.client.get(url)).await?;
        Ok(listing
            .tasks
            .into_iter()
            .map(|raw| {
                let kind = raw.inferred_kind();
                raw.into_task(kind)
            })
            .collect())
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<String, ApiError> {
        let url = self.endpoint(&["tasks", "cancel", task_id.as_str()])?;
        let body: MessageBody = self.send(self.client.post(url)).await?;
        Ok(body.message)
    }

    async fn apply_filter(&self, config: &FilterConfig) -> Result<String, ApiError> {
        let url = self.endpoint(&["filter"])?;
        let body: MessageBody = self.send(self.client.post(url).json(config)).await?;
        Ok(body.message)
    }

    async fn start_analysis(&self, modules: Option<&[String]>) -> Result<Task, ApiError> {
        let url = self.endpoint(&["analyze"])?;
        let payload = json!({ "modules_to_run": modules });
        let raw: RawTask = self.send(self.client.post(url).json(&payload)).await?;
        Ok(raw.into_task(TaskKind::Analysis))
    }

    async fn fetch_data(&self, kind: DataKind) -> Result<SessionData, ApiError> {
        let url = self.endpoint(&["data", kind.endpoint()])?;
        let body = self.send_text(self.client.get(url)).await?;
        SessionData::parse(kind, &body).map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn clear_session(&self) -> Result<String, ApiError> {
        let url = self.endpoint(&["tasks", "session", "clear"])?;
        let body: MessageBody = self.send(self.client.post(url)).await?;
        Ok(body.message)
    }

    async fn count_keyword(&self, keyword: &str) -> Result<KeywordCount, ApiError> {
        let url = self.endpoint(&["count_keyword"])?;
        let payload = json!({ "keyword": keyword });
        self.send(self.client.post(url).json(&payload)).await
    }

    async fn fuzzy_search(&self, query: &str, cutoff: u8) -> Result<FuzzyMatches, ApiError> {
        let url = self.endpoint(&["fuzzy"])?;
        let payload = json!({ "query": query, "cutoff": cutoff });
        let found: FuzzyMatches = self.send(self.client.post(url).json(&payload)).await?;
        engine_debug!(
            "{} of {} messages matched `{query}`",
            found.match_count,
            found.total_messages_searched
        );
        Ok(found)
    }

    fn session_cookie(&self) -> Option<String> {
        let header = self.cookies.cookies(&self.base_url)?;
        header.to_str().ok().map(str::to_string)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(err.to_string());
    }
    ApiError::Network(err.to_string())
}
