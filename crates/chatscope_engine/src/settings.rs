use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5328/api";

/// Poll intervals outside this range still work but drift from what the backend expects.
pub const RECOMMENDED_POLL_INTERVAL: std::ops::RangeInclusive<Duration> =
    Duration::from_millis(2000)..=Duration::from_millis(2500);

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// `name=value` cookie that resumes an existing backend session.
    pub session_cookie: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            // Uploads of large exports go through the same client.
            request_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(2500),
            session_cookie: None,
        }
    }
}
