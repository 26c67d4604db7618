//! `chatscope.ron` loading.
//!
//! A missing file means defaults. A malformed file also means defaults, plus a
//! warning the caller logs once the logger is up.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatscope_engine::{BackendSettings, DEFAULT_BASE_URL};
use chrono::{DateTime, Utc};
use engine_logging::LogDestination;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_FILENAME: &str = "chatscope.ron";
pub(crate) const BASE_URL_ENV: &str = "CHATSCOPE_BASE_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum LogOutput {
    File,
    Terminal,
    Both,
}

impl From<LogOutput> for LogDestination {
    fn from(output: LogOutput) -> Self {
        match output {
            LogOutput::File => LogDestination::File,
            LogOutput::Terminal => LogDestination::Terminal,
            LogOutput::Both => LogDestination::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Upper bound on how long `run` waits for one workflow phase.
    pub phase_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub log_output: LogOutput,
    pub log_level: LogLevel,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let backend = BackendSettings::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: backend.connect_timeout.as_secs(),
            request_timeout_secs: backend.request_timeout.as_secs(),
            poll_interval_ms: backend.poll_interval.as_millis() as u64,
            phase_timeout_secs: 60 * 60,
            output_dir: PathBuf::from("output"),
            log_output: LogOutput::File,
            log_level: LogLevel::Info,
            log_file: PathBuf::from("chatscope.log"),
        }
    }
}

/// Config plus anything worth warning about while reading it.
#[derive(Debug)]
pub(crate) struct LoadedConfig {
    pub config: AppConfig,
    pub warnings: Vec<String>,
}

impl AppConfig {
    /// Reads `explicit`, or `./chatscope.ron` when no path was given.
    pub(crate) fn load(explicit: Option<&Path>) -> LoadedConfig {
        let path = explicit.map_or_else(|| PathBuf::from(CONFIG_FILENAME), Path::to_path_buf);
        let mut warnings = Vec::new();

        let config = match fs::read_to_string(&path) {
            Ok(text) => match ron::from_str::<AppConfig>(&text) {
                Ok(config) => config,
                Err(err) => {
                    warnings.push(format!(
                        "Ignoring malformed config {}: {err}",
                        path.display()
                    ));
                    AppConfig::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if explicit.is_some() {
                    warnings.push(format!("Config file {} not found", path.display()));
                }
                AppConfig::default()
            }
            Err(err) => {
                warnings.push(format!("Could not read config {}: {err}", path.display()));
                AppConfig::default()
            }
        };

        LoadedConfig { config, warnings }
    }

    /// Applies the environment override, then the command line one.
    pub(crate) fn with_overrides(
        mut self,
        env_lookup: impl Fn(&str) -> Option<String>,
        cli_base_url: Option<&str>,
    ) -> Self {
        if let Some(url) = env_lookup(BASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(url) = cli_base_url {
            self.base_url = url.to_string();
        }
        self
    }

    pub(crate) fn backend_settings(&self, session_cookie: Option<String>) -> BackendSettings {
        BackendSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            session_cookie,
        }
    }

    pub(crate) fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }

    /// Per-run export directory, e.g. `output/run-20250301-101500`.
    pub(crate) fn run_dir(&self, started: DateTime<Utc>) -> PathBuf {
        self.output_dir
            .join(format!("run-{}", started.format("%Y%m%d-%H%M%S")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_explicit_file_warns_and_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let loaded = AppConfig::load(Some(temp.path().join("absent.ron").as_path()));
        assert_eq!(loaded.config, AppConfig::default());
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"(base_url: "http://backend:5328/api", poll_interval_ms: 2000, log_output: Both)"#,
        )
        .unwrap();

        let loaded = AppConfig::load(Some(path.as_path()));
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.config.base_url, "http://backend:5328/api");
        assert_eq!(loaded.config.poll_interval_ms, 2000);
        assert_eq!(loaded.config.log_output, LogOutput::Both);
        assert_eq!(loaded.config.request_timeout_secs, 120);
    }

    #[test]
    fn malformed_file_warns_and_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "(base_url: 42").unwrap();

        let loaded = AppConfig::load(Some(path.as_path()));
        assert_eq!(loaded.config, AppConfig::default());
        assert!(loaded.warnings[0].starts_with("Ignoring malformed config"));
    }

    #[test]
    fn command_line_beats_environment() {
        let env = |name: &str| (name == BASE_URL_ENV).then(|| "http://env/api".to_string());

        let from_env = AppConfig::default().with_overrides(env, None);
        assert_eq!(from_env.base_url, "http://env/api");

        let from_cli = AppConfig::default().with_overrides(env, Some("http://cli/api"));
        assert_eq!(from_cli.base_url, "http://cli/api");
    }

    #[test]
    fn backend_settings_carry_timeouts_and_cookie() {
        let settings = AppConfig::default().backend_settings(Some("session=x".to_string()));
        assert_eq!(settings.poll_interval, Duration::from_millis(2500));
        assert_eq!(settings.request_timeout, Duration::from_secs(120));
        assert_eq!(settings.session_cookie.as_deref(), Some("session=x"));
    }

    #[test]
    fn run_dir_is_timestamped() {
        let started = Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 0).unwrap();
        assert_eq!(
            AppConfig::default().run_dir(started),
            PathBuf::from("output").join("run-20250301-101500")
        );
    }
}
