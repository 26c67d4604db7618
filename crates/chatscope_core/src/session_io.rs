//! JSON export and import of session data, used for manual session restore.
use std::fmt;

use thiserror::Error;

use crate::{AnalysisReport, FilteredData, ProcessedData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataKind {
    Processed,
    Filtered,
    Report,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Processed, DataKind::Filtered, DataKind::Report];

    pub fn default_filename(self) -> &'static str {
        match self {
            DataKind::Processed => "processed_messages.json",
            DataKind::Filtered => "filtered_messages.json",
            DataKind::Report => "analysis_report.json",
        }
    }

    /// Path segment under the backend's `/data` route.
    pub fn endpoint(self) -> &'static str {
        match self {
            DataKind::Processed => "processed",
            DataKind::Filtered => "filtered",
            DataKind::Report => "report",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Processed => f.write_str("processed messages"),
            DataKind::Filtered => f.write_str("filtered messages"),
            DataKind::Report => f.write_str("analysis report"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{kind} file is not valid: {source}")]
    Parse {
        kind: DataKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} file contains no data")]
    Empty(DataKind),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no {0} in the current session")]
    Missing(DataKind),
    #[error("failed to serialize {kind}: {source}")]
    Serialize {
        kind: DataKind,
        #[source]
        source: serde_json::Error,
    },
}

/// One exportable piece of session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionData {
    Processed(ProcessedData),
    Filtered(FilteredData),
    Report(AnalysisReport),
}

impl SessionData {
    pub fn kind(&self) -> DataKind {
        match self {
            SessionData::Processed(_) => DataKind::Processed,
            SessionData::Filtered(_) => DataKind::Filtered,
            SessionData::Report(_) => DataKind::Report,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SessionData::Processed(data) => data.is_empty(),
            SessionData::Filtered(data) => data.is_empty(),
            SessionData::Report(report) => report.is_empty(),
        }
    }

    /// Pretty JSON with two-space indentation.
    pub fn to_json(&self) -> Result<String, ExportError> {
        let kind = self.kind();
        let result = match self {
            SessionData::Processed(data) => serde_json::to_string_pretty(data),
            SessionData::Filtered(data) => serde_json::to_string_pretty(data),
            SessionData::Report(report) => serde_json::to_string_pretty(report),
        };
        result.map_err(|source| ExportError::Serialize { kind, source })
    }

    /// Parses an exported file; empty payloads are rejected so a restore
    /// never advances the workflow onto missing data.
    pub fn from_json(kind: DataKind, contents: &str) -> Result<Self, ImportError> {
        let data = Self::parse(kind, contents)?;
        if data.is_empty() {
            return Err(ImportError::Empty(kind));
        }
        Ok(data)
    }

    /// Parses `contents` as `kind`, accepting empty data.
    pub fn parse(kind: DataKind, contents: &str) -> Result<Self, ImportError> {
        let parse_err = |source: serde_json::Error| ImportError::Parse { kind, source };
        let data = match kind {
            DataKind::Processed => {
                SessionData::Processed(serde_json::from_str(contents).map_err(parse_err)?)
            }
            DataKind::Filtered => {
                SessionData::Filtered(serde_json::from_str(contents).map_err(parse_err)?)
            }
            DataKind::Report => {
                SessionData::Report(serde_json::from_str(contents).map_err(parse_err)?)
            }
        };
        Ok(data)
    }
}
