//! Chatscope engine: backend HTTP client, task polling and export IO.
mod backend;
mod engine;
mod persist;
mod poller;
mod settings;
mod types;
mod wire;

pub use backend::{Backend, ReqwestBackend};
pub use engine::EngineHandle;
pub use persist::{
    ensure_output_dir, kind_from_filename, load_export, read_export, ExportWriter, PersistError,
};
pub use poller::{PollControl, PollEvent, PollOutcome, PollSink, TaskPoller};
pub use settings::{BackendSettings, DEFAULT_BASE_URL, RECOMMENDED_POLL_INTERVAL};
pub use types::{ApiError, EngineEvent};
