//! Logger setup for the chatscope binary.
//!
//! Log lines go to the terminal, to the configured log file (`./chatscope.log`
//! by default) or both; only the workspace's own target is recorded.

use engine_logging::engine_warn;

use super::config::LoadedConfig;

/// Installs the global logger, then reports what went wrong while reading the config.
pub(crate) fn initialize(loaded: &LoadedConfig) {
    let config = &loaded.config;
    engine_logging::initialize(
        config.log_output.into(),
        config.log_level.into(),
        &config.log_file,
    );
    for warning in &loaded.warnings {
        engine_warn!("{warning}");
        eprintln!("Warning: {warning}");
    }
}
