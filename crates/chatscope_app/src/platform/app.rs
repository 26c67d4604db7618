use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use chatscope_core::{update, AppState, AppViewModel, Msg, WorkflowState};
use engine_logging::{engine_info, engine_warn};

use super::effects::{map_event, EffectRunner, ExportOutcome};

const EVENT_WAIT: Duration = Duration::from_millis(200);

/// Owns the client state and feeds it engine events until a phase settles.
pub(crate) struct Session {
    state: AppState,
    runner: EffectRunner,
    last_line: Option<String>,
}

impl Session {
    pub(crate) fn new(runner: EffectRunner) -> Self {
        Self {
            state: AppState::new(),
            runner,
            last_line: None,
        }
    }

    pub(crate) fn state(&self) -> &AppState {
        &self.state
    }

    pub(crate) fn runner(&self) -> &EffectRunner {
        &self.runner
    }

    pub(crate) fn dispatch(&mut self, msg: Msg) -> Vec<ExportOutcome> {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            if let Some(line) = status_line(&state.view()) {
                if self.last_line.as_ref() != Some(&line) {
                    println!("{line}");
                    self.last_line = Some(line);
                }
            }
        }
        self.state = state;
        self.runner.run(effects)
    }

    /// Pumps engine events until nothing is running or loading, then checks
    /// that the workflow ended up in `target`.
    pub(crate) fn settle(&mut self, target: WorkflowState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.state.workflow().is_busy() || self.state.is_loading() {
            if Instant::now() >= deadline {
                bail!(
                    "gave up waiting after {}s while {}",
                    timeout.as_secs(),
                    self.state.workflow().as_str()
                );
            }
            if let Some(event) = self.runner.engine().recv_timeout(EVENT_WAIT) {
                self.dispatch(map_event(event));
            }
        }

        if self.state.workflow() == target {
            engine_info!("Reached {}", target.as_str());
            return Ok(());
        }
        let reason = self
            .state
            .error()
            .map(str::to_string)
            .unwrap_or_else(|| format!("stopped in {}", self.state.workflow().as_str()));
        Err(anyhow!(reason))
    }

    /// Reports an error the state machine recorded without leaving the phase.
    pub(crate) fn warn_on_error(&self) {
        if let Some(error) = self.state.error() {
            engine_warn!("{error}");
            eprintln!("Warning: {error}");
        }
    }
}

/// One-line progress summary, or `None` when there is nothing to show.
pub(crate) fn status_line(view: &AppViewModel) -> Option<String> {
    let phase = view.workflow.as_str();
    if let Some(error) = &view.error {
        return Some(format!("[{phase}] error: {error}"));
    }
    if let Some(task) = &view.aggregated {
        if !task.status.is_terminal() {
            let stage = task.stage.as_deref().unwrap_or(task.status.as_str());
            let mut line = format!("[{phase}] {:>3.0}% {stage}", task.progress);
            if let Some(warning) = &view.poll_warning {
                line.push_str(&format!(" (retrying: {warning})"));
            }
            return Some(line);
        }
    }
    match view.workflow {
        WorkflowState::Processed if view.processed_count > 0 => Some(format!(
            "[{phase}] {} messages from {} senders",
            view.processed_count,
            view.available_senders.len()
        )),
        WorkflowState::Filtered => Some(format!(
            "[{phase}] {} messages kept",
            view.filtered_count
        )),
        WorkflowState::Analyzed => Some(format!(
            "[{phase}] report with {} modules",
            view.report_modules.len()
        )),
        _ => None,
    }
}
