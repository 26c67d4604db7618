use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use chatscope_core::{Task, TaskId, TaskKind};
use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::backend::Backend;
use crate::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// Every status fetched in one tick, in request order.
    Snapshot(Vec<Task>),
    /// A single status request failed; the task stays outstanding.
    TransientError { task_id: TaskId, error: ApiError },
}

pub trait PollSink: Send + Sync {
    fn emit(&self, event: PollEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every task reached a terminal status.
    Completed { ticks: u32 },
    /// Stopped from outside before the tasks settled.
    Stopped { ticks: u32 },
}

/// Shared handle used to stop a running poll or drop single tasks from it.
#[derive(Debug, Clone, Default)]
pub struct PollControl {
    stop: CancellationToken,
    excluded: Arc<Mutex<HashSet<TaskId>>>,
}

impl PollControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops polling `task_id` from the next tick on.
    pub fn exclude(&self, task_id: TaskId) {
        if let Ok(mut excluded) = self.excluded.lock() {
            excluded.insert(task_id);
        }
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    fn is_excluded(&self, task_id: &TaskId) -> bool {
        self.excluded
            .lock()
            .map(|excluded| excluded.contains(task_id))
            .unwrap_or(false)
    }
}

pub struct TaskPoller {
    backend: Arc<dyn Backend>,
    interval: Duration,
}

impl TaskPoller {
    pub fn new(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        Self { backend, interval }
    }

    /// Polls `task_ids` until all are terminal or `control` is stopped.
    ///
    /// The first request goes out one interval after the call. Each tick
    /// queries every outstanding task concurrently and emits one
    /// [`PollEvent::Snapshot`] with the results that arrived; failed requests
    /// are reported individually and retried on the next tick.
    pub async fn run(
        &self,
        kind: TaskKind,
        task_ids: Vec<TaskId>,
        control: &PollControl,
        sink: &dyn PollSink,
    ) -> PollOutcome {
        let mut outstanding: Vec<TaskId> = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            if !outstanding.contains(&task_id) {
                outstanding.push(task_id);
            }
        }
        engine_info!("Polling {} {kind} task(s)", outstanding.len());

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u32;

        loop {
            outstanding.retain(|task_id| !control.is_excluded(task_id));
            if outstanding.is_empty() {
                engine_info!("Polling finished after {ticks} tick(s)");
                return PollOutcome::Completed { ticks };
            }

            tokio::select! {
                _ = control.stop.cancelled() => {
                    engine_debug!("Polling stopped after {ticks} tick(s)");
                    return PollOutcome::Stopped { ticks };
                }
                _ = ticker.tick() => {}
            }
            ticks += 1;

            outstanding.retain(|task_id| !control.is_excluded(task_id));
            let requests = outstanding
                .iter()
                .map(|task_id| self.backend.task_status(task_id, kind));
            let responses = join_all(requests).await;

            // A stop that landed mid-request must not leak a stale snapshot.
            if control.is_stopped() {
                return PollOutcome::Stopped { ticks };
            }

            let mut snapshot = Vec::with_capacity(responses.len());
            let mut still_outstanding = Vec::with_capacity(outstanding.len());
            for (task_id, response) in outstanding.drain(..).zip(responses) {
                match response {
                    Ok(task) => {
                        if !task.is_terminal() {
                            still_outstanding.push(task_id);
                        }
                        snapshot.push(task);
                    }
                    Err(error) => {
                        engine_warn!("Status request for task {task_id} failed: {error}");
                        sink.emit(PollEvent::TransientError {
                            task_id: task_id.clone(),
                            error,
                        });
                        still_outstanding.push(task_id);
                    }
                }
            }
            outstanding = still_outstanding;

            if !snapshot.is_empty() {
                sink.emit(PollEvent::Snapshot(snapshot));
            }
        }
    }
}
