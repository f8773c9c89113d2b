//! Watcher feed
//!
//! Bounded in-process channel of live search snapshots for dashboards.
//! Delivery is best-effort: when the consumer lags, new snapshots are
//! dropped rather than blocking the search thread.

use std::sync::Mutex;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;

use crate::application::solvers::{SearchObserver, StepEvent};

/// Sparkline history length carried in each snapshot
const SPARKLINE_LEN: usize = 32;

/// One live view of a running search
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub best: f64,
    pub current: f64,
    pub rolling: f64,
    pub temp: f64,
    pub delta_best: f64,
    pub runtime_ms: u64,
    pub cumulative_acceptance: f64,
    pub windowed_acceptance: f64,
    pub history_sparkline: Vec<f64>,
}

struct WatcherState {
    started: Instant,
    steps: u64,
    accepted: u64,
    history: Vec<f64>,
}

/// Observer that publishes snapshots into a bounded channel
pub struct WatcherFeed {
    sender: Sender<Snapshot>,
    state: Mutex<WatcherState>,
}

/// Creates a watcher feed and its receiving end
///
/// # Arguments
///
/// * `capacity` - Channel bound; snapshots beyond it are dropped
pub fn watcher_channel(capacity: usize) -> (WatcherFeed, Receiver<Snapshot>) {
    let (sender, receiver) = bounded(capacity);
    (
        WatcherFeed {
            sender,
            state: Mutex::new(WatcherState {
                started: Instant::now(),
                steps: 0,
                accepted: 0,
                history: Vec::with_capacity(SPARKLINE_LEN),
            }),
        },
        receiver,
    )
}

impl SearchObserver for WatcherFeed {
    fn on_step(&self, event: &StepEvent) {
        let snapshot = {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(_) => return,
            };
            state.steps += 1;
            if event.accepted {
                state.accepted += 1;
            }
            if state.history.len() == SPARKLINE_LEN {
                state.history.remove(0);
            }
            state.history.push(event.best);

            Snapshot {
                best: event.best,
                current: event.current,
                rolling: event.rolling_mean,
                temp: event.temperature,
                delta_best: event.delta_best,
                runtime_ms: state.started.elapsed().as_millis() as u64,
                cumulative_acceptance: state.accepted as f64 / state.steps as f64,
                windowed_acceptance: event.acceptance_window,
                history_sparkline: state.history.clone(),
            }
        };

        // Non-blocking: a slow dashboard never stalls the search
        match self.sender.try_send(snapshot) {
            Ok(()) | Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
