//! Per-session change detection by polling.
//!
//! Each session gets one task that produces a snapshot on a fixed interval
//! and pushes it to the connection when it differs from the last pushed
//! value. The first snapshot is always pushed.

use super::Connection;
use crate::snapshot::{Snapshot, SnapshotSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The last value a session pushed (or acknowledged).
///
/// A tick holds the lock for its whole produce-compare-record step, so
/// writers that go through [`Baseline::lock`] never interleave with one.
#[derive(Debug, Clone, Default)]
pub struct Baseline(Arc<Mutex<Option<Snapshot>>>);

impl Baseline {
    pub async fn lock(&self) -> MutexGuard<'_, Option<Snapshot>> {
        self.0.lock().await
    }

    /// Record `snapshot` as already seen by the client.
    pub async fn acknowledge(&self, snapshot: Snapshot) {
        *self.0.lock().await = Some(snapshot);
    }

    pub async fn current(&self) -> Option<Snapshot> {
        self.0.lock().await.clone()
    }
}

/// Cancellation handle for a running poll task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    baseline: Baseline,
    stopped: bool,
}

impl PollHandle {
    /// Stop further ticks. Returns `true` only for the call that stopped
    /// the task.
    pub fn cancel(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.stopped
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline.clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct Poller;

impl Poller {
    /// Spawn the poll task for one session.
    pub fn start(
        source: Arc<dyn SnapshotSource>,
        connection: Connection,
        every: Duration,
    ) -> PollHandle {
        let token = CancellationToken::new();
        let baseline = Baseline::default();

        tokio::spawn(run(
            source,
            connection,
            every,
            baseline.clone(),
            token.clone(),
        ));

        PollHandle {
            token,
            baseline,
            stopped: false,
        }
    }
}

async fn run(
    source: Arc<dyn SnapshotSource>,
    connection: Connection,
    every: Duration,
    baseline: Baseline,
    token: CancellationToken,
) {
    let target = source.describe();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut first = true;

    loop {
        // The first tick completes immediately
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let payload = {
            let mut last = baseline.lock().await;
            let current = produce(source.as_ref(), &target).await;
            let unchanged = !first && last.as_ref().is_some_and(|prev| prev.same_as(&current));
            if unchanged {
                None
            } else {
                let payload = current.to_payload();
                *last = Some(current);
                Some(payload)
            }
        };
        first = false;

        let Some(payload) = payload else {
            trace!(target = %target, "No change");
            continue;
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target = %target, "Failed to encode snapshot: {}", e);
                continue;
            }
        };

        // A cancelled session discards whatever it computed
        if token.is_cancelled() {
            break;
        }
        if !connection.push(payload).await {
            debug!(conn_id = %connection.id(), "Connection closed, stopping poller");
            break;
        }
        debug!(conn_id = %connection.id(), target = %target, "Pushed snapshot");
    }

    debug!(conn_id = %connection.id(), target = %target, "Poller stopped");
}

/// Produce a snapshot, substituting a diagnostic text on failure.
async fn produce(source: &dyn SnapshotSource, target: &str) -> Snapshot {
    match source.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!(target = %target, "Snapshot failed: {}", e);
            Snapshot::Text(placeholder(target, &e))
        }
    }
}

/// Diagnostic payload pushed in place of a snapshot that could not be read.
pub fn placeholder(target: &str, error: &dyn std::fmt::Display) -> String {
    format!("Error reading {}: {}", target, error)
}
