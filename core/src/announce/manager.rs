//! Periodic presence announce scheduling
//!
//! One background task per manager decides when the node broadcasts its
//! presence. The wait between announces is the configured interval plus one
//! hour of random jitter in either direction, so a mesh full of nodes sharing
//! the same configured interval does not light up in lockstep. The task waits
//! on a merged set of inputs (settings changes, network-change stamps, explicit
//! resets) and restarts its deadline whenever any of them fires.

use crate::announce::transport::AnnounceTransport;
use crate::identity::IdentityKeys;
use crate::settings::SettingsRepository;
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Bounds on the effective delay, applied after jitter
const MIN_DELAY_HOURS: i64 = 1;
const MAX_DELAY_HOURS: i64 = 12;

/// Schedules periodic presence announces for the active identity.
///
/// Lifecycle: `start()` spawns the timer loop; calling it again while running
/// restarts the loop with a fresh randomized deadline rather than stacking a
/// second one. `stop()` cancels the loop at its next suspension point and is
/// safe to call at any time, including before the first `start()`.
pub struct AutoAnnounceManager {
    settings: Arc<SettingsRepository>,
    identity: watch::Receiver<Option<IdentityKeys>>,
    transport: Arc<dyn AnnounceTransport>,
    reset_signal: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoAnnounceManager {
    pub fn new(
        settings: Arc<SettingsRepository>,
        identity: watch::Receiver<Option<IdentityKeys>>,
        transport: Arc<dyn AnnounceTransport>,
    ) -> Self {
        Self {
            settings,
            identity,
            transport,
            reset_signal: Arc::new(Notify::new()),
            task: Mutex::new(None),
        }
    }

    /// Start (or restart) the timer loop. Must be called from within a tokio
    /// runtime.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
            debug!("restarting announce timer loop");
        }

        let timer = TimerLoop {
            settings: self.settings.clone(),
            enabled: self.settings.auto_announce_enabled(),
            interval_hours: self.settings.auto_announce_interval_hours(),
            network_change: self.settings.network_change_announce_time(),
            identity: self.identity.clone(),
            transport: self.transport.clone(),
            reset_signal: self.reset_signal.clone(),
        };
        *task = Some(tokio::spawn(timer.run()));
        info!("auto-announce scheduler started");
    }

    /// Cancel the timer loop and any wait or announce in flight. Idempotent.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("auto-announce scheduler stopped");
        }
    }

    /// Abandon the pending wait and recompute a fresh randomized delay from
    /// the current settings. Rapid calls coalesce; only the last restart's
    /// deadline matters.
    pub fn reset_timer(&self) {
        self.reset_signal.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AutoAnnounceManager {
    fn drop(&mut self) {
        self.stop();
    }
}

enum WaitOutcome {
    /// The deadline passed with no interruption
    Elapsed,
    /// An input fired; recompute the delay from current settings
    Restarted,
    /// Every input stream closed; nothing left to schedule against
    SourcesClosed,
}

struct TimerLoop {
    settings: Arc<SettingsRepository>,
    enabled: watch::Receiver<bool>,
    interval_hours: watch::Receiver<i64>,
    network_change: watch::Receiver<Option<i64>>,
    identity: watch::Receiver<Option<IdentityKeys>>,
    transport: Arc<dyn AnnounceTransport>,
    reset_signal: Arc<Notify>,
}

impl TimerLoop {
    async fn run(mut self) {
        // A reset sent while no loop was listening is stale, not a wakeup
        let _ = self.reset_signal.notified().now_or_never();
        // The persisted network-change stamp predates this loop; only fresh
        // writes count as a signal
        self.network_change.mark_unchanged();

        loop {
            let configured = *self.interval_hours.borrow();
            let delay_hours = randomized_delay_hours(configured);
            let deadline = Instant::now() + Duration::from_secs(delay_hours as u64 * 3600);
            debug!(configured, delay_hours, "next announce scheduled");

            match self.wait(deadline).await {
                WaitOutcome::Elapsed => self.fire().await,
                WaitOutcome::Restarted => continue,
                WaitOutcome::SourcesClosed => {
                    info!("announce inputs closed; timer loop exiting");
                    break;
                }
            }
        }
    }

    /// Wait until the deadline, a reset, or a scheduling-relevant settings
    /// change, whichever comes first.
    async fn wait(&mut self, deadline: Instant) -> WaitOutcome {
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return WaitOutcome::Elapsed,
                _ = self.reset_signal.notified() => {
                    debug!("announce timer reset");
                    return WaitOutcome::Restarted;
                }
                changed = self.enabled.changed() => match changed {
                    Ok(()) => {
                        debug!(enabled = *self.enabled.borrow(), "auto-announce toggled");
                        return WaitOutcome::Restarted;
                    }
                    Err(_) => return WaitOutcome::SourcesClosed,
                },
                changed = self.interval_hours.changed() => match changed {
                    Ok(()) => {
                        debug!(hours = *self.interval_hours.borrow(), "announce interval changed");
                        return WaitOutcome::Restarted;
                    }
                    Err(_) => return WaitOutcome::SourcesClosed,
                },
                changed = self.network_change.changed() => match changed {
                    Ok(()) => {
                        // A concrete stamp means the service already announced
                        // for a topology change; None is just the cleared marker
                        if self.network_change.borrow_and_update().is_some() {
                            debug!("network change announce observed");
                            return WaitOutcome::Restarted;
                        }
                    }
                    Err(_) => return WaitOutcome::SourcesClosed,
                },
            }
        }
    }

    /// One elapsed cycle. Enabled state and identity presence are sampled now,
    /// not when the wait started, since either can flip mid-wait.
    async fn fire(&mut self) {
        if !*self.enabled.borrow() {
            debug!("auto-announce disabled at fire time, skipping");
            return;
        }

        let identity = self.identity.borrow().clone();
        let Some(identity) = identity else {
            debug!("no active identity, skipping announce");
            return;
        };

        debug!(destination = %identity.destination_hash_hex(), "broadcasting presence");
        if let Err(e) = self.transport.broadcast_presence(&identity).await {
            warn!(error = %e, "presence announce failed");
        }

        // Recorded for success and failure alike: observers in other processes
        // track when the cycle ran, not whether the mesh accepted it
        if let Err(e) = self.settings.set_last_auto_announce_time(now_millis()) {
            warn!(error = %e, "failed to record announce time");
        }
    }
}

/// Effective delay before the next announce attempt: the configured interval
/// plus uniform jitter from {-1, 0, +1} hours, clamped to [1, 12]. Recomputed
/// at the start of every wait.
fn randomized_delay_hours(configured_hours: i64) -> i64 {
    use rand::Rng;
    let jitter = rand::thread_rng().gen_range(-1..=1);
    configured_hours
        .saturating_add(jitter)
        .clamp(MIN_DELAY_HOURS, MAX_DELAY_HOURS)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
