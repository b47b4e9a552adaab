//! Periodic extract -> reduce -> publish loop
//!
//! One tokio task owns the cycle, so cycles can never overlap: a tick that
//! comes due while a slow publish is still running is delayed, not run in
//! parallel. Snapshots therefore reach the publisher in tick order.
//!
//! Lifecycle: `Idle -> Ticking -> Extracting -> Reducing -> Publishing -> Idle`,
//! ending in `Stopped`. Once a cycle reaches `Extracting` it always runs to
//! completion; `stop()` only prevents the next one from starting.

use crate::buffer::SampleBuffer;
use crate::constants::aggregation::DEFAULT_INTERVAL_MS;
use crate::publish::Publisher;
use crate::snapshot::Snapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Phase of the scheduler loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// Tick fired, cycle not yet committed
    Ticking,
    /// Taking the buffer contents
    Extracting,
    /// Averaging each user's samples
    Reducing,
    /// Handing the snapshot to the publisher
    Publishing,
    /// Loop has exited; no further cycles
    Stopped,
}

impl SchedulerState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ticking => "ticking",
            Self::Extracting => "extracting",
            Self::Reducing => "reducing",
            Self::Publishing => "publishing",
            Self::Stopped => "stopped",
        }
    }

    /// Check if a committed cycle is running
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Extracting | Self::Reducing | Self::Publishing)
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Time between ticks; the first tick fires one interval after start
    pub interval: Duration,
    /// Publish whatever is still buffered once after `stop()`
    pub flush_on_stop: bool,
}

impl SchedulerConfig {
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            flush_on_stop: false,
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: SchedulerState,
    stop_requested: bool,
}

/// State shared between the loop task and its handles
#[derive(Debug)]
struct Shared {
    lifecycle: Mutex<Lifecycle>,
    stop_tx: watch::Sender<bool>,
    published: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> SchedulerState {
        self.lock().state
    }

    fn set_state(&self, state: SchedulerState) {
        self.lock().state = state;
    }

    /// Move to `next` unless a stop has been requested
    fn advance_unless_stopped(&self, next: SchedulerState) -> bool {
        let mut lifecycle = self.lock();
        if lifecycle.stop_requested {
            return false;
        }
        lifecycle.state = next;
        true
    }

    fn request_stop(&self) -> bool {
        let first = {
            let mut lifecycle = self.lock();
            !std::mem::replace(&mut lifecycle.stop_requested, true)
        };
        // Wake the loop if it is waiting for the next tick
        self.stop_tx.send_replace(true);
        first
    }
}

/// Cloneable control surface for a running scheduler
///
/// Safe to use from any thread or task, including synchronous code.
#[derive(Debug, Clone)]
pub struct SchedulerControl {
    shared: Arc<Shared>,
}

impl SchedulerControl {
    /// Stop future ticks
    ///
    /// Idempotent. After this returns no new cycle starts; a cycle already
    /// extracting, reducing or publishing finishes and is published once.
    pub fn stop(&self) {
        if self.shared.request_stop() {
            info!(
                state = %self.shared.state(),
                "Stopping aggregation scheduler"
            );
        }
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Check if `stop()` has been called
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.shared.lock().stop_requested
    }

    /// Check if the loop has exited
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state() == SchedulerState::Stopped
    }

    /// Number of snapshots handed to the publisher (successful or not)
    #[must_use]
    pub fn snapshots_published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }

    /// Number of publish calls that returned an error
    #[must_use]
    pub fn publish_failures(&self) -> u64 {
        self.shared.failed.load(Ordering::Relaxed)
    }
}

/// Owner handle of a spawned scheduler loop
#[derive(Debug)]
pub struct SchedulerHandle {
    control: SchedulerControl,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// See [`SchedulerControl::stop`]
    pub fn stop(&self) {
        self.control.stop();
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.control.state()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.control.is_stopped()
    }

    #[must_use]
    pub fn snapshots_published(&self) -> u64 {
        self.control.snapshots_published()
    }

    #[must_use]
    pub fn publish_failures(&self) -> u64 {
        self.control.publish_failures()
    }

    /// Cloneable handle for stopping/inspecting from elsewhere
    #[must_use]
    pub fn control(&self) -> SchedulerControl {
        self.control.clone()
    }

    /// Wait for the loop task to exit
    ///
    /// Does not stop the loop by itself; call `stop()` first or use `shutdown()`.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Aggregation scheduler task failed: {}", e);
        }
    }

    /// Stop and wait for any in-flight cycle to finish
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}

/// Periodic aggregation loop over a shared buffer
pub struct Scheduler {
    buffer: Arc<SampleBuffer>,
    publisher: Arc<dyn Publisher>,
    config: SchedulerConfig,
    shared: Arc<Shared>,
    sequence: u64,
}

impl Scheduler {
    /// Spawn the loop on the current tokio runtime
    ///
    /// # Panics
    /// Panics if `config.interval` is zero (tokio rejects zero-period
    /// intervals); configuration validation refuses such values earlier.
    #[must_use]
    pub fn spawn(
        buffer: Arc<SampleBuffer>,
        config: SchedulerConfig,
        publisher: Arc<dyn Publisher>,
    ) -> SchedulerHandle {
        assert!(
            !config.interval.is_zero(),
            "aggregation interval must be non-zero"
        );
        let (stop_tx, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            lifecycle: Mutex::new(Lifecycle {
                state: SchedulerState::Idle,
                stop_requested: false,
            }),
            stop_tx,
            published: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let scheduler = Self {
            buffer,
            publisher,
            config,
            shared: Arc::clone(&shared),
            sequence: 0,
        };

        let task = tokio::spawn(scheduler.run());
        SchedulerHandle {
            control: SchedulerControl { shared },
            task,
        }
    }

    async fn run(mut self) {
        let period = self.config.interval;
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stop_rx = self.shared.stop_tx.subscribe();

        info!(
            interval_ms = period.as_millis() as u64,
            publisher = %self.publisher.name(),
            "Aggregation scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.wait_for(|stopped| *stopped) => break,
                _ = interval.tick() => {}
            }

            if !self.shared.advance_unless_stopped(SchedulerState::Ticking) {
                break;
            }
            // Committing to Extracting is the point of no return for this cycle
            if !self.shared.advance_unless_stopped(SchedulerState::Extracting) {
                break;
            }
            self.run_cycle().await;

            if !self.shared.advance_unless_stopped(SchedulerState::Idle) {
                break;
            }
        }

        if self.config.flush_on_stop {
            self.flush_remaining().await;
        }

        self.shared.set_state(SchedulerState::Stopped);
        info!(
            snapshots = self.shared.published.load(Ordering::Relaxed),
            "Aggregation scheduler stopped"
        );
    }

    /// Extract, reduce and publish one snapshot
    async fn run_cycle(&mut self) {
        let extraction = self.buffer.extract_and_clear();

        self.shared.set_state(SchedulerState::Reducing);
        self.sequence += 1;
        let snapshot = Snapshot::from_extraction(self.sequence, extraction);

        self.shared.set_state(SchedulerState::Publishing);
        self.publish(&snapshot).await;
    }

    async fn publish(&self, snapshot: &Snapshot) {
        debug!(
            sequence = snapshot.sequence,
            users = snapshot.len(),
            samples = snapshot.sample_count,
            "Publishing snapshot"
        );

        let result = self.publisher.publish(snapshot).await;
        self.shared.published.fetch_add(1, Ordering::Relaxed);

        // Log and carry on: a failing consumer must not stall the cadence
        if let Err(e) = result {
            self.shared.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                publisher = %self.publisher.name(),
                sequence = snapshot.sequence,
                "Failed to publish snapshot: {:#}",
                e
            );
        }
    }

    /// Publish samples still buffered at shutdown, if there are any
    async fn flush_remaining(&mut self) {
        self.shared.set_state(SchedulerState::Extracting);
        let extraction = self.buffer.extract_and_clear();
        if extraction.is_empty() {
            return;
        }

        self.shared.set_state(SchedulerState::Reducing);
        self.sequence += 1;
        let snapshot = Snapshot::from_extraction(self.sequence, extraction);

        self.shared.set_state(SchedulerState::Publishing);
        info!(
            sequence = snapshot.sequence,
            users = snapshot.len(),
            "Flushing buffered samples on shutdown"
        );
        self.publish(&snapshot).await;
    }
}
