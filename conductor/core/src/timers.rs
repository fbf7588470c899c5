//! Phase-scoped timers and fetches
//!
//! Every suspension a phase starts (presentation delay, countdown, reveal
//! delay, sudden-death delay, detail fetch) is a spawned task registered
//! here. Tasks report back through a single wakeup channel, tagged with the
//! [`PhaseToken`] they were started under. [`PhaseTimers::cancel_all`]
//! aborts everything at once and runs on every transition.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::catalog::{CatalogError, Entity, EntityRef};
use crate::round::PhaseToken;

/// One-shot phase delays
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alarm {
    /// Presenting -> Guessing
    PresentationElapsed,
    /// Leave the reveal
    RevealElapsed,
    /// End a sudden-death session
    SuddenDeath,
}

/// Something a phase task finished
#[derive(Debug)]
pub enum Wakeup {
    /// A delay elapsed
    Alarm {
        /// Token the alarm was scheduled under
        token: PhaseToken,
        /// Which delay
        alarm: Alarm,
    },
    /// One countdown second elapsed
    Tick {
        /// Token the countdown was started under
        token: PhaseToken,
    },
    /// A detail fetch resolved
    Fetched {
        /// Token the fetch was started under
        token: PhaseToken,
        /// What was requested
        reference: EntityRef,
        /// Detail, or why it couldn't be had
        result: Result<Entity, CatalogError>,
    },
}

impl Wakeup {
    /// Token the task was started under
    #[must_use]
    pub fn token(&self) -> PhaseToken {
        match self {
            Self::Alarm { token, .. } | Self::Tick { token } | Self::Fetched { token, .. } => {
                *token
            }
        }
    }
}

/// Registry of abortable phase tasks
pub struct PhaseTimers {
    tx: mpsc::UnboundedSender<Wakeup>,
    handles: Vec<AbortHandle>,
    tick_interval: Duration,
}

impl PhaseTimers {
    /// Create a registry and the receiver its tasks report to
    #[must_use]
    pub fn new(tick_interval: Duration) -> (Self, mpsc::UnboundedReceiver<Wakeup>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = Self {
            tx,
            handles: Vec::new(),
            tick_interval,
        };
        (timers, rx)
    }

    /// Deliver `alarm` after `delay`
    pub fn schedule(&mut self, token: PhaseToken, alarm: Alarm, delay: Duration) {
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Wakeup::Alarm { token, alarm });
        });
        self.handles.push(handle.abort_handle());
    }

    /// Tick once per interval until cancelled
    ///
    /// The first tick fires one full interval after the call.
    pub fn start_countdown(&mut self, token: PhaseToken) {
        let tx = self.tx.clone();
        let period = self.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Wakeup::Tick { token }).is_err() {
                    break;
                }
            }
        });
        self.handles.push(handle.abort_handle());
    }

    /// Run a detail fetch and deliver its result
    pub fn spawn_fetch<F>(&mut self, token: PhaseToken, reference: EntityRef, fetch: F)
    where
        F: Future<Output = Result<Entity, CatalogError>> + Send + 'static,
    {
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            let _ = tx.send(Wakeup::Fetched {
                token,
                reference,
                result,
            });
        });
        self.handles.push(handle.abort_handle());
    }

    /// Abort every registered task
    pub fn cancel_all(&mut self) {
        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        if count > 0 {
            tracing::trace!(count, "Cancelled phase tasks");
        }
    }

    /// Tasks still running
    #[must_use]
    pub fn active(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for PhaseTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
