//! Fixed-period tick sources for the playback clock.
//!
//! The clock never sleeps or reads the wall clock itself. It asks a
//! [`Ticker`] to start firing for a given generation and to cancel; the tick
//! comes back as an ordinary event tagged with that generation, so stale
//! ticks can be recognised and dropped by the receiver.

use crossbeam_channel::{bounded, select, tick, Sender, TrySendError};
use log::{debug, error};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub trait Ticker: Send {
    /// Begin firing ticks tagged with `generation`. Any previously started
    /// tick stream is cancelled first; there is never more than one.
    fn start(&mut self, generation: u64);

    /// Stop firing. Idempotent.
    fn cancel(&mut self);
}

// ─── Wall-clock ticker ──────────────────────────────────────────────────────

/// Fires on a background thread every `period` until cancelled.
pub struct ThreadTicker {
    period: Duration,
    on_tick: Arc<dyn Fn(u64) -> bool + Send + Sync>,
    stop_tx: Option<Sender<()>>,
}

impl ThreadTicker {
    /// `on_tick` delivers the tick; returning `false` (receiver gone) ends
    /// the ticking thread.
    pub fn new<F>(period: Duration, on_tick: F) -> Self
    where
        F: Fn(u64) -> bool + Send + Sync + 'static,
    {
        Self {
            period,
            on_tick: Arc::new(on_tick),
            stop_tx: None,
        }
    }

    /// Deliver ticks into `tx` without ever blocking or queueing behind the
    /// consumer. With a `bounded(1)` channel at most one tick is pending: a
    /// tick that finds the slot full is dropped.
    pub fn coalescing(period: Duration, tx: Sender<u64>) -> Self {
        Self::new(period, move |generation| match tx.try_send(generation) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        })
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }
}

impl Ticker for ThreadTicker {
    fn start(&mut self, generation: u64) {
        self.cancel();

        // Dropping stop_tx disconnects stop_rx, which ends the loop.
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let period = self.period;
        let on_tick = self.on_tick.clone();
        let spawned = thread::Builder::new()
            .name(format!("ticker-{}", generation))
            .spawn(move || {
                let metronome = tick(period);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(metronome) -> _ => {
                            if !on_tick(generation) {
                                break;
                            }
                        }
                    }
                }
                debug!("Ticker generation {} stopped", generation);
            });

        match spawned {
            Ok(_) => self.stop_tx = Some(stop_tx),
            Err(e) => error!("Failed to spawn ticker thread: {}", e),
        }
    }

    fn cancel(&mut self) {
        self.stop_tx = None;
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ─── Manual ticker (tests, stepping) ────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ManualTickerLog {
    /// Generation of the currently armed tick stream
    pub armed: Option<u64>,
    pub starts: usize,
    pub cancels: usize,
}

/// A ticker that never fires on its own. It records start/cancel calls so
/// tests can assert on timer discipline, and the test feeds ticks by hand.
#[derive(Clone, Default)]
pub struct ManualTicker {
    log: Arc<Mutex<ManualTickerLog>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> ManualTickerLog {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn armed(&self) -> Option<u64> {
        self.log().armed
    }
}

impl Ticker for ManualTicker {
    fn start(&mut self, generation: u64) {
        if let Ok(mut log) = self.log.lock() {
            if log.armed.take().is_some() {
                log.cancels += 1;
            }
            log.armed = Some(generation);
            log.starts += 1;
        }
    }

    fn cancel(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            if log.armed.take().is_some() {
                log.cancels += 1;
            }
        }
    }
}
