//! TX-done event delivery and the aging timer.
//!
//! Hardware reports the egress timestamp of every two-step event frame
//! asynchronously, once per transmitted port. Rather than calling back
//! into shared mutable state, the platform layer posts a [`TxDone`] into
//! the event channel and the single writer that owns the
//! [`crate::TransparentClock`] drains it — keeping the
//! single-writer-at-a-time access rule explicit and the completion logic
//! testable by direct event injection.
//!
//! The aging sweep rides the same channel: [`AgeTimer`] is a small tokio
//! task emitting [`TcEvent::AgeTick`] once per period until stopped.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::transport::{TsContext, TsId};

/// Default period of the aging sweep.
pub const AGE_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Completion notification for one transmitted two-step event frame on
/// one egress port.
#[derive(Debug, Clone, Copy)]
pub struct TxDone {
    /// Context supplied at transmit time, identifying the registry entry.
    pub context: TsContext,
    /// 1-based egress port the frame left on.
    pub port: u16,
    /// Timestamp-capture identifier returned by the transmit call.
    pub ts_id: TsId,
    /// Raw hardware transmit timestamp (ticks).
    pub tx_time: u64,
}

/// Events delivered to a transparent clock instance.
#[derive(Debug, Clone, Copy)]
pub enum TcEvent {
    /// A two-step event frame finished transmission on one port.
    TxDone(TxDone),
    /// One period of the aging sweep elapsed.
    AgeTick,
}

/// Create the bounded event channel connecting the platform layer (and
/// the aging timer) to the transparent clock's owner.
#[must_use]
pub fn event_channel(capacity: usize) -> (mpsc::Sender<TcEvent>, mpsc::Receiver<TcEvent>) {
    mpsc::channel(capacity)
}

/// Periodic aging-tick source.
///
/// Spawned by [`crate::TransparentClock::enable`]; emits
/// [`TcEvent::AgeTick`] into the event channel once per period until
/// stopped or dropped. Ticks are lost (not queued) if the channel is
/// full — a slow consumer only slows aging down, it never builds a
/// backlog.
#[derive(Debug)]
pub struct AgeTimer {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AgeTimer {
    /// Start the timer task.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn start(period: Duration, events: mpsc::Sender<TcEvent>) -> Self {
        let (shutdown, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if events.try_send(TcEvent::AgeTick).is_err() && events.is_closed() {
                            break;
                        }
                    }
                    _ = stopped.changed() => {
                        if *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Stop the timer task. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the timer task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for AgeTimer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
