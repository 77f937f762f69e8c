//! Periodic progress reporting for a running bisection.
//!
//! The engine publishes one [`ProgressEvent`] per iteration into a single-slot
//! channel. Publishing never blocks: a newer event evicts one the reporter has
//! not picked up yet. The reporter thread wakes on a fixed tick and hands the
//! freshest unseen event to a [`ProgressSink`].

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default reporting cadence.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Status of one bisection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Start of the scanned slice; always 0 for prefix bisection.
    pub low: usize,
    /// End (exclusive) of the scanned slice.
    pub high: usize,
    pub malicious: bool,
    /// Time since the search started.
    pub elapsed: Duration,
}

/// Destination for progress reports (console, log, test buffer).
pub trait ProgressSink: Send {
    fn report(&mut self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressEvent) + Send,
{
    fn report(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sink that emits reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&mut self, event: &ProgressEvent) {
        info!(
            "0x{:X} -> 0x{:X} - malicious: {} - {:?}",
            event.low, event.high, event.malicious, event.elapsed
        );
    }
}

/// Sending half of a latest-value channel.
///
/// Holds a receiver clone purely to evict a stale value when the slot is full.
#[derive(Debug)]
pub struct LatestSender<T> {
    tx: Sender<T>,
    evict: Receiver<T>,
}

/// Create a single-slot channel with overwrite-on-full semantics.
pub fn latest_channel<T>() -> (LatestSender<T>, Receiver<T>) {
    let (tx, rx) = bounded(1);
    (LatestSender { tx, evict: rx.clone() }, rx)
}

impl<T> LatestSender<T> {
    /// Store `value`, replacing whatever is still waiting in the slot.
    /// Returns `false` only if the channel is disconnected.
    pub fn publish(&self, mut value: T) -> bool {
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    let _ = self.evict.try_recv();
                    value = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

/// Handle to the reporter thread.
pub struct ProgressReporter {
    handle: JoinHandle<usize>,
}

impl ProgressReporter {
    /// Spawn the reporter. It exits once every sender for `events` is dropped.
    pub fn spawn(
        events: Receiver<ProgressEvent>,
        interval: Duration,
        mut sink: Box<dyn ProgressSink>,
    ) -> std::io::Result<Self> {
        let handle = thread::Builder::new().name("progress-reporter".into()).spawn(move || {
            let ticker = tick(interval);
            let mut pending: Option<ProgressEvent> = None;
            let mut reported = 0usize;
            loop {
                select! {
                    recv(events) -> msg => match msg {
                        Ok(event) => pending = Some(event),
                        Err(_) => break,
                    },
                    recv(ticker) -> _ => {
                        if let Some(event) = pending.take() {
                            sink.report(&event);
                            reported += 1;
                        }
                    }
                }
            }
            reported
        })?;
        Ok(Self { handle })
    }

    /// Wait for the reporter to finish; returns how many reports it emitted.
    pub fn join(self) -> thread::Result<usize> {
        self.handle.join()
    }
}
