//! Background delivery of notifications to the configured sinks.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::MonitorError;
use crate::notify::NotificationSink;
use crate::Notification;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Accepted into the queue.
    pub queued: u64,
    /// Dropped because the queue was full or the worker was gone.
    pub dropped: u64,
    /// Successful sink deliveries (one notification can count once per sink).
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    queued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Fire-and-forget hand-off from the detection loop to the sinks.
///
/// One worker thread drains a bounded queue in FIFO order. `publish` never
/// blocks: when the queue is full the notification is dropped and counted.
pub struct Dispatcher {
    tx: Option<SyncSender<Notification>>,
    join: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn spawn(sinks: Vec<Box<dyn NotificationSink>>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(MonitorError::configuration("dispatch queue capacity must be >= 1").into());
        }
        let (tx, rx) = sync_channel(capacity);
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);
        let join = std::thread::Builder::new()
            .name("presence-notify".to_string())
            .spawn(move || run_worker(rx, sinks, &worker_counters))
            .map_err(|e| anyhow!("failed to start notification worker: {}", e))?;
        Ok(Self {
            tx: Some(tx),
            join: Some(join),
            counters,
        })
    }

    /// Queue a notification. Returns false if it was dropped.
    pub fn publish(&self, notification: Notification) -> bool {
        let Some(tx) = &self.tx else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        match tx.try_send(notification) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(dropped)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "notification queue full, dropping {} for {}",
                    dropped.event.kind(),
                    dropped.incident_id
                );
                false
            }
            Err(TrySendError::Disconnected(dropped)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "notification worker has stopped, dropping {} for {}",
                    dropped.event.kind(),
                    dropped.incident_id
                );
                false
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Close the queue and detach the worker without waiting for it.
    pub fn abandon(mut self) -> DispatchStats {
        self.tx.take();
        self.join.take();
        self.counters.snapshot()
    }

    /// Close the queue and wait until every queued notification was attempted.
    pub fn drain(mut self) -> Result<DispatchStats> {
        self.tx.take();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("notification worker panicked"))?;
        }
        Ok(self.counters.snapshot())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Closing the sender lets the worker finish on its own.
        self.tx.take();
    }
}

fn run_worker(
    rx: Receiver<Notification>,
    mut sinks: Vec<Box<dyn NotificationSink>>,
    counters: &Counters,
) {
    for notification in rx {
        for sink in sinks.iter_mut() {
            match sink.deliver(&notification) {
                Ok(()) => {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    let err = MonitorError::NotificationDelivery {
                        sink: sink.name(),
                        reason: format!("{:#}", err),
                    };
                    log::warn!("{}: {}", notification.incident_id, err);
                }
            }
        }
    }
    log::debug!("notification worker exiting");
}
