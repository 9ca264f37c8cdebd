//! Local mutation signals in, fire-and-forget forwards out.
//!
//! Every mutation class (cache, event, index) owns one [`ForwardingQueue`]: a
//! bounded channel drained by a fixed number of worker tasks that call the
//! [`Forwarder`]. Producers never wait. When the channel is full the new item
//! is dropped, logged and counted.

pub mod cache;
pub mod event;
pub mod index;

pub use cache::CacheEvictionDispatcher;
pub use event::EventDispatcher;
pub use index::IndexEventDispatcher;

use crate::event::ReplicationEvent;
use crate::forwarder::Forwarder;
use crate::transport::ForwardingOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// What a dispatcher did with one local signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Queued,
    /// Produced while applying a forwarded operation.
    SkippedForwarded,
    /// Cache removal caused by expiry or capacity, not an explicit invalidation.
    SkippedNotExplicit,
    /// Not on the allow-list (or not project scoped, for events).
    SkippedFiltered,
    /// Queue full.
    Dropped,
    /// Forwarding of this mutation class is switched off.
    Disabled,
}

#[derive(Debug, Default)]
struct QueueCounters {
    queued: AtomicU64,
    forwarded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: u64,
    pub forwarded: u64,
    pub failed: u64,
    pub dropped: u64,
}

pub struct ForwardingQueue {
    name: &'static str,
    tx: mpsc::Sender<ReplicationEvent>,
    counters: Arc<QueueCounters>,
    workers: Vec<JoinHandle<()>>,
}

impl ForwardingQueue {
    /// Spawn `pool_size` workers. Must run inside a Tokio runtime.
    pub fn start(
        name: &'static str,
        forwarder: Arc<Forwarder>,
        pool_size: usize,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(QueueCounters::default());

        let workers = (0..pool_size.max(1))
            .map(|_| {
                let rx = Arc::clone(&rx);
                let forwarder = Arc::clone(&forwarder);
                let counters = Arc::clone(&counters);
                tokio::spawn(async move { run_worker(name, rx, forwarder, counters).await })
            })
            .collect();

        tracing::info!(
            "[REPL {}] started {} forwarding workers (queue capacity {})",
            name,
            pool_size.max(1),
            capacity.max(1)
        );

        ForwardingQueue {
            name,
            tx,
            counters,
            workers,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Hand `event` to the pool without waiting.
    pub fn submit(&self, event: ReplicationEvent) -> DispatchOutcome {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    "[REPL {}] forwarding queue full, dropping {} ({} dropped so far)",
                    self.name,
                    event,
                    dropped
                );
                DispatchOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "[REPL {}] forwarding queue closed, dropping {}",
                    self.name,
                    event
                );
                DispatchOutcome::Dropped
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work and wait until the workers drained the queue.
    pub async fn shutdown(self) {
        let ForwardingQueue {
            name, tx, workers, ..
        } = self;
        drop(tx);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("[REPL {}] forwarding worker panicked: {}", name, e);
            }
        }
    }
}

async fn run_worker(
    name: &'static str,
    rx: Arc<Mutex<mpsc::Receiver<ReplicationEvent>>>,
    forwarder: Arc<Forwarder>,
    counters: Arc<QueueCounters>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(event) = next else {
            break;
        };

        let delivery = forwarder.forward(&event).await;
        let peer = delivery
            .peer
            .as_ref()
            .map(|p| p.url().to_string())
            .unwrap_or_else(|| "<none>".to_string());

        match delivery.outcome {
            ForwardingOutcome::Success => {
                counters.forwarded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("[REPL {}] forwarded {} to {}", name, event, peer);
            }
            ForwardingOutcome::PeerUnavailable => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("[REPL {}] no peer known, dropping {}", name, event);
            }
            outcome => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    "[REPL {}] failed to forward {} to {}: {}",
                    name,
                    event,
                    peer,
                    outcome
                );
            }
        }
    }
    tracing::debug!("[REPL {}] forwarding worker stopped", name);
}
