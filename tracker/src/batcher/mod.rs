//! Request-coalescing batcher.
//!
//! Concurrent lookups that miss the cache are accumulated into a shared batch
//! and dispatched to the upstream as one grouped fetch. A batch flushes when
//! it reaches `batch_size`, when the batch timer expires, or on shutdown.
//! Responses fan back to each caller over a private capacity-1 reply channel.
//!
//! ```text
//! submit ──► ingress queue ──► main loop ──► batch (mutex)
//!                                 │ flush
//!                                 ▼
//!                           worker queue ──► dispatcher pool ──► upstream
//!                                 │ (full)                          │
//!                                 └──► detached dispatcher          ▼
//!                                                    per-caller reply channels
//! ```
//!
//! The batch vector is the only shared mutable state; everything else is
//! channels. Backpressure is surfaced to the submitter immediately (a "busy"
//! response on the reply channel), never by blocking.

mod dispatcher;
mod types;

use crate::cache::TrackCache;
use crate::client::TrackSource;
use crate::config::BatcherConfig;
use crate::errors::BatcherError;
use crate::metrics_defs::{BATCH_DISPATCHED, BATCH_SIZE, SUBMIT_REJECTED};
use crate::models::{TrackKey, TrackResponse};
use dispatcher::Dispatcher;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use types::{BatchItem, BatchRequest};

/// Poll interval of the timer manager while the batch is empty.
const EMPTY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a health probe may wait for space on the ingress queue.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

struct BatchState {
    items: Vec<BatchItem>,
    /// Armed on the empty→non-empty transition, cleared on flush.
    deadline: Option<Instant>,
}

struct Inner {
    config: BatcherConfig,
    state: Mutex<BatchState>,
    ingress_tx: mpsc::Sender<BatchRequest>,
    worker_tx: mpsc::Sender<Vec<BatchItem>>,
    flush_tx: mpsc::Sender<()>,
    stop: CancellationToken,
    dispatcher: Dispatcher,
}

/// Receiving halves handed to the background tasks on `start`.
struct Receivers {
    ingress_rx: mpsc::Receiver<BatchRequest>,
    worker_rx: mpsc::Receiver<Vec<BatchItem>>,
    flush_rx: mpsc::Receiver<()>,
}

pub struct Batcher {
    inner: Arc<Inner>,
    receivers: Mutex<Option<Receivers>>,
}

impl Batcher {
    pub fn new(
        config: BatcherConfig,
        cache: Arc<dyn TrackCache>,
        source: Arc<dyn TrackSource>,
    ) -> Self {
        let (ingress_tx, ingress_rx) = mpsc::channel(config.ingress_capacity());
        let (worker_tx, worker_rx) = mpsc::channel(config.workers);
        let (flush_tx, flush_rx) = mpsc::channel(1);

        let dispatcher = Dispatcher::new(
            cache,
            source,
            config.reply_delivery_timeout(),
            config.cache_ttl(),
        );

        let state = Mutex::new(BatchState {
            items: Vec::with_capacity(config.batch_size),
            deadline: None,
        });

        Self {
            inner: Arc::new(Inner {
                config,
                state,
                ingress_tx,
                worker_tx,
                flush_tx,
                stop: CancellationToken::new(),
                dispatcher,
            }),
            receivers: Mutex::new(Some(Receivers {
                ingress_rx,
                worker_rx,
                flush_rx,
            })),
        }
    }

    /// Accepts a key for batching and returns the receiver its single
    /// response will arrive on.
    ///
    /// Never blocks. Rejections (already cancelled, ingress full, shutting
    /// down) are delivered on the returned receiver exactly like real
    /// responses, so the caller's receive path is uniform.
    pub fn submit(
        &self,
        cancel: &CancellationToken,
        key: TrackKey,
    ) -> mpsc::Receiver<TrackResponse> {
        let (reply, rx) = mpsc::channel(1);

        if cancel.is_cancelled() {
            let _ = reply.try_send(TrackResponse::cancelled());
            return rx;
        }
        if self.inner.stop.is_cancelled() {
            let _ = reply.try_send(TrackResponse::shutting_down());
            return rx;
        }

        let request = BatchRequest::Track {
            key,
            reply,
            cancel: cancel.clone(),
        };

        match self.inner.ingress_tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(rejected)) => {
                metrics::counter!(SUBMIT_REJECTED.name, "reason" => "busy").increment(1);
                if let BatchRequest::Track { key, reply, .. } = rejected {
                    tracing::warn!(key = %key, "ingress queue full, rejecting submission");
                    let _ = reply.try_send(TrackResponse::busy());
                }
            }
            Err(TrySendError::Closed(rejected)) => {
                if let BatchRequest::Track { reply, .. } = rejected {
                    let _ = reply.try_send(TrackResponse::shutting_down());
                }
            }
        }

        rx
    }

    /// Spawns the dispatcher pool, the timer manager, and the accumulation
    /// loop. Errors if the batcher was already started.
    pub fn start(&self, cancel: CancellationToken) -> Result<(), BatcherError> {
        let Receivers {
            ingress_rx,
            worker_rx,
            flush_rx,
        } = self
            .receivers
            .lock()
            .take()
            .ok_or(BatcherError::AlreadyStarted)?;

        let worker_rx = Arc::new(tokio::sync::Mutex::new(worker_rx));
        for _ in 0..self.inner.config.workers {
            let inner = self.inner.clone();
            let worker_rx = worker_rx.clone();
            let cancel = cancel.clone();
            tokio::spawn(worker_loop(inner, worker_rx, cancel));
        }

        let inner = self.inner.clone();
        tokio::spawn(timer_manager(inner, cancel.clone()));

        let inner = self.inner.clone();
        tokio::spawn(main_loop(inner, ingress_rx, flush_rx, cancel));

        Ok(())
    }

    /// Asks the main loop to flush the current partial batch. Coalescing: a
    /// signal already pending absorbs this one.
    pub fn flush(&self) {
        let _ = self.inner.flush_tx.try_send(());
    }

    /// Signals shutdown and drains the accumulated batch, notifying each
    /// pending caller best-effort.
    pub fn stop(&self) -> Result<(), BatcherError> {
        self.inner.stop.cancel();

        let mut state = self.inner.state.lock();
        state.deadline = None;
        for item in state.items.drain(..) {
            let _ = item.reply.try_send(TrackResponse::shutting_down());
        }

        Ok(())
    }

    /// Verifies the ingress queue still accepts work within a bounded wait.
    pub async fn health(&self, cancel: &CancellationToken) -> Result<(), BatcherError> {
        let probe = self
            .inner
            .ingress_tx
            .send_timeout(BatchRequest::HealthProbe, HEALTH_PROBE_TIMEOUT);

        tokio::select! {
            sent = probe => sent.map_err(|_| BatcherError::QueueBlocked),
            _ = cancel.cancelled() => Err(BatcherError::ProbeCancelled),
        }
    }
}

impl Inner {
    fn add_to_batch(&self, request: BatchRequest) {
        let BatchRequest::Track { key, reply, cancel } = request else {
            // health probes only exercise the ingress path
            return;
        };

        let mut state = self.state.lock();

        if cancel.is_cancelled() {
            let _ = reply.try_send(TrackResponse::cancelled());
            return;
        }

        if state.items.is_empty() {
            state.deadline = Some(Instant::now() + self.config.batch_timeout());
        }

        state.items.push(BatchItem { key, reply });

        if state.items.len() >= self.config.batch_size {
            self.flush_locked(&mut state);
        }
    }

    /// Snapshots the batch and hands it to a dispatcher. Caller holds the
    /// state lock.
    fn flush_locked(&self, state: &mut BatchState) {
        if state.items.is_empty() {
            return;
        }

        let snapshot = std::mem::replace(
            &mut state.items,
            Vec::with_capacity(self.config.batch_size),
        );
        state.deadline = None;

        metrics::counter!(BATCH_DISPATCHED.name).increment(1);
        metrics::histogram!(BATCH_SIZE.name).record(snapshot.len() as f64);

        match self.worker_tx.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(snapshot)) => {
                // Pool saturated. A one-shot dispatcher keeps the flush from
                // blocking the main loop, transiently exceeding `workers`.
                tracing::debug!(len = snapshot.len(), "worker queue full, detaching dispatcher");
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move { dispatcher.process_batch(snapshot).await });
            }
            Err(TrySendError::Closed(snapshot)) => {
                for item in snapshot {
                    let _ = item.reply.try_send(TrackResponse::shutting_down());
                }
            }
        }
    }
}

/// Single-threaded accumulator: the only task that mutates the batch outside
/// of `stop`.
async fn main_loop(
    inner: Arc<Inner>,
    mut ingress_rx: mpsc::Receiver<BatchRequest>,
    mut flush_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            received = ingress_rx.recv() => match received {
                Some(request) => inner.add_to_batch(request),
                None => return,
            },
            _ = flush_rx.recv() => {
                let mut state = inner.state.lock();
                if !state.items.is_empty() {
                    inner.flush_locked(&mut state);
                }
            }
            _ = cancel.cancelled() => {
                // final best-effort dispatch of whatever accumulated
                let mut state = inner.state.lock();
                if !state.items.is_empty() {
                    inner.flush_locked(&mut state);
                }
                return;
            }
            _ = inner.stop.cancelled() => return,
        }
    }
}

/// Watches the armed deadline and emits a coalescing flush signal on expiry.
/// Polls at a short interval while the batch is empty.
async fn timer_manager(inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        let deadline = inner.state.lock().deadline;

        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {
                        // a size-triggered flush may have superseded this deadline
                        if inner.state.lock().deadline == Some(deadline) {
                            let _ = inner.flush_tx.try_send(());
                        }
                    }
                    _ = cancel.cancelled() => return,
                    _ = inner.stop.cancelled() => return,
                }
            }
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(EMPTY_POLL_INTERVAL) => {}
                    _ = cancel.cancelled() => return,
                    _ = inner.stop.cancelled() => return,
                }
            }
        }
    }
}

/// One member of the dispatcher pool. The pool shares a single receiver; the
/// tokio mutex hands batches to whichever worker is free.
async fn worker_loop(
    inner: Arc<Inner>,
    worker_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Vec<BatchItem>>>>,
    cancel: CancellationToken,
) {
    loop {
        let batch = {
            let mut rx = worker_rx.lock().await;
            tokio::select! {
                received = rx.recv() => match received {
                    Some(batch) => batch,
                    None => return,
                },
                _ = cancel.cancelled() => return,
                _ = inner.stop.cancelled() => return,
            }
        };

        inner.dispatcher.process_batch(batch).await;
    }
}
