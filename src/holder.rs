use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error};

use crate::config::{ConfigError, MetricsConfig};
use crate::point::DataPoint;
use crate::sampler::{RateSampler, Sampling};
use crate::sender::{self, SendError, Sender};

struct Inner {
    config: Arc<MetricsConfig>,
    sampler: Box<dyn Sampling>,
    sender: Box<dyn Sender>,
    buffer: Mutex<Vec<DataPoint>>,
    closed: AtomicBool,
    runtime: Handle,
}

impl Inner {
    /// Swap the buffer for an empty one and return the removed batch.
    ///
    /// The swap happens inside the buffer lock, so a point appended during an
    /// in-flight flush always lands in the next batch: nothing is lost at the
    /// boundary and nothing is shipped twice.
    fn take_batch(&self) -> Vec<DataPoint> {
        std::mem::take(&mut *self.buffer.lock())
    }

    /// Ship a batch on the holder's runtime.
    ///
    /// Spawning through the captured handle keeps `add_metric` callable from
    /// plain threads, and keeps an in-flight send alive when the flush timer
    /// is aborted by `close`.
    fn flush(self: Arc<Self>, batch: Vec<DataPoint>) {
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            if let Err(error) = self.sender.send(&batch).await {
                error!(%error, "failed to flush metrics batch");
            }
        });
    }
}

/// Owner of the pending-point buffer and the flush schedule.
///
/// Points admitted by [`add_metric`](MetricsHolder::add_metric) accumulate
/// until the buffer reaches the configured flush size or the flush interval
/// elapses; either trigger atomically swaps the buffer out and hands the batch
/// to the sender. [`close`](MetricsHolder::close) stops the timer, flushes the
/// residue exactly once, and releases the transport.
pub struct MetricsHolder {
    inner: Arc<Inner>,
    flush_timer: JoinHandle<()>,
}

impl MetricsHolder {
    /// Build a holder with the sender selected by the configuration's
    /// transport.
    ///
    /// Must be called within a tokio runtime; the flush timer is spawned onto
    /// it.
    ///
    /// # Errors
    ///
    /// Fails when the configured transport cannot be constructed.
    pub fn from_config(config: Arc<MetricsConfig>) -> Result<Self, ConfigError> {
        let sender = sender::from_config(&config)?;
        Ok(Self::new(config, sender))
    }

    /// Build a holder around an explicit sender.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(config: Arc<MetricsConfig>, sender: Box<dyn Sender>) -> Self {
        let sampler = Box::new(RateSampler::new(config.sample_rate()));
        Self::with_sampler(config, sender, sampler)
    }

    fn with_sampler(
        config: Arc<MetricsConfig>,
        sender: Box<dyn Sender>,
        sampler: Box<dyn Sampling>,
    ) -> Self {
        let inner = Arc::new(Inner {
            config,
            sampler,
            sender,
            buffer: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            runtime: Handle::current(),
        });

        let timer_inner = Arc::clone(&inner);
        let flush_timer = tokio::spawn(async move {
            let period = timer_inner.config.flush_interval();
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                let batch = timer_inner.take_batch();
                if batch.is_empty() {
                    continue;
                }
                debug!(points = batch.len(), "interval-triggered flush");
                // Handed off to its own task: aborting the timer loop must not
                // cancel a batch already taken from the buffer.
                Arc::clone(&timer_inner).flush(batch);
            }
        });

        MetricsHolder { inner, flush_timer }
    }

    /// Offer one point to the buffer.
    ///
    /// Returns `false`, leaving the buffer untouched, when the holder is
    /// closed, when dry-run is enabled (which short-circuits sampling), or
    /// when the sampler rejects the point. Returns `true` once the point is
    /// buffered; if the buffer has now reached the flush size, the batch is
    /// handed to the sender immediately, independent of the interval timer.
    ///
    /// Never panics into the instrumented call site and never blocks on
    /// network I/O.
    pub fn add_metric(&self, point: DataPoint) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }
        if self.inner.config.dry_run() {
            return false;
        }
        if !self.inner.sampler.should_insert() {
            return false;
        }

        let batch = {
            let mut buffer = self.inner.buffer.lock();
            // Re-checked under the lock: `close` sets the flag before its
            // final drain of the buffer, so a push that observes the flag
            // unset here is still picked up by that drain. Without this a
            // point could slip in after the drain and never leave the buffer.
            if self.inner.closed.load(Ordering::Acquire) {
                return false;
            }
            buffer.push(point);
            if buffer.len() >= self.inner.config.flush_size() {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            debug!(points = batch.len(), "size-triggered flush");
            Arc::clone(&self.inner).flush(batch);
        }

        true
    }

    /// Stop the flush timer, flush any residual points exactly once, and
    /// release the sender.
    ///
    /// Resolves only after the transport has confirmed (or failed) the final
    /// send. Idempotent: subsequent calls resolve immediately, and any
    /// [`add_metric`](MetricsHolder::add_metric) after the first call returns
    /// `false`.
    ///
    /// # Errors
    ///
    /// Propagates the final send or transport-release failure.
    pub async fn close(&self) -> Result<(), SendError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // The timer must stop before the residual flush so no tick can fire
        // against a released sender.
        self.flush_timer.abort();

        let batch = self.inner.take_batch();
        if !batch.is_empty() {
            self.inner.sender.send(&batch).await?;
        }
        self.inner.sender.close().await
    }
}

impl Drop for MetricsHolder {
    fn drop(&mut self) {
        self.flush_timer.abort();
    }
}
