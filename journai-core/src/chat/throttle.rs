//! Paced, ordered delivery of decoded events to a single consumer.

use crate::config::ThrottleConfig;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Re-emits items to one callback in FIFO order, at most one per interval
///
/// Nothing is dropped except by [`Throttler::clear`]. Must be created inside
/// a tokio runtime; the pump task stops when the throttler is dropped.
pub struct Throttler<T> {
    tx: mpsc::UnboundedSender<(u64, T)>,
    generation: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
    pump: JoinHandle<()>,
}

impl<T> std::fmt::Debug for Throttler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttler")
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Throttler<T> {
    pub fn new<F>(config: &ThrottleConfig, on_item: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self::with_pacing(config.interval(), config.jitter(), on_item)
    }

    /// Zero interval and zero jitter pass items straight through
    pub fn with_pacing<F>(interval: Duration, jitter: Duration, mut on_item: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, T)>();
        let generation = Arc::new(AtomicU64::new(0));
        let pending = Arc::new(AtomicUsize::new(0));

        let pump_generation = Arc::clone(&generation);
        let pump_pending = Arc::clone(&pending);
        let pump = tokio::spawn(async move {
            while let Some((item_generation, item)) = rx.recv().await {
                if item_generation != pump_generation.load(Ordering::Acquire) {
                    continue;
                }

                let delay = interval + sample_jitter(jitter);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                    // A clear may have landed while we slept
                    if item_generation != pump_generation.load(Ordering::Acquire) {
                        continue;
                    }
                }

                saturating_decrement(&pump_pending);
                on_item(item);
            }
        });

        Self {
            tx,
            generation,
            pending,
            pump,
        }
    }

    /// Queue an item without waiting
    pub fn enqueue(&self, item: T) {
        // Count first: a clear landing before the load below then either
        // zeroes this count or hands the item the new generation.
        self.pending.fetch_add(1, Ordering::AcqRel);
        let generation = self.generation.load(Ordering::Acquire);
        if self.tx.send((generation, item)).is_err() {
            saturating_decrement(&self.pending);
            tracing::warn!("throttler pump has stopped; item dropped");
        }
    }

    /// Drop everything queued so far, including an item already waiting out its delay
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.pending.store(0, Ordering::Release);
    }

    /// Items queued and not yet delivered
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

impl<T> Drop for Throttler<T> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

fn sample_jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

fn saturating_decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn collector() -> (
        mpsc::UnboundedSender<u32>,
        mpsc::UnboundedReceiver<u32>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn delivers_every_item_in_order() {
        let (out_tx, mut out_rx) = collector();
        let throttler = Throttler::with_pacing(Duration::ZERO, Duration::ZERO, move |n| {
            let _ = out_tx.send(n);
        });

        for n in 0..100 {
            throttler.enqueue(n);
        }

        let mut received = Vec::new();
        while received.len() < 100 {
            received.push(out_rx.recv().await.unwrap());
        }
        assert_eq!(received, (0..100).collect::<Vec<_>>());
        assert_eq!(throttler.pending(), 0);
    }

    #[tokio::test]
    async fn pacing_spaces_out_delivery() {
        let (out_tx, mut out_rx) = collector();
        let throttler = Throttler::with_pacing(Duration::from_millis(20), Duration::ZERO, move |n| {
            let _ = out_tx.send(n);
        });

        let started = Instant::now();
        for n in 0..4 {
            throttler.enqueue(n);
        }
        assert!(throttler.pending() > 0);

        for expected in 0..4 {
            assert_eq!(out_rx.recv().await.unwrap(), expected);
        }
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn clear_discards_queued_items() {
        let (out_tx, mut out_rx) = collector();
        let throttler = Throttler::with_pacing(Duration::from_millis(30), Duration::ZERO, move |n| {
            let _ = out_tx.send(n);
        });

        for n in 0..5 {
            throttler.enqueue(n);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        throttler.clear();
        assert_eq!(throttler.pending(), 0);

        throttler.enqueue(99);
        assert_eq!(out_rx.recv().await.unwrap(), 99);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pending_settles_to_zero_under_concurrent_clears() {
        const SENTINEL: u32 = u32::MAX;
        let (out_tx, mut out_rx) = collector();
        let throttler = Arc::new(Throttler::with_pacing(Duration::ZERO, Duration::ZERO, move |n| {
            let _ = out_tx.send(n);
        }));

        let producer = {
            let throttler = Arc::clone(&throttler);
            tokio::spawn(async move {
                for n in 0..2_000 {
                    throttler.enqueue(n);
                    if n % 16 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };
        let clearer = {
            let throttler = Arc::clone(&throttler);
            tokio::spawn(async move {
                for _ in 0..200 {
                    throttler.clear();
                    tokio::task::yield_now().await;
                }
            })
        };
        producer.await.unwrap();
        clearer.await.unwrap();

        throttler.enqueue(SENTINEL);
        while out_rx.recv().await.unwrap() != SENTINEL {}
        assert_eq!(throttler.pending(), 0);
    }

    #[tokio::test]
    async fn jitter_stays_within_bound() {
        for _ in 0..50 {
            assert!(sample_jitter(Duration::from_millis(10)) <= Duration::from_millis(10));
        }
        assert_eq!(sample_jitter(Duration::ZERO), Duration::ZERO);
    }
}
