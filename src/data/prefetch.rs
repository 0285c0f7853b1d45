// ============================================================
// Layer 4 — Prefetch Queue and Background Generator
// ============================================================
// Producer/consumer pipeline between the batch sampler and the
// training thread:
//
//   BatchSampler ──(producer thread)──► PrefetchQueue ──► training loop
//
// The queue is a bounded FIFO built on std's sync_channel:
//   push → blocks while the queue holds `capacity` items
//   pop  → blocks while the queue is empty
//
// Items travel as Result<MiniBatch, DataError>, so a failure in
// the producer reaches the consumer as an error instead of
// leaving it blocked. A dead producer drops its sender, which
// wakes the consumer with ProducerGone; a live but stuck producer
// is caught by the stall timeout.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::data::error::DataError;
use crate::domain::batch::MiniBatch;
use crate::domain::traits::BatchSource;

// ─── PrefetchQueue ────────────────────────────────────────────────────────────
/// Factory for the two ends of a bounded single-producer /
/// single-consumer queue.
pub struct PrefetchQueue;

impl PrefetchQueue {
    /// Create a queue that holds at most `capacity` items (minimum 1).
    pub fn bounded<T: Send>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
        let capacity   = capacity.max(1);
        let (tx, rx)   = mpsc::sync_channel(capacity);
        (QueueProducer { tx }, QueueConsumer { rx, capacity })
    }
}

/// Sending half, owned by the producer thread.
pub struct QueueProducer<T> {
    tx: SyncSender<T>,
}

impl<T> QueueProducer<T> {
    /// Append an item, blocking while the queue is full.
    pub fn push(&self, item: T) -> Result<(), DataError> {
        self.tx.send(item).map_err(|_| DataError::ConsumerGone)
    }

    /// Append an item only if there is room right now.
    #[cfg(test)]
    pub fn try_push(&self, item: T) -> Result<(), DataError> {
        use std::sync::mpsc::TrySendError;
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_)         => DataError::QueueFull,
            TrySendError::Disconnected(_) => DataError::ConsumerGone,
        })
    }
}

/// Receiving half, owned by the training thread.
pub struct QueueConsumer<T> {
    rx:       Receiver<T>,
    capacity: usize,
}

impl<T> QueueConsumer<T> {
    /// Remove the oldest item, blocking while the queue is empty.
    /// Fails once the producer is gone and the queue is drained.
    #[cfg(test)]
    pub fn pop(&self) -> Result<T, DataError> {
        self.rx.recv().map_err(|_| DataError::ProducerGone)
    }

    /// Like `pop`, but gives up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, DataError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout      => DataError::ProducerStalled(timeout),
            RecvTimeoutError::Disconnected => DataError::ProducerGone,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ─── BackgroundGenerator ──────────────────────────────────────────────────────
type Produced = Result<MiniBatch, DataError>;

/// Runs a batch-producing closure on a dedicated thread and hands
/// its output to the training loop through a PrefetchQueue.
pub struct BackgroundGenerator {
    consumer:      Option<QueueConsumer<Produced>>,
    handle:        Option<JoinHandle<()>>,
    stall_timeout: Duration,
}

impl BackgroundGenerator {
    /// Start the producer thread.
    ///
    /// `produce` is called repeatedly; the thread stops after the
    /// first error (which is forwarded) or once the consumer is dropped.
    pub fn spawn<F>(mut produce: F, capacity: usize, stall_timeout: Duration) -> Result<Self, DataError>
    where
        F: FnMut() -> Produced + Send + 'static,
    {
        let (producer, consumer) = PrefetchQueue::bounded::<Produced>(capacity);

        let handle = thread::Builder::new()
            .name("batch-prefetch".to_string())
            .spawn(move || loop {
                let item   = produce();
                let failed = item.is_err();
                if let Err(e) = &item {
                    tracing::error!("Batch producer failed: {}", e);
                }
                if producer.push(item).is_err() || failed {
                    break;
                }
            })
            .map_err(DataError::Spawn)?;

        tracing::debug!("Background generator started (capacity={})", consumer.capacity());
        Ok(Self { consumer: Some(consumer), handle: Some(handle), stall_timeout })
    }

    /// Next prefetched batch, or the producer's failure.
    pub fn pop(&mut self) -> Result<MiniBatch, DataError> {
        let consumer = self.consumer.as_ref().ok_or(DataError::ProducerGone)?;
        consumer.pop_timeout(self.stall_timeout)?
    }

    /// Disconnect the queue and wait for the producer to exit.
    pub fn stop(&mut self) {
        // Dropping the receiver makes any blocked push fail.
        self.consumer.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Batch producer thread panicked");
            }
        }
    }
}

impl BatchSource for BackgroundGenerator {
    fn next_batch(&mut self) -> anyhow::Result<MiniBatch> {
        Ok(self.pop()?)
    }
}

impl Drop for BackgroundGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn tiny_batch(tag: f32) -> MiniBatch {
        MiniBatch {
            inputs:  vec![tag],
            targets: vec![tag],
            batch:   1,
            depth:   1,
            height:  1,
            width:   1,
        }
    }

    #[test]
    fn test_queue_is_fifo() {
        let (producer, consumer) = PrefetchQueue::bounded(8);
        for i in 0..8 {
            producer.push(i).unwrap();
        }
        let popped: Vec<i32> = (0..8).map(|_| consumer.pop().unwrap()).collect();
        assert_eq!(popped, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_queue_never_exceeds_capacity() {
        let (producer, consumer) = PrefetchQueue::bounded(3);
        assert_eq!(consumer.capacity(), 3);
        for i in 0..3 {
            producer.try_push(i).unwrap();
        }
        assert!(matches!(producer.try_push(99), Err(DataError::QueueFull)));

        // Freeing one slot admits exactly one more item
        assert_eq!(consumer.pop().unwrap(), 0);
        producer.try_push(3).unwrap();
        assert!(matches!(producer.try_push(100), Err(DataError::QueueFull)));
        let rest: Vec<i32> = (0..3).map(|_| consumer.pop().unwrap()).collect();
        assert_eq!(rest, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (producer, consumer) = PrefetchQueue::bounded::<u8>(0);
        assert_eq!(consumer.capacity(), 1);
        producer.try_push(1).unwrap();
        assert!(matches!(producer.try_push(2), Err(DataError::QueueFull)));
    }

    #[test]
    fn test_blocked_pop_wakes_when_producer_drops() {
        let (producer, consumer) = PrefetchQueue::bounded::<u8>(2);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(producer);
        });
        assert!(matches!(consumer.pop(), Err(DataError::ProducerGone)));
        t.join().unwrap();
    }

    #[test]
    fn test_pop_timeout_reports_stall() {
        let (_producer, consumer) = PrefetchQueue::bounded::<u8>(1);
        let err = consumer.pop_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, DataError::ProducerStalled(_)));
    }

    #[test]
    fn test_push_fails_once_consumer_is_gone() {
        let (producer, consumer) = PrefetchQueue::bounded::<u8>(1);
        drop(consumer);
        assert!(matches!(producer.push(1), Err(DataError::ConsumerGone)));
    }

    #[test]
    fn test_background_generator_delivers_in_order() {
        let mut counter = 0.0f32;
        let mut gen = BackgroundGenerator::spawn(
            move || {
                counter += 1.0;
                Ok(tiny_batch(counter))
            },
            2,
            Duration::from_secs(5),
        )
        .unwrap();

        let tags: Vec<f32> = (0..5).map(|_| gen.pop().unwrap().inputs[0]).collect();
        assert_eq!(tags, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_producer_error_reaches_consumer() {
        let mut calls = 0;
        let mut gen = BackgroundGenerator::spawn(
            move || {
                calls += 1;
                if calls < 3 {
                    Ok(tiny_batch(calls as f32))
                } else {
                    Err(DataError::CropTooLarge { crop: 64, height: 32, width: 32 })
                }
            },
            4,
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(gen.pop().is_ok());
        assert!(gen.pop().is_ok());
        assert!(matches!(gen.pop(), Err(DataError::CropTooLarge { .. })));
        // The producer has exited, so the queue now reports it gone
        assert!(matches!(gen.pop(), Err(DataError::ProducerGone)));
    }

    #[test]
    fn test_producer_panic_does_not_hang_consumer() {
        let mut gen = BackgroundGenerator::spawn(
            || panic!("sampler blew up"),
            1,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(matches!(gen.pop(), Err(DataError::ProducerGone)));
    }

    #[test]
    fn test_drop_stops_a_blocked_producer() {
        let produced = Arc::new(AtomicUsize::new(0));
        let seen     = produced.clone();
        let gen = BackgroundGenerator::spawn(
            move || {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(tiny_batch(0.0))
            },
            2,
            Duration::from_secs(5),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        // Producer is parked on a full queue; dropping must not hang
        drop(gen);
        let after_drop = produced.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(produced.load(Ordering::SeqCst), after_drop);
        // capacity 2 plus at most one item in hand
        assert!(after_drop <= 3);
    }
}
