use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::ArrayQueue;
use sweep_core::config::OverflowPolicy;

/// What happened to a value offered to a [SweepSlot]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferResult {
    /// The slot was empty and now holds the value
    Accepted,
    /// The slot was full, the pending value was dropped in favour of the new one
    Replaced,
    /// The slot was full, the new value was dropped
    Dropped,
}

/// A lock-free hand-off slot that holds at most one pending value. Producers never block: when the slot is
/// full, the [OverflowPolicy] decides whether the pending or the arriving value is dropped.
/// ```
/// # use sweep_algorithms::slot::{OfferResult, SweepSlot};
/// # use sweep_core::config::OverflowPolicy;
/// let slot = SweepSlot::new(OverflowPolicy::Overwrite);
/// assert_eq!(OfferResult::Accepted, slot.offer(1));
/// assert_eq!(OfferResult::Replaced, slot.offer(2));
/// assert_eq!(Some(2), slot.take());
/// assert_eq!(None, slot.take());
/// ```
pub struct SweepSlot<T> {
    queue: ArrayQueue<T>,
    policy: OverflowPolicy,
    dropped: AtomicUsize,
}

impl<T> SweepSlot<T> {
    pub fn new(policy: OverflowPolicy) -> Self {
        Self {
            queue: ArrayQueue::new(1),
            policy,
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Puts `value` into the slot
    pub fn offer(&self, value: T) -> OfferResult {
        match self.policy {
            OverflowPolicy::Overwrite => match self.queue.force_push(value) {
                None => OfferResult::Accepted,
                Some(_) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    OfferResult::Replaced
                }
            },
            OverflowPolicy::DropIncoming => match self.queue.push(value) {
                Ok(()) => OfferResult::Accepted,
                Err(_) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    OfferResult::Dropped
                }
            },
        }
    }

    /// Removes the pending value, if any
    pub fn take(&self) -> Option<T> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of values that were dropped because the slot was full
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
