//! A two-slot single-producer/single-consumer queue, used to hand
//! commands from the blocking stdin-reader thread to the async harness
//! loop without a mutex. Depth of two is deliberate: the harness never
//! needs more than "the command in flight" plus "the next one already
//! parsed," so a bounded double-buffer is enough and keeps the producer
//! from racing ahead of a slow consumer.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct SpscQueue<T> {
    slots: [UnsafeCell<Option<T>>; 2],
    ready: [AtomicBool; 2],
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T> Default for SpscQueue<T> {
    fn default() -> Self {
        SpscQueue {
            slots: [UnsafeCell::new(None), UnsafeCell::new(None)],
            ready: [AtomicBool::new(false), AtomicBool::new(false)],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }
}

impl<T> SpscQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called only from the single producer. Returns the item back on
    /// `Err` if both slots are occupied.
    pub fn push(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let idx = tail % 2;
        if self.ready[idx].load(Ordering::Acquire) {
            return Err(item);
        }
        unsafe { *self.slots[idx].get() = Some(item) };
        self.ready[idx].store(true, Ordering::Release);
        self.tail.store(tail.wrapping_add(1), Ordering::Relaxed);
        Ok(())
    }

    /// Called only from the single consumer. `None` if nothing is queued.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let idx = head % 2;
        if !self.ready[idx].load(Ordering::Acquire) {
            return None;
        }
        let item = unsafe { (*self.slots[idx].get()).take() };
        self.ready[idx].store(false, Ordering::Release);
        self.head.store(head.wrapping_add(1), Ordering::Relaxed);
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_within_capacity() {
        let q: SpscQueue<u32> = SpscQueue::new();
        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn push_fails_when_both_slots_full() {
        let q: SpscQueue<u32> = SpscQueue::new();
        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.push(3), Err(3));
        assert_eq!(q.pop(), Some(1));
        q.push(3).unwrap();
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn producer_consumer_threads_hand_off_items() {
        use std::sync::Arc;
        let q = Arc::new(SpscQueue::<u32>::new());
        let producer_q = q.clone();
        let producer = std::thread::spawn(move || {
            for i in 0..100 {
                while producer_q.push(i).is_err() {
                    std::thread::yield_now();
                }
            }
        });
        let mut received = Vec::new();
        while received.len() < 100 {
            if let Some(v) = q.pop() {
                received.push(v);
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }
}
