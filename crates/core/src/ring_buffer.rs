//! Single-producer single-consumer byte ring for the transmit path.
//!
//! `head` is the slot that was written last and `tail` the slot that was
//! drained last; the next byte goes into `head + 1` and the next byte out
//! comes from `tail + 1`. The buffer is empty when `head == tail` and full
//! when advancing `head` would land on `tail`, so one slot is always left
//! unused and the usable capacity is `N - 1`.
//!
//! Ownership of the fields is split between exactly two actors:
//!
//! - the producer writes `head` and the slot at the new `head`;
//! - the consumer (interrupt handler) writes `tail` and reads the slot at the
//!   new `tail`.
//!
//! Each side only loads the other's index, with acquire ordering, and
//! publishes its own with release ordering. No lock is needed as long as the
//! two roles are never taken by the same context at once.

use std::sync::atomic::{AtomicU8, Ordering};

pub struct TxRing<const N: usize> {
    slots: [AtomicU8; N],
    head: AtomicU8,
    tail: AtomicU8,
}

impl<const N: usize> TxRing<N> {
    const CAPACITY_OK: () = assert!(N >= 2 && N <= 256, "ring size must be 2..=256");

    pub fn new() -> Self {
        let () = Self::CAPACITY_OK;
        TxRing {
            slots: std::array::from_fn(|_| AtomicU8::new(0)),
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
        }
    }

    /// Number of bytes that can be pending at once.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    #[inline(always)]
    const fn advance(idx: u8) -> u8 {
        let next = idx as usize + 1;
        if next >= N { 0 } else { next as u8 }
    }

    /// Put both indices back to zero. Only valid while neither actor is
    /// running, i.e. during initialization with interrupts disabled.
    pub fn reset(&self) {
        self.head.store(0, Ordering::Release);
        self.tail.store(0, Ordering::Release);
    }

    // ─── Producer side ──────────────────────────────────────────────────────

    /// Slot the next byte would be written to, or `None` when the buffer is full.
    pub fn vacant_slot(&self) -> Option<u8> {
        let next = Self::advance(self.head.load(Ordering::Relaxed));
        if next == self.tail.load(Ordering::Acquire) { None } else { Some(next) }
    }

    /// Store a byte and commit it to the consumer. Returns `false` (and
    /// stores nothing) when the buffer is full.
    pub fn push(&self, byte: u8) -> bool {
        match self.vacant_slot() {
            Some(slot) => {
                self.slots[slot as usize].store(byte, Ordering::Relaxed);
                self.head.store(slot, Ordering::Release);
                true
            }
            None => false,
        }
    }

    // ─── Consumer side ──────────────────────────────────────────────────────

    /// Take the oldest byte, if any.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if self.head.load(Ordering::Acquire) == tail {
            return None;
        }
        let slot = Self::advance(tail);
        let byte = self.slots[slot as usize].load(Ordering::Relaxed);
        self.tail.store(slot, Ordering::Release);
        Some(byte)
    }

    // ─── Either side ────────────────────────────────────────────────────────

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Bytes pending. A snapshot only; the other actor may move its index
    /// right after.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire) as usize;
        let tail = self.tail.load(Ordering::Acquire) as usize;
        if head >= tail { head - tail } else { N - tail + head }
    }

    pub fn head(&self) -> u8 {
        self.head.load(Ordering::Acquire)
    }

    pub fn tail(&self) -> u8 {
        self.tail.load(Ordering::Acquire)
    }
}

impl<const N: usize> Default for TxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_empty() {
        let ring = TxRing::<64>::new();
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
        assert_eq!((ring.head(), ring.tail()), (0, 0));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_first_byte_goes_to_slot_one() {
        let ring = TxRing::<8>::new();
        assert_eq!(ring.vacant_slot(), Some(1));
        assert!(ring.push(b'a'));
        assert_eq!(ring.head(), 1);
        assert_eq!(ring.pop(), Some(b'a'));
        assert_eq!(ring.tail(), 1);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_holds_n_minus_one() {
        let ring = TxRing::<64>::new();
        for i in 0..63u8 {
            assert!(ring.push(i), "push {} failed", i);
        }
        assert_eq!(ring.len(), 63);
        assert_eq!(ring.vacant_slot(), None);
        assert!(!ring.push(0xFF));
        assert_eq!(ring.len(), 63);

        assert_eq!(ring.pop(), Some(0));
        assert!(ring.push(63));
        let drained: Vec<u8> = std::iter::from_fn(|| ring.pop()).collect();
        assert_eq!(drained, (1..=63).collect::<Vec<u8>>());
    }

    #[test]
    fn test_smallest_and_largest_sizes() {
        let tiny = TxRing::<2>::new();
        assert_eq!(tiny.capacity(), 1);
        assert!(tiny.push(1));
        assert!(!tiny.push(2));
        assert_eq!(tiny.pop(), Some(1));
        assert!(tiny.push(3));
        assert_eq!(tiny.pop(), Some(3));

        let big = TxRing::<256>::new();
        for i in 0..255u8 {
            assert!(big.push(i));
        }
        assert!(!big.push(0));
        for i in 0..255u8 {
            assert_eq!(big.pop(), Some(i));
        }
        assert_eq!(big.head(), 255);
    }

    #[test]
    fn test_reset() {
        let ring = TxRing::<16>::new();
        ring.push(1);
        ring.push(2);
        ring.pop();
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!((ring.head(), ring.tail()), (0, 0));
    }

    #[test]
    fn test_concurrent_fifo() {
        let ring = Arc::new(TxRing::<16>::new());
        let total = 10_000usize;
        let consumer = {
            let ring = ring.clone();
            thread::spawn(move || {
                let mut out = Vec::with_capacity(total);
                while out.len() < total {
                    match ring.pop() {
                        Some(b) => out.push(b),
                        None => std::hint::spin_loop(),
                    }
                }
                out
            })
        };
        for i in 0..total {
            while !ring.push(i as u8) {
                std::hint::spin_loop();
            }
        }
        let out = consumer.join().unwrap();
        let expected: Vec<u8> = (0..total).map(|i| i as u8).collect();
        assert_eq!(out, expected);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(u8),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![any::<u8>().prop_map(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        #[test]
        fn prop_matches_bounded_queue(ops in prop::collection::vec(op(), 0..400)) {
            let ring = TxRing::<8>::new();
            let mut model = VecDeque::new();
            for op in ops {
                match op {
                    Op::Push(b) => {
                        let accepted = ring.push(b);
                        prop_assert_eq!(accepted, model.len() < 7);
                        if accepted {
                            model.push_back(b);
                        }
                    }
                    Op::Pop => prop_assert_eq!(ring.pop(), model.pop_front()),
                }
                prop_assert_eq!(ring.len(), model.len());
                prop_assert!(ring.len() <= ring.capacity());
                prop_assert_eq!(ring.is_empty(), model.is_empty());
            }
        }
    }
}
