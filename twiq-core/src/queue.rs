//! Bounded FIFO queues
//!
//! The bus keeps its pending transactions in anything implementing
//! [`Queue`]. Two implementations are provided:
//!
//! - [`StaticQueue`]: array-backed ring buffer, `const`-constructible so it
//!   can live in a `static`
//! - [`heapless::Deque`]: for code that already uses heapless collections
//!
//! Neither allocates or grows.

use heapless::Deque;

/// Returned by [`Queue::enqueue`] when the queue is at capacity
///
/// Carries the rejected item back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

/// Returned by [`Queue::dequeue`] when the queue holds nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Empty;

/// Bounded first-in first-out container
pub trait Queue<T> {
    /// Append `item` at the tail
    fn enqueue(&mut self, item: T) -> Result<(), Full<T>>;

    /// Remove and return the head
    fn dequeue(&mut self) -> Result<T, Empty>;

    /// Head without removing it
    fn peek(&self) -> Option<&T>;

    /// Mutable head without removing it
    fn peek_mut(&mut self) -> Option<&mut T>;

    /// Number of items queued
    fn size(&self) -> usize;

    /// Maximum number of items
    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn has_data(&self) -> bool {
        !self.is_empty()
    }

    fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }
}

/// Fixed-capacity ring buffer
///
/// `count` alone decides emptiness and fullness, so `head == tail` is
/// never ambiguous.
#[derive(Debug)]
pub struct StaticQueue<T, const N: usize> {
    slots: [Option<T>; N],
    head: usize,
    tail: usize,
    count: usize,
}

impl<T, const N: usize> Default for StaticQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> StaticQueue<T, N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Index following `i` in the ring
    const fn advance(i: usize) -> usize {
        if i + 1 == N {
            0
        } else {
            i + 1
        }
    }

    /// Iterate from head to tail
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.count).filter_map(move |i| self.slots[(self.head + i) % N].as_ref())
    }
}

impl<T, const N: usize> Queue<T> for StaticQueue<T, N> {
    fn enqueue(&mut self, item: T) -> Result<(), Full<T>> {
        if self.count == N {
            return Err(Full(item));
        }
        self.slots[self.tail] = Some(item);
        self.tail = Self::advance(self.tail);
        self.count += 1;
        Ok(())
    }

    fn dequeue(&mut self) -> Result<T, Empty> {
        if self.count == 0 {
            return Err(Empty);
        }
        let item = self.slots[self.head].take().ok_or(Empty)?;
        self.head = Self::advance(self.head);
        self.count -= 1;
        Ok(item)
    }

    fn peek(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    fn peek_mut(&mut self) -> Option<&mut T> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.head].as_mut()
    }

    fn size(&self) -> usize {
        self.count
    }

    fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Queue<T> for Deque<T, N> {
    fn enqueue(&mut self, item: T) -> Result<(), Full<T>> {
        self.push_back(item).map_err(Full)
    }

    fn dequeue(&mut self) -> Result<T, Empty> {
        self.pop_front().ok_or(Empty)
    }

    fn peek(&self) -> Option<&T> {
        self.front()
    }

    fn peek_mut(&mut self) -> Option<&mut T> {
        self.front_mut()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn capacity(&self) -> usize {
        N
    }

    fn is_full(&self) -> bool {
        Deque::is_full(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[test]
    fn test_new_queue_is_empty() {
        let q: StaticQueue<u8, 4> = StaticQueue::new();
        assert!(q.is_empty());
        assert!(!q.has_data());
        assert!(!q.is_full());
        assert_eq!(q.size(), 0);
        assert_eq!(q.capacity(), 4);
        assert_eq!(q.peek(), None);
    }

    #[test]
    fn test_fifo_order() {
        let mut q: StaticQueue<u8, 4> = StaticQueue::new();
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.enqueue(3).unwrap();
        assert_eq!(q.peek(), Some(&1));
        assert_eq!(q.dequeue(), Ok(1));
        assert_eq!(q.dequeue(), Ok(2));
        assert_eq!(q.dequeue(), Ok(3));
        assert_eq!(q.dequeue(), Err(Empty));
    }

    #[test]
    fn test_full_rejects_and_returns_item() {
        let mut q: StaticQueue<u8, 2> = StaticQueue::new();
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        assert!(q.is_full());
        assert_eq!(q.enqueue(3), Err(Full(3)));
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn test_wraps_around() {
        let mut q: StaticQueue<u8, 3> = StaticQueue::new();
        for round in 0..5u8 {
            q.enqueue(round).unwrap();
            q.enqueue(round + 100).unwrap();
            assert_eq!(q.dequeue(), Ok(round));
            assert_eq!(q.dequeue(), Ok(round + 100));
            assert!(q.is_empty());
        }
    }

    #[test]
    fn test_peek_mut_edits_head() {
        let mut q: StaticQueue<u8, 2> = StaticQueue::new();
        q.enqueue(5).unwrap();
        if let Some(head) = q.peek_mut() {
            *head = 6;
        }
        assert_eq!(q.dequeue(), Ok(6));
    }

    #[test]
    fn test_zero_capacity() {
        let mut q: StaticQueue<u8, 0> = StaticQueue::new();
        assert!(q.is_empty());
        assert!(q.is_full());
        assert_eq!(q.enqueue(1), Err(Full(1)));
    }

    #[test]
    fn test_static_construction() {
        static QUEUE: StaticQueue<u32, 8> = StaticQueue::new();
        assert_eq!(QUEUE.size(), 0);
    }

    #[test]
    fn test_iter_head_to_tail() {
        let mut q: StaticQueue<u8, 3> = StaticQueue::new();
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        q.dequeue().unwrap();
        q.enqueue(3).unwrap();
        q.enqueue(4).unwrap();
        let items: Vec<u8> = q.iter().copied().collect();
        assert_eq!(items, [2, 3, 4]);
    }

    #[test]
    fn test_deque_implementation() {
        let mut q: Deque<u8, 2> = Deque::new();
        assert!(Queue::is_empty(&q));
        q.enqueue(1).unwrap();
        q.enqueue(2).unwrap();
        assert!(Queue::is_full(&q));
        assert_eq!(q.enqueue(3), Err(Full(3)));
        assert_eq!(Queue::peek(&q), Some(&1));
        assert_eq!(q.dequeue(), Ok(1));
        assert_eq!(Queue::size(&q), 1);
    }

    proptest! {
        /// Any interleaving of operations matches an unbounded reference
        /// queue, as long as the bound is respected
        #[test]
        fn prop_matches_reference(ops in prop::collection::vec(prop::option::of(any::<u8>()), 0..64)) {
            let mut q: StaticQueue<u8, 5> = StaticQueue::new();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Some(v) => {
                        let res = q.enqueue(v);
                        if model.len() == 5 {
                            prop_assert_eq!(res, Err(Full(v)));
                        } else {
                            prop_assert!(res.is_ok());
                            model.push_back(v);
                        }
                    }
                    None => {
                        prop_assert_eq!(q.dequeue().ok(), model.pop_front());
                    }
                }
                prop_assert_eq!(q.size(), model.len());
                prop_assert_eq!(q.peek(), model.front());
                prop_assert_eq!(q.is_full(), model.len() == 5);
            }
        }
    }
}
