use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

struct Slot<T> {
    priority: i64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Slot<T> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Slot<T> {}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Slot<T> {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

/// Min-priority-first queue. Items of equal priority pop in insertion order.
pub struct PriorityQueue<T> {
    heap: BinaryHeap<Reverse<Slot<T>>>,
    next_seq: u64,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        priority: i64,
        item: T,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Slot { priority, seq, item }));
    }

    pub fn pop(&mut self) -> Option<(i64, T)> {
        self.heap
            .pop()
            .map(|Reverse(slot)| (slot.priority, slot.item))
    }

    pub fn peek_priority(&self) -> Option<i64> {
        self.heap.peek().map(|Reverse(slot)| slot.priority)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
