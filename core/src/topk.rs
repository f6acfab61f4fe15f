//! Bounded top-K selection.

use crate::align::Similarity;
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_NUM_OF_ANSWERS: u16 = 10;

/// Array-backed binary min-heap holding at most `capacity` items.
///
/// The root is the smallest retained item. Once full, an incoming item enters
/// only if it is strictly greater than the root, which keeps the `capacity`
/// greatest items seen so far.
#[derive(Debug, Clone)]
pub struct BoundedMinHeap<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Ord> BoundedMinHeap<T> {
    pub fn new(capacity: usize) -> Self {
        Self { items: Vec::with_capacity(capacity), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn peek_min(&self) -> Option<&T> {
        self.items.first()
    }

    /// Offers `item` to the heap.
    ///
    /// Returns the item that did not survive: the displaced root, the rejected
    /// challenger, or `None` if the heap still had room.
    pub fn insert(&mut self, item: T) -> Option<T> {
        if self.items.len() < self.capacity {
            self.items.push(item);
            self.sift_up(self.items.len() - 1);
            return None;
        }
        match self.items.first_mut() {
            Some(root) if item > *root => {
                let evicted = std::mem::replace(root, item);
                self.sift_down(0);
                Some(evicted)
            }
            _ => Some(item),
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.items[i] >= self.items[parent] {
                break;
            }
            self.items.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.items.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut min = i;
            if left < n && self.items[left] < self.items[min] {
                min = left;
            }
            if right < n && self.items[right] < self.items[min] {
                min = right;
            }
            if min == i {
                return;
            }
            self.items.swap(i, min);
            i = min;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Retained items, greatest first.
    pub fn into_descending_vec(self) -> Vec<T> {
        let mut items = self.items;
        items.sort_by(|a, b| b.cmp(a));
        items
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub pitch: u32,
    pub ioi: Option<u32>,
    pub combined: f64,
}

impl Score {
    pub fn new(sim: Similarity, mode: crate::align::ScoringMode) -> Self {
        Self { pitch: sim.pitch, ioi: sim.ioi, combined: sim.combined(mode) }
    }

    /// Score carrying only a combined value.
    pub fn single(combined: f64) -> Self {
        Self { pitch: 0, ioi: None, combined }
    }
}

/// A ranked candidate.
///
/// Answers order by combined score; among equal scores the one met earlier in
/// the corpus (lower ordinal) ranks higher.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub title: String,
    pub ordinal: u64,
    pub score: Score,
}

impl Ord for Answer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .combined
            .total_cmp(&other.score.combined)
            .then_with(|| other.ordinal.cmp(&self.ordinal))
    }
}

impl PartialOrd for Answer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Answer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Answer {}

/// Keeps the K best answers of one query pass.
#[derive(Debug, Clone)]
pub struct TopKRanker {
    heap: BoundedMinHeap<Answer>,
    next_ordinal: u64,
}

impl TopKRanker {
    pub fn new(k: u16) -> Self {
        Self { heap: BoundedMinHeap::new(k as usize), next_ordinal: 0 }
    }

    /// Offers an answer numbered after every answer offered so far.
    pub fn insert(&mut self, title: &str, score: Score) {
        let ordinal = self.next_ordinal;
        self.insert_at(ordinal, title, score);
    }

    /// Offers an answer with an explicit corpus ordinal.
    pub fn insert_at(&mut self, ordinal: u64, title: &str, score: Score) {
        self.next_ordinal = self.next_ordinal.max(ordinal.saturating_add(1));
        let candidate = Answer { title: String::new(), ordinal, score };
        // Compare before copying the title so rejected candidates cost nothing.
        if self.heap.len() == self.heap.capacity() {
            match self.heap.peek_min() {
                Some(min) if candidate > *min => {}
                _ => return,
            }
        }
        self.heap.insert(Answer { title: title.to_string(), ..candidate });
    }

    /// Folds `other`'s retained answers into this ranker.
    pub fn merge(&mut self, other: TopKRanker) {
        self.next_ordinal = self.next_ordinal.max(other.next_ordinal);
        for answer in other.heap.items {
            self.heap.insert(answer);
        }
    }

    pub fn peek_min(&self) -> Option<&Answer> {
        self.heap.peek_min()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Snapshot of the retained answers, best first. The heap is left as is.
    pub fn finalize(&self) -> Vec<Answer> {
        self.heap.clone().into_descending_vec()
    }

    pub fn into_ranked(self) -> Vec<Answer> {
        self.heap.into_descending_vec()
    }
}

/// Resolves the requested answer count: unset or zero means the default,
/// anything above `u16::MAX` is clamped.
pub fn clamp_num_of_answers(requested: Option<u64>) -> u16 {
    match requested {
        None | Some(0) => DEFAULT_NUM_OF_ANSWERS,
        Some(n) => u16::try_from(n).unwrap_or(u16::MAX),
    }
}
