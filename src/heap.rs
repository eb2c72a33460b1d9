use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::models::Cgpa;

/// Rank position of one student: higher cgpa ranks higher, equal cgpa
/// falls back to the smaller reg_no ranking higher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankKey {
    pub cgpa: Cgpa,
    pub reg_no: String,
}

impl RankKey {
    pub fn new(cgpa: Cgpa, reg_no: &str) -> Self {
        RankKey {
            cgpa,
            reg_no: reg_no.to_string(),
        }
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cgpa
            .cmp(&other.cgpa)
            .then_with(|| other.reg_no.cmp(&self.reg_no))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Array-backed binary max-heap that tracks where each reg_no sits, so a
/// single entry can be pulled out in O(log n) when its cgpa changes.
#[derive(Debug, Default, Clone)]
pub struct RankHeap {
    slots: Vec<RankKey>,
    positions: HashMap<String, usize>,
}

impl RankHeap {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, key: &RankKey) -> bool {
        self.positions
            .get(&key.reg_no)
            .is_some_and(|&slot| self.slots[slot] == *key)
    }

    /// Callers keep reg_no unique; the engine checks before pushing.
    pub fn push(&mut self, key: RankKey) {
        let slot = self.slots.len();
        self.positions.insert(key.reg_no.clone(), slot);
        self.slots.push(key);
        self.sift_up(slot);
    }

    pub fn remove(&mut self, reg_no: &str) -> Option<RankKey> {
        let slot = self.positions.remove(reg_no)?;
        let last = self.slots.len() - 1;
        if slot != last {
            self.swap(slot, last);
        }
        let removed = self.slots.pop();
        if slot < self.slots.len() {
            self.sift_down(slot);
            self.sift_up(slot);
        }
        removed
    }

    /// The `k` highest keys, best first, without disturbing the heap.
    ///
    /// Walks the implicit tree with a frontier queue: the next best key is
    /// always the root or a child of a key already taken, so only O(k)
    /// slots are ever examined.
    pub fn top_k(&self, k: usize) -> Vec<&RankKey> {
        let mut taken = Vec::with_capacity(k.min(self.slots.len()));
        let mut frontier: BinaryHeap<(&RankKey, usize)> = BinaryHeap::new();
        if let Some(root) = self.slots.first() {
            frontier.push((root, 0));
        }

        while taken.len() < k {
            let Some((key, slot)) = frontier.pop() else {
                break;
            };
            taken.push(key);
            for child in [2 * slot + 1, 2 * slot + 2] {
                if let Some(next) = self.slots.get(child) {
                    frontier.push((next, child));
                }
            }
        }

        taken
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.slots[slot] <= self.slots[parent] {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut largest = slot;
            if left < len && self.slots[left] > self.slots[largest] {
                largest = left;
            }
            if right < len && self.slots[right] > self.slots[largest] {
                largest = right;
            }
            if largest == slot {
                break;
            }
            self.swap(slot, largest);
            slot = largest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
        if let Some(pos) = self.positions.get_mut(&self.slots[a].reg_no) {
            *pos = a;
        }
        if let Some(pos) = self.positions.get_mut(&self.slots[b].reg_no) {
            *pos = b;
        }
    }
}
