// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::cmp::Ordering;

use crate::error::{FmmError, Result};

const NOT_QUEUED: usize = usize::MAX;

/// Binary min-heap over grid points keyed by tentative distance.
///
/// Each point's heap slot is tracked in a side table updated on every swap,
/// so `decrease_key` and `contains` never scan the heap. Equal keys are
/// ordered by point index, smaller first.
#[derive(Debug, Default, Clone)]
pub struct IndexedMinHeap {
    entries: Vec<(f64, usize)>,
    slots: Vec<usize>,
}

#[inline]
fn precedes(a: (f64, usize), b: (f64, usize)) -> bool {
    match a.0.partial_cmp(&b.0) {
        Some(Ordering::Less) => true,
        Some(Ordering::Greater) => false,
        _ => a.1 < b.1,
    }
}

impl IndexedMinHeap {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty heap able to track points `0..num_points` without reallocating.
    pub fn with_capacity(num_points: usize) -> Self {
        IndexedMinHeap {
            entries: Vec::new(),
            slots: vec![NOT_QUEUED; num_points],
        }
    }

    /// Grow the slot table to cover points `0..num_points`.
    pub fn reserve(&mut self, num_points: usize) {
        if num_points > self.slots.len() {
            self.slots.resize(num_points, NOT_QUEUED);
        }
    }

    /// Number of queued points.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the heap is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `point` is currently queued. Never-inserted points are not.
    pub fn contains(&self, point: usize) -> bool {
        self.slots.get(point).is_some_and(|&s| s != NOT_QUEUED)
    }

    /// Current key of a queued point.
    pub fn key(&self, point: usize) -> Option<f64> {
        match self.slots.get(point) {
            Some(&s) if s != NOT_QUEUED => Some(self.entries[s].0),
            _ => None,
        }
    }

    /// Smallest entry without removing it.
    pub fn peek_min(&self) -> Option<(usize, f64)> {
        self.entries.first().map(|&(k, p)| (p, k))
    }

    /// Queue a point.
    ///
    /// # Errors
    /// Returns [`FmmError::DuplicateEntry`] if the point is already queued.
    pub fn insert(&mut self, point: usize, key: f64) -> Result<()> {
        if self.contains(point) {
            return Err(FmmError::DuplicateEntry { point });
        }
        self.reserve(point + 1);
        let slot = self.entries.len();
        self.entries.push((key, point));
        self.slots[point] = slot;
        self.sift_up(slot);
        Ok(())
    }

    /// Lower the key of a queued point. Returns `Ok(false)` and leaves the
    /// heap unchanged if `key` is not smaller than the current key.
    ///
    /// # Errors
    /// Returns [`FmmError::NotFound`] if the point is not queued.
    pub fn decrease_key(&mut self, point: usize, key: f64) -> Result<bool> {
        let slot = match self.slots.get(point) {
            Some(&s) if s != NOT_QUEUED => s,
            _ => return Err(FmmError::NotFound { point }),
        };
        if key.partial_cmp(&self.entries[slot].0) != Some(Ordering::Less) {
            return Ok(false);
        }
        self.entries[slot].0 = key;
        self.sift_up(slot);
        Ok(true)
    }

    /// Remove and return the entry with the smallest key.
    pub fn extract_min(&mut self) -> Option<(usize, f64)> {
        let last = self.entries.len().checked_sub(1)?;
        self.swap(0, last);
        let (key, point) = self.entries.pop()?;
        self.slots[point] = NOT_QUEUED;
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some((point, key))
    }

    /// Remove every entry, keeping the slot table allocation.
    pub fn clear(&mut self) {
        for &(_, p) in &self.entries {
            self.slots[p] = NOT_QUEUED;
        }
        self.entries.clear();
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.slots[self.entries[a].1] = a;
        self.slots[self.entries[b].1] = b;
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !precedes(self.entries[slot], self.entries[parent]) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * slot + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < len && precedes(self.entries[right], self.entries[left]) {
                child = right;
            }
            if !precedes(self.entries[child], self.entries[slot]) {
                break;
            }
            self.swap(slot, child);
            slot = child;
        }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        for (slot, &(_, p)) in self.entries.iter().enumerate() {
            assert_eq!(self.slots[p], slot, "slot table out of sync for {}", p);
            if slot > 0 {
                let parent = (slot - 1) / 2;
                assert!(!precedes(self.entries[slot], self.entries[parent]));
            }
        }
        let queued = self.slots.iter().filter(|&&s| s != NOT_QUEUED).count();
        assert_eq!(queued, self.entries.len());
    }
}
