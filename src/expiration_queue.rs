// ⏳ Expiration Queue - indexed binary min-heap
//
// Ordered by (expiration_date, plate). A side map plate → heap slot is
// kept in step with every swap, so removing an arbitrary plate costs
// O(log n) instead of a scan. A plate is tracked at most once.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One tracked registration.
///
/// Field order matters: the derived ordering compares the date first and
/// breaks ties on the plate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HeapEntry {
    pub expiration_date: NaiveDate,
    pub plate: String,
}

impl HeapEntry {
    pub fn new(plate: &str, expiration_date: NaiveDate) -> Self {
        HeapEntry {
            expiration_date,
            plate: plate.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ExpirationQueue {
    heap: Vec<HeapEntry>,
    positions: HashMap<String, usize>,
}

impl ExpirationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, plate: &str) -> bool {
        self.positions.contains_key(plate)
    }

    pub fn expiration_of(&self, plate: &str) -> Option<NaiveDate> {
        self.positions
            .get(plate)
            .map(|&slot| self.heap[slot].expiration_date)
    }

    /// Track a plate. A plate already tracked has its entry replaced,
    /// and the old date is returned.
    pub fn add(&mut self, plate: &str, expiration_date: NaiveDate) -> Option<NaiveDate> {
        if self.contains(plate) {
            return self.replace(plate, expiration_date);
        }

        let slot = self.heap.len();
        self.heap.push(HeapEntry::new(plate, expiration_date));
        self.positions.insert(plate.to_string(), slot);
        self.sift_up(slot);
        None
    }

    /// Earliest expiration, left in place
    pub fn peek_next(&self) -> Option<&HeapEntry> {
        self.heap.first()
    }

    /// Earliest expiration, removed
    pub fn extract_next(&mut self) -> Option<HeapEntry> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Stop tracking a plate. None if it was not tracked.
    pub fn remove(&mut self, plate: &str) -> Option<HeapEntry> {
        let slot = *self.positions.get(plate)?;
        Some(self.remove_at(slot))
    }

    /// Move a tracked plate to a new date in one step.
    ///
    /// Returns the old date, or None (and changes nothing) if the plate
    /// is not tracked.
    pub fn replace(&mut self, plate: &str, expiration_date: NaiveDate) -> Option<NaiveDate> {
        let slot = *self.positions.get(plate)?;
        let old = std::mem::replace(&mut self.heap[slot].expiration_date, expiration_date);

        if expiration_date < old {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
        Some(old)
    }

    /// Every entry in extraction order, without draining the queue
    pub fn sorted(&self) -> Vec<HeapEntry> {
        let mut entries = self.heap.clone();
        entries.sort();
        entries
    }

    /// Entries expiring strictly before `cutoff`, soonest first.
    ///
    /// Only subtrees whose root is before the cutoff are visited.
    pub fn expiring_before(&self, cutoff: NaiveDate) -> Vec<HeapEntry> {
        let mut result = Vec::new();
        let mut stack = vec![0];

        while let Some(slot) = stack.pop() {
            match self.heap.get(slot) {
                Some(entry) if entry.expiration_date < cutoff => {
                    result.push(entry.clone());
                    stack.push(2 * slot + 1);
                    stack.push(2 * slot + 2);
                }
                _ => {}
            }
        }

        result.sort();
        result
    }

    /// Heap entries in storage order (not sorted)
    pub fn iter(&self) -> impl Iterator<Item = &HeapEntry> {
        self.heap.iter()
    }

    // ========================================================================
    // HEAP MAINTENANCE
    // ========================================================================

    fn remove_at(&mut self, slot: usize) -> HeapEntry {
        let removed = self.heap.swap_remove(slot);
        self.positions.remove(&removed.plate);

        if slot < self.heap.len() {
            // The former last entry now sits at `slot` and may belong above or below it
            self.positions.insert(self.heap[slot].plate.clone(), slot);
            self.sift_down(slot);
            self.sift_up(slot);
        }
        removed
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[slot] >= self.heap[parent] {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;

            if left < len && self.heap[left] < self.heap[smallest] {
                smallest = left;
            }
            if right < len && self.heap[right] < self.heap[smallest] {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].plate.clone(), a);
        self.positions.insert(self.heap[b].plate.clone(), b);
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        assert_eq!(self.heap.len(), self.positions.len());
        for (slot, entry) in self.heap.iter().enumerate() {
            assert_eq!(self.positions[&entry.plate], slot);
            if slot > 0 {
                assert!(self.heap[(slot - 1) / 2] <= *entry, "heap order broken at {}", slot);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample() -> ExpirationQueue {
        let mut queue = ExpirationQueue::new();
        queue.add("ABC123", date("2024-01-15"));
        queue.add("XYZ789", date("2023-12-01"));
        queue.add("DEF456", date("2024-03-10"));
        queue.add("LMN101", date("2023-11-20"));
        queue
    }

    #[test]
    fn test_peek_returns_earliest() {
        let queue = sample();

        let next = queue.peek_next().unwrap();
        assert_eq!(next.plate, "LMN101");
        assert_eq!(next.expiration_date, date("2023-11-20"));
        assert_eq!(queue.len(), 4);
        queue.check_invariants();
    }

    #[test]
    fn test_extract_in_date_order() {
        let mut queue = sample();

        let mut plates = Vec::new();
        while let Some(entry) = queue.extract_next() {
            queue.check_invariants();
            plates.push(entry.plate);
        }

        assert_eq!(plates, vec!["LMN101", "XYZ789", "ABC123", "DEF456"]);
        assert!(queue.peek_next().is_none());
        assert!(queue.extract_next().is_none());
    }

    #[test]
    fn test_ties_break_on_plate() {
        let mut queue = ExpirationQueue::new();
        queue.add("ZZZ999", date("2024-01-01"));
        queue.add("AAA111", date("2024-01-01"));
        queue.add("MMM555", date("2024-01-01"));

        assert_eq!(queue.extract_next().unwrap().plate, "AAA111");
        assert_eq!(queue.extract_next().unwrap().plate, "MMM555");
        assert_eq!(queue.extract_next().unwrap().plate, "ZZZ999");
    }

    #[test]
    fn test_remove_specific_plate() {
        let mut queue = sample();

        let removed = queue.remove("DEF456").unwrap();
        assert_eq!(removed.expiration_date, date("2024-03-10"));
        assert!(!queue.contains("DEF456"));
        assert_eq!(queue.len(), 3);
        queue.check_invariants();

        assert!(queue.remove("NONEXISTENT").is_none());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_remove_head() {
        let mut queue = sample();
        queue.remove("LMN101");

        assert_eq!(queue.peek_next().unwrap().plate, "XYZ789");
        queue.check_invariants();
    }

    #[test]
    fn test_replace_moves_entry() {
        let mut queue = sample();

        assert_eq!(queue.replace("XYZ789", date("2024-05-01")), Some(date("2023-12-01")));
        queue.check_invariants();
        assert_eq!(
            queue.sorted().iter().map(|e| e.plate.as_str()).collect::<Vec<_>>(),
            vec!["LMN101", "ABC123", "DEF456", "XYZ789"]
        );

        assert_eq!(queue.replace("DEF456", date("2020-01-01")), Some(date("2024-03-10")));
        assert_eq!(queue.peek_next().unwrap().plate, "DEF456");
        queue.check_invariants();
    }

    #[test]
    fn test_replace_untracked_changes_nothing() {
        let mut queue = sample();
        let before = queue.sorted();

        assert_eq!(queue.replace("NON123", date("2025-01-01")), None);
        assert_eq!(queue.sorted(), before);
    }

    #[test]
    fn test_add_twice_keeps_single_entry() {
        let mut queue = ExpirationQueue::new();
        assert_eq!(queue.add("ABC123", date("2024-01-15")), None);
        assert_eq!(queue.add("ABC123", date("2025-01-15")), Some(date("2024-01-15")));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.expiration_of("ABC123"), Some(date("2025-01-15")));
    }

    #[test]
    fn test_sorted_does_not_drain() {
        let queue = sample();
        let sorted = queue.sorted();

        assert_eq!(sorted.len(), 4);
        assert_eq!(sorted[0].plate, "LMN101");
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_expiring_before() {
        let queue = sample();

        let soon = queue.expiring_before(date("2024-01-15"));
        let plates: Vec<&str> = soon.iter().map(|e| e.plate.as_str()).collect();
        assert_eq!(plates, vec!["LMN101", "XYZ789"]);

        assert!(queue.expiring_before(date("2000-01-01")).is_empty());
        assert_eq!(queue.expiring_before(date("2100-01-01")).len(), 4);
    }

    #[test]
    fn test_many_removals_keep_heap_valid() {
        let mut queue = ExpirationQueue::new();
        let base = date("2024-01-01");
        for i in 0..100u32 {
            // Scrambled dates
            let offset = (i * 37) % 100;
            queue.add(&format!("P{:03}", i), base + chrono::Duration::days(offset as i64));
        }
        for i in (0..100).step_by(7) {
            assert!(queue.remove(&format!("P{:03}", i)).is_some());
            queue.check_invariants();
        }

        let mut last = None;
        while let Some(entry) = queue.extract_next() {
            if let Some(prev) = last {
                assert!(prev <= entry.expiration_date);
            }
            last = Some(entry.expiration_date);
        }
    }
}
