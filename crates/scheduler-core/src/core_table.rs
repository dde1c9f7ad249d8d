//! Bitmap of logical CPU cores with allocate/release accounting.
//!
//! Allocation here is purely an accounting action: it does not pin the
//! worker's OS thread to the core by default (`enable_cpu_affinity` in the
//! Control API records an intent flag but this table never calls into
//! `sched_setaffinity` itself).

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
struct CoreSlot {
    available: bool,
    last_used: Option<DateTime<Utc>>,
}

/// Fixed-size table of `num_cores` logical core slots.
#[derive(Debug)]
pub struct CoreTable {
    slots: Vec<CoreSlot>,
}

impl CoreTable {
    pub fn new(num_cores: usize) -> Self {
        CoreTable {
            slots: vec![
                CoreSlot {
                    available: true,
                    last_used: None,
                };
                num_cores.max(1)
            ],
        }
    }

    pub fn num_cores(&self) -> usize {
        self.slots.len()
    }

    /// First free slot by lowest index, or `None` if all are allocated.
    pub fn allocate(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let slot = self.slots.iter_mut().enumerate().find(|(_, s)| s.available);
        if let Some((idx, slot)) = slot {
            slot.available = false;
            slot.last_used = Some(now);
            Some(idx)
        } else {
            None
        }
    }

    /// Allocate exactly `k` free slots, or none at all if fewer than `k`
    /// are currently free (no partial allocation).
    pub fn allocate_n(&mut self, k: usize, now: DateTime<Utc>) -> Option<Vec<usize>> {
        let free: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.available)
            .map(|(idx, _)| idx)
            .take(k)
            .collect();
        if free.len() < k {
            return None;
        }
        for &idx in &free {
            self.slots[idx].available = false;
            self.slots[idx].last_used = Some(now);
        }
        Some(free)
    }

    /// Mark a slot available. Idempotent: releasing an already-free slot
    /// (or an out-of-range index) is a no-op.
    pub fn release(&mut self, core_id: i64) {
        if core_id < 0 {
            return;
        }
        if let Some(slot) = self.slots.get_mut(core_id as usize) {
            slot.available = true;
        }
    }

    pub fn release_all(&mut self, core_ids: &[i64]) {
        for &id in core_ids {
            self.release(id);
        }
    }

    pub fn allocated_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.available).count()
    }

    pub fn is_available(&self, core_id: usize) -> Option<bool> {
        self.slots.get(core_id).map(|s| s.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_picks_lowest_free_index() {
        let mut table = CoreTable::new(4);
        assert_eq!(table.allocate(Utc::now()), Some(0));
        assert_eq!(table.allocate(Utc::now()), Some(1));
        table.release(0);
        assert_eq!(table.allocate(Utc::now()), Some(0));
    }

    #[test]
    fn allocate_exhausts_and_returns_none() {
        let mut table = CoreTable::new(1);
        assert_eq!(table.allocate(Utc::now()), Some(0));
        assert_eq!(table.allocate(Utc::now()), None);
    }

    #[test]
    fn release_of_free_slot_is_a_no_op() {
        let mut table = CoreTable::new(2);
        table.release(0);
        table.release(0);
        assert_eq!(table.allocated_count(), 0);
    }

    #[test]
    fn allocate_n_is_all_or_nothing() {
        let mut table = CoreTable::new(2);
        assert!(table.allocate_n(3, Utc::now()).is_none());
        assert_eq!(table.allocated_count(), 0);
        assert_eq!(table.allocate_n(2, Utc::now()), Some(vec![0, 1]));
    }
}
