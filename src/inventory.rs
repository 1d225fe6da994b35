use std::collections::{BTreeSet, HashMap};

use crate::protocol::SlotItem;

/// Consolidated view of a container: quantity per item id summed across
/// slots, plus the occupied slot set per item id. Replaced wholesale on each
/// capture, never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    quantities: HashMap<i32, u32>,
    slots: HashMap<i32, BTreeSet<usize>>,
}

impl InventorySnapshot {
    pub fn capture(items: &[SlotItem]) -> Self {
        let mut snapshot = Self::default();
        for item in items {
            if item.id < 0 || item.quantity == 0 {
                continue;
            }
            *snapshot.quantities.entry(item.id).or_default() += item.quantity;
            snapshot.slots.entry(item.id).or_default().insert(item.slot);
        }
        snapshot
    }

    pub fn quantity(&self, item_id: i32) -> u32 {
        self.quantities.get(&item_id).copied().unwrap_or(0)
    }

    pub fn item_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.quantities.keys().copied()
    }
}

/// An item whose total quantity is unchanged but whose occupied slots are
/// not, a rearrangement rather than a gain or loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedItem {
    pub item_id: i32,
    pub old_slots: Vec<usize>,
    pub new_slots: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryDiff {
    pub added: HashMap<i32, u32>,
    pub removed: HashMap<i32, u32>,
    pub moved: Vec<MovedItem>,
}

impl InventoryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }
}

/// Computes per-item net change between two snapshots. Quantities are
/// clamped at zero in each direction; items with no net change and no slot
/// movement produce nothing.
pub fn diff(previous: &InventorySnapshot, current: &InventorySnapshot) -> InventoryDiff {
    let mut out = InventoryDiff::default();
    let ids: BTreeSet<i32> = previous.item_ids().chain(current.item_ids()).collect();
    for id in ids {
        let before = previous.quantity(id);
        let after = current.quantity(id);
        if after > before {
            out.added.insert(id, after - before);
        } else if before > after {
            out.removed.insert(id, before - after);
        } else {
            let old_slots = previous.slots.get(&id);
            let new_slots = current.slots.get(&id);
            if old_slots != new_slots {
                out.moved.push(MovedItem {
                    item_id: id,
                    old_slots: old_slots.map(|s| s.iter().copied().collect()).unwrap_or_default(),
                    new_slots: new_slots.map(|s| s.iter().copied().collect()).unwrap_or_default(),
                });
            }
        }
    }
    out
}

/// Tracks successive container snapshots. The first snapshot after
/// construction or a `reset` establishes the baseline only and yields no
/// diff, so items already held do not register as gains.
#[derive(Debug, Default)]
pub struct InventoryDeltaTracker {
    baseline: Option<InventorySnapshot>,
}

impl InventoryDeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the baseline so the next observation re-establishes it.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Replaces the baseline with the current container contents without
    /// diffing, used when a reward trigger wants a fresh reference point.
    pub fn rebaseline(&mut self, items: &[SlotItem]) {
        self.baseline = Some(InventorySnapshot::capture(items));
    }

    pub fn observe(&mut self, items: &[SlotItem]) -> Option<InventoryDiff> {
        let current = InventorySnapshot::capture(items);
        let previous = match self.baseline.replace(current.clone()) {
            Some(previous) => previous,
            None => return None,
        };
        let delta = diff(&previous, &current);
        (!delta.is_empty()).then_some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::{diff, InventoryDeltaTracker, InventorySnapshot};
    use crate::protocol::SlotItem;

    fn slot(slot: usize, id: i32, quantity: u32) -> SlotItem {
        SlotItem {
            slot,
            id,
            quantity,
            name: None,
        }
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let snapshot = InventorySnapshot::capture(&[slot(0, 10, 5), slot(3, 20, 1)]);
        assert!(diff(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn diff_reports_net_gains_per_item() {
        let before = InventorySnapshot::capture(&[slot(0, 10, 5)]);
        let after = InventorySnapshot::capture(&[slot(0, 10, 8), slot(1, 20, 1)]);

        let delta = diff(&before, &after);
        assert_eq!(delta.added.get(&10), Some(&3));
        assert_eq!(delta.added.get(&20), Some(&1));
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn stackable_quantities_sum_across_slots() {
        let snapshot = InventorySnapshot::capture(&[slot(0, 995, 100), slot(7, 995, 50)]);
        assert_eq!(snapshot.quantity(995), 150);
    }

    #[test]
    fn first_observation_is_baseline_only() {
        let mut tracker = InventoryDeltaTracker::new();
        assert!(tracker.observe(&[slot(0, 10, 5)]).is_none());

        let delta = tracker
            .observe(&[slot(0, 10, 8)])
            .expect("expected a diff after baseline");
        assert_eq!(delta.added.get(&10), Some(&3));
    }

    #[test]
    fn reset_rearms_the_baseline() {
        let mut tracker = InventoryDeltaTracker::new();
        tracker.observe(&[slot(0, 10, 5)]);
        tracker.reset();
        assert!(tracker.observe(&[slot(0, 10, 50)]).is_none());
    }

    #[test]
    fn unchanged_total_with_new_slots_classifies_as_moved() {
        let before = InventorySnapshot::capture(&[slot(0, 4151, 1)]);
        let after = InventorySnapshot::capture(&[slot(27, 4151, 1)]);

        let delta = diff(&before, &after);
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(delta.moved.len(), 1);
        assert_eq!(delta.moved[0].old_slots, vec![0]);
        assert_eq!(delta.moved[0].new_slots, vec![27]);
    }
}
