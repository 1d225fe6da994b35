use std::collections::HashMap;

use uuid::Uuid;

use crate::events::{merge_loot_item, LootItem, WorldPoint};

/// Ticks a kill must age before its loot list is frozen, so multi-item
/// drops all land in one record.
pub const MIN_TRACKING_TICKS: u64 = 3;
/// Ticks after which a kill is finalized and removed regardless of loot.
pub const LOOT_TIMEOUT_TICKS: u64 = 10;
/// Game cycles to wait before re-scanning the scene for delayed drops.
pub const DELAYED_SCAN_CYCLES: u64 = 59;

#[derive(Debug, Clone)]
pub struct KillDetails {
    pub monster_name: String,
    pub monster_id: u32,
    pub combat_level: u32,
}

#[derive(Debug)]
struct ActiveKill {
    kill_id: Uuid,
    details: KillDetails,
    location: WorldPoint,
    items: Vec<LootItem>,
    ticks_since_kill: u64,
    finalized: bool,
}

/// A kill whose loot window has closed, ready to become an event.
#[derive(Debug, Clone)]
pub struct FinalizedKill {
    pub kill_id: Uuid,
    pub details: KillDetails,
    pub location: WorldPoint,
    pub items: Vec<LootItem>,
}

#[derive(Debug)]
struct DelayedScan {
    details: KillDetails,
    location: WorldPoint,
    region_id: u32,
    baseline: HashMap<i32, u32>,
    due_cycle: u64,
}

/// Associates detected kills with ground-item spawns near the death tile,
/// advancing each kill through a tick-driven loot window.
#[derive(Debug, Default)]
pub struct KillLootCorrelator {
    active: Vec<ActiveKill>,
    location_index: HashMap<WorldPoint, Uuid>,
    delayed: Vec<DelayedScan>,
}

/// NPCs whose loot arrives on a long delay with no attributable tile.
/// None are currently routed this way; kills matching here take the
/// scene-snapshot path instead of the location index.
pub fn needs_ground_snapshot(_npc_id: u32) -> bool {
    false
}

impl KillLootCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Registers a confirmed player-caused kill and indexes the death tile
    /// plus its eight neighbors. Overlapping nearby kills resolve to
    /// last-write-wins.
    pub fn record_kill(&mut self, details: KillDetails, location: WorldPoint) -> Uuid {
        let kill_id = Uuid::new_v4();
        for dx in -1..=1 {
            for dy in -1..=1 {
                let tile = WorldPoint::new(location.x + dx, location.y + dy, location.plane);
                self.location_index.insert(tile, kill_id);
            }
        }
        self.active.push(ActiveKill {
            kill_id,
            details,
            location,
            items: Vec::new(),
            ticks_since_kill: 0,
            finalized: false,
        });
        kill_id
    }

    /// Attributes a ground-item spawn to a nearby active kill. Returns false
    /// when the tile is not indexed, so the caller can treat the spawn as
    /// unrelated.
    pub fn attribute_spawn(&mut self, item: LootItem, location: WorldPoint) -> bool {
        let Some(kill_id) = self.location_index.get(&location).copied() else {
            return false;
        };
        let Some(kill) = self
            .active
            .iter_mut()
            .find(|kill| kill.kill_id == kill_id && !kill.finalized)
        else {
            return false;
        };
        merge_loot_item(&mut kill.items, item);
        true
    }

    /// Takes a scene-wide multiset snapshot for a kill whose loot cannot be
    /// tied to a tile, to be resolved by `poll_delayed_scans` later.
    pub fn begin_delayed_scan(
        &mut self,
        details: KillDetails,
        location: WorldPoint,
        baseline: HashMap<i32, u32>,
        current_cycle: u64,
    ) {
        self.delayed.push(DelayedScan {
            details,
            region_id: location.region_id(),
            location,
            baseline,
            due_cycle: current_cycle + DELAYED_SCAN_CYCLES,
        });
    }

    /// Advances every active kill by one tick and returns the kills whose
    /// loot window closed this tick. A kill with loot finalizes once the
    /// minimum tracking time has passed; a kill without loot finalizes at the
    /// timeout with an empty list. Either way each kill emits exactly once.
    pub fn advance_tick(&mut self) -> Vec<FinalizedKill> {
        let mut finalized = Vec::new();
        for kill in &mut self.active {
            kill.ticks_since_kill += 1;
            if kill.finalized {
                continue;
            }
            let past_min = kill.ticks_since_kill >= MIN_TRACKING_TICKS;
            let timed_out = kill.ticks_since_kill >= LOOT_TIMEOUT_TICKS;
            if past_min && (!kill.items.is_empty() || timed_out) {
                kill.finalized = true;
                finalized.push(FinalizedKill {
                    kill_id: kill.kill_id,
                    details: kill.details.clone(),
                    location: kill.location,
                    items: kill.items.clone(),
                });
            }
        }

        let expired: Vec<Uuid> = self
            .active
            .iter()
            .filter(|kill| kill.ticks_since_kill >= LOOT_TIMEOUT_TICKS)
            .map(|kill| kill.kill_id)
            .collect();
        if !expired.is_empty() {
            self.active
                .retain(|kill| kill.ticks_since_kill < LOOT_TIMEOUT_TICKS);
            self.location_index
                .retain(|_, kill_id| !expired.contains(kill_id));
        }
        finalized
    }

    /// Resolves due delayed scans against the current scene. The loot list is
    /// the count difference against the baseline snapshot, and only counts
    /// while the player remains in the kill's map region; leaving the region
    /// drops the scan without emitting.
    pub fn poll_delayed_scans(
        &mut self,
        current_cycle: u64,
        current_regions: &[u32],
        scene_counts: &HashMap<i32, u32>,
        name_of: impl Fn(i32) -> String,
    ) -> Vec<FinalizedKill> {
        let mut finalized = Vec::new();
        self.delayed.retain(|scan| {
            if current_cycle < scan.due_cycle {
                return true;
            }
            if current_regions.contains(&scan.region_id) {
                let mut items = Vec::new();
                for (id, count) in scene_counts {
                    let before = scan.baseline.get(id).copied().unwrap_or(0);
                    if *count > before {
                        items.push(LootItem {
                            item_id: *id,
                            item_name: name_of(*id),
                            quantity: count - before,
                        });
                    }
                }
                items.sort_by_key(|item| item.item_id);
                finalized.push(FinalizedKill {
                    kill_id: Uuid::new_v4(),
                    details: scan.details.clone(),
                    location: scan.location,
                    items,
                });
            }
            false
        });
        finalized
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{
        needs_ground_snapshot, KillDetails, KillLootCorrelator, LOOT_TIMEOUT_TICKS,
        MIN_TRACKING_TICKS,
    };
    use crate::events::{LootItem, WorldPoint};

    fn goblin() -> KillDetails {
        KillDetails {
            monster_name: "Goblin".to_owned(),
            monster_id: 3029,
            combat_level: 2,
        }
    }

    fn bones() -> LootItem {
        LootItem {
            item_id: 526,
            item_name: "Bones".to_owned(),
            quantity: 1,
        }
    }

    #[test]
    fn kill_with_loot_finalizes_after_minimum_window() {
        let mut correlator = KillLootCorrelator::new();
        correlator.record_kill(goblin(), WorldPoint::new(100, 100, 0));
        assert!(correlator.attribute_spawn(bones(), WorldPoint::new(101, 100, 0)));

        for tick in 1..MIN_TRACKING_TICKS {
            assert!(correlator.advance_tick().is_empty(), "tick {tick}");
        }
        let finalized = correlator.advance_tick();
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].items, vec![bones()]);
        assert_eq!(finalized[0].details.monster_name, "Goblin");
    }

    #[test]
    fn spawn_outside_radius_is_not_attributed() {
        let mut correlator = KillLootCorrelator::new();
        correlator.record_kill(goblin(), WorldPoint::new(100, 100, 0));
        assert!(!correlator.attribute_spawn(bones(), WorldPoint::new(105, 100, 0)));
    }

    #[test]
    fn lootless_kill_finalizes_empty_at_timeout() {
        let mut correlator = KillLootCorrelator::new();
        correlator.record_kill(goblin(), WorldPoint::new(100, 100, 0));

        let mut finalized = Vec::new();
        for _ in 0..LOOT_TIMEOUT_TICKS {
            finalized.extend(correlator.advance_tick());
        }
        assert_eq!(finalized.len(), 1);
        assert!(finalized[0].items.is_empty());
        assert_eq!(correlator.active_count(), 0);
    }

    #[test]
    fn each_kill_emits_exactly_once() {
        let mut correlator = KillLootCorrelator::new();
        correlator.record_kill(goblin(), WorldPoint::new(100, 100, 0));
        correlator.attribute_spawn(bones(), WorldPoint::new(100, 100, 0));

        let mut total = 0;
        for _ in 0..(LOOT_TIMEOUT_TICKS * 2) {
            total += correlator.advance_tick().len();
        }
        assert_eq!(total, 1);
    }

    #[test]
    fn index_entries_are_pruned_with_their_kill() {
        let mut correlator = KillLootCorrelator::new();
        correlator.record_kill(goblin(), WorldPoint::new(100, 100, 0));
        for _ in 0..LOOT_TIMEOUT_TICKS {
            correlator.advance_tick();
        }
        assert!(!correlator.attribute_spawn(bones(), WorldPoint::new(100, 100, 0)));
    }

    #[test]
    fn delayed_scan_emits_scene_difference_in_region() {
        let mut correlator = KillLootCorrelator::new();
        let location = WorldPoint::new(3200, 3200, 0);
        let baseline = HashMap::from([(526, 1)]);
        correlator.begin_delayed_scan(goblin(), location, baseline, 1000);

        // Not due yet.
        let scene = HashMap::from([(526, 2), (995, 100)]);
        assert!(correlator
            .poll_delayed_scans(1010, &[location.region_id()], &scene, |_| String::new())
            .is_empty());

        let finalized = correlator.poll_delayed_scans(
            1059,
            &[location.region_id()],
            &scene,
            |id| format!("Item {id}"),
        );
        assert_eq!(finalized.len(), 1);
        let items = &finalized[0].items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, 526);
        assert_eq!(items[0].quantity, 1);
        assert_eq!(items[1].item_id, 995);
        assert_eq!(items[1].quantity, 100);
    }

    #[test]
    fn delayed_scan_dropped_after_leaving_region() {
        let mut correlator = KillLootCorrelator::new();
        let location = WorldPoint::new(3200, 3200, 0);
        correlator.begin_delayed_scan(goblin(), location, HashMap::new(), 0);

        let scene = HashMap::from([(526, 1)]);
        assert!(correlator
            .poll_delayed_scans(100, &[9999], &scene, |_| String::new())
            .is_empty());
        // The scan is consumed; returning to the region later emits nothing.
        assert!(correlator
            .poll_delayed_scans(200, &[location.region_id()], &scene, |_| String::new())
            .is_empty());
    }

    #[test]
    fn no_npc_currently_requires_a_ground_snapshot() {
        assert!(!needs_ground_snapshot(3029));
    }
}
