use std::collections::HashMap;

use crate::events::{PlayerInfo, WorldPoint};
use crate::protocol::{ClientSync, GroundItem, RaidStatus, SkillState, SlotItem};

/// Cached view of the queryable client state, refreshed by periodic sync
/// payloads and nudged along by incremental signals between them.
#[derive(Debug, Default)]
pub struct ClientState {
    pub player_name: Option<String>,
    pub player_id: i64,
    pub combat_level: u32,
    pub location: Option<WorldPoint>,
    pub map_regions: Vec<u32>,
    pub skills: HashMap<String, SkillState>,
    pub inventory: Vec<SlotItem>,
    pub ground_items: Vec<GroundItem>,
    pub raid: Option<RaidStatus>,
    pub game_tick: u64,
    pub game_cycle: u64,
    pub world_id: u32,
    item_names: HashMap<i32, String>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_sync(&mut self, sync: ClientSync) {
        if sync.player_name.is_some() {
            self.player_name = sync.player_name;
            self.player_id = sync.player_id;
            self.combat_level = sync.combat_level;
        }
        if sync.location.is_some() {
            self.location = sync.location;
        }
        if !sync.map_regions.is_empty() {
            self.map_regions = sync.map_regions;
        }
        for skill in sync.skills {
            self.skills.insert(skill.name.clone(), skill);
        }
        self.inventory = sync.inventory;
        self.ground_items = sync.ground_items;
        self.raid = sync.raid;
        self.game_cycle = sync.game_cycle;
        for (id, name) in sync.item_names {
            self.item_names.insert(id, name);
        }
    }

    pub fn advance_tick(&mut self, tick: u64) {
        self.game_tick = tick;
        // Cycles run at 50/s against the 0.6 s tick; keep the counter moving
        // between syncs so cycle-delayed work still fires.
        self.game_cycle = self.game_cycle.max(tick * 30);
    }

    pub fn in_region(&self, region: u32) -> bool {
        self.map_regions.contains(&region)
    }

    pub fn in_any_region(&self, regions: &[u32]) -> bool {
        regions.iter().any(|region| self.in_region(*region))
    }

    pub fn skill_level(&self, name: &str) -> u32 {
        self.skills.get(name).map(|skill| skill.level).unwrap_or(0)
    }

    pub fn boosted_skill_level(&self, name: &str) -> u32 {
        self.skills
            .get(name)
            .map(|skill| skill.boosted_level.max(skill.level))
            .unwrap_or(0)
    }

    pub fn item_name(&self, id: i32) -> String {
        self.item_names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Item {id}"))
    }

    pub fn remember_item_name(&mut self, id: i32, name: &str) {
        self.item_names.entry(id).or_insert_with(|| name.to_owned());
    }

    /// Counts of every item stack currently visible on the scene floor.
    pub fn ground_item_counts(&self) -> HashMap<i32, u32> {
        let mut counts: HashMap<i32, u32> = HashMap::new();
        for item in &self.ground_items {
            *counts.entry(item.id).or_default() += item.quantity;
        }
        counts
    }

    /// Identity and progression summary, available once a sync has named the
    /// local player.
    pub fn player_info(&self) -> Option<PlayerInfo> {
        let name = self.player_name.clone()?;
        let total_level = self.skills.values().map(|skill| skill.level).sum();
        let total_xp = self.skills.values().map(|skill| skill.xp).sum();
        Some(PlayerInfo {
            player_name: name,
            player_id: self.player_id,
            combat_level: self.combat_level,
            total_level,
            total_xp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ClientState;
    use crate::events::WorldPoint;
    use crate::protocol::{ClientSync, GroundItem, SkillState};

    fn sync_with_player() -> ClientSync {
        ClientSync {
            player_name: Some("Zezima".to_owned()),
            player_id: 77,
            combat_level: 126,
            location: Some(WorldPoint::new(3221, 3218, 0)),
            map_regions: vec![12850],
            skills: vec![
                SkillState {
                    name: "Attack".to_owned(),
                    level: 99,
                    boosted_level: 99,
                    xp: 13_034_431,
                },
                SkillState {
                    name: "Herblore".to_owned(),
                    level: 80,
                    boosted_level: 84,
                    xp: 1_986_068,
                },
            ],
            inventory: Vec::new(),
            ground_items: vec![
                GroundItem {
                    id: 995,
                    quantity: 100,
                },
                GroundItem {
                    id: 995,
                    quantity: 50,
                },
            ],
            raid: None,
            game_cycle: 4200,
            item_names: vec![(995, "Coins".to_owned())],
        }
    }

    #[test]
    fn player_info_sums_skill_totals() {
        let mut state = ClientState::new();
        state.apply_sync(sync_with_player());

        let info = state.player_info().expect("expected player info");
        assert_eq!(info.player_name, "Zezima");
        assert_eq!(info.total_level, 179);
        assert_eq!(info.total_xp, 13_034_431 + 1_986_068);
    }

    #[test]
    fn player_info_absent_before_first_sync() {
        assert!(ClientState::new().player_info().is_none());
    }

    #[test]
    fn ground_item_counts_merge_stacks() {
        let mut state = ClientState::new();
        state.apply_sync(sync_with_player());

        let counts = state.ground_item_counts();
        assert_eq!(counts.get(&995), Some(&150));
    }

    #[test]
    fn boosted_level_never_reads_below_base() {
        let mut state = ClientState::new();
        state.apply_sync(sync_with_player());

        assert_eq!(state.boosted_skill_level("Herblore"), 84);
        assert_eq!(state.boosted_skill_level("Attack"), 99);
        assert_eq!(state.skill_level("Runecraft"), 0);
    }

    #[test]
    fn item_name_falls_back_to_id() {
        let mut state = ClientState::new();
        state.apply_sync(sync_with_player());

        assert_eq!(state.item_name(995), "Coins");
        assert_eq!(state.item_name(4151), "Item 4151");
    }
}
