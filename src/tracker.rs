use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::achievements;
use crate::combat;
use crate::events::{EventLog, LootItem, PlayerInfo};
use crate::inventory::InventoryDeltaTracker;
use crate::kills::{needs_ground_snapshot, FinalizedKill, KillDetails, KillLootCorrelator};
use crate::protocol::{NpcInfo, RawSignal};
use crate::rewards::{RewardEngine, INVENTORY_CONTAINER};
use crate::skills::XpTracker;
use crate::state::ClientState;
use crate::text::strip_color_tags;

/// The most recent NPC the player was seen engaging, written only from the
/// animation path. Kill attribution falls back to it when neither actor is
/// interacting with the other at death time.
#[derive(Debug, Default)]
pub struct InteractionContext {
    pub last_npc_target: Option<u32>,
    pub last_npc_name: Option<String>,
}

/// Routes every raw client signal to its classifier and collects the
/// resulting events into the shared log.
pub struct EventTracker {
    log: Arc<EventLog>,
    state: ClientState,
    rewards: RewardEngine,
    kills: KillLootCorrelator,
    inventory: InventoryDeltaTracker,
    xp: XpTracker,
    interaction: InteractionContext,
}

impl EventTracker {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            log,
            state: ClientState::new(),
            rewards: RewardEngine::new(),
            kills: KillLootCorrelator::new(),
            inventory: InventoryDeltaTracker::new(),
            xp: XpTracker::new(),
            interaction: InteractionContext::default(),
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn player_info(&self) -> Option<PlayerInfo> {
        self.state.player_info()
    }

    fn record(&self, event_type: &str, details: Value) {
        self.log.record(event_type, self.state.location, details);
    }

    pub fn handle_signal(&mut self, signal: RawSignal, now: DateTime<Utc>) {
        match signal {
            RawSignal::ClientSync(sync) => {
                if !self.xp.is_initialized() && !sync.skills.is_empty() {
                    self.xp.initialize(&sync.skills);
                }
                self.state.apply_sync(sync);
                if !self.inventory.has_baseline() {
                    self.inventory.rebaseline(&self.state.inventory);
                }
            }
            RawSignal::ChatMessage { message_type, text } => {
                self.handle_chat(&message_type, &text, now);
            }
            RawSignal::MenuClick {
                option,
                target,
                item_id,
                object_id,
                id,
                is_item_op,
                is_object_op,
            } => {
                let mut details = serde_json::Map::new();
                details.insert(
                    "action".to_owned(),
                    json!(strip_color_tags(Some(&option))),
                );
                details.insert(
                    "target".to_owned(),
                    json!(strip_color_tags(Some(&target))),
                );
                if let Some(id) = id.filter(|id| *id != -1) {
                    details.insert("id".to_owned(), json!(id));
                }
                self.record("MENU_CLICK", Value::Object(details));

                self.rewards.handle_menu_click(
                    &option,
                    item_id,
                    object_id,
                    is_item_op,
                    is_object_op,
                    &self.state,
                    now,
                );
            }
            RawSignal::InventoryChanged {
                container_id,
                items,
            } => {
                for details in
                    self.rewards
                        .handle_inventory_changed(container_id, &items, &self.state, now)
                {
                    self.record("REWARD", details);
                }
                if container_id == INVENTORY_CONTAINER {
                    self.state.inventory = items.clone();
                    for item in &items {
                        if let Some(name) = &item.name {
                            self.state.remember_item_name(item.id, name);
                        }
                    }
                    self.emit_inventory_changes(&items);
                }
            }
            RawSignal::ActorDeath { npc } => self.handle_actor_death(&npc),
            RawSignal::ItemSpawned {
                item_id,
                quantity,
                name,
                location,
            } => {
                if let Some(name) = &name {
                    self.state.remember_item_name(item_id, name);
                }
                let item = LootItem {
                    item_id,
                    item_name: name.unwrap_or_else(|| self.state.item_name(item_id)),
                    quantity,
                };
                self.kills.attribute_spawn(item, location);
            }
            RawSignal::NpcDespawned { npc } => {
                if needs_ground_snapshot(npc.id) {
                    let location = npc.location.or(self.state.location);
                    if let Some(location) = location {
                        self.kills.begin_delayed_scan(
                            kill_details(&npc),
                            location,
                            self.state.ground_item_counts(),
                            self.state.game_cycle,
                        );
                    }
                }
            }
            RawSignal::AnimationChanged { npc } => {
                if npc.targeted_by_player {
                    self.interaction.last_npc_target = Some(npc.id);
                    self.interaction.last_npc_name =
                        npc.name.as_deref().map(|name| strip_color_tags(Some(name)));
                }
            }
            RawSignal::WidgetLoaded { group_id, root } => {
                match group_id {
                    achievements::ACHIEVEMENT_DIARY_GROUP => {
                        if let Some(root) = &root {
                            for found in achievements::classify_diary_interface(root) {
                                self.record(found.event_type, found.details);
                            }
                        }
                    }
                    achievements::COMBAT_ACHIEVEMENT_GROUP => {
                        if let Some(root) = &root {
                            for found in achievements::classify_combat_interface(root) {
                                self.record(found.event_type, found.details);
                            }
                        }
                    }
                    _ => {
                        if let Some(details) = self.rewards.handle_widget_loaded(
                            group_id,
                            root.as_ref(),
                            &self.state,
                            now,
                        ) {
                            self.record("REWARD", details);
                        }
                    }
                }
            }
            RawSignal::StatChanged { skill, xp, level } => {
                if let Some(details) = self.xp.observe(&skill, xp, level) {
                    self.record("XP_GAIN", details);
                }
            }
            RawSignal::Hitsplat {
                target_name,
                target_is_player,
                target_is_interaction,
                amount,
                hitsplat_type,
                attacker_name,
            } => {
                if let Some(details) = combat::classify_hitsplat(
                    target_is_player,
                    target_is_interaction,
                    target_name.as_deref(),
                    attacker_name.as_deref(),
                    amount,
                    hitsplat_type,
                ) {
                    self.record("HIT_SPLAT", details);
                }
            }
            RawSignal::WorldChanged { world_id } => {
                self.state.world_id = world_id;
                self.record("WORLD_CHANGE", json!({ "worldId": world_id }));
            }
            RawSignal::SceneLoading => self.rewards.scene_loading(),
            RawSignal::GameTick { tick } => self.handle_tick(tick, now),
        }
    }

    /// Completion checks run before any reward rule; a message that lands a
    /// completion never doubles as a reward trigger.
    fn handle_chat(&mut self, message_type: &str, text: &str, now: DateTime<Utc>) {
        let completions = achievements::classify_chat(message_type, text);
        if !completions.is_empty() {
            for found in completions {
                self.record(found.event_type, found.details);
            }
            return;
        }
        let interacting = self.interaction.last_npc_name.clone();
        self.rewards
            .handle_chat(message_type, text, interacting.as_deref(), &self.state, now);
    }

    fn handle_actor_death(&mut self, npc: &NpcInfo) {
        let attributed = npc.targeted_by_player
            || npc.targeting_player
            || self.interaction.last_npc_target == Some(npc.id);
        if !attributed {
            return;
        }
        let Some(location) = npc.location.or(self.state.location) else {
            return;
        };
        if needs_ground_snapshot(npc.id) {
            self.kills.begin_delayed_scan(
                kill_details(npc),
                location,
                self.state.ground_item_counts(),
                self.state.game_cycle,
            );
            return;
        }
        self.kills.record_kill(kill_details(npc), location);
    }

    fn handle_tick(&mut self, tick: u64, now: DateTime<Utc>) {
        self.state.advance_tick(tick);

        let finalized = self.kills.advance_tick();
        for kill in finalized {
            self.record("MONSTER_KILL", kill_event_details(&kill));
        }

        let counts = self.state.ground_item_counts();
        let delayed = self.kills.poll_delayed_scans(
            self.state.game_cycle,
            &self.state.map_regions,
            &counts,
            |id| self.state.item_name(id),
        );
        for kill in delayed {
            self.record("MONSTER_KILL", kill_event_details(&kill));
        }

        self.rewards.advance_tick(now);
    }

    /// Per-item ADD and MOVE records, matching totals summed across slots.
    fn emit_inventory_changes(&mut self, items: &[crate::protocol::SlotItem]) {
        let Some(delta) = self.inventory.observe(items) else {
            return;
        };
        let mut added: Vec<_> = delta.added.iter().collect();
        added.sort_by_key(|(id, _)| **id);
        for (id, quantity) in added {
            self.record(
                "INVENTORY_CHANGE",
                json!({
                    "itemId": id,
                    "itemName": self.state.item_name(*id),
                    "quantity": quantity,
                    "changeType": "ADD",
                }),
            );
        }
        for moved in &delta.moved {
            self.record(
                "INVENTORY_CHANGE",
                json!({
                    "itemId": moved.item_id,
                    "itemName": self.state.item_name(moved.item_id),
                    "quantity": self.state
                        .inventory
                        .iter()
                        .filter(|item| item.id == moved.item_id)
                        .map(|item| item.quantity)
                        .sum::<u32>(),
                    "changeType": "MOVE",
                    "oldPositions": moved.old_slots,
                    "newPositions": moved.new_slots,
                }),
            );
        }
    }
}

fn kill_details(npc: &NpcInfo) -> KillDetails {
    KillDetails {
        monster_name: strip_color_tags(npc.name.as_deref()),
        monster_id: npc.id,
        combat_level: npc.combat_level,
    }
}

fn kill_event_details(kill: &FinalizedKill) -> Value {
    json!({
        "monsterName": kill.details.monster_name,
        "monsterId": kill.details.monster_id,
        "combatLevel": kill.details.combat_level,
        "regionId": kill.location.region_id(),
        "x": kill.location.x,
        "y": kill.location.y,
        "plane": kill.location.plane,
        "killId": kill.kill_id.to_string(),
        "items": kill.items,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;

    use super::EventTracker;
    use crate::events::{EventLog, WorldPoint};
    use crate::protocol::{ClientSync, NpcInfo, RawSignal, SkillState, SlotItem};

    fn tracker() -> (EventTracker, Arc<EventLog>) {
        let log = Arc::new(EventLog::new());
        let mut tracker = EventTracker::new(Arc::clone(&log));
        tracker.handle_signal(
            RawSignal::ClientSync(ClientSync {
                player_name: Some("Tester".to_owned()),
                player_id: 9,
                combat_level: 100,
                location: Some(WorldPoint::new(100, 100, 0)),
                map_regions: vec![WorldPoint::new(100, 100, 0).region_id()],
                skills: vec![SkillState {
                    name: "Attack".to_owned(),
                    level: 70,
                    boosted_level: 70,
                    xp: 737_627,
                }],
                inventory: Vec::new(),
                ground_items: Vec::new(),
                raid: None,
                game_cycle: 100,
                item_names: vec![(526, "Bones".to_owned()), (995, "Coins".to_owned())],
            }),
            Utc::now(),
        );
        (tracker, log)
    }

    fn goblin(location: WorldPoint) -> NpcInfo {
        NpcInfo {
            id: 3029,
            name: Some("<col=ffff00>Goblin</col=ffff00>".to_owned()),
            combat_level: 2,
            location: Some(location),
            targeted_by_player: true,
            targeting_player: false,
        }
    }

    fn tick(tracker: &mut EventTracker, n: u64) {
        for i in 0..n {
            tracker.handle_signal(RawSignal::GameTick { tick: i + 1 }, Utc::now());
        }
    }

    #[test]
    fn nearby_spawn_lands_in_the_kill_event() {
        let (mut tracker, log) = tracker();
        let now = Utc::now();
        tracker.handle_signal(
            RawSignal::ActorDeath {
                npc: goblin(WorldPoint::new(100, 100, 0)),
            },
            now,
        );
        tracker.handle_signal(
            RawSignal::ItemSpawned {
                item_id: 526,
                quantity: 1,
                name: Some("Bones".to_owned()),
                location: WorldPoint::new(101, 100, 0),
            },
            now,
        );
        tick(&mut tracker, 10);

        let events = log.drain();
        let kills: Vec<_> = events
            .iter()
            .filter(|event| event.event_type == "MONSTER_KILL")
            .collect();
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].details["monsterName"], json!("Goblin"));
        assert_eq!(kills[0].details["items"][0]["itemId"], json!(526));
    }

    #[test]
    fn distant_spawn_is_not_attributed() {
        let (mut tracker, log) = tracker();
        let now = Utc::now();
        tracker.handle_signal(
            RawSignal::ActorDeath {
                npc: goblin(WorldPoint::new(100, 100, 0)),
            },
            now,
        );
        tracker.handle_signal(
            RawSignal::ItemSpawned {
                item_id: 526,
                quantity: 1,
                name: Some("Bones".to_owned()),
                location: WorldPoint::new(105, 100, 0),
            },
            now,
        );
        tick(&mut tracker, 10);

        let events = log.drain();
        let kill = events
            .iter()
            .find(|event| event.event_type == "MONSTER_KILL")
            .expect("expected the kill to finalize at timeout");
        assert_eq!(kill.details["items"], json!([]));
    }

    #[test]
    fn unattributed_death_produces_no_kill() {
        let (mut tracker, log) = tracker();
        let mut npc = goblin(WorldPoint::new(100, 100, 0));
        npc.targeted_by_player = false;
        tracker.handle_signal(RawSignal::ActorDeath { npc }, Utc::now());
        tick(&mut tracker, 12);
        assert!(log.drain().is_empty());
    }

    #[test]
    fn animation_target_backs_kill_attribution() {
        let (mut tracker, log) = tracker();
        let mut engaged = goblin(WorldPoint::new(100, 100, 0));
        engaged.targeted_by_player = true;
        tracker.handle_signal(RawSignal::AnimationChanged { npc: engaged }, Utc::now());

        let mut dying = goblin(WorldPoint::new(100, 100, 0));
        dying.targeted_by_player = false;
        tracker.handle_signal(RawSignal::ActorDeath { npc: dying }, Utc::now());
        tick(&mut tracker, 10);

        assert!(log
            .drain()
            .iter()
            .any(|event| event.event_type == "MONSTER_KILL"));
    }

    #[test]
    fn completion_message_never_doubles_as_reward_trigger() {
        let (mut tracker, log) = tracker();
        tracker.handle_signal(
            RawSignal::ChatMessage {
                message_type: "GAMEMESSAGE".to_owned(),
                text: "Congratulations! You have completed 3 Moons of Peril Quest!".to_owned(),
            },
            Utc::now(),
        );
        let events = log.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "QUEST_COMPLETION");
    }

    #[test]
    fn xp_gain_flows_from_stat_change() {
        let (mut tracker, log) = tracker();
        tracker.handle_signal(
            RawSignal::StatChanged {
                skill: "Attack".to_owned(),
                xp: 737_727,
                level: 70,
            },
            Utc::now(),
        );
        let events = log.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "XP_GAIN");
        assert_eq!(events[0].details["xpGained"], json!(100));
        assert_eq!(
            events[0].player_location,
            Some(WorldPoint::new(100, 100, 0))
        );
    }

    #[test]
    fn menu_click_strips_markup_and_keeps_id() {
        let (mut tracker, log) = tracker();
        tracker.handle_signal(
            RawSignal::MenuClick {
                option: "Attack".to_owned(),
                target: "<col=ffff00>Goblin</col=ffff00>".to_owned(),
                item_id: None,
                object_id: None,
                id: Some(3029),
                is_item_op: false,
                is_object_op: false,
            },
            Utc::now(),
        );
        let events = log.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "MENU_CLICK");
        assert_eq!(events[0].details["target"], json!("Goblin"));
        assert_eq!(events[0].details["id"], json!(3029));
    }

    #[test]
    fn world_change_records_new_world() {
        let (mut tracker, log) = tracker();
        tracker.handle_signal(RawSignal::WorldChanged { world_id: 302 }, Utc::now());
        let events = log.drain();
        assert_eq!(events[0].event_type, "WORLD_CHANGE");
        assert_eq!(events[0].details["worldId"], json!(302));
    }

    #[test]
    fn inventory_additions_emit_per_item_records() {
        let (mut tracker, log) = tracker();
        // Baseline was established from the sync; this change adds coins.
        tracker.handle_signal(
            RawSignal::InventoryChanged {
                container_id: 93,
                items: vec![SlotItem {
                    slot: 0,
                    id: 995,
                    quantity: 40,
                    name: Some("Coins".to_owned()),
                }],
            },
            Utc::now(),
        );
        let events = log.drain();
        let change = events
            .iter()
            .find(|event| event.event_type == "INVENTORY_CHANGE")
            .expect("expected inventory change");
        assert_eq!(change.details["changeType"], json!("ADD"));
        assert_eq!(change.details["itemName"], json!("Coins"));
        assert_eq!(change.details["quantity"], json!(40));
    }

    #[test]
    fn rearranged_stack_reports_move_with_slots() {
        let (mut tracker, log) = tracker();
        let now = Utc::now();
        tracker.handle_signal(
            RawSignal::InventoryChanged {
                container_id: 93,
                items: vec![SlotItem {
                    slot: 0,
                    id: 995,
                    quantity: 40,
                    name: Some("Coins".to_owned()),
                }],
            },
            now,
        );
        log.drain();
        tracker.handle_signal(
            RawSignal::InventoryChanged {
                container_id: 93,
                items: vec![SlotItem {
                    slot: 12,
                    id: 995,
                    quantity: 40,
                    name: Some("Coins".to_owned()),
                }],
            },
            now,
        );
        let events = log.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details["changeType"], json!("MOVE"));
        assert_eq!(events[0].details["oldPositions"], json!([0]));
        assert_eq!(events[0].details["newPositions"], json!([12]));
    }
}
