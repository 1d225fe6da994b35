use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::events::WorldPoint;

/// One occupied slot of an item container.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotItem {
    pub slot: usize,
    pub id: i32,
    pub quantity: u32,
    #[serde(default)]
    pub name: Option<String>,
}

/// An NPC as reported by the bridge at the moment of an event.
#[derive(Debug, Clone, Deserialize)]
pub struct NpcInfo {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub combat_level: u32,
    #[serde(default)]
    pub location: Option<WorldPoint>,
    /// The local player is currently interacting with this NPC.
    #[serde(default)]
    pub targeted_by_player: bool,
    /// This NPC is currently interacting with the local player.
    #[serde(default)]
    pub targeting_player: bool,
}

/// A node of the client's interface tree. The client exposes three distinct
/// child lists; a full scan must visit all of them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetNode {
    pub id: u32,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub item_id: Option<i32>,
    #[serde(default)]
    pub item_quantity: Option<u32>,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub rel_x: i32,
    #[serde(default)]
    pub rel_y: i32,
    #[serde(default)]
    pub children: Vec<WidgetNode>,
    #[serde(default)]
    pub dynamic_children: Vec<WidgetNode>,
    #[serde(default)]
    pub static_children: Vec<WidgetNode>,
}

/// Per-skill progression as carried by a client sync.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillState {
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub boosted_level: u32,
    pub xp: u64,
}

/// Raid status varbits surfaced by the bridge while inside a raid.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RaidStatus {
    pub raid_level: u32,
    pub team_size: u32,
    pub raid_damage: u32,
}

/// An item lying on the scene floor.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GroundItem {
    pub id: i32,
    pub quantity: u32,
}

/// Periodic full snapshot of the queryable client state.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSync {
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub player_id: i64,
    #[serde(default)]
    pub combat_level: u32,
    #[serde(default)]
    pub location: Option<WorldPoint>,
    #[serde(default)]
    pub map_regions: Vec<u32>,
    #[serde(default)]
    pub skills: Vec<SkillState>,
    #[serde(default)]
    pub inventory: Vec<SlotItem>,
    #[serde(default)]
    pub ground_items: Vec<GroundItem>,
    #[serde(default)]
    pub raid: Option<RaidStatus>,
    #[serde(default)]
    pub game_cycle: u64,
    #[serde(default)]
    pub item_names: Vec<(i32, String)>,
}

/// A raw client signal pushed by the bridge exporter.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawSignal {
    ChatMessage {
        message_type: String,
        text: String,
    },
    MenuClick {
        option: String,
        target: String,
        #[serde(default)]
        item_id: Option<i32>,
        #[serde(default)]
        object_id: Option<u32>,
        #[serde(default)]
        id: Option<i64>,
        #[serde(default)]
        is_item_op: bool,
        #[serde(default)]
        is_object_op: bool,
    },
    InventoryChanged {
        container_id: i32,
        items: Vec<SlotItem>,
    },
    ActorDeath {
        npc: NpcInfo,
    },
    ItemSpawned {
        item_id: i32,
        quantity: u32,
        #[serde(default)]
        name: Option<String>,
        location: WorldPoint,
    },
    NpcDespawned {
        npc: NpcInfo,
    },
    AnimationChanged {
        npc: NpcInfo,
    },
    WidgetLoaded {
        group_id: u32,
        #[serde(default)]
        root: Option<WidgetNode>,
    },
    StatChanged {
        skill: String,
        xp: u64,
        level: u32,
    },
    Hitsplat {
        #[serde(default)]
        target_name: Option<String>,
        target_is_player: bool,
        target_is_interaction: bool,
        amount: u32,
        hitsplat_type: i32,
        #[serde(default)]
        attacker_name: Option<String>,
    },
    WorldChanged {
        world_id: u32,
    },
    SceneLoading,
    GameTick {
        tick: u64,
    },
    ClientSync(ClientSync),
}

pub fn parse_raw_signal(text: &str) -> Result<RawSignal> {
    serde_json::from_str::<RawSignal>(text)
        .map_err(|err| anyhow!("payload did not match any known client signal: {err}"))
}
