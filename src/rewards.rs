use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::events::{merge_loot_item, LootItem};
use crate::inventory::{diff, InventorySnapshot};
use crate::protocol::{SlotItem, WidgetNode};
use crate::state::ClientState;
use crate::widgets;

/// Age past which a pending reward no longer accepts items.
pub const PENDING_REWARD_EXPIRY_MS: i64 = 10_000;
/// Server ticks an armed inventory snapshot stays live.
const SNAPSHOT_TIMEOUT_TICKS: u32 = 10;

/// The backpack container.
pub const INVENTORY_CONTAINER: i32 = 93;
/// The wilderness loot chest container; emptying it re-arms chest tracking.
pub const WILDERNESS_LOOT_CHEST_CONTAINER: i32 = 797;

// Reward source labels.
const BARROWS_EVENT: &str = "Barrows";
const CHAMBERS_OF_XERIC_EVENT: &str = "Chambers of Xeric";
const THEATRE_OF_BLOOD_EVENT: &str = "Theatre of Blood";
const TOMBS_OF_AMASCUT_EVENT: &str = "Tombs of Amascut";
const KINGDOM_EVENT: &str = "Kingdom of Miscellania";
const FISHING_TRAWLER_EVENT: &str = "Fishing Trawler";
const DRIFT_NET_EVENT: &str = "Drift Net";
const WINTERTODT_EVENT: &str = "Wintertodt";
const WINTERTODT_SUPPLY_CRATE_EVENT: &str = "Supply crate (Wintertodt)";
const TEMPOROSS_EVENT: &str = "Reward pool (Tempoross)";
const TEMPOROSS_CASKET_EVENT: &str = "Casket (Tempoross)";
const GUARDIANS_OF_THE_RIFT_EVENT: &str = "Guardians of the Rift";
const HERBIBOAR_EVENT: &str = "Herbiboar";
const HESPORI_EVENT: &str = "Hespori";
const BIRDNEST_EVENT: &str = "Bird nest";
const CASKET_EVENT: &str = "Casket";
const SEEDPACK_EVENT: &str = "Seed pack";
const HALLOWED_SEPULCHRE_COFFIN_EVENT: &str = "Coffin (Hallowed Sepulchre)";
const HALLOWED_SACK_EVENT: &str = "Hallowed Sack";
const SPOILS_OF_WAR_EVENT: &str = "Spoils of war";
const MAHOGANY_CRATE_EVENT: &str = "Supply crate (Mahogany Homes)";
const BA_HIGH_GAMBLE_EVENT: &str = "Barbarian Assault high gamble";
const ORE_PACK_VM_EVENT: &str = "Ore Pack (Volcanic Mine)";

// Fixed chat lines that announce a loot grant.
const ACTIVITY_LOOT_PREFIX: &str = "You found some loot: ";
const CHEST_LOOTED_MESSAGE: &str = "You find some treasure in the chest!";
const OTHER_CHEST_LOOTED_MESSAGE: &str = "You steal some loot from the chest.";
const DORGESH_KAAN_CHEST_LOOTED_MESSAGE: &str = "You find treasure inside!";
const GRUBBY_CHEST_LOOTED_MESSAGE: &str = "You have opened the Grubby Chest";
const ANCIENT_CHEST_LOOTED_MESSAGE: &str = "You open the chest and find";
const HALLOWED_SEPULCHRE_COFFIN_MESSAGE: &str = "You push the coffin lid aside.";
const HERBIBOAR_LOOTED_MESSAGE: &str =
    "You harvest herbs from the herbiboar, whereupon it escapes.";
const HESPORI_LOOTED_MESSAGE: &str = "You have successfully cleared this patch for new crops.";
const FONT_OF_CONSUMPTION_MESSAGE: &str = "You place the Unsired into the Font of Consumption...";
const IMPLING_CATCH_MESSAGE: &str = "You manage to catch the impling and acquire some loot.";

// Map regions gating region-specific messages.
const WINTERTODT_REGIONS: &[u32] = &[6461];
const TEMPOROSS_REGIONS: &[u32] = &[12588];
const GUARDIANS_OF_RIFT_REGIONS: &[u32] = &[14484];
const HALLOWED_SEPULCHRE_REGIONS: &[u32] = &[8797, 10077, 9308, 10074, 9050];
const HAM_STOREROOM_REGIONS: &[u32] = &[10321];
const HESPORI_REGIONS: &[u32] = &[5021];
const FONT_OF_CONSUMPTION_REGIONS: &[u32] = &[12106];
const BA_LOBBY_REGIONS: &[u32] = &[10039];

// Interface group ids the client assigns to reward screens.
pub const BARROWS_REWARD_GROUP: u32 = 155;
pub const CHAMBERS_OF_XERIC_REWARD_GROUP: u32 = 539;
pub const TOB_REWARD_GROUP: u32 = 23;
pub const TOA_REWARD_GROUP: u32 = 771;
pub const KINGDOM_GROUP: u32 = 392;
pub const TRAWLER_REWARD_GROUP: u32 = 367;
pub const DRIFT_NET_REWARD_GROUP: u32 = 607;
pub const WILDERNESS_LOOT_CHEST_GROUP: u32 = 786;
pub const LUNAR_CHEST_GROUP: u32 = 868;
pub const FORTIS_COLOSSEUM_REWARD_GROUP: u32 = 728;

/// Interface group to reward source. Built once; includes the raw group ids
/// some clients report alongside the named ones.
fn reward_interfaces() -> &'static HashMap<u32, &'static str> {
    static TABLE: OnceLock<HashMap<u32, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        table.insert(BARROWS_REWARD_GROUP, BARROWS_EVENT);
        table.insert(CHAMBERS_OF_XERIC_REWARD_GROUP, CHAMBERS_OF_XERIC_EVENT);
        table.insert(TOB_REWARD_GROUP, THEATRE_OF_BLOOD_EVENT);
        table.insert(TOA_REWARD_GROUP, TOMBS_OF_AMASCUT_EVENT);
        table.insert(KINGDOM_GROUP, KINGDOM_EVENT);
        table.insert(TRAWLER_REWARD_GROUP, FISHING_TRAWLER_EVENT);
        table.insert(DRIFT_NET_REWARD_GROUP, DRIFT_NET_EVENT);
        table.insert(WILDERNESS_LOOT_CHEST_GROUP, "Loot Chest");
        table.insert(LUNAR_CHEST_GROUP, "Lunar Chest");
        table.insert(FORTIS_COLOSSEUM_REWARD_GROUP, "Fortis Colosseum");

        table.insert(291, CHAMBERS_OF_XERIC_EVENT);
        table.insert(235, THEATRE_OF_BLOOD_EVENT);
        table.insert(289, TOMBS_OF_AMASCUT_EVENT);
        table.insert(81, KINGDOM_EVENT);
        table.insert(371, FISHING_TRAWLER_EVENT);
        table.insert(334, WINTERTODT_EVENT);
        table.insert(426, "Shooting Star");
        table.insert(422, "Brimstone Chest");
        table.insert(982, "Mahogany Homes");
        table.insert(540, "Giant's Foundry");
        table.insert(746, GUARDIANS_OF_THE_RIFT_EVENT);
        table.insert(611, "Volcanic Mine");
        table.insert(668, "Hallowed Sepulchre");
        table.insert(730, "Moons of Peril");
        table
    })
}

fn chest_source_for_region(region: u32) -> Option<&'static str> {
    Some(match region {
        5179 => "Brimstone Chest",
        11573 => "Crystal Chest",
        12093 => "Larran's big chest",
        12127 => "The Gauntlet",
        13113 => "Larran's small chest",
        13151 => "Elven Crystal Chest",
        5277 => "Stone chest",
        10834 | 10835 => "Dorgesh-Kaan Chest",
        7323 => "Grubby Chest",
        8593 => "Isle of Souls Chest",
        7827 => "Dark Chest",
        13117 => "Rogues' Chest",
        13156 => "Chest (Ancient Vault)",
        12348 => "Muddy Chest",
        5422 => "Chest (Aldarin Villas)",
        6550 => "Chest (Moon key)",
        _ => return None,
    })
}

fn shade_chest_source(object_id: u32) -> Option<&'static str> {
    Some(match object_id {
        4111 => "Bronze key red",
        4112 => "Bronze key brown",
        4113 => "Bronze key crimson",
        4114 => "Bronze key black",
        4115 => "Bronze key purple",
        4116 => "Steel key red",
        4117 => "Steel key brown",
        4118 => "Steel key crimson",
        4119 => "Steel key black",
        4120 => "Steel key purple",
        4121 => "Black key red",
        4122 => "Black key brown",
        4123 => "Black key crimson",
        4124 => "Black key black",
        4125 => "Black key purple",
        4126 => "Silver key red",
        4127 => "Silver key brown",
        4128 => "Silver key crimson",
        4129 => "Silver key black",
        4130 => "Silver key purple",
        41212 => "Gold key red",
        41213 => "Gold key brown",
        41214 => "Gold key crimson",
        41215 => "Gold key black",
        41216 => "Gold key purple",
        _ => return None,
    })
}

fn birdhouse_type_for_xp(xp: u32) -> Option<&'static str> {
    Some(match xp {
        280 => "Regular Bird House",
        420 => "Oak Bird House",
        560 => "Willow Bird House",
        700 => "Teak Bird House",
        820 => "Maple Bird House",
        960 => "Mahogany Bird House",
        1020 => "Yew Bird House",
        1140 => "Magic Bird House",
        1200 => "Redwood Bird House",
        _ => return None,
    })
}

/// Containers whose "Open"/"Search"/"Loot" menu action arms inventory
/// tracking under the item's own name.
fn is_openable_reward_item(item_id: i32) -> bool {
    matches!(
        item_id,
        20703
            | 24884
            | 405
            | 25590
            | 23951
            | 25516
            | 21511
            | 23083
            | 12109
            | 24853
            | 25537
            | 22866
            | 27693
            | 27606
            | 28354..=28357
            | 25647
            | 25649
            | 25651
            | 25638
            | 25642
            | 25644
            | 27417..=27425
            | 27291
            | 27293
            | 27295
    )
}

fn is_bird_nest(item_id: i32) -> bool {
    matches!(item_id, 5070..=5074 | 7413 | 13653 | 22798 | 22800)
}

fn is_impling_jar(item_id: i32) -> bool {
    matches!(
        item_id,
        11238 | 11240 | 11242 | 11244 | 11246 | 11248 | 11250 | 11252 | 11254 | 11256 | 19732
            | 23748
    )
}

const CHEST_SOURCES: &[&str] = &[
    "Brimstone Chest",
    "Crystal Chest",
    "Larran's big chest",
    "The Gauntlet",
    "Larran's small chest",
    "Elven Crystal Chest",
    "Stone chest",
    "Dorgesh-Kaan Chest",
    "Grubby Chest",
    "Isle of Souls Chest",
    "Dark Chest",
    "Rogues' Chest",
    "Chest (Ancient Vault)",
    "Muddy Chest",
    "Chest (Aldarin Villas)",
    "Chest (Moon key)",
];

/// Sources whose items arrive as an inventory delta rather than a reward
/// interface, so a matched chat rule should also arm a snapshot.
fn needs_inventory_snapshot(source: &str) -> bool {
    const TRACKED: &[&str] = &[
        WINTERTODT_EVENT,
        TEMPOROSS_EVENT,
        GUARDIANS_OF_THE_RIFT_EVENT,
        "Hallowed Sepulchre",
        HALLOWED_SEPULCHRE_COFFIN_EVENT,
        "Volcanic Mine",
        "Mahogany Homes",
        HERBIBOAR_EVENT,
        HESPORI_EVENT,
        "Clue Scroll (Beginner)",
        "Clue Scroll (Easy)",
        "Clue Scroll (Medium)",
        "Clue Scroll (Hard)",
        "Clue Scroll (Elite)",
        "Clue Scroll (Master)",
        CASKET_EVENT,
        SEEDPACK_EVENT,
        BA_HIGH_GAMBLE_EVENT,
    ];
    TRACKED.contains(&source)
        || (CHEST_SOURCES.contains(&source) && source != "Lunar Chest")
        || source.ends_with("Bird House")
        || source.contains(" key ")
}

/// Per-source extra fields attached to a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RewardMetadata {
    SkillLevel {
        #[serde(rename = "skillLevel")]
        skill_level: u32,
    },
    RaidStats {
        #[serde(rename = "raidLevel")]
        raid_level: u32,
        #[serde(rename = "teamSize")]
        team_size: u32,
        #[serde(rename = "raidDamage")]
        raid_damage: u32,
    },
    LootSackLevels {
        #[serde(rename = "woodcuttingLevel")]
        woodcutting: u32,
        #[serde(rename = "herbloreLevel")]
        herblore: u32,
        #[serde(rename = "hunterLevel")]
        hunter: u32,
    },
}

/// A reward trigger awaiting the items that confirm it.
#[derive(Debug, Clone)]
pub struct PendingReward {
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub completion_count: Option<u32>,
    pub message: Option<String>,
    pub metadata: Option<RewardMetadata>,
    pub items: Vec<LootItem>,
}

impl PendingReward {
    fn new(source: &str, now: DateTime<Utc>) -> Self {
        Self {
            source: source.to_owned(),
            created_at: now,
            completion_count: None,
            message: None,
            metadata: None,
            items: Vec::new(),
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.created_at).num_milliseconds() < PENDING_REWARD_EXPIRY_MS
    }

    /// Freezes the record into event details, stamping a correlation id.
    pub fn into_details(self) -> Value {
        let mut details = serde_json::Map::new();
        details.insert("rewardSource".to_owned(), json!(self.source));
        details.insert(
            "timestamp".to_owned(),
            json!(self.created_at.timestamp_millis()),
        );
        if let Some(count) = self.completion_count {
            details.insert("completionCount".to_owned(), json!(count));
        }
        if let Some(message) = self.message {
            details.insert("message".to_owned(), json!(message));
        }
        if let Some(metadata) = self.metadata {
            if let Ok(Value::Object(fields)) = serde_json::to_value(metadata) {
                details.extend(fields);
            }
        }
        details.insert("itemCount".to_owned(), json!(self.items.len()));
        details.insert("items".to_owned(), json!(self.items));
        details.insert("rewardId".to_owned(), json!(Uuid::new_v4().to_string()));
        Value::Object(details)
    }
}

/// Details for items gained with no live trigger to pin them on.
pub fn unknown_reward_details(items: Vec<LootItem>, now: DateTime<Utc>) -> Value {
    json!({
        "rewardSource": "Unknown Reward",
        "timestamp": now.timestamp_millis(),
        "itemCount": items.len(),
        "items": items,
        "rewardId": Uuid::new_v4().to_string(),
    })
}

/// Pending rewards keyed by source label. Reward triggers and their item
/// deltas arrive as separate signals; this table is where cause and effect
/// are reunited.
#[derive(Debug, Default)]
pub struct RewardCorrelationTable {
    pending: HashMap<String, PendingReward>,
}

impl RewardCorrelationTable {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, source: &str) -> bool {
        self.pending.contains_key(source)
    }

    /// Creates a pending entry unless one already exists for the source.
    /// Overlapping triggers for the same label must not double count.
    pub fn open(&mut self, source: &str, metadata: Option<RewardMetadata>, now: DateTime<Utc>) {
        self.pending.entry(source.to_owned()).or_insert_with(|| {
            let mut entry = PendingReward::new(source, now);
            entry.metadata = metadata;
            entry
        });
    }

    /// Installs a fully-formed entry, replacing any previous one.
    pub fn register(&mut self, entry: PendingReward) {
        self.pending.insert(entry.source.clone(), entry);
    }

    pub fn take(&mut self, source: &str) -> Option<PendingReward> {
        self.pending.remove(source)
    }

    /// Appends gained items to the freshest live entry and finalizes it.
    /// Returns the finished details, or None when every entry has aged out
    /// and the caller should fall back to an unknown reward.
    pub fn append_items(&mut self, items: &[LootItem], now: DateTime<Utc>) -> Option<Value> {
        let source = self
            .pending
            .values()
            .filter(|entry| entry.is_fresh(now))
            .max_by_key(|entry| entry.created_at)
            .map(|entry| entry.source.clone())?;
        let mut entry = self.pending.remove(&source)?;
        for item in items {
            merge_loot_item(&mut entry.items, item.clone());
        }
        if entry.items.is_empty() {
            self.pending.insert(source, entry);
            return None;
        }
        Some(entry.into_details())
    }

    /// Drops entries past the expiry threshold without emitting. Bounded
    /// data loss, not an error.
    pub fn expire_stale(&mut self, now: DateTime<Utc>) {
        self.pending.retain(|_, entry| entry.is_fresh(now));
    }
}

struct ChatRule {
    pattern: Regex,
    source: &'static str,
}

fn chat_rules() -> Vec<ChatRule> {
    let rule = |pattern: &str, source: &'static str| ChatRule {
        pattern: Regex::new(pattern).expect("static pattern compiles"),
        source,
    };
    vec![
        rule(r"Your Barrows chest count is: (\d+)", BARROWS_EVENT),
        rule(
            r"You have completed (\d+) ([\w\s]+) Treasure Trails",
            "Treasure Trail",
        ),
        rule(r"Reward permits: (\d+)", TEMPOROSS_EVENT),
        rule(r"Your subdued the Wintertodt", WINTERTODT_EVENT),
        rule(r"Challenge complete!", CHAMBERS_OF_XERIC_EVENT),
        rule(
            r"Theatre of Blood total completion time:",
            THEATRE_OF_BLOOD_EVENT,
        ),
        rule(r"Tombs of Amascut completed!", TOMBS_OF_AMASCUT_EVENT),
        rule(
            r"You have completed (\d+) trips on the Fishing Trawler",
            FISHING_TRAWLER_EVENT,
        ),
        rule(r"Kingdom Management: Collected resources", KINGDOM_EVENT),
        rule(r"You hand over your stardust", "Shooting Star"),
        rule(
            r"You've completed (\d+) Mahogany Homes contracts",
            "Mahogany Homes",
        ),
        rule(
            r"You've completed (\d+) Giant's Foundry commissions",
            "Giant's Foundry",
        ),
        rule(r"Elemental energy: (\d+)", GUARDIANS_OF_THE_RIFT_EVENT),
        rule(
            r"The volcano erupts shortly after your escape!",
            "Volcanic Mine",
        ),
        rule(
            r"You've completed (\d+) laps of the Hallowed Sepulchre",
            "Hallowed Sepulchre",
        ),
        rule(r"You have completed (\d+) Moons of Peril", "Moons of Peril"),
        rule(r"Your Lunar Chest count is:.*?(\d+).*", "Lunar Chest"),
        rule(
            r"^You have opened Larran's (big|small) chest .*$",
            "Larran's chest",
        ),
        rule(r"^You find (a|some)([a-z\s]*) inside\.$", "Rogues' Chest"),
    ]
}

struct FixedPatterns {
    clue_scroll: Regex,
    pickpocket: Regex,
    birdhouse: Regex,
    ham_chest: Regex,
    shade_chest_no_key: Regex,
    rogues_chest: Regex,
    larran_looted: Regex,
}

fn fixed_patterns() -> &'static FixedPatterns {
    static PATTERNS: OnceLock<FixedPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("static pattern compiles");
        FixedPatterns {
            clue_scroll: compile(r"You have completed [0-9]+ ([a-z]+) Treasure Trails?\."),
            pickpocket: compile(r"^You pick (the )?(?P<target>.+)'s? pocket.*$"),
            birdhouse: compile(
                r"^You dismantle and discard the trap, retrieving (?:(?:a|\d{1,2}) nests?, )?10 dead birds, \d{1,3} feathers and (\d,?\d{1,3}) Hunter XP\.$",
            ),
            ham_chest: compile(r"^Your (?P<key>[a-z]+) key breaks in the lock.*$"),
            shade_chest_no_key: compile(
                r"^You need a [a-z]+ key with a [a-z]+ trim to open this chest .*$",
            ),
            rogues_chest: compile(r"^You find (a|some)([a-z\s]*) inside\.$"),
            larran_looted: compile(r"^You have opened Larran's (big|small) chest .*$"),
        }
    })
}

fn clue_tier_source(tier: &str) -> Option<&'static str> {
    Some(match tier {
        "beginner" => "Clue Scroll (Beginner)",
        "easy" => "Clue Scroll (Easy)",
        "medium" => "Clue Scroll (Medium)",
        "hard" => "Clue Scroll (Hard)",
        "elite" => "Clue Scroll (Elite)",
        "master" => "Clue Scroll (Master)",
        _ => return None,
    })
}

/// Classifies reward triggers from chat, menu clicks, and reward interfaces,
/// then confirms them against inventory deltas or widget scans.
pub struct RewardEngine {
    table: RewardCorrelationTable,
    rules: Vec<ChatRule>,
    snapshot: Option<InventorySnapshot>,
    snapshot_ticks_left: u32,
    chest_looted: bool,
}

impl Default for RewardEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RewardEngine {
    pub fn new() -> Self {
        Self {
            table: RewardCorrelationTable::default(),
            rules: chat_rules(),
            snapshot: None,
            snapshot_ticks_left: 0,
            chest_looted: false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    pub fn has_pending(&self, source: &str) -> bool {
        self.table.contains(source)
    }

    fn arm_snapshot(
        &mut self,
        source: &str,
        metadata: Option<RewardMetadata>,
        state: &ClientState,
        now: DateTime<Utc>,
    ) {
        self.snapshot = Some(InventorySnapshot::capture(&state.inventory));
        self.snapshot_ticks_left = SNAPSHOT_TIMEOUT_TICKS;
        self.table.open(source, metadata, now);
    }

    fn disarm_snapshot(&mut self) {
        self.snapshot = None;
        self.snapshot_ticks_left = 0;
    }

    /// Drops the raid-chest dedupe flag; called when the scene reloads.
    pub fn scene_loading(&mut self) {
        self.chest_looted = false;
    }

    /// Ages the armed snapshot and expires stale pending entries.
    pub fn advance_tick(&mut self, now: DateTime<Utc>) {
        if self.snapshot.is_some() {
            self.snapshot_ticks_left = self.snapshot_ticks_left.saturating_sub(1);
            if self.snapshot_ticks_left == 0 {
                self.snapshot = None;
            }
        }
        self.table.expire_stale(now);
    }

    /// Reward triggers carried by chat. `interacting` names the actor the
    /// player is engaged with, for sources labeled by their target.
    pub fn handle_chat(
        &mut self,
        message_type: &str,
        message: &str,
        interacting: Option<&str>,
        state: &ClientState,
        now: DateTime<Utc>,
    ) {
        if !matches!(message_type, "GAMEMESSAGE" | "SPAM" | "MESBOX") {
            return;
        }
        let patterns = fixed_patterns();

        if state.in_any_region(WINTERTODT_REGIONS) && message.contains(ACTIVITY_LOOT_PREFIX) {
            let level = state.boosted_skill_level("Firemaking");
            self.arm_snapshot(
                WINTERTODT_EVENT,
                Some(RewardMetadata::SkillLevel { skill_level: level }),
                state,
                now,
            );
            return;
        }
        if state.in_any_region(TEMPOROSS_REGIONS) && message.starts_with(ACTIVITY_LOOT_PREFIX) {
            let level = state.boosted_skill_level("Fishing");
            self.arm_snapshot(
                TEMPOROSS_EVENT,
                Some(RewardMetadata::SkillLevel { skill_level: level }),
                state,
                now,
            );
            return;
        }
        if state.in_any_region(GUARDIANS_OF_RIFT_REGIONS)
            && message.starts_with(ACTIVITY_LOOT_PREFIX)
        {
            let level = state.boosted_skill_level("Runecraft");
            self.arm_snapshot(
                GUARDIANS_OF_THE_RIFT_EVENT,
                Some(RewardMetadata::SkillLevel { skill_level: level }),
                state,
                now,
            );
            return;
        }
        if message == HERBIBOAR_LOOTED_MESSAGE {
            let level = state.boosted_skill_level("Herblore");
            self.arm_snapshot(
                HERBIBOAR_EVENT,
                Some(RewardMetadata::SkillLevel { skill_level: level }),
                state,
                now,
            );
            return;
        }
        if state.in_any_region(HESPORI_REGIONS) && message == HESPORI_LOOTED_MESSAGE {
            self.arm_snapshot(HESPORI_EVENT, None, state, now);
            return;
        }
        if state.in_any_region(FONT_OF_CONSUMPTION_REGIONS) && message == FONT_OF_CONSUMPTION_MESSAGE
        {
            self.arm_snapshot("Unsired", None, state, now);
            return;
        }
        if message == IMPLING_CATCH_MESSAGE {
            if let Some(name) = interacting {
                let name = name.to_owned();
                self.arm_snapshot(&name, None, state, now);
            }
            return;
        }

        let is_chest_message = message == CHEST_LOOTED_MESSAGE
            || message == OTHER_CHEST_LOOTED_MESSAGE
            || message == DORGESH_KAAN_CHEST_LOOTED_MESSAGE
            || message.starts_with(GRUBBY_CHEST_LOOTED_MESSAGE)
            || message.starts_with(ANCIENT_CHEST_LOOTED_MESSAGE)
            || patterns.larran_looted.is_match(message)
            || patterns.rogues_chest.is_match(message);
        if is_chest_message {
            let region = state.location.map(|point| point.region_id());
            if let Some(source) = region.and_then(chest_source_for_region) {
                self.arm_snapshot(source, None, state, now);
                return;
            }
        }

        if message == HALLOWED_SEPULCHRE_COFFIN_MESSAGE
            && state.in_any_region(HALLOWED_SEPULCHRE_REGIONS)
        {
            self.arm_snapshot(HALLOWED_SEPULCHRE_COFFIN_EVENT, None, state, now);
            return;
        }
        if let Some(captures) = patterns.ham_chest.captures(message) {
            if state.in_any_region(HAM_STOREROOM_REGIONS) {
                if let Some(key) = captures.name("key") {
                    let source = format!("H.A.M. chest ({})", key.as_str());
                    self.arm_snapshot(&source, None, state, now);
                    return;
                }
            }
        }
        if let Some(captures) = patterns.pickpocket.captures(message) {
            if let Some(target) = captures.name("target") {
                let source = format!("Pickpocket: {}", target.as_str());
                self.arm_snapshot(&source, None, state, now);
                return;
            }
        }
        if state.in_any_region(BA_LOBBY_REGIONS)
            && message_type == "MESBOX"
            && message.contains("High level gamble count:")
        {
            self.arm_snapshot(BA_HIGH_GAMBLE_EVENT, None, state, now);
            return;
        }
        if let Some(captures) = patterns.clue_scroll.captures(message) {
            let tier = captures
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default();
            // Unknown tiers are ignored rather than guessed at.
            if let Some(source) = clue_tier_source(&tier) {
                self.arm_snapshot(source, None, state, now);
            }
            return;
        }
        if let Some(captures) = patterns.birdhouse.captures(message) {
            let xp = captures
                .get(1)
                .and_then(|m| m.as_str().replace(',', "").parse::<u32>().ok());
            if let Some(source) = xp.and_then(birdhouse_type_for_xp) {
                let level = state.boosted_skill_level("Hunter");
                self.arm_snapshot(
                    source,
                    Some(RewardMetadata::SkillLevel { skill_level: level }),
                    state,
                    now,
                );
            }
            return;
        }
        if patterns.shade_chest_no_key.is_match(message) {
            self.disarm_snapshot();
            return;
        }

        // Generic rules, first match wins.
        for rule in &self.rules {
            let Some(captures) = rule.pattern.captures(message) else {
                continue;
            };
            let completion_count = captures
                .get(1)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            let mut entry = PendingReward::new(rule.source, now);
            entry.completion_count = Some(completion_count);
            entry.message = Some(message.to_owned());
            self.table.register(entry);
            if needs_inventory_snapshot(rule.source) {
                self.arm_snapshot(rule.source, None, state, now);
            }
            break;
        }
    }

    /// Menu actions that open a reward container arm inventory tracking
    /// under the container's label.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_menu_click(
        &mut self,
        option: &str,
        item_id: Option<i32>,
        object_id: Option<u32>,
        is_item_op: bool,
        is_object_op: bool,
        state: &ClientState,
        now: DateTime<Utc>,
    ) {
        if is_object_op && option == "Open" {
            if let Some(source) = object_id.and_then(shade_chest_source) {
                self.arm_snapshot(source, None, state, now);
                return;
            }
        }
        if !is_item_op {
            return;
        }
        let Some(item_id) = item_id else {
            return;
        };

        if item_id == 22866 && (option == "Take" || option == "Take-all") {
            self.arm_snapshot(SEEDPACK_EVENT, None, state, now);
            return;
        }
        if option == "Search" && is_bird_nest(item_id) {
            self.arm_snapshot(BIRDNEST_EVENT, None, state, now);
            return;
        }

        // Containers with a canonical label come first; anything else on the
        // openable list falls back to its item name.
        if option == "Open" {
            let handled = match item_id {
                405 => {
                    self.arm_snapshot(CASKET_EVENT, None, state, now);
                    true
                }
                20703 | 24420 => {
                    self.arm_snapshot(WINTERTODT_SUPPLY_CRATE_EVENT, None, state, now);
                    true
                }
                23951 => {
                    self.arm_snapshot(SPOILS_OF_WAR_EVENT, None, state, now);
                    true
                }
                25590 => {
                    self.arm_snapshot(TEMPOROSS_CASKET_EVENT, None, state, now);
                    true
                }
                25516 => {
                    self.arm_snapshot(HALLOWED_SACK_EVENT, None, state, now);
                    true
                }
                24884 => {
                    let level = state.boosted_skill_level("Construction");
                    self.arm_snapshot(
                        MAHOGANY_CRATE_EVENT,
                        Some(RewardMetadata::SkillLevel { skill_level: level }),
                        state,
                        now,
                    );
                    true
                }
                27693 => {
                    self.arm_snapshot(ORE_PACK_VM_EVENT, None, state, now);
                    true
                }
                12109 => {
                    self.arm_snapshot("Bag full of gems (Percy)", None, state, now);
                    true
                }
                24853 => {
                    self.arm_snapshot("Bag full of gems (Belona)", None, state, now);
                    true
                }
                25537 => {
                    self.arm_snapshot("Bag full of gems (Dusuri)", None, state, now);
                    true
                }
                27606 | 28354..=28357 => {
                    self.open_hunter_loot_sack(item_id, state, now);
                    true
                }
                _ => false,
            };
            if handled {
                return;
            }
        }

        if is_openable_reward_item(item_id)
            && (option == "Open" || option == "Search" || option == "Loot")
        {
            let name = state.item_name(item_id);
            self.arm_snapshot(&name, None, state, now);
            return;
        }

        if option == "Loot" && is_impling_jar(item_id) {
            let name = state.item_name(item_id);
            self.arm_snapshot(&name, None, state, now);
        }
    }

    fn open_hunter_loot_sack(&mut self, item_id: i32, state: &ClientState, now: DateTime<Utc>) {
        let name = state.item_name(item_id);
        let mut entry = PendingReward::new(&name, now);
        entry.metadata = Some(RewardMetadata::LootSackLevels {
            woodcutting: state.boosted_skill_level("Woodcutting"),
            herblore: state.boosted_skill_level("Herblore"),
            hunter: state.boosted_skill_level("Hunter"),
        });
        self.table.register(entry);
        self.arm_snapshot(&name, None, state, now);
    }

    /// Confirms an armed snapshot against the new container contents.
    /// Returns finalized reward details ready to become events.
    pub fn handle_inventory_changed(
        &mut self,
        container_id: i32,
        items: &[SlotItem],
        state: &ClientState,
        now: DateTime<Utc>,
    ) -> Vec<Value> {
        if container_id == WILDERNESS_LOOT_CHEST_CONTAINER
            && items.iter().all(|item| item.id < 0 || item.quantity == 0)
        {
            self.chest_looted = false;
        }
        if container_id != INVENTORY_CONTAINER {
            return Vec::new();
        }
        let Some(previous) = self.snapshot.take() else {
            return Vec::new();
        };
        self.snapshot_ticks_left = 0;

        let current = InventorySnapshot::capture(items);
        let delta = diff(&previous, &current);

        let mut gained: Vec<LootItem> = Vec::new();
        for (id, quantity) in &delta.added {
            let name = items
                .iter()
                .find(|item| item.id == *id)
                .and_then(|item| item.name.clone())
                .unwrap_or_else(|| state.item_name(*id));
            merge_loot_item(
                &mut gained,
                LootItem {
                    item_id: *id,
                    item_name: name,
                    quantity: *quantity,
                },
            );
        }
        gained.sort_by_key(|item| item.item_id);

        let mut finalized = Vec::new();
        if !gained.is_empty() {
            match self.table.append_items(&gained, now) {
                Some(details) => finalized.push(details),
                None => finalized.push(unknown_reward_details(gained.clone(), now)),
            }
        }

        // Looting a jar consumes it from a stack, so the trigger shows up on
        // the removed side of the delta.
        for (id, _) in &delta.removed {
            if is_impling_jar(*id) {
                let mut entry = PendingReward::new(&state.item_name(*id), now);
                entry.items = gained.clone();
                finalized.push(entry.into_details());
            }
        }
        finalized
    }

    /// A reward interface opened; scan it for items. Raid chests report
    /// their interface again on re-open, deduplicated by the looted flag
    /// until the next scene load.
    pub fn handle_widget_loaded(
        &mut self,
        group_id: u32,
        root: Option<&WidgetNode>,
        state: &ClientState,
        now: DateTime<Utc>,
    ) -> Option<Value> {
        let source = *reward_interfaces().get(&group_id)?;

        let is_raid_chest = matches!(
            source,
            CHAMBERS_OF_XERIC_EVENT | THEATRE_OF_BLOOD_EVENT | TOMBS_OF_AMASCUT_EVENT
        );
        if is_raid_chest {
            if self.chest_looted {
                return None;
            }
            self.chest_looted = true;
        }

        let metadata = if source == TOMBS_OF_AMASCUT_EVENT {
            state.raid.map(|raid| RewardMetadata::RaidStats {
                raid_level: raid.raid_level,
                team_size: raid.team_size,
                raid_damage: raid.raid_damage,
            })
        } else if source == FISHING_TRAWLER_EVENT || source == DRIFT_NET_EVENT {
            Some(RewardMetadata::SkillLevel {
                skill_level: state.boosted_skill_level("Fishing"),
            })
        } else {
            None
        };

        let root = root?;
        if root.hidden {
            return None;
        }
        let items = widgets::collect_items(root, |id| state.item_name(id));
        if items.is_empty() {
            return None;
        }

        let mut entry = self
            .table
            .take(source)
            .unwrap_or_else(|| PendingReward::new(source, now));
        entry.items = items;
        if metadata.is_some() {
            entry.metadata = metadata;
        }
        Some(entry.into_details())
    }
}
