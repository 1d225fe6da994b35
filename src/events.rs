use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A world-space tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: i32,
    pub y: i32,
    pub plane: i32,
}

impl WorldPoint {
    pub fn new(x: i32, y: i32, plane: i32) -> Self {
        Self { x, y, plane }
    }

    /// The 64x64-tile map region this point falls in.
    pub fn region_id(&self) -> u32 {
        (((self.x as u32) >> 6) << 8) | ((self.y as u32) >> 6)
    }
}

/// One item stack attributed to a kill or reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootItem {
    #[serde(rename = "itemId")]
    pub item_id: i32,
    #[serde(rename = "itemName")]
    pub item_name: String,
    pub quantity: u32,
}

/// Appends `item` to `items`, summing quantities when the same item id is
/// already present.
pub fn merge_loot_item(items: &mut Vec<LootItem>, item: LootItem) {
    if let Some(existing) = items.iter_mut().find(|e| e.item_id == item.item_id) {
        existing.quantity += item.quantity;
        return;
    }
    items.push(item);
}

/// A classified semantic event, immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct GameEvent {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "playerLocation", skip_serializing_if = "Option::is_none")]
    pub player_location: Option<WorldPoint>,
    pub details: Value,
}

/// Append-only buffer of classified events. Appends from the classification
/// path and drains from the sender may interleave freely; each event comes
/// back from exactly one drain.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<GameEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event_type: &str, player_location: Option<WorldPoint>, details: Value) {
        let event = GameEvent {
            event_type: event_type.to_owned(),
            timestamp: Utc::now(),
            player_location,
            details,
        };
        self.append(event);
    }

    pub fn append(&self, event: GameEvent) {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .push(event);
    }

    /// Atomically takes every buffered event, leaving the log empty.
    pub fn drain(&self) -> Vec<GameEvent> {
        let mut guard = self.events.lock().expect("event log mutex poisoned");
        std::mem::take(&mut *guard)
    }

    pub fn is_empty(&self) -> bool {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("event log mutex poisoned").len()
    }
}

/// Identity and progression summary sent as element 0 of every batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    #[serde(rename = "playerName")]
    pub player_name: String,
    #[serde(rename = "playerId")]
    pub player_id: i64,
    #[serde(rename = "combatLevel")]
    pub combat_level: u32,
    #[serde(rename = "totalLevel")]
    pub total_level: u32,
    #[serde(rename = "totalXp")]
    pub total_xp: u64,
}

/// Latest player info, shared between the feed worker (writer) and the
/// batch sender (reader).
#[derive(Debug, Default)]
pub struct PlayerInfoCell {
    inner: RwLock<Option<PlayerInfo>>,
}

impl PlayerInfoCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, info: Option<PlayerInfo>) {
        *self.inner.write().expect("player info lock poisoned") = info;
    }

    pub fn load(&self) -> Option<PlayerInfo> {
        self.inner
            .read()
            .expect("player info lock poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde_json::json;

    use super::{merge_loot_item, EventLog, LootItem, WorldPoint};

    #[test]
    fn drain_returns_events_exactly_once() {
        let log = EventLog::new();
        log.record("XP_GAIN", None, json!({"skill": "Attack"}));
        log.record("REWARD", None, json!({"rewardSource": "Casket"}));

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].event_type, "XP_GAIN");
        assert_eq!(drained[1].event_type, "REWARD");
        assert!(log.is_empty());
        assert!(log.drain().is_empty());
    }

    #[test]
    fn concurrent_appends_and_drains_lose_nothing() {
        let log = Arc::new(EventLog::new());
        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for n in 0..250 {
                        log.record("TEST", None, json!({"writer": writer, "n": n}));
                    }
                })
            })
            .collect();

        let drainer = {
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..50 {
                    seen.extend(log.drain());
                    std::thread::yield_now();
                }
                seen
            })
        };

        for writer in writers {
            writer.join().expect("writer thread panicked");
        }
        let mut seen = drainer.join().expect("drain thread panicked");
        seen.extend(log.drain());

        assert_eq!(seen.len(), 1000);
        let mut per_writer: HashMap<i64, usize> = HashMap::new();
        for event in &seen {
            let writer = event.details["writer"].as_i64().expect("writer id");
            *per_writer.entry(writer).or_default() += 1;
        }
        assert!(per_writer.values().all(|count| *count == 250));
    }

    #[test]
    fn merge_sums_duplicate_item_ids() {
        let mut items = Vec::new();
        merge_loot_item(
            &mut items,
            LootItem {
                item_id: 995,
                item_name: "Coins".to_owned(),
                quantity: 100,
            },
        );
        merge_loot_item(
            &mut items,
            LootItem {
                item_id: 995,
                item_name: "Coins".to_owned(),
                quantity: 50,
            },
        );
        merge_loot_item(
            &mut items,
            LootItem {
                item_id: 1513,
                item_name: "Magic logs".to_owned(),
                quantity: 1,
            },
        );

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 150);
    }

    #[test]
    fn region_id_derives_from_tile_coordinates() {
        let point = WorldPoint::new(3221, 3218, 0);
        assert_eq!(point.region_id(), ((3221u32 >> 6) << 8) | (3218u32 >> 6));
    }
}
