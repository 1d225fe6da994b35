use serde_json::{json, Value};

use crate::text::strip_color_tags;

// Hitsplat type ids as the client reports them.
const BLOCK_ME: i32 = 12;
const DAMAGE_ME: i32 = 16;
const DAMAGE_OTHER: i32 = 17;
const POISON: i32 = 65;
const DISEASE: i32 = 4;
const VENOM: i32 = 5;
const HEAL: i32 = 6;
const DAMAGE_MAX_ME: i32 = 43;
const DAMAGE_MAX_ME_CYAN: i32 = 45;
const DAMAGE_MAX_ME_ORANGE: i32 = 47;
const DAMAGE_MAX_ME_YELLOW: i32 = 49;
const DAMAGE_MAX_ME_WHITE: i32 = 51;

/// Readable label for a hitsplat type id. Unknown ids pass through as their
/// number.
pub fn hitsplat_type_label(hitsplat_type: i32) -> String {
    match hitsplat_type {
        POISON => "Poison".to_owned(),
        DISEASE => "Disease".to_owned(),
        VENOM => "Venom".to_owned(),
        HEAL => "Heal".to_owned(),
        DAMAGE_ME | DAMAGE_OTHER => "Damage".to_owned(),
        DAMAGE_MAX_ME | DAMAGE_MAX_ME_CYAN | DAMAGE_MAX_ME_ORANGE | DAMAGE_MAX_ME_WHITE
        | DAMAGE_MAX_ME_YELLOW => "Max Damage".to_owned(),
        BLOCK_ME => "Block".to_owned(),
        other => other.to_string(),
    }
}

/// Classifies a hitsplat as incoming (landed on the player) or outgoing
/// (landed on the player's current target). Splats on unrelated actors are
/// dropped.
pub fn classify_hitsplat(
    target_is_player: bool,
    target_is_interaction: bool,
    target_name: Option<&str>,
    attacker_name: Option<&str>,
    amount: u32,
    hitsplat_type: i32,
) -> Option<Value> {
    let label = hitsplat_type_label(hitsplat_type);
    if target_is_player {
        let source = match attacker_name {
            Some(name) => strip_color_tags(Some(name)),
            None => label.clone(),
        };
        return Some(json!({
            "target": "Player",
            "source": source,
            "damage": amount,
            "type": hitsplat_type,
            "typeString": label,
            "direction": "incoming",
        }));
    }
    if target_is_interaction {
        return Some(json!({
            "source": "Player",
            "target": strip_color_tags(target_name),
            "damage": amount,
            "type": hitsplat_type,
            "typeString": label,
            "direction": "outgoing",
        }));
    }
    None
}
