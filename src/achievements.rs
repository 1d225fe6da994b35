use serde_json::{json, Value};

use crate::protocol::WidgetNode;
use crate::text::strip_all_tags;
use crate::widgets;

/// The diary completion scroll interface.
pub const ACHIEVEMENT_DIARY_GROUP: u32 = 153;
/// The combat achievement popup interface.
pub const COMBAT_ACHIEVEMENT_GROUP: u32 = 717;

const DIARY_TIERS: [&str; 4] = ["Easy", "Medium", "Hard", "Elite"];

/// A completion recognized from chat or an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub event_type: &'static str,
    pub details: Value,
}

/// Hard-coded completion checks run against every game message before any
/// reward rule sees it. Quest, diary, and combat achievement phrasings can
/// overlap in one message; each check emits independently.
pub fn classify_chat(message_type: &str, message: &str) -> Vec<Achievement> {
    if !matches!(message_type, "GAMEMESSAGE" | "SPAM") {
        return Vec::new();
    }
    let mut found = Vec::new();

    if message.contains("Congratulations")
        && message.contains("completed")
        && message.contains("Quest")
    {
        if let Some(quest_name) = extract_quest_name(message) {
            found.push(Achievement {
                event_type: "QUEST_COMPLETION",
                details: json!({
                    "questName": quest_name,
                    "message": message,
                }),
            });
        }
    }

    if (message.contains("completed") || message.contains("Completed"))
        && (message.contains("diary") || message.contains("Diary"))
    {
        let mut details = serde_json::Map::new();
        details.insert("message".to_owned(), json!(message));
        if let Some((name, tier)) = extract_diary_from_words(message) {
            details.insert("diaryName".to_owned(), json!(name));
            details.insert("diaryTier".to_owned(), json!(tier));
        }
        found.push(Achievement {
            event_type: "ACHIEVEMENT_DIARY_COMPLETION",
            details: Value::Object(details),
        });
    }

    if message.contains("Combat Achievement") || message.contains("combat achievement") {
        let name = match message.split_once(':') {
            Some((_, rest)) => rest.trim().to_owned(),
            None => message.to_owned(),
        };
        found.push(Achievement {
            event_type: "COMBAT_ACHIEVEMENT_COMPLETION",
            details: json!({
                "achievementName": name,
                "message": message,
            }),
        });
    }
    found
}

/// Quest name sits between "completed" and the closing exclamation mark.
fn extract_quest_name(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("completed")?;
    let rest = rest.trim_start();
    let (name, _) = rest.split_once('!')?;
    Some(name.trim().to_owned())
}

/// Word-level scan: the word before "diary" names it, the word after may be
/// the tier.
fn extract_diary_from_words(message: &str) -> Option<(String, String)> {
    if !DIARY_TIERS.iter().any(|tier| message.contains(tier)) {
        return None;
    }
    let words: Vec<&str> = message.split_whitespace().collect();
    let mut name = String::new();
    let mut tier = String::new();
    for (i, word) in words.iter().enumerate() {
        if !word.contains("diary") && !word.contains("Diary") {
            continue;
        }
        if i > 0 {
            name = words[i - 1].to_owned();
        }
        if let Some(next) = words.get(i + 1) {
            if DIARY_TIERS.contains(next) {
                tier = (*next).to_owned();
            }
        }
    }
    Some((name, tier))
}

/// Scans the diary completion scroll for the congratulation line.
pub fn classify_diary_interface(root: &WidgetNode) -> Vec<Achievement> {
    if root.hidden {
        return Vec::new();
    }
    let mut found = Vec::new();
    for text in widgets::collect_text(root) {
        for line in text.split("<br>") {
            if !line.contains("Congratulations") {
                continue;
            }
            let line = strip_all_tags(Some(line));
            let Some(completion) = widgets::parse_diary_completion(&line) else {
                continue;
            };
            if completion.area.is_empty() {
                continue;
            }
            found.push(Achievement {
                event_type: "ACHIEVEMENT_DIARY_COMPLETION",
                details: json!({
                    "diaryName": completion.area,
                    "diaryTier": completion.tier,
                    "message": line,
                }),
            });
        }
    }
    found
}

/// Scans the combat achievement popup for completion lines.
pub fn classify_combat_interface(root: &WidgetNode) -> Vec<Achievement> {
    if root.hidden {
        return Vec::new();
    }
    let mut found = Vec::new();
    for text in widgets::collect_text(root) {
        if !text.contains("completed") && !text.contains("Completed") {
            continue;
        }
        let name = strip_all_tags(Some(&text));
        found.push(Achievement {
            event_type: "COMBAT_ACHIEVEMENT_COMPLETION",
            details: json!({
                "achievementName": name,
                "message": text,
            }),
        });
    }
    found
}
