use std::collections::HashMap;

use serde_json::{json, Value};

use crate::protocol::SkillState;

/// Tracks per-skill XP and emits the delta on each change. The first tick's
/// totals seed the table so login stat bursts do not register as gains.
#[derive(Debug, Default)]
pub struct XpTracker {
    previous_xp: HashMap<String, u64>,
    initialized: bool,
}

impl XpTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Seeds the baseline from a full skill snapshot, once.
    pub fn initialize(&mut self, skills: &[SkillState]) {
        if self.initialized {
            return;
        }
        for skill in skills {
            self.previous_xp.insert(skill.name.clone(), skill.xp);
        }
        self.initialized = true;
    }

    /// Records a stat change, returning XP_GAIN details when the skill
    /// gained XP against a known baseline. The stored value always updates.
    pub fn observe(&mut self, skill: &str, xp: u64, level: u32) -> Option<Value> {
        let previous = self.previous_xp.insert(skill.to_owned(), xp);
        let previous = previous?;
        let gained = xp.checked_sub(previous)?;
        if gained == 0 {
            return None;
        }
        Some(json!({
            "skill": skill,
            "totalXp": xp,
            "xpGained": gained,
            "level": level,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::XpTracker;
    use crate::protocol::SkillState;

    fn baseline() -> Vec<SkillState> {
        vec![SkillState {
            name: "Woodcutting".to_owned(),
            level: 60,
            boosted_level: 60,
            xp: 273_742,
        }]
    }

    #[test]
    fn gain_after_baseline_reports_delta() {
        let mut tracker = XpTracker::new();
        tracker.initialize(&baseline());

        let details = tracker
            .observe("Woodcutting", 273_842, 60)
            .expect("expected xp gain");
        assert_eq!(details["skill"], json!("Woodcutting"));
        assert_eq!(details["xpGained"], json!(100));
        assert_eq!(details["totalXp"], json!(273_842));
        assert_eq!(details["level"], json!(60));
    }

    #[test]
    fn unknown_skill_sets_baseline_without_emitting() {
        let mut tracker = XpTracker::new();
        tracker.initialize(&baseline());

        assert!(tracker.observe("Fishing", 50_000, 40).is_none());
        let details = tracker
            .observe("Fishing", 50_250, 40)
            .expect("expected gain after baseline");
        assert_eq!(details["xpGained"], json!(250));
    }

    #[test]
    fn unchanged_or_reduced_xp_emits_nothing() {
        let mut tracker = XpTracker::new();
        tracker.initialize(&baseline());

        assert!(tracker.observe("Woodcutting", 273_742, 60).is_none());
        // A smaller total (profile swap) must reset quietly, not underflow.
        assert!(tracker.observe("Woodcutting", 100, 1).is_none());
        assert!(tracker.observe("Woodcutting", 150, 1).is_some());
    }

    #[test]
    fn initialize_is_applied_once() {
        let mut tracker = XpTracker::new();
        tracker.initialize(&baseline());
        tracker.observe("Woodcutting", 300_000, 61);
        tracker.initialize(&baseline());
        // Re-initializing must not roll the baseline back.
        assert!(tracker.observe("Woodcutting", 300_000, 61).is_none());
    }
}
