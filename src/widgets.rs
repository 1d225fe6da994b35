use std::collections::HashSet;

use crate::events::{merge_loot_item, LootItem};
use crate::protocol::WidgetNode;
use crate::text::strip_all_tags;

/// Collects every item stack shown by a reward interface. All three child
/// lists are walked; hidden elements are skipped. The same element is never
/// counted twice, but distinct slots holding the same item id are summed.
pub fn collect_items(root: &WidgetNode, name_of: impl Fn(i32) -> String) -> Vec<LootItem> {
    let mut seen: HashSet<(u32, i32, i32, i32)> = HashSet::new();
    let mut items = Vec::new();
    walk_items(root, &name_of, &mut seen, &mut items);
    items
}

fn walk_items(
    node: &WidgetNode,
    name_of: &impl Fn(i32) -> String,
    seen: &mut HashSet<(u32, i32, i32, i32)>,
    items: &mut Vec<LootItem>,
) {
    if node.hidden {
        return;
    }
    if let Some(item_id) = node.item_id {
        let quantity = node.item_quantity.unwrap_or(0);
        if item_id >= 0 && quantity > 0 && seen.insert((node.id, item_id, node.rel_x, node.rel_y))
        {
            let item_name = node
                .item_name
                .clone()
                .unwrap_or_else(|| name_of(item_id));
            merge_loot_item(
                items,
                LootItem {
                    item_id,
                    item_name,
                    quantity,
                },
            );
        }
    }
    for child in node
        .children
        .iter()
        .chain(&node.dynamic_children)
        .chain(&node.static_children)
    {
        walk_items(child, name_of, seen, items);
    }
}

/// Every visible text string in the subtree, in walk order.
pub fn collect_text(root: &WidgetNode) -> Vec<String> {
    let mut out = Vec::new();
    walk_text(root, &mut out);
    out
}

fn walk_text(node: &WidgetNode, out: &mut Vec<String>) {
    if node.hidden {
        return;
    }
    if let Some(text) = &node.text {
        if !text.is_empty() {
            out.push(text.clone());
        }
    }
    for child in node
        .children
        .iter()
        .chain(&node.dynamic_children)
        .chain(&node.static_children)
    {
        walk_text(child, out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryCompletion {
    pub area: String,
    pub tier: String,
}

const DIARY_TIERS: [&str; 4] = ["Easy", "Medium", "Hard", "Elite"];

/// Pulls the area name and tier out of a diary completion interface text.
/// The text arrives as markup with `<br>` line breaks; the relevant line
/// names the diary and its tier.
pub fn parse_diary_completion(raw: &str) -> Option<DiaryCompletion> {
    let tier = DIARY_TIERS
        .iter()
        .find(|tier| raw.contains(**tier))
        .copied()?;
    for line in raw.split("<br>") {
        let line = strip_all_tags(Some(line));
        let lower = line.to_lowercase();
        let Some(idx) = line.find("Diary").or_else(|| lower.find("diary")) else {
            continue;
        };
        let area = line[..idx]
            .trim_start_matches("Congratulations!")
            .replace(tier, "")
            .trim()
            .trim_end_matches("Achievement")
            .trim()
            .to_owned();
        return Some(DiaryCompletion {
            area,
            tier: tier.to_owned(),
        });
    }
    None
}
