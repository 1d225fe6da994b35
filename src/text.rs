use std::sync::OnceLock;

use regex::Regex;

fn color_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"</?col=[0-9a-fA-F]+>").expect("static pattern compiles"))
}

fn any_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern compiles"))
}

/// Removes `<col=RRGGBB>` style color tags and trims the result. Absent
/// input yields an empty string; this never fails.
pub fn strip_color_tags(input: Option<&str>) -> String {
    let Some(text) = input else {
        return String::new();
    };
    color_tag_pattern().replace_all(text, "").trim().to_owned()
}

/// Removes every bracketed markup tag (`<...>`) and trims the result.
pub fn strip_all_tags(input: Option<&str>) -> String {
    let Some(text) = input else {
        return String::new();
    };
    any_tag_pattern().replace_all(text, "").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::{strip_all_tags, strip_color_tags};

    #[test]
    fn strips_color_tags_at_any_depth() {
        assert_eq!(
            strip_color_tags(Some("<col=ff0000>Hello</col=ff0000>")),
            "Hello"
        );
        assert_eq!(strip_color_tags(Some("<col=00ffff>Goblin ")), "Goblin");
        assert_eq!(strip_color_tags(Some("plain")), "plain");
    }

    #[test]
    fn absent_input_yields_empty_string() {
        assert_eq!(strip_color_tags(None), "");
        assert_eq!(strip_all_tags(None), "");
    }

    #[test]
    fn strips_generic_markup() {
        assert_eq!(
            strip_all_tags(Some("<col=ff0000>Hello</col> world<br>")),
            "Hello world"
        );
        assert_eq!(strip_all_tags(Some("  padded  ")), "padded");
    }
}
