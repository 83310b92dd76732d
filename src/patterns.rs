//! Regex vocabulary for inline task metadata.
//!
//! Capturing patterns are used for extraction; the `_GLOBAL` variants carry
//! no groups and are used for removal. Every token may appear anywhere on a
//! line, in any order.

use std::sync::LazyLock;

use regex::Regex;

use crate::task::PRIORITY_GLYPHS;

/// Marks the task's own ID.
pub const ID_GLYPH: &str = "🆔";
/// Marks a dependency on another task's ID.
pub const DEPENDS_GLYPH: &str = "⛔";
pub const STAR_GLYPH: &str = "⭐";

pub(crate) fn compile(pattern: &str) -> Regex {
    // Patterns are literals in this module; a failure is a build-time bug.
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid pattern {pattern}: {err}"))
}

pub static EMOJI_ID: LazyLock<Regex> = LazyLock::new(|| compile(r"🆔\s*([a-zA-Z0-9]{6})"));
pub static EMOJI_ID_GLOBAL: LazyLock<Regex> = LazyLock::new(|| compile(r"🆔\s*[a-zA-Z0-9]{6}"));

/// Matches `[id:: abc123]`, and the inner part of `[[id:: abc123]]`.
pub static DATAVIEW_ID: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\[id::\s*([a-zA-Z0-9]{6})\]"));
pub static DATAVIEW_ID_GLOBAL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\[id::\s*[a-zA-Z0-9]{6}\]"));

/// Looser removal forms used when deriving summaries and core text.
pub static EMOJI_ID_REMOVAL: LazyLock<Regex> = LazyLock::new(|| compile(r"🆔\s*\S+"));
pub static DATAVIEW_ID_REMOVAL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\[\[?id::[^\]]*\]\]?"));

pub static CSV_LINKS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"⛔\s*([a-zA-Z0-9]{6}(?:,[a-zA-Z0-9]{6})*)"));
pub static INDIVIDUAL_LINKS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"⛔\s*([a-zA-Z0-9]{6})"));
pub static DATAVIEW_DEPENDS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\[dependsOn::\s*([a-zA-Z0-9]{6}(?:\s*,\s*[a-zA-Z0-9]{6})*)\s*\]")
});
pub static DEPENDS_REMOVAL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"⛔\s*[a-zA-Z0-9]{6}(?:\s*,\s*[a-zA-Z0-9]{6})*"));
pub static DATAVIEW_DEPENDS_REMOVAL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\[\[?dependsOn::[^\]]*\]\]?"));

pub static TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"(?:^|\s)#(\S+)"));
pub static TAG_GLOBAL: LazyLock<Regex> = LazyLock::new(|| compile(r"(?:^|\s)#\S+"));

pub static PRIORITY: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!("({})", PRIORITY_GLYPHS.join("|"))));

pub static STAR: LazyLock<Regex> = LazyLock::new(|| compile(r"⭐\x{FE0F}?"));
pub static STAR_WITH_SPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s*⭐\x{FE0F}?\s*"));

/// The first glyph of any metadata token, or an ellipsis.
pub static METADATA_GLYPH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"🆔|⛔|🔺|⏫|🔼|🔽|⏬|📅|⏳|🛫|✅|❌|➕|\.\.\."));

/// Any `[[key::value]]` field; its presence selects the bracketed date notation.
pub static DATAVIEW_FIELD: LazyLock<Regex> = LazyLock::new(|| compile(r"\[\[[^\]]+::[^\]]+\]\]"));

/// `- [ ] text`, `* [x] text`, `1. [/] text`.
pub static CHECKLIST: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(\s*)(?:[-*+]|\d+[.)])\s+\[(.)\]\s?(.*)$"));
pub static STATUS_BOX: LazyLock<Regex> = LazyLock::new(|| compile(r"\[[ xX/\-]\]"));

pub static GLYPH_DATE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:📅|✅|🛫|⏳|➕|❌)\x{FE0F}?\s*\d{4}-\d{2}-\d{2}"));
pub static DATAVIEW_DATE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\[\[(?:due|completion|start|scheduled|created|canceled)::[^\]]*\]\]")
});
pub static PICTOGRAPHIC: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\p{Extended_Pictographic}\x{FE0F}?"));
pub static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));

/// First ID token on the line, either notation.
pub fn find_id(text: &str) -> Option<String> {
    EMOJI_ID
        .captures(text)
        .or_else(|| DATAVIEW_ID.captures(text))
        .map(|caps| caps[1].to_string())
}

pub fn has_id_token(text: &str) -> bool {
    EMOJI_ID_GLOBAL.is_match(text) || DATAVIEW_ID_GLOBAL.is_match(text)
}

pub fn find_priority(text: &str) -> Option<&str> {
    PRIORITY.find(text).map(|m| m.as_str())
}

pub fn has_star(text: &str) -> bool {
    STAR.is_match(text)
}

/// Tags in document order, without the leading `#`.
pub fn tags(text: &str) -> Vec<String> {
    TAG.captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// IDs from every `⛔ a,b,c` token.
pub fn csv_links(text: &str) -> Vec<String> {
    CSV_LINKS
        .captures_iter(text)
        .flat_map(|caps| split_ids(&caps[1]))
        .collect()
}

/// IDs from `⛔ abc123` tokens that are not the head of a comma list.
pub fn individual_links(text: &str) -> Vec<String> {
    INDIVIDUAL_LINKS
        .captures_iter(text)
        .filter(|caps| {
            let end = caps.get(0).map(|m| m.end()).unwrap_or(text.len());
            !continues_list(&text[end..])
        })
        .map(|caps| caps[1].to_string())
        .collect()
}

/// IDs from every `[dependsOn:: a, b]` token.
pub fn dataview_links(text: &str) -> Vec<String> {
    DATAVIEW_DEPENDS
        .captures_iter(text)
        .flat_map(|caps| split_ids(&caps[1]))
        .collect()
}

pub(crate) fn split_ids(list: &str) -> Vec<String> {
    list.split(',')
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn continues_list(rest: &str) -> bool {
    let mut chars = rest.chars();
    if chars.next() != Some(',') {
        return false;
    }
    let next: String = chars.take(6).collect();
    next.len() == 6 && next.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_found_in_either_notation() {
        assert_eq!(find_id("- [ ] a 🆔 ab12cd").as_deref(), Some("ab12cd"));
        assert_eq!(find_id("- [ ] a [id:: ab12cd]").as_deref(), Some("ab12cd"));
        assert_eq!(find_id("- [ ] a [[id:: ab12cd]]").as_deref(), Some("ab12cd"));
        assert_eq!(find_id("- [ ] plain"), None);
    }

    #[test]
    fn priority_first_match_wins() {
        assert_eq!(find_priority("x ⏬ then 🔺"), Some("⏬"));
        assert_eq!(find_priority("nothing"), None);
    }

    #[test]
    fn tags_need_leading_whitespace() {
        assert_eq!(tags("#a text #b-c url.com/#anchor"), vec!["a", "b-c"]);
    }

    #[test]
    fn individual_skips_csv_heads() {
        let line = "t ⛔ aaaaaa,bbbbbb ⛔ cccccc";
        assert_eq!(individual_links(line), vec!["cccccc"]);
        assert_eq!(csv_links(line), vec!["aaaaaa", "bbbbbb", "cccccc"]);
    }

    #[test]
    fn dataview_links_tolerate_spaces() {
        assert_eq!(
            dataview_links("t [dependsOn:: aaaaaa, bbbbbb]"),
            vec!["aaaaaa", "bbbbbb"]
        );
    }

    #[test]
    fn checklist_line_captures_status_and_text() {
        let caps = CHECKLIST.captures("  - [/] Write it").unwrap();
        assert_eq!(&caps[1], "  ");
        assert_eq!(&caps[2], "/");
        assert_eq!(&caps[3], "Write it");
    }
}
