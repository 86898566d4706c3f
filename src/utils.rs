//! Text helpers shared by classification, archiving, and the stores.

use crate::constants::artifacts::UNTITLED_NAME;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// True for characters in the CJK unified ideograph, kana, and hangul blocks.
pub fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3040..=0x30FF     // hiragana, katakana
            | 0x3400..=0x4DBF // extension A
            | 0x4E00..=0x9FFF // unified ideographs
            | 0xAC00..=0xD7AF // hangul syllables
            | 0xF900..=0xFAFF // compatibility ideographs
            | 0x20000..=0x2A6DF
    )
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || is_cjk(ch)
}

/// Reduce a free-form name to the archive allow-list.
///
/// Whitespace becomes `-`, anything outside `[A-Za-z0-9_-]` and CJK is dropped,
/// and repeated or edge dashes are trimmed. Empty results become `untitled`.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in normalize_inline_whitespace(raw).chars() {
        let ch = if ch == ' ' { '-' } else { ch };
        if !is_name_char(ch) {
            continue;
        }
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        UNTITLED_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Cut a sanitized name to at most `max_bytes` bytes on a character boundary.
///
/// Dashes left dangling by the cut are trimmed; a name that loses everything
/// becomes `untitled`.
pub fn truncate_name(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let mut end = max_bytes;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let trimmed = name[..end].trim_end_matches(['-', '_']);
    if trimmed.is_empty() {
        UNTITLED_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercase dash-joined slug of the ASCII alphanumeric (and CJK) words in `raw`.
pub fn slugify(raw: &str) -> String {
    let words: Vec<String> = raw
        .split(|ch: char| !(ch.is_ascii_alphanumeric() || is_cjk(ch)))
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_lowercase())
        .collect();
    words.join("-")
}

/// Round to one decimal place, the precision every store reports percentages with.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places, used for MB figures.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_inline_whitespace_collapses_runs() {
        let input = "Alpha\n\n  Beta\tGamma";
        assert_eq!(normalize_inline_whitespace(input), "Alpha Beta Gamma");
    }

    #[test]
    fn sanitize_keeps_allow_list_and_cjk() {
        assert_eq!(sanitize_name("Match Game: drag & drop"), "Match-Game-drag-drop");
        assert_eq!(sanitize_name("配對遊戲 測試"), "配對遊戲-測試");
        assert_eq!(sanitize_name("a/b\\c..d"), "abcd");
        assert_eq!(sanitize_name("keep_under-score"), "keep_under-score");
    }

    #[test]
    fn sanitize_falls_back_when_nothing_survives() {
        assert_eq!(sanitize_name("!!! ???"), UNTITLED_NAME);
        assert_eq!(sanitize_name(""), UNTITLED_NAME);
    }

    #[test]
    fn truncate_name_respects_char_boundaries() {
        assert_eq!(truncate_name("short", 10), "short");
        // 3-byte ideographs: 7 bytes leaves room for two of them.
        assert_eq!(truncate_name("遊戲測試", 7), "遊戲");
        assert_eq!(truncate_name("abc-def", 4), "abc");
        assert_eq!(truncate_name("遊戲", 2), UNTITLED_NAME);
    }

    #[test]
    fn slugify_lowercases_and_joins_words() {
        assert_eq!(slugify("Pause Overlay: click blocked"), "pause-overlay-click-blocked");
        assert_eq!(slugify("  "), "");
    }

    #[test]
    fn rounding_helpers_round_half_away() {
        assert_eq!(round1(66.66), 66.7);
        assert_eq!(round2(1.005_1), 1.01);
    }
}
