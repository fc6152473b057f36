//! `%KEY%` placeholder substitution.
//!
//! A placeholder is the text between a `%` and the next `%`. It is replaced
//! when that span is exactly a key of the mapping, whatever characters the key
//! uses. Replacement happens in a single left-to-right pass, so a value that
//! itself looks like a placeholder is emitted as-is and never expanded again.
//! Keys absent from the mapping are left in the output untouched, and their
//! closing `%` may still open the next placeholder.
//!
//! [`placeholders`] and [`unresolved`] only report conventional tokens made of
//! ASCII letters, digits and underscores, so stray `%` signs in prose such as
//! `100% of 50%` are never reported as missing keys.

use std::collections::BTreeMap;

const SIGIL: u8 = b'%';

fn is_key_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Returns the key span `(start, end)` of a conventional placeholder opening
/// at `open`, where `text[open]` is `%` and `text[end]` is the closing `%`.
fn placeholder_at(bytes: &[u8], open: usize) -> Option<(usize, usize)> {
    let start = open + 1;
    let mut end = start;
    while end < bytes.len() && is_key_byte(bytes[end]) {
        end += 1;
    }
    (end > start && end < bytes.len() && bytes[end] == SIGIL).then_some((start, end))
}

/// Returns the closing `%` index and value when the span after `open` is a mapped key.
fn mapped_at<'m>(
    text: &str,
    open: usize,
    colors: &'m BTreeMap<String, String>,
) -> Option<(usize, &'m str)> {
    let start = open + 1;
    let end = start + text.get(start..)?.find('%')?;
    let value = colors.get(&text[start..end])?;
    Some((end, value.as_str()))
}

/// Replaces every `%KEY%` whose key is present in `colors` with its value.
#[must_use]
pub fn substitute(text: &str, colors: &BTreeMap<String, String>) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut cursor = 0;

    while cursor < bytes.len() {
        if bytes[cursor] == SIGIL
            && let Some((end, value)) = mapped_at(text, cursor, colors)
        {
            out.push_str(&text[copied..cursor]);
            out.push_str(value);
            cursor = end + 1;
            copied = cursor;
            continue;
        }
        cursor += 1;
    }

    out.push_str(&text[copied..]);
    out
}

/// Lists the keys of every syntactically valid placeholder, in order of appearance.
///
/// Tokens are matched left to right without overlap, the same way
/// [`substitute`] would see them if every key were defined.
#[must_use]
pub fn placeholders(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut keys = Vec::new();
    let mut cursor = 0;

    while cursor < bytes.len() {
        if bytes[cursor] == SIGIL
            && let Some((start, end)) = placeholder_at(bytes, cursor)
        {
            keys.push(&text[start..end]);
            cursor = end + 1;
            continue;
        }
        cursor += 1;
    }

    keys
}

/// Conventional placeholder keys in `text` that [`substitute`] would leave
/// in place, deduplicated and sorted.
#[must_use]
pub fn unresolved<'a>(text: &'a str, colors: &BTreeMap<String, String>) -> Vec<&'a str> {
    let bytes = text.as_bytes();
    let mut missing = Vec::new();
    let mut cursor = 0;

    while cursor < bytes.len() {
        if bytes[cursor] == SIGIL {
            if let Some((end, _)) = mapped_at(text, cursor, colors) {
                cursor = end + 1;
                continue;
            }
            if let Some((start, end)) = placeholder_at(bytes, cursor) {
                missing.push(&text[start..end]);
            }
        }
        cursor += 1;
    }

    missing.sort_unstable();
    missing.dedup();
    missing
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{placeholders, substitute, unresolved};

    fn colors(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn replaces_every_occurrence_of_known_keys() {
        let map = colors(&[("BG_PRIMARY", "#1e1e2e"), ("ACCENT", "#89b4fa")]);
        let out = substitute(
            "QWidget { background: %BG_PRIMARY%; } a { color: %ACCENT%; border: %BG_PRIMARY%; }",
            &map,
        );
        assert_eq!(
            out,
            "QWidget { background: #1e1e2e; } a { color: #89b4fa; border: #1e1e2e; }"
        );
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        let map = colors(&[("ACCENT", "red")]);
        assert_eq!(substitute("%NOT_DEFINED% %ACCENT%", &map), "%NOT_DEFINED% red");
    }

    #[test]
    fn replaced_values_are_not_rescanned() {
        let map = colors(&[("A", "%B%"), ("B", "loop")]);
        assert_eq!(substitute("%A%", &map), "%B%");
    }

    #[test]
    fn stray_percent_signs_are_preserved() {
        let map = colors(&[("FG_PRIMARY", "#fff")]);
        assert_eq!(
            substitute("width: 100%; color: %FG_PRIMARY%; 50% %", &map),
            "width: 100%; color: #fff; 50% %"
        );
        assert_eq!(substitute("%%", &map), "%%");
        assert_eq!(substitute("%FG_PRIMARY", &map), "%FG_PRIMARY");
    }

    #[test]
    fn values_are_inserted_without_escaping() {
        let map = colors(&[("ACCENT", "<b>&\"x\"</b>")]);
        assert_eq!(
            substitute("<rect fill=\"%ACCENT%\"/>", &map),
            "<rect fill=\"<b>&\"x\"</b>\"/>"
        );
    }

    #[test]
    fn multibyte_text_around_placeholders_is_kept_intact() {
        let map = colors(&[("ACCENT", "#abc")]);
        assert_eq!(substitute("é%ACCENT%ü — %ACCENT%", &map), "é#abcü — #abc");
    }

    #[test]
    fn keys_with_any_characters_but_the_sigil_are_replaced() {
        let map = colors(&[("BG-PRIMARY", "#111"), ("bg.alt", "#222"), ("a b", "#333")]);
        assert_eq!(
            substitute("%BG-PRIMARY% %bg.alt% %a b% %bg-alt%", &map),
            "#111 #222 #333 %bg-alt%"
        );
        assert!(unresolved("%BG-PRIMARY% %bg.alt%", &map).is_empty());
    }

    #[test]
    fn unmatched_span_does_not_hide_a_following_placeholder() {
        let map = colors(&[("ACCENT", "red")]);
        assert_eq!(substitute("50% off %ACCENT%", &map), "50% off red");
        assert_eq!(substitute("%%ACCENT%", &map), "%red");
        assert_eq!(unresolved("100% %MISSING% %ACCENT%", &map), vec!["MISSING"]);
    }

    #[test]
    fn placeholders_lists_tokens_in_order() {
        assert_eq!(placeholders("%A% 100% %B_2% %% %C"), vec!["A", "B_2"]);
    }

    #[test]
    fn unresolved_reports_missing_keys_once() {
        let map = colors(&[("A", "1")]);
        assert_eq!(unresolved("%B% %A% %B% %C%", &map), vec!["B", "C"]);
    }
}
