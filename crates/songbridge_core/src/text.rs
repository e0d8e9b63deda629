//! Title normalization and group classification.
//!
//! Both functions are pure so the catalog and the query side always agree on
//! how a title is folded.

use serde::{Serialize, Serializer};
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Shortcut block a title belongs to in the game's song list.
///
/// Ordering follows the game's list: letters a-z, then the non-Latin block,
/// then digits and symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// Lower-case ASCII letter `a..=z`.
    Letter(char),
    /// Title starts with a non-Latin letter (Hangul, Kana, Cyrillic, ...).
    NonLatin,
    /// Title starts with a digit, punctuation or symbol.
    SymbolDigit,
}

impl GroupKey {
    pub fn letter(&self) -> Option<char> {
        match self {
            GroupKey::Letter(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Letter(c) => write!(f, "{}", c),
            GroupKey::NonLatin => write!(f, "non-latin"),
            GroupKey::SymbolDigit => write!(f, "symbol"),
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fold a title for matching: compatibility-decomposed, diacritics and
/// punctuation and whitespace dropped, lower-cased, then recomposed.
///
/// ```
/// use songbridge_core::text::normalize_title;
///
/// assert_eq!(normalize_title("  Binary  Star! "), "binarystar");
/// assert_eq!(normalize_title("ＯＢＬＩＶＩＯＮ"), "oblivion");
/// ```
pub fn normalize_title(value: &str) -> String {
    let folded: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    folded.nfc().collect()
}

/// Canonical form of a song id used for matching.
///
/// Purely numeric ids drop their leading zeros so `"007"` and `7` agree;
/// anything else is only trimmed.
///
/// ```
/// use songbridge_core::text::normalize_id;
///
/// assert_eq!(normalize_id(" 007 "), "7");
/// assert_eq!(normalize_id("000"), "0");
/// assert_eq!(normalize_id("c-01"), "c-01");
/// ```
pub fn normalize_id(value: &str) -> String {
    let value = value.trim();
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        let stripped = value.trim_start_matches('0');
        return if stripped.is_empty() { "0" } else { stripped }.to_string();
    }
    value.to_string()
}

/// Split free text scraped from a song tile into `(number, title)`.
///
/// A leading number followed by separators (`"001. Binary Star"`) yields both
/// parts. Otherwise the whole text is the title, and the number is set only
/// when the text contains exactly one run of digits.
pub fn split_title_and_number(text: &str) -> (Option<String>, Option<String>) {
    let raw: String = text.nfkc().collect();
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, None);
    }

    let digits_end = raw
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(raw.len(), |(i, _)| i);
    if digits_end > 0 {
        let title = raw[digits_end..]
            .trim_start_matches(|c: char| c.is_whitespace() || "-:./".contains(c))
            .trim();
        let title = (!title.is_empty()).then(|| title.to_string());
        return (Some(normalize_id(&raw[..digits_end])), title);
    }

    let runs: Vec<&str> = raw
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect();
    let number = match runs.as_slice() {
        [only] => Some(normalize_id(only)),
        _ => None,
    };
    (number, Some(raw.to_string()))
}

/// Classify a title by its first non-whitespace character.
///
/// Accented Latin letters count as their base letter (`É` is in the `e` block).
pub fn classify(title: &str) -> GroupKey {
    let first = title
        .nfkd()
        .find(|c| !c.is_whitespace() && !is_combining_mark(*c));
    match first {
        Some(c) if c.is_ascii_alphabetic() => GroupKey::Letter(c.to_ascii_lowercase()),
        Some(c) if c.is_alphabetic() => GroupKey::NonLatin,
        _ => GroupKey::SymbolDigit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_title("Binary Sunset"), "binarysunset");
        assert_eq!(normalize_title("Don't Die"), "dontdie");
        assert_eq!(normalize_title("OBLIVION (feat. Someone)"), "oblivionfeatsomeone");
        assert_eq!(normalize_title("   "), "");
    }

    #[test]
    fn test_normalize_keeps_non_latin_letters() {
        assert_eq!(normalize_title("아리랑 - Remix"), "아리랑remix");
        assert_eq!(normalize_title("Café"), "cafe");
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("0042"), "42");
        assert_eq!(normalize_id("42"), "42");
        assert_eq!(normalize_id("s-007"), "s-007");
        assert_eq!(normalize_id("  "), "");
    }

    #[test]
    fn test_split_title_and_number() {
        assert_eq!(
            split_title_and_number("001. Binary Star"),
            (Some("1".to_string()), Some("Binary Star".to_string()))
        );
        assert_eq!(
            split_title_and_number("12 - Cradle"),
            (Some("12".to_string()), Some("Cradle".to_string()))
        );
        assert_eq!(split_title_and_number("０７"), (Some("7".to_string()), None));
        assert_eq!(
            split_title_and_number("Airwave"),
            (None, Some("Airwave".to_string()))
        );
        assert_eq!(
            split_title_and_number("Track 9 Remix"),
            (Some("9".to_string()), Some("Track 9 Remix".to_string()))
        );
        assert_eq!(
            split_title_and_number("A1 B2"),
            (None, Some("A1 B2".to_string()))
        );
        assert_eq!(split_title_and_number("   "), (None, None));
    }

    #[test]
    fn test_classify_latin_letters() {
        assert_eq!(classify("Airwave"), GroupKey::Letter('a'));
        assert_eq!(classify("  binary star"), GroupKey::Letter('b'));
        // Full-width letters fold to ASCII.
        assert_eq!(classify("Ｚｅｒｏ"), GroupKey::Letter('z'));
        assert_eq!(classify("Élan"), GroupKey::Letter('e'));
    }

    #[test]
    fn test_classify_overflow_groups() {
        assert_eq!(classify("아리랑"), GroupKey::NonLatin);
        assert_eq!(classify("ひまわり"), GroupKey::NonLatin);
        assert_eq!(classify("1st Love"), GroupKey::SymbolDigit);
        assert_eq!(classify("#Hashtag"), GroupKey::SymbolDigit);
        assert_eq!(classify(""), GroupKey::SymbolDigit);
    }

    #[test]
    fn test_group_ordering_matches_list_order() {
        let mut keys = vec![
            GroupKey::SymbolDigit,
            GroupKey::Letter('c'),
            GroupKey::NonLatin,
            GroupKey::Letter('a'),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                GroupKey::Letter('a'),
                GroupKey::Letter('c'),
                GroupKey::NonLatin,
                GroupKey::SymbolDigit,
            ]
        );
    }
}
