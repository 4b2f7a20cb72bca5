//! Chat text clean-up before speech
//!
//! Chat lines are full of things that sound terrible when read verbatim:
//! long links, "!!!!!!!!" floods and stray whitespace. [`TextProcessor`]
//! turns a raw line into something worth speaking.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Matches http(s) and bare www links
static URL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").ok());

/// Text processing options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSettings {
    /// Master switch; when false text is only trimmed
    pub process_text: bool,
    /// Collapse runs of the characters in `repeated_symbols_values`
    pub repeated_symbols: bool,
    pub repeated_symbols_values: String,
    /// Spoken in place of a link
    pub link_word: String,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            process_text: true,
            repeated_symbols: true,
            repeated_symbols_values: "!?.-=*#".to_string(),
            link_word: "enlace".to_string(),
        }
    }
}

/// Turns raw chat text into speakable text
#[derive(Debug, Clone)]
pub struct TextProcessor {
    settings: TextSettings,
}

impl TextProcessor {
    pub fn new(settings: TextSettings) -> Self {
        Self { settings }
    }

    /// Clean a chat line; may return an empty string
    pub fn process(&self, text: &str) -> String {
        if !self.settings.process_text {
            return text.trim().to_string();
        }

        let mut result = replace_links(text, &self.settings.link_word);
        if self.settings.repeated_symbols {
            result = condense_repeated_chars(&result, &self.settings.repeated_symbols_values);
        }
        collapse_whitespace(&result)
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new(TextSettings::default())
    }
}

/// Replace every link with a single spoken word
pub fn replace_links(text: &str, word: &str) -> String {
    match URL_PATTERN.as_ref() {
        Some(re) => re.replace_all(text, word).into_owned(),
        None => text.to_string(),
    }
}

/// Replace runs of repeated characters with a single occurrence
/// e.g., "hola!!!!!" becomes "hola!"
pub fn condense_repeated_chars(text: &str, chars_to_condense: &str) -> String {
    if chars_to_condense.is_empty() || text.is_empty() {
        return text.to_string();
    }

    // The regex crate has no backreferences, so runs are found by hand
    let condense_set: HashSet<char> = chars_to_condense.chars().collect();

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        result.push(ch);
        if condense_set.contains(&ch) {
            while chars.peek() == Some(&ch) {
                chars.next();
            }
        }
    }

    result
}

/// Trim and squeeze internal whitespace (including newlines) to single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
