// Language tags and letter-unit tokenization.
//
// A "letter unit" is what a speaker perceives as a single letter. For most
// languages that is one Unicode scalar, but Serbian written in Gaj's Latin
// alphabet treats the digraphs dž, lj and nj as single letters. Chaining
// rules compare perceived letters, so naive `&word[0..2]` slicing would
// split a digraph in half and accept/reject the wrong words.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A supported dictionary language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Sr,
}

impl Language {
    /// All languages the service knows how to load dictionaries for.
    pub const ALL: [Language; 2] = [Language::En, Language::Sr];

    /// Short tag used for dictionary file names and API payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Sr => "sr",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Language> {
        match tag {
            "en" => Some(Language::En),
            "sr" => Some(Language::Sr),
            _ => None,
        }
    }

    /// Multi-character sequences counted as one letter, longest first.
    /// Tokenization input is lowercase; only lowercase forms are listed.
    fn digraphs(&self) -> &'static [&'static str] {
        match self {
            Language::Sr => &["dž", "lj", "nj"],
            Language::En => &[],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Split a lowercase word into letter units using greedy longest-match:
/// at each position a registered digraph wins over a single character.
pub fn letter_units<'a>(word: &'a str, language: Language) -> Vec<&'a str> {
    let digraphs = language.digraphs();
    let mut units = Vec::new();
    let mut pos = 0;
    while pos < word.len() {
        let rest = &word[pos..];
        if let Some(d) = digraphs.iter().find(|d| rest.starts_with(**d)) {
            units.push(&rest[..d.len()]);
            pos += d.len();
        } else {
            // Fall back to a single Unicode scalar.
            let ch_len = rest.chars().next().map(|c| c.len_utf8()).unwrap_or(1);
            units.push(&rest[..ch_len]);
            pos += ch_len;
        }
    }
    units
}

/// Number of perceived letters in a lowercase word.
pub fn unit_count(word: &str, language: Language) -> usize {
    letter_units(word, language).len()
}

/// The first two letter units concatenated, or None for words shorter
/// than two units.
pub fn first_two_units(word: &str, language: Language) -> Option<String> {
    let units = letter_units(word, language);
    match units.as_slice() {
        [a, b, ..] => Some(format!("{a}{b}")),
        _ => None,
    }
}

/// The last two letter units concatenated, or None for words shorter
/// than two units.
pub fn last_two_units(word: &str, language: Language) -> Option<String> {
    let units = letter_units(word, language);
    match units.as_slice() {
        [.., a, b] => Some(format!("{a}{b}")),
        _ => None,
    }
}

/// Whether a word begins and ends with the same two letter units.
/// Such a word would satisfy its own required prefix, so the game rules
/// reject it outright.
pub fn is_self_loop(word: &str, language: Language) -> bool {
    match (first_two_units(word, language), last_two_units(word, language)) {
        (Some(head), Some(tail)) => head == tail,
        _ => false,
    }
}
