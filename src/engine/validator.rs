// Word-chain validation: a pure function from game state to a verdict.
//
// Verdicts are expected, user-facing outcomes, never errors. The checks
// run cheapest-first: syntactic rejections before the dictionary lookup,
// and the reachability scan last and only in endless mode.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::language::{first_two_units, is_self_loop, last_two_units, unit_count};
use super::lexicon::LanguageDict;

/// How strictly a game treats words that would strand the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Dead-end words are accepted; the chain may simply get stuck.
    Normal,
    /// Dead-end words are rejected so the chain can always continue.
    Endless,
}

impl GameMode {
    pub fn from_tag(tag: &str) -> Option<GameMode> {
        match tag {
            "normal" => Some(GameMode::Normal),
            "endless" => Some(GameMode::Endless),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            GameMode::Normal => "normal",
            GameMode::Endless => "endless",
        }
    }
}

/// Outcome of validating one candidate word. Exactly one applies; the
/// variants are listed in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    TooShort,
    AlreadyUsed,
    WrongLetters,
    SelfLoop,
    NotInDictionary,
    DeadEnd,
    Valid,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    /// Stable label used for metrics and logging.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::TooShort => "too_short",
            Verdict::AlreadyUsed => "already_used",
            Verdict::WrongLetters => "wrong_letters",
            Verdict::SelfLoop => "self_loop",
            Verdict::NotInDictionary => "not_in_dictionary",
            Verdict::DeadEnd => "dead_end",
            Verdict::Valid => "valid",
        }
    }
}

/// Validate a candidate against the current word and the set of already
/// used words. Does not mutate anything; `used_words` and `current_word`
/// are expected lowercase, the candidate is normalized here.
pub fn validate(
    candidate: &str,
    current_word: &str,
    used_words: &HashSet<String>,
    dict: &LanguageDict,
    mode: GameMode,
) -> Verdict {
    let language = dict.language();
    let candidate = candidate.trim().to_lowercase();

    if unit_count(&candidate, language) < 3 {
        return Verdict::TooShort;
    }
    if used_words.contains(&candidate) {
        return Verdict::AlreadyUsed;
    }
    if first_two_units(&candidate, language) != last_two_units(current_word, language) {
        return Verdict::WrongLetters;
    }
    if is_self_loop(&candidate, language) {
        return Verdict::SelfLoop;
    }
    if !dict.lexicon.contains(&candidate) {
        return Verdict::NotInDictionary;
    }
    if mode == GameMode::Endless {
        // last_two_units is Some for any word of >= 3 units.
        let suffix = match last_two_units(&candidate, language) {
            Some(s) => s,
            None => return Verdict::WrongLetters,
        };
        if !dict.index.has_continuation(&suffix, used_words) {
            return Verdict::DeadEnd;
        }
    }
    Verdict::Valid
}
