// Precomputed reachability index: 2-unit prefix -> words with that prefix.
//
// Built once per loaded lexicon and never mutated. Turns the dead-end
// check from a full-dictionary scan into a scan of one prefix bucket,
// and backs starting-word selection so a fresh game never opens on a
// word with zero legal replies.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use super::language::{is_self_loop, last_two_units, unit_count, Language};
use super::lexicon::Lexicon;

/// Starting words are preferred in this letter-unit length range: long
/// enough to be interesting, short enough to type.
const STARTING_WORD_UNITS: std::ops::RangeInclusive<usize> = 4..=8;

#[derive(Debug)]
pub struct ReachabilityIndex {
    language: Language,
    buckets: HashMap<String, Vec<String>>,
}

impl ReachabilityIndex {
    /// Index every word of at least two letter units under its first two
    /// units.
    pub fn build(lexicon: &Lexicon) -> ReachabilityIndex {
        let language = lexicon.language();
        let mut buckets: HashMap<String, Vec<String>> = HashMap::new();
        for word in lexicon.words() {
            if let Some(prefix) = super::language::first_two_units(word, language) {
                buckets.entry(prefix).or_default().push(word.clone());
            }
        }
        ReachabilityIndex { language, buckets }
    }

    /// All dictionary words beginning with the given 2-unit prefix.
    pub fn lookup_by_prefix(&self, prefix: &str) -> &[String] {
        self.buckets.get(prefix).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether at least one unused, non-self-looping word starts with the
    /// given prefix. Short-circuits on the first hit.
    pub fn has_continuation(&self, prefix: &str, used: &HashSet<String>) -> bool {
        self.lookup_by_prefix(prefix)
            .iter()
            .any(|w| !used.contains(w) && !is_self_loop(w, self.language))
    }

    /// Pick a random starting word that is guaranteed to have at least one
    /// legal reply. Preference order: words of 4-8 letter units with a
    /// continuation, then any word with a continuation, then any word at
    /// all (a pathological dictionary with no chains).
    pub fn pick_starting_word(&self, lexicon: &Lexicon) -> Option<String> {
        let no_used = HashSet::new();
        let openable = |word: &&String| -> bool {
            last_two_units(word, self.language)
                .map(|suffix| self.has_continuation(&suffix, &no_used))
                .unwrap_or(false)
        };

        let preferred: Vec<&String> = lexicon
            .words()
            .iter()
            .filter(|w| STARTING_WORD_UNITS.contains(&unit_count(w, self.language)))
            .filter(openable)
            .collect();
        if let Some(word) = pick_uniform(&preferred) {
            return Some(word.clone());
        }

        let any_openable: Vec<&String> = lexicon.words().iter().filter(openable).collect();
        if let Some(word) = pick_uniform(&any_openable) {
            return Some(word.clone());
        }

        let all: Vec<&String> = lexicon.words().iter().collect();
        pick_uniform(&all).map(|w| (*w).clone())
    }
}

fn pick_uniform<'a>(candidates: &[&'a String]) -> Option<&'a String> {
    if candidates.is_empty() {
        return None;
    }
    let mut rng = rand::thread_rng();
    Some(candidates[rng.gen_range(0..candidates.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn en_lexicon(words: &[&str]) -> Lexicon {
        Lexicon::from_words(Language::En, words.iter().copied())
    }

    #[test]
    fn test_buckets_group_by_prefix() {
        let lexicon = en_lexicon(&["table", "tangent", "lemon"]);
        let index = ReachabilityIndex::build(&lexicon);

        let ta = index.lookup_by_prefix("ta");
        assert_eq!(ta.len(), 2);
        assert!(ta.contains(&"table".to_string()));
        assert!(ta.contains(&"tangent".to_string()));
        assert_eq!(index.lookup_by_prefix("le").len(), 1);
        assert!(index.lookup_by_prefix("zz").is_empty());
    }

    #[test]
    fn test_serbian_buckets_keep_digraphs_whole() {
        let lexicon = Lexicon::from_words(Language::Sr, ["njiva", "njegov"]);
        let index = ReachabilityIndex::build(&lexicon);
        // Prefix is nj + i / nj + e, not "nj" alone or "n" + "j".
        assert_eq!(index.lookup_by_prefix("nji").len(), 1);
        assert_eq!(index.lookup_by_prefix("nje").len(), 1);
        assert!(index.lookup_by_prefix("nj").is_empty());
    }

    #[test]
    fn test_has_continuation_skips_used_and_self_loops() {
        let lexicon = en_lexicon(&["lemon", "onion"]);
        let index = ReachabilityIndex::build(&lexicon);

        let mut used = HashSet::new();
        // "lemon" ends "on"; "onion" starts "on" but is a self-loop
        // (starts "on", ends "on"), so it never counts.
        assert!(!index.has_continuation("on", &used));

        let lexicon = en_lexicon(&["lemon", "onset"]);
        let index = ReachabilityIndex::build(&lexicon);
        assert!(index.has_continuation("on", &used));

        used.insert("onset".to_string());
        assert!(!index.has_continuation("on", &used));
    }

    #[test]
    fn test_pick_starting_word_prefers_openable_words() {
        // "stranded" (8 units) ends "ed" with no continuation; "table"
        // ends "le" and "lemon" continues it.
        let lexicon = en_lexicon(&["table", "lemon", "stranded"]);
        let index = ReachabilityIndex::build(&lexicon);
        for _ in 0..20 {
            let word = index.pick_starting_word(&lexicon).unwrap();
            assert_eq!(word, "table", "only 'table' has a legal reply");
        }
    }

    #[test]
    fn test_pick_starting_word_falls_back_outside_length_range() {
        // The only openable word has 10 letter units, outside 4-8.
        let lexicon = en_lexicon(&["watermelon", "onset"]);
        let index = ReachabilityIndex::build(&lexicon);
        // "onset" ends "et": no continuation. "watermelon" ends "on":
        // "onset" continues it. So "watermelon" is the only openable word.
        for _ in 0..20 {
            let word = index.pick_starting_word(&lexicon).unwrap();
            assert_eq!(word, "watermelon");
        }
    }

    #[test]
    fn test_pick_starting_word_degrades_to_any_word() {
        // No word has any continuation at all.
        let lexicon = en_lexicon(&["abc", "def"]);
        let index = ReachabilityIndex::build(&lexicon);
        let word = index.pick_starting_word(&lexicon).unwrap();
        assert!(word == "abc" || word == "def");
    }

    #[test]
    fn test_pick_starting_word_empty_lexicon() {
        let lexicon = en_lexicon(&[]);
        let index = ReachabilityIndex::build(&lexicon);
        assert!(index.pick_starting_word(&lexicon).is_none());
    }
}
