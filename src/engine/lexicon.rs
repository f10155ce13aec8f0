// Dictionary loading and membership testing.
//
// One plain-text word list per language: one word per line, UTF-8, blank
// lines and `#` comments ignored. A missing or empty file degrades to an
// empty lexicon; callers must refuse to start games for that language
// instead of crashing.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use super::language::{unit_count, Language};
use super::reachability::ReachabilityIndex;

/// An immutable set of lowercase words for one language.
#[derive(Debug)]
pub struct Lexicon {
    language: Language,
    words: HashSet<String>,
}

impl Lexicon {
    /// Load a word list from a file. Lines are trimmed and lowercased;
    /// blank lines, `#` comments and words shorter than 3 letter units
    /// are discarded. A missing file yields an empty lexicon.
    pub fn load(path: &Path, language: Language) -> Lexicon {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    language = %language,
                    path = %path.display(),
                    "Dictionary file not readable ({e}), language will be unavailable"
                );
                return Lexicon {
                    language,
                    words: HashSet::new(),
                };
            }
        };

        let reader = BufReader::new(file);
        let mut words = HashSet::new();
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Stopping dictionary read: {e}");
                    break;
                }
            };
            let word = line.trim();
            if word.is_empty() || word.starts_with('#') {
                continue;
            }
            let word = word.to_lowercase();
            if unit_count(&word, language) < 3 {
                continue;
            }
            words.insert(word);
        }

        tracing::info!(language = %language, count = words.len(), "Loaded dictionary");
        Lexicon { language, words }
    }

    /// Build a lexicon from an iterator of words. Applies the same
    /// normalization and length filter as `load`.
    pub fn from_words<I, S>(language: Language, words: I) -> Lexicon
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty() && unit_count(w, language) >= 3)
            .collect();
        Lexicon { language, words }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn words(&self) -> &HashSet<String> {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// A lexicon together with the reachability index built from it.
/// Read-only after construction and shared across all concurrent games.
#[derive(Debug)]
pub struct LanguageDict {
    pub lexicon: Lexicon,
    pub index: ReachabilityIndex,
}

impl LanguageDict {
    pub fn new(lexicon: Lexicon) -> LanguageDict {
        let index = ReachabilityIndex::build(&lexicon);
        LanguageDict { lexicon, index }
    }

    pub fn language(&self) -> Language {
        self.lexicon.language()
    }
}

/// All loaded dictionaries, keyed by language. A language with no usable
/// word list is simply absent; game starts for it are refused.
#[derive(Debug, Default)]
pub struct Dictionaries {
    inner: HashMap<Language, Arc<LanguageDict>>,
}

impl Dictionaries {
    /// Scan a words directory for `<tag>.txt` files, one per supported
    /// language. Empty results are dropped rather than treated as errors.
    pub fn load(words_dir: &Path) -> Dictionaries {
        let mut inner = HashMap::new();
        for language in Language::ALL {
            let path = words_dir.join(format!("{}.txt", language.tag()));
            let lexicon = Lexicon::load(&path, language);
            if lexicon.is_empty() {
                continue;
            }
            inner.insert(language, Arc::new(LanguageDict::new(lexicon)));
        }
        Dictionaries { inner }
    }

    /// Build from pre-made lexicons (used by tests and seeding).
    pub fn from_lexicons<I>(lexicons: I) -> Dictionaries
    where
        I: IntoIterator<Item = Lexicon>,
    {
        let inner = lexicons
            .into_iter()
            .filter(|l| !l.is_empty())
            .map(|l| (l.language(), Arc::new(LanguageDict::new(l))))
            .collect();
        Dictionaries { inner }
    }

    pub fn get(&self, language: Language) -> Option<Arc<LanguageDict>> {
        self.inner.get(&language).cloned()
    }

    /// (language, word count) pairs for every usable dictionary, sorted
    /// by tag for stable listings.
    pub fn available(&self) -> Vec<(Language, usize)> {
        let mut langs: Vec<_> = self
            .inner
            .values()
            .map(|d| (d.language(), d.lexicon.len()))
            .collect();
        langs.sort_by_key(|(l, _)| l.tag());
        langs
    }
}
