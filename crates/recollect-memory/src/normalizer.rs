use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use recollect_core::RecollectError;

use crate::stopwords;

/// Tokens shorter than this many characters are discarded.
const MIN_TOKEN_CHARS: usize = 2;

static ENGLISH_STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| stopwords::ENGLISH.iter().copied().collect());
static RUSSIAN_STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| stopwords::RUSSIAN.iter().copied().collect());

/// A language with a built-in stop-word list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    /// English (`en`).
    #[serde(rename = "en")]
    English,
    /// Russian (`ru`).
    #[serde(rename = "ru")]
    Russian,
}

impl Language {
    /// All supported languages, in auto-detection priority order.
    pub const ALL: [Language; 2] = [Language::English, Language::Russian];

    /// Two-letter language code.
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Russian => "ru",
        }
    }

    fn builtin(self) -> &'static HashSet<&'static str> {
        match self {
            Self::English => &ENGLISH_STOP_WORDS,
            Self::Russian => &RUSSIAN_STOP_WORDS,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How the stop-word list for a text is chosen.
///
/// Serialized as `"auto"`, `"multilingual"`, or a language code such as `"en"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LanguageMode {
    /// Pick the language whose stop words overlap the text the most.
    #[default]
    Auto,
    /// Always use one language's list.
    Forced(Language),
    /// Use the union of every list.
    Multilingual,
}

impl FromStr for LanguageMode {
    type Err = RecollectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "multilingual" => Ok(Self::Multilingual),
            "en" => Ok(Self::Forced(Language::English)),
            "ru" => Ok(Self::Forced(Language::Russian)),
            other => Err(RecollectError::Config(format!(
                "unknown language mode '{other}' (expected auto, multilingual, en or ru)"
            ))),
        }
    }
}

impl TryFrom<String> for LanguageMode {
    type Error = RecollectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LanguageMode> for String {
    fn from(mode: LanguageMode) -> Self {
        match mode {
            LanguageMode::Auto => "auto".to_string(),
            LanguageMode::Multilingual => "multilingual".to_string(),
            LanguageMode::Forced(lang) => lang.code().to_string(),
        }
    }
}

/// User-supplied stop words added on top of the built-in lists.
///
/// Deserializes from a map of language code to either a list of words or a
/// single comma-separated string. Words are trimmed and lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Language, WordList>", into = "BTreeMap<Language, Vec<String>>")]
pub struct CustomStopWords {
    words: BTreeMap<Language, BTreeSet<String>>,
}

/// Raw per-language entry of [`CustomStopWords`] as written in configuration.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WordList {
    /// `"foo, bar"`
    Csv(String),
    /// `["foo", "bar"]`
    List(Vec<String>),
}

impl CustomStopWords {
    /// Creates an empty set of additions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one word for `language`. Blank words are ignored.
    pub fn add(&mut self, language: Language, word: &str) {
        let word = word.trim().to_lowercase();
        if !word.is_empty() {
            self.words.entry(language).or_default().insert(word);
        }
    }

    /// Adds every word of a comma-separated list, e.g. `"foo, bar"`.
    pub fn add_csv(&mut self, language: Language, csv: &str) {
        for word in csv.split(',') {
            self.add(language, word);
        }
    }

    /// Chainable form of [`CustomStopWords::add_csv`].
    pub fn with_csv(mut self, language: Language, csv: &str) -> Self {
        self.add_csv(language, csv);
        self
    }

    fn contains(&self, language: Language, token: &str) -> bool {
        self.words
            .get(&language)
            .is_some_and(|words| words.contains(token))
    }
}

impl From<BTreeMap<Language, WordList>> for CustomStopWords {
    fn from(raw: BTreeMap<Language, WordList>) -> Self {
        let mut custom = Self::new();
        for (language, list) in raw {
            match list {
                WordList::Csv(csv) => custom.add_csv(language, &csv),
                WordList::List(words) => {
                    for word in &words {
                        custom.add(language, word);
                    }
                }
            }
        }
        custom
    }
}

impl From<CustomStopWords> for BTreeMap<Language, Vec<String>> {
    fn from(custom: CustomStopWords) -> Self {
        custom
            .words
            .into_iter()
            .map(|(language, words)| (language, words.into_iter().collect()))
            .collect()
    }
}

fn is_stop_word(language: Language, token: &str, custom: &CustomStopWords) -> bool {
    language.builtin().contains(token) || custom.contains(language, token)
}

/// Split text into lowercase letter-only tokens of at least two characters.
///
/// Any non-letter character (punctuation, digits, whitespace) is a boundary,
/// so Latin and Cyrillic words split the same way.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .collect()
}

/// Choose the language whose stop words (built-in and custom) occur most often
/// in `tokens`. Ties go to the earlier entry of [`Language::ALL`].
pub fn detect_language(tokens: &[String], custom: &CustomStopWords) -> Language {
    let mut best = Language::ALL[0];
    let mut best_overlap = 0usize;
    for language in Language::ALL {
        let overlap = tokens
            .iter()
            .filter(|t| is_stop_word(language, t, custom))
            .count();
        if overlap > best_overlap {
            best = language;
            best_overlap = overlap;
        }
    }
    best
}

/// Tokenize `text` and drop the stop words that apply under `mode`.
///
/// Pure function of its inputs: identical arguments always yield identical tokens,
/// in source order, duplicates kept.
pub fn normalize(text: &str, mode: LanguageMode, custom: &CustomStopWords) -> Vec<String> {
    let tokens = tokenize(text);
    match mode {
        LanguageMode::Forced(language) => retain_non_stop(tokens, &[language], custom),
        LanguageMode::Multilingual => retain_non_stop(tokens, &Language::ALL, custom),
        LanguageMode::Auto => {
            let language = detect_language(&tokens, custom);
            retain_non_stop(tokens, &[language], custom)
        }
    }
}

fn retain_non_stop(
    mut tokens: Vec<String>,
    languages: &[Language],
    custom: &CustomStopWords,
) -> Vec<String> {
    tokens.retain(|t| !languages.iter().any(|&l| is_stop_word(l, t, custom)));
    tokens
}
