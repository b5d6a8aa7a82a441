//! Frozen vocabularies built from the training split.
//!
//! Both vocabularies assign ids in sorted order so that rebuilding from the
//! same corpus always yields the same mapping.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Padding character id.
pub const PAD_ID: u32 = 0;
/// Unknown character id.
pub const UNK_ID: u32 = 1;

/// Character vocabulary for encoding words.
///
/// Ids `0` and `1` are reserved for padding and unknown characters; real
/// characters start at `2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<char>", into = "Vec<char>")]
pub struct CharVocab {
    chars: Vec<char>,
    char_to_idx: HashMap<char, u32>,
}

impl CharVocab {
    /// Build from training words.
    pub fn build<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let chars: BTreeSet<char> = words
            .into_iter()
            .flat_map(|w| w.as_ref().chars().collect::<Vec<_>>())
            .collect();
        Self::from(chars.into_iter().collect::<Vec<_>>())
    }

    pub fn id(&self, c: char) -> u32 {
        self.char_to_idx.get(&c).copied().unwrap_or(UNK_ID)
    }

    pub fn encode(&self, word: &str) -> Vec<u32> {
        word.chars().map(|c| self.id(c)).collect()
    }

    /// Number of ids including the two reserved ones.
    pub fn vocab_size(&self) -> usize {
        self.chars.len() + 2
    }

    pub fn contains(&self, c: char) -> bool {
        self.char_to_idx.contains_key(&c)
    }
}

impl From<Vec<char>> for CharVocab {
    fn from(chars: Vec<char>) -> Self {
        let char_to_idx = chars
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as u32 + 2))
            .collect();
        Self { chars, char_to_idx }
    }
}

impl From<CharVocab> for Vec<char> {
    fn from(vocab: CharVocab) -> Self {
        vocab.chars
    }
}

/// String vocabulary for affixes or semantic tags, ids starting at `0`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocab {
    items: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocab {
    pub fn build<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::from(sorted.into_iter().collect::<Vec<_>>())
    }

    /// Id of `item`, or `None` if it was not seen in training.
    pub fn get(&self, item: &str) -> Option<usize> {
        self.index.get(item).copied()
    }

    pub fn item(&self, id: usize) -> Option<&str> {
        self.items.get(id).map(String::as_str)
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<String>> for Vocab {
    fn from(items: Vec<String>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self { items, index }
    }
}

impl From<Vocab> for Vec<String> {
    fn from(vocab: Vocab) -> Self {
        vocab.items
    }
}
