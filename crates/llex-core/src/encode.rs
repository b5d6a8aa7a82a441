//! Example encoders: raw records to numeric features.

use crate::error::Result;
use crate::record::{SegmentationRecord, SemanticRecord};
use crate::tags::{BioTag, TagScheme};
use crate::vocab::{CharVocab, Vocab};

/// A segmentation example after vocabulary lookup. Both sequences have one
/// entry per character of the word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedWord {
    pub char_ids: Vec<u32>,
    pub tags: Vec<BioTag>,
}

impl EncodedWord {
    pub fn len(&self) -> usize {
        self.char_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.char_ids.is_empty()
    }
}

/// Encodes segmentation records with a frozen character vocabulary and a fixed tag scheme.
#[derive(Debug, Clone, Copy)]
pub struct SegmentationEncoder<'a> {
    vocab: &'a CharVocab,
    scheme: TagScheme,
}

impl<'a> SegmentationEncoder<'a> {
    pub fn new(vocab: &'a CharVocab, scheme: TagScheme) -> Self {
        Self { vocab, scheme }
    }

    /// Unknown characters map to the unknown id; unknown labels are an error.
    pub fn encode(&self, record: &SegmentationRecord) -> Result<EncodedWord> {
        let char_ids = self.vocab.encode(&record.word);
        let tags = record
            .labels
            .iter()
            .map(|l| self.scheme.parse(l))
            .collect::<Result<Vec<_>>>()?;
        Ok(EncodedWord { char_ids, tags })
    }
}

/// A semantic example as dense features.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAffixes {
    /// Count of each affix vocabulary entry among prefixes and suffixes.
    pub affix_counts: Vec<f32>,
    /// Multi-hot tag targets.
    pub tag_vector: Vec<f32>,
    pub complexity: f32,
    pub confidence: f32,
}

/// Encodes semantic records with frozen affix and tag vocabularies.
///
/// Affixes and tags absent from the vocabularies are dropped without error.
#[derive(Debug, Clone, Copy)]
pub struct AffixEncoder<'a> {
    affixes: &'a Vocab,
    tags: &'a Vocab,
}

impl<'a> AffixEncoder<'a> {
    pub fn new(affixes: &'a Vocab, tags: &'a Vocab) -> Self {
        Self { affixes, tags }
    }

    pub fn encode(&self, record: &SemanticRecord) -> EncodedAffixes {
        EncodedAffixes {
            affix_counts: affix_counts(self.affixes, record.affixes()),
            tag_vector: multi_hot(self.tags, record.tags.iter().map(String::as_str)),
            complexity: record.complexity,
            confidence: record.confidence,
        }
    }
}

/// Count vector of length `vocab.len()`.
pub fn affix_counts<'s, I>(vocab: &Vocab, affixes: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'s str>,
{
    let mut counts = vec![0.0f32; vocab.len()];
    for id in affixes.into_iter().filter_map(|a| vocab.get(a)) {
        counts[id] += 1.0;
    }
    counts
}

/// 0/1 vector of length `vocab.len()`.
pub fn multi_hot<'s, I>(vocab: &Vocab, items: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'s str>,
{
    let mut hot = vec![0.0f32; vocab.len()];
    for id in items.into_iter().filter_map(|t| vocab.get(t)) {
        hot[id] = 1.0;
    }
    hot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordStore;

    fn walked() -> SegmentationRecord {
        SegmentationRecord {
            word: "walked".into(),
            labels: ["B-ROOT", "I-ROOT", "I-ROOT", "I-ROOT", "B-SUFFIX", "I-SUFFIX"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            spans: Vec::new(),
            morphemes: vec!["walk".into(), "ed".into()],
        }
    }

    #[test]
    fn test_encode_walked() {
        let record = walked();
        let vocab = CharVocab::build([record.word.as_str()]);
        let encoded = SegmentationEncoder::new(&vocab, TagScheme::Full)
            .encode(&record)
            .unwrap();
        assert_eq!(encoded.char_ids.len(), 6);
        assert_eq!(encoded.tags.len(), 6);
        assert_eq!(encoded.tags[0], BioTag::BeginRoot);
        assert_eq!(encoded.tags[4], BioTag::BeginSuffix);
        assert!(encoded.char_ids.iter().all(|&id| id >= 2));
    }

    #[test]
    fn test_encode_lengths_match_word() {
        let input = concat!(
            r#"{"word":"unkind","labels":["B-PREFIX","I-PREFIX","B-ROOT","I-ROOT","I-ROOT","I-ROOT"]}"#,
            "\n",
            r#"{"word":"naïve","labels":["B-ROOT","I-ROOT","I-ROOT","I-ROOT","I-ROOT"]}"#,
        );
        let store = RecordStore::<SegmentationRecord>::from_reader(input.as_bytes()).unwrap();
        let vocab = CharVocab::build(store.iter().map(|r| r.word.as_str()));
        let encoder = SegmentationEncoder::new(&vocab, TagScheme::Full);
        for record in &store {
            let encoded = encoder.encode(record).unwrap();
            let n = record.word.chars().count();
            assert_eq!(encoded.char_ids.len(), n);
            assert_eq!(encoded.tags.len(), n);
        }
    }

    #[test]
    fn test_encode_unknown_char_uses_unk() {
        let vocab = CharVocab::build(["walk"]);
        let encoded = SegmentationEncoder::new(&vocab, TagScheme::Full)
            .encode(&walked())
            .unwrap();
        assert_eq!(encoded.char_ids[4], crate::vocab::UNK_ID);
    }

    #[test]
    fn test_encode_wrong_scheme_is_fatal() {
        let vocab = CharVocab::build(["walked"]);
        let err = SegmentationEncoder::new(&vocab, TagScheme::Abbreviated).encode(&walked());
        assert!(err.is_err());
    }

    #[test]
    fn test_oov_affix_ignored() {
        let affixes = Vocab::build(["-ness", "un-"]);
        let tags = Vocab::build(["NEGATION"]);
        let record = SemanticRecord {
            prefixes: vec!["un-".into()],
            suffixes: vec!["-ify".into()],
            tags: vec!["NEGATION".into(), "UNSEEN".into()],
            complexity: 2.0,
            confidence: 0.9,
        };
        let encoded = AffixEncoder::new(&affixes, &tags).encode(&record);
        assert_eq!(encoded.affix_counts, vec![0.0, 1.0]);
        assert_eq!(encoded.tag_vector, vec![1.0]);
        assert_eq!(encoded.complexity, 2.0);
    }

    #[test]
    fn test_prefixes_and_suffixes_share_counts() {
        let affixes = Vocab::build(["a"]);
        let tags = Vocab::default();
        let record = SemanticRecord {
            prefixes: vec!["a".into()],
            suffixes: vec!["a".into()],
            tags: Vec::new(),
            complexity: 0.0,
            confidence: 1.0,
        };
        let encoded = AffixEncoder::new(&affixes, &tags).encode(&record);
        assert_eq!(encoded.affix_counts, vec![2.0]);
        assert!(encoded.tag_vector.is_empty());
    }

    #[test]
    fn test_multi_hot_tags() {
        let tags = Vocab::from(vec!["CAUSATIVE".to_string(), "BENEFACTIVE".to_string()]);
        assert_eq!(multi_hot(&tags, ["CAUSATIVE"]), vec![1.0, 0.0]);
        assert_eq!(multi_hot(&tags, ["BENEFACTIVE", "CAUSATIVE"]), vec![1.0, 1.0]);
    }
}
