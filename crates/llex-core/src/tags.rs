//! # BIO Tags for Morpheme Segmentation
//!
//! Defines the closed 7-tag set used to label each character of a word as the
//! beginning or inside of a prefix, root or suffix, or outside any morpheme.
//!
//! The label *strings* depend on a [`TagScheme`]. A scheme is picked once per
//! training run, stored alongside the trained parameters and passed by value to
//! everything that parses or renders labels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LlexError, Result};

/// Loss/metric sentinel used by the integer view of [`LabelSlot::Ignore`].
pub const IGNORE_INDEX: i64 = -100;

/// BIO tags for labeling characters of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BioTag {
    Outside,
    BeginPrefix,
    InsidePrefix,
    BeginRoot,
    InsideRoot,
    BeginSuffix,
    InsideSuffix,
}

impl BioTag {
    /// Total number of distinct tags.
    pub const NUM_TAGS: usize = 7;

    /// Get all possible tags in index order.
    pub fn all_tags() -> &'static [BioTag] {
        &[
            BioTag::Outside,
            BioTag::BeginPrefix,
            BioTag::InsidePrefix,
            BioTag::BeginRoot,
            BioTag::InsideRoot,
            BioTag::BeginSuffix,
            BioTag::InsideSuffix,
        ]
    }

    /// Get the tag index for tensor operations.
    pub fn index(&self) -> usize {
        match self {
            BioTag::Outside => 0,
            BioTag::BeginPrefix => 1,
            BioTag::InsidePrefix => 2,
            BioTag::BeginRoot => 3,
            BioTag::InsideRoot => 4,
            BioTag::BeginSuffix => 5,
            BioTag::InsideSuffix => 6,
        }
    }

    /// Get tag from index.
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::all_tags().get(idx).copied()
    }

    /// Check if this is a "Begin" tag.
    pub fn is_begin(&self) -> bool {
        matches!(
            self,
            BioTag::BeginPrefix | BioTag::BeginRoot | BioTag::BeginSuffix
        )
    }

    /// Check if this is an "Inside" tag.
    pub fn is_inside(&self) -> bool {
        matches!(
            self,
            BioTag::InsidePrefix | BioTag::InsideRoot | BioTag::InsideSuffix
        )
    }

    /// Get the morpheme kind this tag belongs to.
    pub fn morpheme_kind(&self) -> Option<MorphemeKind> {
        match self {
            BioTag::BeginPrefix | BioTag::InsidePrefix => Some(MorphemeKind::Prefix),
            BioTag::BeginRoot | BioTag::InsideRoot => Some(MorphemeKind::Root),
            BioTag::BeginSuffix | BioTag::InsideSuffix => Some(MorphemeKind::Suffix),
            BioTag::Outside => None,
        }
    }
}

/// Morpheme categories a span can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MorphemeKind {
    Prefix,
    Root,
    Suffix,
}

impl fmt::Display for MorphemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MorphemeKind::Prefix => write!(f, "prefix"),
            MorphemeKind::Root => write!(f, "root"),
            MorphemeKind::Suffix => write!(f, "suffix"),
        }
    }
}

/// The label spelling used by a dataset and every artifact trained on it.
///
/// Both schemes map onto the same 7-way [`BioTag`] space, but they are never
/// mixed: parsing `B-PRE` under [`TagScheme::Full`] is an unknown label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagScheme {
    /// `O, B-PREFIX, I-PREFIX, B-ROOT, I-ROOT, B-SUFFIX, I-SUFFIX`
    #[default]
    Full,
    /// `O, B-PRE, I-PRE, B-ROOT, I-ROOT, B-SUF, I-SUF`
    Abbreviated,
}

impl TagScheme {
    /// Label strings in [`BioTag::index`] order.
    pub fn labels(&self) -> &'static [&'static str; BioTag::NUM_TAGS] {
        match self {
            TagScheme::Full => &[
                "O", "B-PREFIX", "I-PREFIX", "B-ROOT", "I-ROOT", "B-SUFFIX", "I-SUFFIX",
            ],
            TagScheme::Abbreviated => &[
                "O", "B-PRE", "I-PRE", "B-ROOT", "I-ROOT", "B-SUF", "I-SUF",
            ],
        }
    }

    /// Short identifier stored in checkpoint metadata.
    pub fn name(&self) -> &'static str {
        match self {
            TagScheme::Full => "full",
            TagScheme::Abbreviated => "abbreviated",
        }
    }

    /// Look up a label string. Unknown labels are fatal.
    pub fn parse(&self, label: &str) -> Result<BioTag> {
        self.labels()
            .iter()
            .position(|l| *l == label)
            .and_then(BioTag::from_index)
            .ok_or_else(|| LlexError::UnknownLabel {
                label: label.to_string(),
                scheme: self.name().to_string(),
            })
    }

    /// Render a tag in this scheme's spelling.
    pub fn label(&self, tag: BioTag) -> &'static str {
        self.labels()[tag.index()]
    }
}

impl fmt::Display for TagScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TagScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(TagScheme::Full),
            "abbreviated" | "short" => Ok(TagScheme::Abbreviated),
            other => Err(format!("unknown tag scheme: {other}")),
        }
    }
}

/// Supervision target for one character position.
///
/// `Ignore` marks padding added during collation. It is a distinct value, not a
/// reserved tag id, so it cannot collide with a real tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelSlot {
    Tag(BioTag),
    Ignore,
}

impl LabelSlot {
    /// Integer view: the tag index, or [`IGNORE_INDEX`] for padding.
    pub fn id(&self) -> i64 {
        match self {
            LabelSlot::Tag(tag) => tag.index() as i64,
            LabelSlot::Ignore => IGNORE_INDEX,
        }
    }

    pub fn tag(&self) -> Option<BioTag> {
        match self {
            LabelSlot::Tag(tag) => Some(*tag),
            LabelSlot::Ignore => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, LabelSlot::Ignore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_index_roundtrip() {
        for tag in BioTag::all_tags() {
            let idx = tag.index();
            let recovered = BioTag::from_index(idx).unwrap();
            assert_eq!(*tag, recovered);
        }
        assert_eq!(BioTag::from_index(BioTag::NUM_TAGS), None);
    }

    #[test]
    fn test_schemes_share_tag_space() {
        for tag in BioTag::all_tags() {
            let full = TagScheme::Full.label(*tag);
            let short = TagScheme::Abbreviated.label(*tag);
            assert_eq!(TagScheme::Full.parse(full).unwrap(), *tag);
            assert_eq!(TagScheme::Abbreviated.parse(short).unwrap(), *tag);
        }
    }

    #[test]
    fn test_schemes_are_not_mixed() {
        assert!(TagScheme::Full.parse("B-PRE").is_err());
        assert!(TagScheme::Abbreviated.parse("I-SUFFIX").is_err());
        // ROOT is spelled the same in both
        assert_eq!(TagScheme::Abbreviated.parse("B-ROOT").unwrap(), BioTag::BeginRoot);
    }

    #[test]
    fn test_unknown_label_is_error() {
        let err = TagScheme::Full.parse("B-ROO").unwrap_err();
        assert!(matches!(err, LlexError::UnknownLabel { .. }));
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("full".parse::<TagScheme>().unwrap(), TagScheme::Full);
        assert_eq!("short".parse::<TagScheme>().unwrap(), TagScheme::Abbreviated);
        assert!("bio".parse::<TagScheme>().is_err());
    }

    #[test]
    fn test_label_slot_ids() {
        assert_eq!(LabelSlot::Tag(BioTag::Outside).id(), 0);
        assert_eq!(LabelSlot::Tag(BioTag::InsideSuffix).id(), 6);
        assert_eq!(LabelSlot::Ignore.id(), IGNORE_INDEX);
        assert!(LabelSlot::Ignore.is_ignored());
        assert_eq!(LabelSlot::Ignore.tag(), None);
    }

    #[test]
    fn test_morpheme_kind() {
        assert_eq!(BioTag::BeginRoot.morpheme_kind(), Some(MorphemeKind::Root));
        assert_eq!(BioTag::InsideSuffix.morpheme_kind(), Some(MorphemeKind::Suffix));
        assert_eq!(BioTag::Outside.morpheme_kind(), None);
        assert!(BioTag::BeginPrefix.is_begin());
        assert!(!BioTag::InsidePrefix.is_begin());
        assert!(BioTag::InsidePrefix.is_inside());
    }
}
