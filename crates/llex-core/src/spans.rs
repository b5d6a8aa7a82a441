//! Assembles morpheme spans from a predicted BIO tag sequence.

use serde::Serialize;

use crate::tags::{BioTag, MorphemeKind};

/// A decoded morpheme of a word, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Morpheme {
    pub start: usize,
    pub end: usize,
    pub kind: MorphemeKind,
    pub text: String,
}

/// Group per-character tags of `word` into morphemes.
///
/// `B-X` opens a span, following `I-X` extend it. An `I-X` that does not
/// continue a span of kind X opens a new one. `O` characters belong to no span.
pub fn assemble_morphemes(word: &str, tags: &[BioTag]) -> Vec<Morpheme> {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len().min(tags.len());
    let mut morphemes = Vec::new();
    let mut i = 0;

    while i < n {
        let Some(kind) = tags[i].morpheme_kind() else {
            i += 1;
            continue;
        };
        let start = i;
        i += 1;
        while i < n && tags[i].is_inside() && tags[i].morpheme_kind() == Some(kind) {
            i += 1;
        }
        morphemes.push(Morpheme {
            start,
            end: i,
            kind,
            text: chars[start..i].iter().collect(),
        });
    }

    morphemes
}
