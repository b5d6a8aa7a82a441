use criterion::{black_box, criterion_group, criterion_main, Criterion};
use llex_core::{collate, CharVocab, SegmentationEncoder, SegmentationRecord, TagScheme};

fn record(word: &str, labels: &[&str]) -> SegmentationRecord {
    SegmentationRecord {
        word: word.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        spans: Vec::new(),
        morphemes: Vec::new(),
    }
}

fn bench_collate(c: &mut Criterion) {
    let records = vec![
        record("walked", &["B-ROOT", "I-ROOT", "I-ROOT", "I-ROOT", "B-SUFFIX", "I-SUFFIX"]),
        record("unkind", &["B-PREFIX", "I-PREFIX", "B-ROOT", "I-ROOT", "I-ROOT", "I-ROOT"]),
        record("cats", &["B-ROOT", "I-ROOT", "I-ROOT", "B-SUFFIX"]),
        record(
            "rethinking",
            &[
                "B-PREFIX", "I-PREFIX", "B-ROOT", "I-ROOT", "I-ROOT", "I-ROOT", "I-ROOT",
                "B-SUFFIX", "I-SUFFIX", "I-SUFFIX",
            ],
        ),
    ];
    let vocab = CharVocab::build(records.iter().map(|r| r.word.as_str()));
    let encoder = SegmentationEncoder::new(&vocab, TagScheme::Full);
    let encoded: Vec<_> = records
        .iter()
        .cycle()
        .take(32)
        .map(|r| encoder.encode(r).unwrap())
        .collect();

    c.bench_function("encode_single", |b| {
        b.iter(|| encoder.encode(black_box(&records[3])).unwrap());
    });

    c.bench_function("collate_batch_32", |b| {
        b.iter(|| collate(black_box(&encoded)).unwrap());
    });
}

criterion_group!(benches, bench_collate);
criterion_main!(benches);
