use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mtjudge_core::config::LanguageConfig;
use mtjudge_core::corpus::builder::{merge, truncate};
use mtjudge_core::corpus::po::{parse_po, write_po};
use mtjudge_core::corpus::tmx::{parse_tmx, write_tmx};
use mtjudge_core::metrics::{Outcome, RunStatistics};
use mtjudge_core::{EvaluationItem, classify_outcome, normalize};
use std::path::Path;

fn sample_items(n: usize) -> Vec<EvaluationItem> {
    (0..n)
        .map(|i| {
            let note = (i % 5 == 0).then(|| format!("error {}", i));
            EvaluationItem::new(
                format!("Open the file number {} & save it", i),
                format!("Obre el fitxer número {} i desa'l", i),
                note,
            )
        })
        .collect()
}

fn bench_verdict_normalizer(c: &mut Criterion) {
    c.bench_function("normalize_plain_yes", |b| {
        b.iter(|| normalize(black_box("YES, the target is French")))
    });

    c.bench_function("normalize_reasoning_span", |b| {
        b.iter(|| {
            normalize(black_box(
                "<think>The source says open, the target says close. That is wrong.</think>YES",
            ))
        })
    });

    let long_answer = format!("<think>{}</think>NO", "step ".repeat(2000));
    c.bench_function("normalize_long_reasoning", |b| {
        b.iter(|| normalize(black_box(&long_answer)))
    });
}

fn bench_corpus_parsers(c: &mut Criterion) {
    let languages = LanguageConfig::default();
    let items = sample_items(1000);
    let tmx = write_tmx(&items, &languages);
    let po = write_po(&items, "bench", "ca");

    c.bench_function("parse_tmx_1000_units", |b| {
        b.iter(|| parse_tmx(black_box(&tmx), Path::new("bench.tmx"), &languages))
    });

    c.bench_function("parse_po_1000_entries", |b| {
        b.iter(|| parse_po(black_box(&po), Path::new("bench.po")))
    });
}

fn bench_dataset_builder(c: &mut Criterion) {
    let errors = sample_items(100);
    let reference = sample_items(5000);

    c.bench_function("truncate_5000_to_500", |b| {
        b.iter(|| truncate(black_box(&reference), 500))
    });

    c.bench_function("merge_with_duplicates", |b| {
        b.iter(|| merge(errors.clone(), vec![truncate(&reference, 500)], 1000))
    });
}

fn bench_scoring(c: &mut Criterion) {
    let ternaries: Vec<_> = ["YES", "NO", "maybe", "no way"]
        .iter()
        .map(|a| normalize(a).ternary)
        .collect();

    c.bench_function("classify_and_count_1000", |b| {
        b.iter(|| {
            let mut stats = RunStatistics::default();
            for i in 0..1000 {
                let outcome: Outcome = classify_outcome(ternaries[i % 4], i % 3 == 0);
                stats.record(outcome);
            }
            stats.metrics()
        })
    });
}

criterion_group!(
    benches,
    bench_verdict_normalizer,
    bench_corpus_parsers,
    bench_dataset_builder,
    bench_scoring,
);
criterion_main!(benches);
