//! Benchmarks for keyword scanning.
//!
//! Measures a full [`scan`] of one message body against keyword sets of
//! growing size, plus notification formatting of a long message.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chanwatch::matching::scan;
use chanwatch::{Message, Origin, PatternSet, format_notification};
use chrono::Utc;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn keywords(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("keyword{i}")).collect()
}

fn body(words: usize) -> String {
    (0..words)
        .map(|i| if i % 17 == 0 { format!("keyword{}", i % 50) } else { "filler".to_string() })
        .collect::<Vec<_>>()
        .join(" ")
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let text = body(400);

    for count in [1, 10, 50, 200] {
        let patterns = PatternSet::compile(keywords(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &patterns, |b, patterns| {
            b.iter(|| scan(Some(black_box(text.as_str())), patterns));
        });
    }

    group.finish();
}

fn bench_format(c: &mut Criterion) {
    let patterns = PatternSet::compile(keywords(50));
    let message = Message::new("@shop", 1, Utc::now(), body(2000));
    let matches = scan(message.text.as_deref(), &patterns);

    c.bench_function("format_notification", |b| {
        b.iter(|| format_notification(black_box(&message), &matches, Origin::Live));
    });
}

criterion_group!(benches, bench_scan, bench_format);
criterion_main!(benches);
