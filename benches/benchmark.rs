//! Benchmarks for the keystroke path.
//!
//! Run with: cargo bench

use checkout_fields::cursor::{restore, CursorUpdate};
use checkout_fields::detect::detect_brand;
use checkout_fields::edit::{apply, EditPolicy, TextEdit};
use checkout_fields::expiry::ExpiryDraft;
use checkout_fields::format::{format_card_number, format_with_gaps};
use checkout_fields::surcharge::extract_network_surcharges;
use checkout_fields::MAX_CARD_DIGITS;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const VISA_16: &str = "4111111111111111";
const AMEX: &str = "378282246310005";
const VISA_19: &str = "4111111111111111110";

fn space(c: char) -> bool {
    c == ' '
}

/// Random keystrokes against a card field: mostly typing, some deletes and pastes.
fn keystrokes(count: usize, seed: u64) -> Vec<TextEdit> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let at = rng.gen_range(0..=23);
            match rng.gen_range(0..10) {
                0..=6 => TextEdit::insert(at, rng.gen_range(0..10u8).to_string()),
                7 | 8 => TextEdit::backspace(at),
                _ => {
                    let end = (at + rng.gen_range(0..6)).min(23);
                    TextEdit::replace(at..end, "4242")
                }
            }
        })
        .collect()
}

/// Benchmark formatting by detected network
fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("format");

    group.bench_function("visa_16", |b| {
        b.iter(|| format_card_number(black_box(VISA_16)))
    });

    group.bench_function("amex_15", |b| b.iter(|| format_card_number(black_box(AMEX))));

    group.bench_function("gaps_19", |b| {
        b.iter(|| format_with_gaps(black_box(VISA_19), black_box(&[4, 8, 12, 16]), ' '))
    });

    group.finish();
}

/// Benchmark network detection by prefix length
fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");

    for len in [1usize, 4, 6, 16] {
        let prefix = &VISA_16[..len];
        group.bench_with_input(BenchmarkId::new("prefix", len), prefix, |b, prefix| {
            b.iter(|| detect_brand(black_box(prefix)))
        });
    }

    group.finish();
}

/// Benchmark edit resolution alone
fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    let policy = EditPolicy::digits(MAX_CARD_DIGITS, space);
    let formatted = format_card_number(VISA_16);

    group.bench_function("insert_middle", |b| {
        let edit = TextEdit::insert(7, "5");
        b.iter(|| apply(black_box(VISA_16), black_box(&edit), &formatted, &policy))
    });

    group.bench_function("backspace_separator", |b| {
        let edit = TextEdit::backspace(5);
        b.iter(|| apply(black_box(VISA_16), black_box(&edit), &formatted, &policy))
    });

    group.bench_function("expiry_draft", |b| {
        let draft = ExpiryDraft::from_text("42/25");
        let edit = TextEdit::backspace(3);
        b.iter(|| black_box(&draft).apply_edit(black_box(&edit)))
    });

    group.finish();
}

/// Benchmark the full keystroke path: resolve, detect, format, caret
fn bench_keystroke_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("keystroke_path");
    let policy = EditPolicy::digits(MAX_CARD_DIGITS, space);

    for count in [16usize, 256] {
        let edits = keystrokes(count, 42);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("random", count), &edits, |b, edits| {
            b.iter(|| {
                let mut raw = String::new();
                let mut formatted = String::new();
                let mut caret = 0;
                for edit in edits {
                    let old_len = raw.len();
                    raw = apply(&raw, edit, &formatted, &policy);
                    formatted = format_card_number(&raw);
                    caret = restore(
                        CursorUpdate::Insert {
                            raw_offset: 0,
                            inserted: raw.len().saturating_sub(old_len),
                        },
                        &formatted,
                        space,
                    );
                }
                black_box((raw, caret))
            })
        });
    }

    group.finish();
}

/// Benchmark surcharge extraction from both payload shapes
fn bench_surcharges(c: &mut Criterion) {
    let mut group = c.benchmark_group("surcharges");
    let list = serde_json::json!([
        {"type": "VISA", "surcharge": {"amount": 100}},
        {"type": "MASTERCARD", "surcharge": 75},
        {"type": "AMEX", "surcharge": 0},
        {"type": "JCB"}
    ]);
    let map = serde_json::json!({
        "VISA": {"surcharge": {"amount": 100}},
        "MASTERCARD": {"surcharge": 75},
        "AMEX": {"surcharge": 0}
    });

    group.bench_function("list", |b| b.iter(|| extract_network_surcharges(black_box(&list))));
    group.bench_function("map", |b| b.iter(|| extract_network_surcharges(black_box(&map))));

    group.finish();
}

criterion_group!(
    benches,
    bench_format,
    bench_detect,
    bench_apply,
    bench_keystroke_path,
    bench_surcharges,
);

criterion_main!(benches);
