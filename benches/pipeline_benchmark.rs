//! Ingestion Benchmarks
//!
//! Measures the CPU-bound stages of a run.
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use lumens_ingest::dedup::DedupStore;
use lumens_ingest::enrich::parse_iso8601_duration;
use lumens_ingest::output::summarize;
use lumens_ingest::reference::classify;
use lumens_ingest::schemas::{VideoRecord, VideoStats};
use lumens_ingest::storage::merge_documents;

fn sample_record(i: usize) -> VideoRecord {
    let mut record = VideoRecord::new(format!("vid{:08}", i));
    record.title = "Counting with colors | Learn numbers for kids".to_string();
    record.description = "Sing along and learn to count from one to ten.\nSubscribe for more!".to_string();
    record.channel_id = Some("UCabcdefghijklmnopqrstuv".to_string());
    record.channel_title = Some("Kids Channel".to_string());
    record.duration_seconds = Some(245);
    record.stats = Some(VideoStats {
        views: Some(1_204_332),
        likes: Some(10_020),
        comments: None,
    });
    record.language = Some("en".to_string());
    record.is_english = true;
    record
}

/// Benchmark reference classification across reference shapes
fn bench_classify(c: &mut Criterion) {
    let references = [
        "@One4kids-Zaky",
        "https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv",
        "https://www.youtube.com/@SomeHandle/videos",
        "https://www.youtube.com/user/legacyname",
        "https://www.youtube.com/playlist?list=PL1234567890",
        "https://youtu.be/dQw4w9WgXcQ",
        "Noor Kids Arabic",
    ];

    let mut group = c.benchmark_group("reference_classification");
    group.throughput(Throughput::Elements(references.len() as u64));
    group.bench_function("classify", |b| {
        b.iter(|| {
            for reference in &references {
                black_box(classify(black_box(reference)));
            }
        })
    });
    group.finish();
}

/// Benchmark duration parsing
fn bench_duration(c: &mut Criterion) {
    let durations = ["PT15S", "PT4M5S", "PT1H2M3S", "P1DT2H", "PT", "PT5X"];

    let mut group = c.benchmark_group("duration_parsing");
    group.throughput(Throughput::Elements(durations.len() as u64));
    group.bench_function("parse_iso8601_duration", |b| {
        b.iter(|| {
            for duration in &durations {
                black_box(parse_iso8601_duration(black_box(duration)));
            }
        })
    });
    group.finish();
}

/// Benchmark record serialization and the text summary
fn bench_record_output(c: &mut Criterion) {
    let records: Vec<VideoRecord> = (0..100).map(sample_record).collect();

    let mut group = c.benchmark_group("record_output");
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("ndjson_line", |b| {
        b.iter(|| {
            for record in &records {
                black_box(serde_json::to_string(black_box(record)).unwrap());
            }
        })
    });

    group.bench_function("summarize", |b| {
        b.iter(|| {
            for record in &records {
                black_box(summarize(black_box(record)));
            }
        })
    });

    group.finish();
}

/// Benchmark document merging on upsert
fn bench_merge(c: &mut Criterion) {
    let existing = json!({
        "id": "yt:vid1",
        "title": "Old title",
        "stats": {"views": 10, "likes": 1},
        "curation": {"approved": true, "tags": ["numbers", "songs"]}
    });
    let incoming = serde_json::to_value(sample_record(1)).unwrap();

    c.bench_function("merge_documents", |b| {
        b.iter(|| {
            let mut doc = existing.clone();
            merge_documents(&mut doc, black_box(incoming.clone()));
            black_box(doc)
        })
    });
}

/// Benchmark dedup contention with different task counts
fn bench_dedup_scaling(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let ids: Arc<Vec<String>> = Arc::new((0..1000).map(|i| format!("vid{}", i % 700)).collect());

    let mut group = c.benchmark_group("dedup_scaling");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    for tasks in [1usize, 2, 4, 8] {
        group.throughput(Throughput::Elements(ids.len() as u64));
        group.bench_with_input(format!("tasks_{}", tasks), &tasks, |b, &tasks| {
            b.to_async(&rt).iter(|| {
                let ids = Arc::clone(&ids);
                async move {
                    let store = Arc::new(DedupStore::new());
                    let chunk = ids.len().div_ceil(tasks);
                    let mut handles = Vec::with_capacity(tasks);

                    for t in 0..tasks {
                        let store = Arc::clone(&store);
                        let ids = Arc::clone(&ids);
                        handles.push(tokio::spawn(async move {
                            let end = ((t + 1) * chunk).min(ids.len());
                            let mut fresh = 0usize;
                            for id in &ids[t * chunk..end] {
                                if !store.check_and_mark(id) {
                                    fresh += 1;
                                }
                            }
                            fresh
                        }));
                    }

                    let mut fresh = 0;
                    for handle in handles {
                        fresh += handle.await.unwrap();
                    }
                    black_box(fresh)
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_duration,
    bench_record_output,
    bench_merge,
    bench_dedup_scaling,
);
criterion_main!(benches);
