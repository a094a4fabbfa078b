//! Benchmarks for patternlog
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use patternlog::classifier::known_details;
use patternlog::{
    classify, CascadeGraph, DetailAxis, DiscoveryAggregator, EngineConfig, ExtractedPattern,
    JournalObservation, PatternEngine, PatternId, PatternType, SqliteStore,
};
use tempfile::tempdir;

const DAY: i64 = 24 * 3600 * 1000;
const START: i64 = 1_705_312_800_000;

fn create_test_patterns(count: usize) -> Vec<ExtractedPattern> {
    let types = PatternType::all();
    (0..count)
        .map(|i| {
            ExtractedPattern::with_timestamp(types[i % 7], START + (i as i64 % 30) * DAY)
                .trigger(format!("trigger-{}", i % 3))
                .coping("rest")
                .intensity_level((i % 5) as i64 + 1)
                .source_entry(format!("entry-{}", i))
        })
        .collect()
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    let all: Vec<&str> = [
        DetailAxis::Environment,
        DetailAxis::Event,
        DetailAxis::Health,
        DetailAxis::Social,
        DetailAxis::Demand,
    ]
    .into_iter()
    .flat_map(known_details)
    .collect();

    group.bench_function("two_details", |b| {
        b.iter(|| classify(black_box(["Too many things to do", "Task I keep avoiding"])))
    });

    group.throughput(Throughput::Elements(all.len() as u64));
    group.bench_function("all_details", |b| b.iter(|| classify(black_box(&all))));

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let aggregator = DiscoveryAggregator::default();

    for size in [100, 1000, 10000] {
        let patterns = create_test_patterns(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("aggregate_{}", size), |b| {
            b.iter(|| aggregator.aggregate(black_box(&patterns), None))
        });
    }

    group.finish();
}

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph");

    group.bench_function("propose_chain_1000", |b| {
        let ids: Vec<PatternId> = (0..1001).map(|_| PatternId::new()).collect();
        b.iter(|| {
            let mut graph = CascadeGraph::default();
            for pair in ids.windows(2) {
                graph.propose(pair[0], pair[1], 0.5, START).unwrap();
            }
            graph
        })
    });

    group.bench_function("downstream_chain_1000", |b| {
        let ids: Vec<PatternId> = (0..1001).map(|_| PatternId::new()).collect();
        let mut graph = CascadeGraph::default();
        for pair in ids.windows(2) {
            graph.propose(pair[0], pair[1], 0.5, START).unwrap();
        }
        b.iter(|| graph.downstream(black_box(ids[0]), 1000))
    });

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("engine");

    group.bench_function("record_entry", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let dir = tempdir().unwrap();
                let store = SqliteStore::open(&dir.path().join("bench.db")).unwrap();
                let engine = PatternEngine::open(store, EngineConfig::default())
                    .await
                    .unwrap();

                let start = std::time::Instant::now();

                for i in 0..iters {
                    let entry = JournalObservation::new(format!("entry-{}", i), START + i as i64 * 60_000)
                        .details(["Noise level", "Poor sleep"])
                        .trigger("open office");
                    engine.record_entry(entry).await.unwrap();
                }

                start.elapsed()
            })
        });
    });

    group.bench_function("discoveries_month", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let dir = tempdir().unwrap();
                let store = SqliteStore::open(&dir.path().join("bench.db")).unwrap();
                let engine = PatternEngine::open(store, EngineConfig::default())
                    .await
                    .unwrap();

                // Setup: a month of 3 entries a day
                for i in 0..90 {
                    let entry = JournalObservation::new(format!("entry-{}", i), START + i * 8 * 3600 * 1000)
                        .detail(["Noise level", "Headache", "Conflict"][(i % 3) as usize])
                        .trigger("work");
                    engine.record_entry(entry).await.unwrap();
                }

                let start = std::time::Instant::now();

                for _ in 0..iters {
                    let _ = engine.discoveries(black_box(None)).await.unwrap();
                }

                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_aggregate, bench_graph, bench_engine);
criterion_main!(benches);
