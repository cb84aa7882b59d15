//! Throughput benchmarks for queue operations

use channel_matchmaker::config::{QueueConfig, SessionLifecycleConfig};
use channel_matchmaker::metrics::MetricsCollector;
use channel_matchmaker::platform::InMemoryPlatform;
use channel_matchmaker::queue::{MembershipIndex, QueueManager};
use channel_matchmaker::storage::InMemorySnapshotStore;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn create_bench_system(capacity: usize) -> QueueManager {
    QueueManager::new(
        QueueConfig::without_cooldowns(capacity),
        SessionLifecycleConfig::default(),
        Arc::new(InMemoryPlatform::new()),
        Arc::new(InMemorySnapshotStore::new()),
        Arc::new(MetricsCollector::new().unwrap()),
    )
    .unwrap()
}

fn bench_enroll_withdraw(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("enroll_withdraw_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let manager = create_bench_system(1000);
                for participant in 0..100u64 {
                    manager.enroll(1, participant).await.unwrap();
                }
                for participant in 0..100u64 {
                    black_box(manager.withdraw(1, participant).await.unwrap());
                }
            })
        })
    });
}

fn bench_match_formation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("form_25_matches", |b| {
        b.iter(|| {
            rt.block_on(async {
                let manager = create_bench_system(4);
                for participant in 0..100u64 {
                    black_box(manager.enroll(1, participant).await.unwrap());
                }
                manager.shutdown().unwrap();
            })
        })
    });
}

fn bench_concurrent_channels(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("concurrent_enroll_8_channels", |b| {
        b.iter(|| {
            rt.block_on(async {
                let manager = create_bench_system(1000);
                let tasks: Vec<_> = (0..8u64)
                    .map(|channel| {
                        let manager = manager.clone();
                        tokio::spawn(async move {
                            for i in 0..50u64 {
                                let _ = manager.enroll(channel, channel * 1000 + i).await;
                            }
                        })
                    })
                    .collect();
                for task in tasks {
                    task.await.unwrap();
                }
                black_box(manager.stats().unwrap())
            })
        })
    });
}

fn bench_membership_claims(c: &mut Criterion) {
    c.bench_function("membership_claim_release_1000", |b| {
        b.iter(|| {
            let index = MembershipIndex::new();
            for participant in 0..1000u64 {
                index.claim(participant, participant % 16).unwrap();
            }
            for participant in 0..1000u64 {
                index.release(participant).unwrap();
            }
            black_box(index.len())
        })
    });
}

criterion_group!(
    benches,
    bench_enroll_withdraw,
    bench_match_formation,
    bench_concurrent_channels,
    bench_membership_claims
);
criterion_main!(benches);
