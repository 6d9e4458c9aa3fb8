//! Issue path benchmarks
//!
//! Measures the per-request cost of the broker's hot path: policy
//! evaluation, key allocation, and a full issue round against the
//! in-memory provider.

use consignr::authz::AllowAllAuthorizer;
use consignr::issuer::{CapabilityIssuer, UploadIntent};
use consignr::keys::{KeyAllocator, Purpose};
use consignr::policy::{self, Constraints};
use consignr::storage::InMemoryObjectStore;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

fn benchmark_key_allocation(c: &mut Criterion) {
    let allocator = KeyAllocator::new();
    let purpose = Purpose::parse("avatar").unwrap();

    c.bench_function("key_allocation", |b| {
        b.iter(|| {
            let key = allocator.allocate(black_box(&purpose));
            black_box(key);
        });
    });
}

fn benchmark_policy_evaluation(c: &mut Criterion) {
    let constraints = Constraints::new(
        10 * 1024 * 1024,
        vec!["image/".to_string(), "application/pdf".to_string()],
    );

    let mut group = c.benchmark_group("policy_evaluation");

    group.bench_function("accept", |b| {
        b.iter(|| {
            let verdict =
                policy::evaluate(black_box("image/png"), black_box(2_048), &constraints);
            black_box(verdict)
        });
    });

    group.bench_function("reject_type", |b| {
        b.iter(|| {
            let verdict =
                policy::evaluate(black_box("video/mp4"), black_box(2_048), &constraints);
            black_box(verdict)
        });
    });

    group.finish();
}

fn benchmark_issue_round(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let issuer = CapabilityIssuer::new(
        Arc::new(InMemoryObjectStore::new()),
        Arc::new(AllowAllAuthorizer),
        Constraints::new(10 * 1024 * 1024, vec!["image/".to_string()]),
        Duration::from_secs(300),
    );
    let intent = UploadIntent::new("image/png", 2_048)
        .with_purpose(Purpose::parse("avatar").unwrap());

    c.bench_function("issue_round", |b| {
        b.to_async(&rt).iter(|| async {
            let capability = issuer.issue("bench-subject", black_box(&intent)).await;
            black_box(capability)
        });
    });
}

criterion_group!(
    benches,
    benchmark_key_allocation,
    benchmark_policy_evaluation,
    benchmark_issue_round
);
criterion_main!(benches);
