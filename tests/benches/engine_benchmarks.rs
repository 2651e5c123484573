//! # Keepsake Engine Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | ks-04 Scheduler | one tick over N due date messages | < 5ms per message |
//! | ks-01 Ledger | quorum over N verifiers with re-issued rounds | < 100us |

use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ks_01_verification_ledger::domain::{
    compute_quorum, QuorumPolicy, RequestStatus, VerificationRequest, VerificationSubject,
};
use ks_03_delivery::Trigger;
use ks_tests::integration::harness::{t0, Engine};
use shared_types::{ContactId, MessageId, OwnerId, Recipient};

// ============================================================================
// KS-04: Scheduler tick
// ============================================================================

async fn seeded(messages: usize) -> Engine {
    let engine = Engine::new();
    let owner = OwnerId::new("bench-owner");
    for i in 0..messages {
        engine
            .letter_to(
                &owner,
                Recipient::new(format!("r{i}"), format!("r{i}@example.com")),
                Trigger::Date { deliver_at: t0() },
            )
            .await;
    }
    engine
}

fn bench_scheduler_tick(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("ks-04-scheduler");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for messages in [10usize, 100, 500] {
        group.throughput(Throughput::Elements(messages as u64));
        group.bench_with_input(
            BenchmarkId::new("tick_due_messages", messages),
            &messages,
            |b, &messages| {
                b.iter_custom(|iters| {
                    let mut total = Duration::ZERO;
                    for _ in 0..iters {
                        let engine = rt.block_on(seeded(messages));
                        let start = Instant::now();
                        let report = rt.block_on(engine.tick_at(t0()));
                        total += start.elapsed();
                        assert_eq!(report.delivered, messages);
                    }
                    total
                })
            },
        );
    }
    group.finish();
}

// ============================================================================
// KS-01: Quorum computation
// ============================================================================

fn requests(verifiers: usize) -> Vec<VerificationRequest> {
    let subject = VerificationSubject::Message(MessageId::new());
    let issued = t0();
    let mut all = Vec::with_capacity(verifiers * 2);
    for i in 0..verifiers {
        let verifier = ContactId::new();
        // Round one expired for everyone; round two answered by most.
        let mut first = VerificationRequest::new(
            subject.clone(),
            verifier,
            1,
            issued,
            issued + ChronoDuration::days(7),
        );
        first.status = RequestStatus::Expired;
        let mut second = VerificationRequest::new(
            subject.clone(),
            verifier,
            2,
            issued + ChronoDuration::days(7),
            issued + ChronoDuration::days(14),
        );
        second.status = match i % 3 {
            0 | 1 => RequestStatus::Confirmed,
            _ => RequestStatus::Pending,
        };
        all.push(first);
        all.push(second);
    }
    all
}

fn bench_quorum(c: &mut Criterion) {
    let mut group = c.benchmark_group("ks-01-verification-ledger");
    let policy = QuorumPolicy::new(3);
    let as_of = t0() + ChronoDuration::days(8);

    for verifiers in [3usize, 10, 50] {
        let reqs = requests(verifiers);
        group.throughput(Throughput::Elements(reqs.len() as u64));
        group.bench_with_input(BenchmarkId::new("compute_quorum", verifiers), &reqs, |b, reqs| {
            b.iter(|| compute_quorum(black_box(reqs), &policy, false, as_of))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scheduler_tick, bench_quorum);
criterion_main!(benches);
