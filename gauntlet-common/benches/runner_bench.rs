//! Criterion microbenchmarks for the concurrency runner.
//!
//! Benchmarks cover:
//!   - Runner overhead on no-op operations at several concurrency limits
//!   - Outcome-set assembly for large batches
//!   - Invariant classification over a pre-built outcome set

use std::convert::Infallible;
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use gauntlet_common::{
    ContentionPolicy, HttpOutcome, Outcome, check_contention, run_repeat,
};

fn bench_runner_overhead(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");

    for limit in [1usize, 8, 64] {
        c.bench_function(&format!("run_repeat_100_noop_limit_{limit}"), |b| {
            b.to_async(&rt).iter(|| async move {
                let outcomes =
                    run_repeat(100, limit, |i| async move { Ok::<usize, Infallible>(i) }).await;
                black_box(outcomes)
            })
        });
    }
}

fn bench_contention_check(c: &mut Criterion) {
    let outcomes: Vec<Outcome<HttpOutcome>> = (0..500)
        .map(|i| {
            Outcome::Completed(HttpOutcome {
                status: if i == 250 { 201 } else { 409 },
                headers: Vec::new(),
                body: r#"{"detail":"item name already exists"}"#.to_string(),
            })
        })
        .collect();
    let policy = ContentionPolicy::ExactlyOneWinner { losers: vec![409] };

    c.bench_function("check_contention_500_outcomes", |b| {
        b.iter(|| black_box(check_contention(&outcomes, &policy, "bench")))
    });
}

criterion_group!(benches, bench_runner_overhead, bench_contention_check);
criterion_main!(benches);
