use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use shield_kit::prelude::*;

fn orchestrator(level: SecurityLevel) -> SecurityOrchestrator {
    let policy = SecurityPolicy {
        asymmetric_key_bits: 2048,
        ..SecurityPolicy::default()
    };
    SecurityOrchestrator::open(Arc::new(MemoryKeyStore::new()), policy, level).unwrap()
}

fn bench_protect(c: &mut Criterion) {
    let payload = vec![0xC3u8; 16 * 1024];

    for level in [SecurityLevel::Standard, SecurityLevel::Maximum] {
        let orchestrator = orchestrator(level);
        // Warm the label key so the benchmark measures the steady state.
        orchestrator.protect(&payload, "bench").unwrap();

        c.bench_function(&format!("protect/{level}"), |b| {
            b.iter(|| orchestrator.protect(black_box(&payload), "bench").unwrap())
        });

        let envelope = orchestrator.protect(&payload, "bench").unwrap();
        c.bench_function(&format!("unprotect/{level}"), |b| {
            b.iter(|| orchestrator.unprotect(black_box(&envelope)).unwrap())
        });
    }
}

criterion_group!(benches, bench_protect);
criterion_main!(benches);
