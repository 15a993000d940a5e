//! 短 ID 生成与删除标签签名基准测试

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use url_shortener::store::Signer;
use url_shortener::store::id::generate_id;

fn bench_generate_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("id/generate");

    for length in [4usize, 8] {
        group.bench_function(format!("len_{}", length), |b| {
            b.iter(|| generate_id(black_box(length)));
        });
    }

    group.finish();
}

fn bench_signer(c: &mut Criterion) {
    let signer = Signer::new(b"bench-secret-key").expect("non-empty key");
    let tag = signer.sign("abcd");

    c.bench_function("signer/sign", |b| {
        b.iter(|| signer.sign(black_box("abcd")));
    });

    c.bench_function("signer/verify_valid", |b| {
        b.iter(|| {
            assert!(signer.verify(black_box("abcd"), black_box(&tag)));
        });
    });

    c.bench_function("signer/verify_forged", |b| {
        b.iter(|| {
            assert!(!signer.verify(black_box("abce"), black_box(&tag)));
        });
    });
}

criterion_group!(benches, bench_generate_id, bench_signer);
criterion_main!(benches);
