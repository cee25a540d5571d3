use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use oracle_arena::oracle::RsaKey;
use oracle_arena::primitives::DEFAULT_SHIFT_BITS;
use oracle_arena::{BasePoint, BlumBlumShub, GuessingSetup, LoakRng, SecureRng};

fn loak_rng(rng: &mut SecureRng) -> LoakRng {
    let setup = GuessingSetup::random(rng);
    LoakRng::new(
        setup.seed,
        BasePoint::new(setup.second.group.clone(), setup.second.point.clone()),
        setup.second,
        DEFAULT_SHIFT_BITS,
    )
}

fn bench_loak_next_output(c: &mut Criterion) {
    let mut rng = SecureRng::new();
    let mut generator = loak_rng(&mut rng);

    c.bench_function("loak_next_output", |b| b.iter(|| generator.next_output()));
}

fn bench_session_setup(c: &mut Criterion) {
    let mut rng = SecureRng::new();

    c.bench_function("guessing_setup_random", |b| {
        b.iter(|| GuessingSetup::random(black_box(&mut rng)))
    });
}

fn bench_bbs_bits(c: &mut Criterion) {
    let mut rng = SecureRng::new();

    c.bench_function("bbs_1500_bits", |b| {
        b.iter_batched(
            || BlumBlumShub::random(&mut rng),
            |mut bbs| (0..1500).filter(|_| bbs.next_bit()).count(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_rsa_keygen(c: &mut Criterion) {
    let mut rng = SecureRng::new();
    let mut group = c.benchmark_group("rsa_keygen");
    group.sample_size(10);
    group.bench_function("512_bits", |b| {
        b.iter(|| RsaKey::generate(black_box(512), &mut rng).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_loak_next_output,
    bench_session_setup,
    bench_bbs_bits,
    bench_rsa_keygen
);
criterion_main!(benches);
