use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use vec_pack::delta::{apply_delta, compute_delta};

fn related_pair(size: usize) -> (Vec<u8>, Vec<u8>) {
    let source: Vec<u8> = (0..size as u32).map(|i| (i % 251) as u8).collect();
    let mut target = source.clone();
    for i in (0..size).step_by(997) {
        target[i] ^= 0x55;
    }
    (source, target)
}

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_delta");
    for size in [4 * 1024usize, 64 * 1024] {
        let (source, target) = related_pair(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{size}B"), |b| {
            b.iter(|| compute_delta(black_box(&source), black_box(&target)))
        });
    }
    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_delta");
    for size in [4 * 1024usize, 64 * 1024] {
        let (source, target) = related_pair(size);
        let delta = compute_delta(&source, &target);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{size}B"), |b| {
            b.iter(|| apply_delta(black_box(&source), black_box(&delta)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compute, bench_apply);
criterion_main!(benches);
