use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use distvec::algs::communicator::NoComm;
use distvec::data::map::{LocalGlobal, Map};
use distvec::data::vector::Vector;

#[allow(clippy::approx_constant)]
fn bench_update_and_norm(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector");
    for &n in &[1_000u64, 100_000, 1_000_000] {
        let map = Arc::new(Map::new(n, 0, &NoComm, LocalGlobal::GloballyDistributed).unwrap());
        let mut x = Vector::<f64>::new(Arc::clone(&map));
        let mut z = Vector::<f64>::new(map);
        z.randomize_with_seed(42);
        x.put_scalar(1.0);

        group.bench_with_input(BenchmarkId::new("update2", n), &n, |b, _| {
            let y0 = x.clone();
            b.iter(|| {
                let mut y = y0.clone();
                y.update2(3.14159, &x, 2.71828, &z, -10.0).unwrap();
                y
            })
        });
        group.bench_with_input(BenchmarkId::new("norm2", n), &n, |b, _| {
            b.iter(|| z.norm2(&NoComm))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_update_and_norm);
criterion_main!(benches);
