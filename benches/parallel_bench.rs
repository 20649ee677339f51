use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qdwconv::cases::find_case;

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("dwconv_parallel_112x112_c32");
    let Some(case) = find_case("mbv2_112x112_c32_s1") else { return };
    let data = case.generate(42).unwrap();
    let mut out = vec![0u8; case.shape().output_len()];
    let max = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(16);
    let mut threads = 1;
    while threads <= max {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &t| {
            b.iter(|| pool.install(|| data.run(&case, black_box(&mut out), t)).unwrap())
        });
        threads *= 2;
    }
    group.finish();
}

criterion_group!(benches, bench_thread_scaling);
criterion_main!(benches);
