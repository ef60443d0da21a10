use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use imgqa_image::Image;
use imgqa_metrics::gmlog::compute_features;
use imgqa_metrics::QualityBlockSvd;

fn synthetic_image(width: usize, height: usize) -> Image<f32, 1> {
    let data = (0..width * height)
        .map(|i| {
            let x = (i % width) as f32;
            let y = (i / width) as f32;
            128.0 + 60.0 * (0.15 * x).sin() * (0.1 * y).cos()
        })
        .collect();
    Image::new([width, height].into(), data).unwrap()
}

fn bench_gmlog_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("gmlog");

    for (width, height) in [(256, 224), (512, 448)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);
        let image = synthetic_image(*width, *height);

        group.bench_with_input(
            BenchmarkId::new("compute_features", &parameter_string),
            &image,
            |b, i| b.iter(|| compute_features(black_box(i))),
        );
    }
    group.finish();
}

fn bench_blocksvd(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocksvd");

    for (width, height) in [(256, 224), (512, 448)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);
        let image = synthetic_image(*width, *height);
        let metric = QualityBlockSvd::default();

        group.bench_with_input(
            BenchmarkId::new("compute_pair", &parameter_string),
            &image,
            |b, i| b.iter(|| metric.compute_pair(black_box(i), black_box(i))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_gmlog_features, bench_blocksvd);
criterion_main!(benches);
