use canvas_cutout::{
    engine::{classify_trimap, cutout_image, kernel_size, FitMode},
    CutoutParameters, NativeRuntime,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// Disc on a gradient background with a mask slightly larger than the disc
fn scene(size: u32) -> (DynamicImage, DynamicImage) {
    let center = size as f32 / 2.0;
    let radius = size as f32 / 3.0;
    let mut composite = RgbImage::new(size, size);
    let mut mask = GrayImage::new(size, size);
    for (x, y, pixel) in composite.enumerate_pixels_mut() {
        let distance = ((x as f32 - center).powi(2) + (y as f32 - center).powi(2)).sqrt();
        *pixel = if distance < radius {
            Rgb([210, 60, 40])
        } else {
            let shade = ((x + y) % 64) as u8;
            Rgb([30 + shade, 90, 200 - shade])
        };
        if distance < radius * 1.08 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    (DynamicImage::ImageRgb8(composite), DynamicImage::ImageLuma8(mask))
}

fn bench_trimap(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_trimap");
    for size in [256usize, 1024] {
        let pixels = size * size;
        let binary: Vec<u8> = (0..pixels).map(|i| if i % 7 < 4 { 255 } else { 0 }).collect();
        let eroded: Vec<u8> = (0..pixels).map(|i| if i % 7 < 2 { 255 } else { 0 }).collect();
        let dilated: Vec<u8> = (0..pixels).map(|i| if i % 7 < 6 { 255 } else { 0 }).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| classify_trimap(black_box(&eroded), black_box(&dilated), black_box(&binary)));
        });
    }
    group.finish();

    c.bench_function("kernel_size", |b| {
        b.iter(|| {
            (1..=100u32)
                .map(|range| kernel_size(black_box(range), 1080, 1920))
                .sum::<usize>()
        });
    });
}

fn bench_fit_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_pipeline");
    group.sample_size(10);
    for size in [64u32, 128] {
        let (composite, mask) = scene(size);
        for iterations in [2i64, 5] {
            let params = CutoutParameters::new(50, iterations);
            group.bench_with_input(
                BenchmarkId::new(format!("{}px", size), iterations),
                &params,
                |b, params| {
                    let mut runtime = NativeRuntime::default();
                    b.iter(|| {
                        cutout_image(
                            &mut runtime,
                            black_box(&composite),
                            black_box(&mask),
                            *params,
                            FitMode::Extract,
                        )
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_trimap, bench_fit_pipeline);
criterion_main!(benches);
