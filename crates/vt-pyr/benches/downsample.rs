use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vt_core::Image;
use vt_pyr::{PyramidF32, downsample2x2_mean_u8_to_f32};

fn ramp(width: usize, height: usize) -> Image<u8> {
    Image::from_fn(width, height, |x, y| ((x + y * width) % 251) as u8)
}

fn bench_downsample_u8_to_f32(c: &mut Criterion) {
    let img = ramp(1280, 1024);
    let view = img.as_view();

    c.bench_function("downsample2x2_mean_u8_to_f32_1280x1024", |b| {
        b.iter(|| black_box(downsample2x2_mean_u8_to_f32(black_box(&view))));
    });
}

fn bench_pyramid_build(c: &mut Criterion) {
    let img = ramp(1280, 1024);
    let view = img.as_view();
    let mut pyr = PyramidF32::new();

    c.bench_function("pyramid_build_u8_6_levels_1280x1024", |b| {
        b.iter(|| {
            pyr.build_from_u8(black_box(&view), 6);
            black_box(pyr.num_levels());
        });
    });
}

criterion_group!(benches, bench_downsample_u8_to_f32, bench_pyramid_build);
criterion_main!(benches);
