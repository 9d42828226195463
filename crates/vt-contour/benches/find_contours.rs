use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vt_contour::{ApproxMode, RetrievalMode, ShapeMetrics, find_contours};
use vt_core::Image;

fn blob_field(w: usize, h: usize) -> Image<u8> {
    Image::from_fn(w, h, |x, y| {
        let cx = (x / 40) * 40 + 20;
        let cy = (y / 40) * 40 + 20;
        let dx = x as f32 - cx as f32;
        let dy = y as f32 - cy as f32;
        if dx * dx + dy * dy <= 144.0 { 255 } else { 0 }
    })
}

fn bench_contours(c: &mut Criterion) {
    let img = blob_field(640, 480);
    let view = img.as_view();

    c.bench_function("find_contours_tree_640x480", |b| {
        b.iter(|| {
            black_box(find_contours(
                black_box(&view),
                RetrievalMode::Tree,
                ApproxMode::None,
            ))
        });
    });

    let contours = find_contours(&view, RetrievalMode::External, ApproxMode::None);
    c.bench_function("shape_metrics_192_blobs", |b| {
        b.iter(|| {
            for contour in &contours {
                black_box(ShapeMetrics::measure(&contour.points));
            }
        });
    });
}

criterion_group!(benches, bench_contours);
criterion_main!(benches);
