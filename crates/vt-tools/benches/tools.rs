use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vt_core::{Frame, Image, Point2f};
use vt_tools::{BlobAnalysisTool, CircleFitTool, VisionTool};

/// Grid of bright disks, radius 12, pitch 48.
fn disks(w: usize, h: usize) -> Frame {
    Frame::Gray8(Image::from_fn(w, h, |x, y| {
        let (dx, dy) = ((x % 48) as i32 - 24, (y % 48) as i32 - 24);
        if dx * dx + dy * dy <= 144 { 220u8 } else { 30 }
    }))
}

fn bench_blob(c: &mut Criterion) {
    let frame = disks(640, 480);
    let mut tool = BlobAnalysisTool::new();
    tool.set_max_blob_count(500);

    c.bench_function("blob_640x480_130_disks", |b| {
        b.iter(|| {
            let r = tool.execute(black_box(&frame));
            black_box(r.success);
        });
    });
}

fn bench_circle_fit(c: &mut Criterion) {
    let frame = disks(640, 480);
    let mut tool = CircleFitTool::new();
    tool.set_circle(Point2f::new(218.0, 218.0), 14.0);

    c.bench_function("circle_fit_16_calipers", |b| {
        b.iter(|| {
            let r = tool.execute(black_box(&frame));
            black_box(r.position);
        });
    });
}

criterion_group!(benches, bench_blob, bench_circle_fit);
criterion_main!(benches);
