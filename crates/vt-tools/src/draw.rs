//! Minimal rasterizer turning [`GraphicOverlay`]s into an RGB overlay.
//!
//! Lines are 1 px Bresenham on rounded coordinates, clipped per pixel. Text
//! supports digits and a few punctuation marks in a 3x5 bitmap font; other
//! characters only advance the cursor.

use vt_core::{Frame, Image, Point2f};

use crate::result::{Color, GraphicOverlay, OverlayKind};

const CIRCLE_SEGMENTS: usize = 64;

// Rows top to bottom, 3 bits each, MSB left.
const GLYPHS: [(char, [u8; 5]); 13] = [
    ('0', [0b111, 0b101, 0b101, 0b101, 0b111]),
    ('1', [0b010, 0b110, 0b010, 0b010, 0b111]),
    ('2', [0b111, 0b001, 0b111, 0b100, 0b111]),
    ('3', [0b111, 0b001, 0b111, 0b001, 0b111]),
    ('4', [0b101, 0b101, 0b111, 0b001, 0b001]),
    ('5', [0b111, 0b100, 0b111, 0b001, 0b111]),
    ('6', [0b111, 0b100, 0b111, 0b101, 0b111]),
    ('7', [0b111, 0b001, 0b010, 0b010, 0b010]),
    ('8', [0b111, 0b101, 0b111, 0b101, 0b111]),
    ('9', [0b111, 0b101, 0b111, 0b001, 0b111]),
    ('.', [0b000, 0b000, 0b000, 0b000, 0b010]),
    ('-', [0b000, 0b000, 0b111, 0b000, 0b000]),
    (':', [0b000, 0b010, 0b000, 0b010, 0b000]),
];

/// RGB copy of `base` with every overlay drawn on top.
pub fn render_overlays(base: &Frame, graphics: &[GraphicOverlay]) -> Frame {
    let mut canvas = base.to_rgb8();
    for g in graphics {
        draw_overlay(&mut canvas, g);
    }
    Frame::Rgb8(canvas)
}

pub fn draw_overlay(canvas: &mut Image<[u8; 3]>, g: &GraphicOverlay) {
    let c = g.color;
    match g.kind {
        OverlayKind::Point => {
            for p in &g.points {
                fill_square(canvas, *p, 1, c);
            }
        }
        OverlayKind::Line | OverlayKind::Polyline => {
            for w in g.points.windows(2) {
                draw_line(canvas, w[0], w[1], c);
            }
        }
        OverlayKind::Polygon | OverlayKind::Ellipse => draw_closed(canvas, &g.points, c),
        OverlayKind::Rectangle => {
            if let [a, b] = g.points[..] {
                let corners = [a, Point2f::new(b.x, a.y), b, Point2f::new(a.x, b.y)];
                draw_closed(canvas, &corners, c);
            }
        }
        OverlayKind::Circle => {
            if let (Some(&center), Some(r)) = (g.points.first(), g.radius) {
                let pts: Vec<Point2f> = (0..CIRCLE_SEGMENTS)
                    .map(|i| {
                        let t = core::f32::consts::TAU * i as f32 / CIRCLE_SEGMENTS as f32;
                        Point2f::new(center.x + r * t.cos(), center.y + r * t.sin())
                    })
                    .collect();
                draw_closed(canvas, &pts, c);
            }
        }
        OverlayKind::Cross => {
            if let Some(&p) = g.points.first() {
                let arm = g.radius.unwrap_or(3.0);
                draw_line(canvas, Point2f::new(p.x - arm, p.y), Point2f::new(p.x + arm, p.y), c);
                draw_line(canvas, Point2f::new(p.x, p.y - arm), Point2f::new(p.x, p.y + arm), c);
            }
        }
        OverlayKind::Text => {
            if let (Some(&p), Some(text)) = (g.points.first(), g.label.as_deref()) {
                draw_text(canvas, p, text, c);
            }
        }
    }
}

fn put(canvas: &mut Image<[u8; 3]>, x: i64, y: i64, c: Color) {
    if x < 0 || y < 0 {
        return;
    }
    if let Some(px) = canvas.get_mut(x as usize, y as usize) {
        *px = c.rgb();
    }
}

fn fill_square(canvas: &mut Image<[u8; 3]>, p: Point2f, half: i64, c: Color) {
    let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
    for y in cy - half..=cy + half {
        for x in cx - half..=cx + half {
            put(canvas, x, y, c);
        }
    }
}

fn draw_closed(canvas: &mut Image<[u8; 3]>, pts: &[Point2f], c: Color) {
    match pts {
        [] => {}
        [p] => put(canvas, p.x.round() as i64, p.y.round() as i64, c),
        _ => {
            for i in 0..pts.len() {
                draw_line(canvas, pts[i], pts[(i + 1) % pts.len()], c);
            }
        }
    }
}

pub fn draw_line(canvas: &mut Image<[u8; 3]>, a: Point2f, b: Point2f, c: Color) {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return;
    }
    let (mut x0, mut y0) = (a.x.round() as i64, a.y.round() as i64);
    let (x1, y1) = (b.x.round() as i64, b.y.round() as i64);

    // Skip segments entirely off-canvas on one side.
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    if (x0 < 0 && x1 < 0) || (y0 < 0 && y1 < 0) || (x0 >= w && x1 >= w) || (y0 >= h && y1 >= h) {
        return;
    }

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(canvas, x0, y0, c);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_text(canvas: &mut Image<[u8; 3]>, anchor: Point2f, text: &str, c: Color) {
    let (mut x, y) = (anchor.x.round() as i64, anchor.y.round() as i64);
    for ch in text.chars() {
        if let Some((_, rows)) = GLYPHS.iter().find(|(g, _)| *g == ch) {
            for (dy, bits) in rows.iter().enumerate() {
                for dx in 0..3 {
                    if bits & (0b100 >> dx) != 0 {
                        put(canvas, x + dx, y + dy as i64, c);
                    }
                }
            }
        }
        x += 4;
    }
}

#[cfg(test)]
mod tests {
    use vt_core::{Frame, Image, Point2f, Rect};

    use super::render_overlays;
    use crate::result::{Color, GraphicOverlay};

    fn lit(frame: &Frame) -> Vec<(usize, usize)> {
        let rgb = frame.to_rgb8();
        let mut out = Vec::new();
        for y in 0..rgb.height() {
            for x in 0..rgb.width() {
                if rgb.get(x, y) != Some(&[0, 0, 0]) {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn horizontal_line_pixels() {
        let base = Frame::Gray8(Image::new_fill(8, 4, 0u8));
        let g = GraphicOverlay::line(Point2f::new(1.0, 2.0), Point2f::new(5.0, 2.0), Color::RED);
        let out = render_overlays(&base, &[g]);
        assert_eq!(lit(&out), vec![(1, 2), (2, 2), (3, 2), (4, 2), (5, 2)]);
    }

    #[test]
    fn rectangle_outline_and_clipping() {
        let base = Frame::Gray8(Image::new_fill(10, 10, 0u8));
        let g = GraphicOverlay::rectangle(Rect::new(2, 2, 3, 3), Color::GREEN);
        let out = render_overlays(&base, &[g]);
        // 3x3 box outline: 8 pixels, centre untouched.
        assert_eq!(lit(&out).len(), 8);
        assert_eq!(out.to_rgb8().get(3, 3), Some(&[0, 0, 0]));

        let off = GraphicOverlay::line(Point2f::new(-5.0, -5.0), Point2f::new(20.0, -1.0), Color::RED);
        assert!(lit(&render_overlays(&base, &[off])).is_empty());
    }

    #[test]
    fn cross_and_text() {
        let base = Frame::Gray8(Image::new_fill(20, 20, 0u8));
        let cross = GraphicOverlay::cross(Point2f::new(10.0, 10.0), 2.0, Color::YELLOW);
        assert_eq!(lit(&render_overlays(&base, &[cross])).len(), 9);

        let text = GraphicOverlay::text(Point2f::new(0.0, 0.0), "1", Color::WHITE);
        assert_eq!(lit(&render_overlays(&base, &[text])).len(), 8);
    }

    #[test]
    fn circle_stays_near_radius() {
        let base = Frame::Gray8(Image::new_fill(40, 40, 0u8));
        let g = GraphicOverlay::circle(Point2f::new(20.0, 20.0), 10.0, Color::CYAN);
        for (x, y) in lit(&render_overlays(&base, &[g])) {
            let d = ((x as f32 - 20.0).powi(2) + (y as f32 - 20.0).powi(2)).sqrt();
            assert!((d - 10.0).abs() < 1.0, "({x},{y}) at {d}");
        }
    }
}
