//! Shape descriptors of closed pixel-centre contours.
//!
//! Areas count pixel centres enclosed by or lying on the polygon (Pick's
//! theorem), so a filled region measures exactly its pixel count. Hull areas
//! follow the same rule, which keeps `area / hull_area` within `(0, 1]`.
//! Circularity is the exception: it pairs the shoelace area of the chain
//! with a length estimate of the same chain, so both describe one polygon.

use nalgebra::{Matrix2, SymmetricEigen};
use vt_core::{Ellipse, Point2f, Rect, RotatedRect};

use crate::trace::PixelPoint;

const MOMENT_EPS: f64 = 1e-9;

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 { a.abs() } else { gcd(b, a % b) }
}

fn edges(points: &[PixelPoint]) -> impl Iterator<Item = (PixelPoint, PixelPoint)> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[i], points[(i + 1) % n]))
}

/// Shoelace area, positive for counterclockwise polygons in y-up axes.
pub fn signed_area(points: &[PixelPoint]) -> f64 {
    let twice: i64 = edges(points)
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice as f64 * 0.5
}

/// Lattice points on the closed polygon boundary.
pub fn boundary_points(points: &[PixelPoint]) -> i64 {
    if points.len() < 2 {
        return points.len() as i64;
    }
    edges(points)
        .map(|(a, b)| gcd((b.x - a.x) as i64, (b.y - a.y) as i64))
        .sum()
}

/// Pixel-centre count of the region bounded by `points`.
pub fn pixel_area(points: &[PixelPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    if points.len() == 1 {
        return 1.0;
    }
    signed_area(points).abs() + boundary_points(points) as f64 * 0.5 + 1.0
}

/// Pixel centres strictly inside the polygon. For the border chain of a
/// hole these are the background pixels of the hole itself.
pub fn interior_area(points: &[PixelPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    (signed_area(points).abs() - boundary_points(points) as f64 * 0.5 + 1.0).max(0.0)
}

/// Closed arc length.
pub fn arc_length(points: &[PixelPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    edges(points)
        .map(|(a, b)| {
            let dx = (b.x - a.x) as f64;
            let dy = (b.y - a.y) as f64;
            dx.hypot(dy)
        })
        .sum()
}

/// Length of the curve a closed 8-connected chain digitises.
///
/// Raw chain length overshoots a smooth boundary by about 5.5% averaged over
/// orientations; Kulpa's factor `pi * (1 + sqrt 2) / 8` removes that bias.
/// Segments of any slope are split into diagonal and axial steps.
pub fn digital_perimeter(points: &[PixelPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let kulpa = core::f64::consts::PI * (1.0 + core::f64::consts::SQRT_2) / 8.0;
    let raw: f64 = edges(points)
        .map(|(a, b)| {
            let dx = (b.x - a.x).unsigned_abs();
            let dy = (b.y - a.y).unsigned_abs();
            let diagonal = dx.min(dy);
            (dx.max(dy) - diagonal) as f64 + diagonal as f64 * core::f64::consts::SQRT_2
        })
        .sum();
    kulpa * raw
}

/// `4 pi A / P^2` of the chain polygon, 0 for degenerate chains.
pub fn circularity(points: &[PixelPoint]) -> f64 {
    let area = signed_area(points).abs();
    let perimeter = digital_perimeter(points);
    if area <= 0.0 || perimeter <= 0.0 {
        return 0.0;
    }
    (4.0 * core::f64::consts::PI * area / (perimeter * perimeter)).min(1.0)
}

/// Inclusive pixel bounding box.
pub fn bounding_rect(points: &[PixelPoint]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::default();
    };
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1)
}

/// Region moments of the polygon (Green's theorem), up to second order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
}

impl Moments {
    pub fn from_polygon(points: &[PixelPoint]) -> Self {
        let (mut a00, mut a10, mut a01) = (0.0, 0.0, 0.0);
        let (mut a20, mut a11, mut a02) = (0.0, 0.0, 0.0);
        for (p, q) in edges(points) {
            let (x0, y0) = (p.x as f64, p.y as f64);
            let (x1, y1) = (q.x as f64, q.y as f64);
            let c = x0 * y1 - x1 * y0;
            a00 += c;
            a10 += c * (x0 + x1);
            a01 += c * (y0 + y1);
            a20 += c * (x0 * x0 + x0 * x1 + x1 * x1);
            a11 += c * (2.0 * x0 * y0 + x0 * y1 + x1 * y0 + 2.0 * x1 * y1);
            a02 += c * (y0 * y0 + y0 * y1 + y1 * y1);
        }
        let sign = if a00 < 0.0 { -1.0 } else { 1.0 };
        let m00 = sign * a00 / 2.0;
        let m10 = sign * a10 / 6.0;
        let m01 = sign * a01 / 6.0;
        let m20 = sign * a20 / 12.0;
        let m11 = sign * a11 / 24.0;
        let m02 = sign * a02 / 12.0;

        if m00.abs() < MOMENT_EPS {
            return Self {
                m00,
                m10,
                m01,
                ..Self::default()
            };
        }
        let (cx, cy) = (m10 / m00, m01 / m00);
        Self {
            m00,
            m10,
            m01,
            mu20: m20 - cx * m10,
            mu11: m11 - cx * m01,
            mu02: m02 - cy * m01,
        }
    }

    /// `None` when the polygon encloses no area.
    pub fn centroid(&self) -> Option<Point2f> {
        (self.m00.abs() >= MOMENT_EPS)
            .then(|| Point2f::new((self.m10 / self.m00) as f32, (self.m01 / self.m00) as f32))
    }
}

/// Andrew's monotone chain; counterclockwise in y-up axes, no collinear
/// points.
pub fn convex_hull(points: &[PixelPoint]) -> Vec<PixelPoint> {
    let mut pts = points.to_vec();
    pts.sort_unstable();
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: PixelPoint, a: PixelPoint, b: PixelPoint| {
        (a.x - o.x) as i64 * (b.y - o.y) as i64 - (a.y - o.y) as i64 * (b.x - o.x) as i64
    };

    let mut hull: Vec<PixelPoint> = Vec::with_capacity(2 * pts.len());
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

fn normalize_angle(deg: f32) -> f32 {
    let mut a = deg;
    while a > 90.0 {
        a -= 180.0;
    }
    while a <= -90.0 {
        a += 180.0;
    }
    a
}

/// Minimum-area enclosing rectangle by rotating calipers over the hull.
/// `width` runs along `angle_deg`.
pub fn min_area_rect(points: &[PixelPoint]) -> Option<RotatedRect> {
    let hull = convex_hull(points);
    match hull.len() {
        0 => return None,
        1 => {
            return Some(RotatedRect {
                center: hull[0].to_point2f(),
                ..RotatedRect::default()
            });
        }
        2 => {
            let (a, b) = (hull[0].to_point2f(), hull[1].to_point2f());
            let d = b - a;
            return Some(RotatedRect {
                center: a.lerp(b, 0.5),
                width: d.norm(),
                height: 0.0,
                angle_deg: normalize_angle(d.y.atan2(d.x).to_degrees()),
            });
        }
        _ => {}
    }

    let pts: Vec<Point2f> = hull.iter().map(|p| p.to_point2f()).collect();
    let mut best: Option<(f32, RotatedRect)> = None;
    for i in 0..pts.len() {
        let u = (pts[(i + 1) % pts.len()] - pts[i]).normalize();
        let v = u.perp();
        let (mut u0, mut u1, mut v0, mut v1) = (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
        for p in &pts {
            let r = *p - pts[i];
            let (pu, pv) = (r.dot(u), r.dot(v));
            u0 = u0.min(pu);
            u1 = u1.max(pu);
            v0 = v0.min(pv);
            v1 = v1.max(pv);
        }
        let area = (u1 - u0) * (v1 - v0);
        if best.as_ref().is_none_or(|(a, _)| area < *a) {
            let center = pts[i] + u * (0.5 * (u0 + u1)) + v * (0.5 * (v0 + v1));
            best = Some((
                area,
                RotatedRect {
                    center,
                    width: u1 - u0,
                    height: v1 - v0,
                    angle_deg: normalize_angle(u.y.atan2(u.x).to_degrees()),
                },
            ));
        }
    }
    best.map(|(_, r)| r)
}

/// Ellipse with the same second-order region moments as the polygon.
pub fn fit_ellipse(points: &[PixelPoint]) -> Option<Ellipse> {
    let m = Moments::from_polygon(points);
    let center = m.centroid()?;
    let cov = Matrix2::new(m.mu20, m.mu11, m.mu11, m.mu02) / m.m00;
    let eig = SymmetricEigen::new(cov);
    let (major_idx, minor_idx) = if eig.eigenvalues[0] >= eig.eigenvalues[1] {
        (0, 1)
    } else {
        (1, 0)
    };
    let major = eig.eigenvalues[major_idx].max(0.0);
    let minor = eig.eigenvalues[minor_idx].max(0.0);
    let axis = eig.eigenvectors.column(major_idx);

    Some(Ellipse {
        center,
        semi_major: (2.0 * major.sqrt()) as f32,
        semi_minor: (2.0 * minor.sqrt()) as f32,
        angle_deg: normalize_angle(axis[1].atan2(axis[0]).to_degrees() as f32),
    })
}

/// Everything measured for one contour.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMetrics {
    pub area: f64,
    pub perimeter: f64,
    pub centroid: Point2f,
    pub bounding_rect: Rect,
    pub hull: Vec<PixelPoint>,
    pub hull_area: f64,
    pub circularity: f64,
    pub aspect_ratio: f64,
    /// `area / hull_area`, or 1 when the hull is empty.
    pub convexity: f64,
    pub extent: f64,
    pub equivalent_diameter: f64,
    pub min_area_rect: Option<RotatedRect>,
    pub ellipse: Option<Ellipse>,
    /// Orientation of the min-area rectangle, 0 without one.
    pub angle: f64,
}

impl ShapeMetrics {
    /// Rotated rectangle and ellipse need at least this many points.
    pub const MIN_FIT_POINTS: usize = 5;

    pub fn measure(points: &[PixelPoint]) -> Self {
        Self::measure_with(points, pixel_area)
    }

    /// Metrics of a hole traced along its surrounding foreground border:
    /// areas count only the enclosed background pixels.
    pub fn measure_hole(points: &[PixelPoint]) -> Self {
        Self::measure_with(points, interior_area)
    }

    fn measure_with(points: &[PixelPoint], area_of: fn(&[PixelPoint]) -> f64) -> Self {
        let area = area_of(points);
        let perimeter = arc_length(points);
        let bounding_rect = bounding_rect(points);
        let centroid = Moments::from_polygon(points)
            .centroid()
            .unwrap_or_else(|| bounding_rect.center());

        let hull = convex_hull(points);
        let hull_area = area_of(&hull);
        let convexity = if hull_area > 0.0 {
            (area / hull_area).min(1.0)
        } else {
            1.0
        };

        let circularity = circularity(points);
        let aspect_ratio = if bounding_rect.height > 0 {
            bounding_rect.width as f64 / bounding_rect.height as f64
        } else {
            0.0
        };
        let bbox_area = bounding_rect.area() as f64;
        let extent = if bbox_area > 0.0 { area / bbox_area } else { 0.0 };

        let (min_area_rect, ellipse) = if points.len() >= Self::MIN_FIT_POINTS {
            (min_area_rect(points), fit_ellipse(points))
        } else {
            (None, None)
        };
        let angle = min_area_rect.map_or(0.0, |r| r.angle_deg as f64);

        Self {
            area,
            perimeter,
            centroid,
            bounding_rect,
            hull,
            hull_area,
            circularity,
            aspect_ratio,
            convexity,
            extent,
            equivalent_diameter: (4.0 * area / core::f64::consts::PI).sqrt(),
            min_area_rect,
            ellipse,
            angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use vt_core::{Image, Rect};

    use crate::{
        ApproxMode, PixelPoint, RetrievalMode, ShapeMetrics, convex_hull, find_contours,
        min_area_rect, pixel_area,
    };

    fn single_contour(img: &Image<u8>, approx: ApproxMode) -> Vec<PixelPoint> {
        let mut cs = find_contours(&img.as_view(), RetrievalMode::External, approx);
        assert_eq!(cs.len(), 1);
        cs.remove(0).points
    }

    fn disk(size: usize, c: f32, r: f32) -> Image<u8> {
        Image::from_fn(size, size, |x, y| {
            let dx = x as f32 - c;
            let dy = y as f32 - c;
            if dx * dx + dy * dy <= r * r { 255 } else { 0 }
        })
    }

    #[test]
    fn filled_rectangle_metrics() {
        let img = Image::from_fn(20, 20, |x, y| {
            if (3..=12).contains(&x) && (5..=9).contains(&y) { 255u8 } else { 0 }
        });
        for approx in [ApproxMode::None, ApproxMode::Simple] {
            let pts = single_contour(&img, approx);
            let m = ShapeMetrics::measure(&pts);
            assert_abs_diff_eq!(m.area, 50.0);
            assert_abs_diff_eq!(m.hull_area, 50.0);
            assert_abs_diff_eq!(m.convexity, 1.0);
            assert_abs_diff_eq!(m.extent, 1.0);
            assert_abs_diff_eq!(m.perimeter, 26.0);
            assert_eq!(m.bounding_rect, Rect::new(3, 5, 10, 5));
            assert_abs_diff_eq!(m.aspect_ratio, 2.0);
            assert_abs_diff_eq!(m.centroid.x, 7.5, epsilon = 1e-4);
            assert_abs_diff_eq!(m.centroid.y, 7.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn disk_area_matches_pixel_count() {
        let img = disk(64, 32.0, 20.0);
        let count = img.data().iter().filter(|&&v| v != 0).count();
        let pts = single_contour(&img, ApproxMode::None);
        let m = ShapeMetrics::measure(&pts);
        assert_abs_diff_eq!(m.area, count as f64);
        assert!(m.circularity > 0.85 && m.circularity <= 1.0);
        assert!(m.convexity > 0.95 && m.convexity <= 1.0);
        assert_abs_diff_eq!(m.centroid.x, 32.0, epsilon = 0.05);
        assert_abs_diff_eq!(m.centroid.y, 32.0, epsilon = 0.05);

        let ellipse = m.ellipse.expect("ellipse");
        assert_abs_diff_eq!(ellipse.semi_major, 20.0, epsilon = 1.0);
        assert_abs_diff_eq!(ellipse.semi_minor, 20.0, epsilon = 1.0);
    }

    #[test]
    fn circularity_separates_disks_from_squares() {
        let square = |side: usize| {
            Image::from_fn(side + 6, side + 6, |x, y| {
                if (3..3 + side).contains(&x) && (3..3 + side).contains(&y) { 255u8 } else { 0 }
            })
        };
        let score = |img: &Image<u8>| {
            ShapeMetrics::measure(&single_contour(img, ApproxMode::Simple)).circularity
        };

        let disk10 = score(&disk(32, 16.0, 10.0));
        let disk20 = score(&disk(64, 32.0, 20.0));
        assert!(disk10 > 0.9, "r=10 circularity {disk10}");
        assert!(disk20 > 0.9, "r=20 circularity {disk20}");
        for side in [6, 14, 20] {
            let sq = score(&square(side));
            let kulpa = core::f64::consts::PI * (1.0 + core::f64::consts::SQRT_2) / 8.0;
            assert_abs_diff_eq!(sq, core::f64::consts::PI / (4.0 * kulpa * kulpa), epsilon = 1e-9);
            assert!(sq + 0.04 < disk10, "square {side}: {sq} vs disk {disk10}");
        }

        let line = Image::from_fn(9, 3, |x, y| if y == 1 && (2..7).contains(&x) { 255u8 } else { 0 });
        assert_abs_diff_eq!(score(&line), 0.0);
    }

    #[test]
    fn tiny_region_circularity_is_clamped() {
        let img = disk(12, 6.0, 1.0);
        let pts = single_contour(&img, ApproxMode::None);
        let m = ShapeMetrics::measure(&pts);
        assert_abs_diff_eq!(m.area, 5.0);
        assert!(m.circularity <= 1.0);
    }

    #[test]
    fn l_shape_is_not_convex() {
        let img = Image::from_fn(20, 20, |x, y| {
            let vertical = (2..=5).contains(&x) && (2..=15).contains(&y);
            let foot = (2..=15).contains(&x) && (12..=15).contains(&y);
            if vertical || foot { 255u8 } else { 0 }
        });
        let pts = single_contour(&img, ApproxMode::Simple);
        let m = ShapeMetrics::measure(&pts);
        assert_abs_diff_eq!(m.area, 4.0 * 14.0 + 10.0 * 4.0);
        assert!(m.convexity < 0.7, "convexity {}", m.convexity);
        assert!(m.solidity_consistent());
    }

    #[test]
    fn hole_area_counts_background_pixels_only() {
        // Border chain of a 16x16 hole with cut corners, as traced on a ring.
        let pts = vec![
            PixelPoint::new(12, 11),
            PixelPoint::new(27, 11),
            PixelPoint::new(28, 12),
            PixelPoint::new(28, 27),
            PixelPoint::new(27, 28),
            PixelPoint::new(12, 28),
            PixelPoint::new(11, 27),
            PixelPoint::new(11, 12),
        ];
        let hole = ShapeMetrics::measure_hole(&pts);
        assert_abs_diff_eq!(hole.area, 256.0);
        assert_abs_diff_eq!(hole.hull_area, 256.0);
        assert_abs_diff_eq!(hole.convexity, 1.0);
        assert_abs_diff_eq!(ShapeMetrics::measure(&pts).area, 320.0);
    }

    #[test]
    fn single_pixel_has_unit_area_and_no_fits() {
        let pts = vec![PixelPoint::new(4, 4)];
        let m = ShapeMetrics::measure(&pts);
        assert_abs_diff_eq!(m.area, 1.0);
        assert_abs_diff_eq!(m.convexity, 1.0);
        assert_abs_diff_eq!(m.circularity, 0.0);
        assert!(m.min_area_rect.is_none());
        assert!(m.ellipse.is_none());
        assert_abs_diff_eq!(m.centroid.x, 4.0);
    }

    #[test]
    fn rotated_square_min_area_rect() {
        // Diamond with half-diagonal 10.
        let pts: Vec<PixelPoint> = vec![
            PixelPoint::new(10, 0),
            PixelPoint::new(20, 10),
            PixelPoint::new(10, 20),
            PixelPoint::new(0, 10),
        ];
        let r = min_area_rect(&pts).expect("rect");
        let side = 200.0f32.sqrt();
        assert_abs_diff_eq!(r.width, side, epsilon = 1e-3);
        assert_abs_diff_eq!(r.height, side, epsilon = 1e-3);
        assert_abs_diff_eq!(r.angle_deg.abs(), 45.0, epsilon = 1e-3);
        assert_abs_diff_eq!(r.center.x, 10.0, epsilon = 1e-3);
        assert_abs_diff_eq!(r.center.y, 10.0, epsilon = 1e-3);
    }

    #[test]
    fn hull_drops_interior_and_collinear_points() {
        let pts = vec![
            PixelPoint::new(0, 0),
            PixelPoint::new(2, 0),
            PixelPoint::new(4, 0),
            PixelPoint::new(4, 4),
            PixelPoint::new(2, 2),
            PixelPoint::new(0, 4),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert_abs_diff_eq!(pixel_area(&hull), 25.0);
    }

    impl ShapeMetrics {
        fn solidity_consistent(&self) -> bool {
            self.convexity > 0.0 && self.convexity <= 1.0 && self.area <= self.hull_area
        }
    }
}
