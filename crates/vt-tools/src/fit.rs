//! Robust geometric fits over edge points.
//!
//! - Total least squares line (principal axis of the point scatter).
//! - Algebraic (Kasa) circle, solved in centred coordinates.
//! - RANSAC wrappers: minimal samples, best inlier set, refit on inliers.

use nalgebra::{Matrix2, Matrix3, SymmetricEigen, Vector3};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use vt_core::{Point2f, Vec2f};

#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    TooFewPoints { needed: usize, got: usize },
    InsufficientInliers { needed: usize, found: usize },
    /// Collinear or coincident points.
    Degenerate,
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
            Self::InsufficientInliers { needed, found } => {
                write!(f, "insufficient inliers: need {}, found {}", needed, found)
            }
            Self::Degenerate => write!(f, "degenerate point configuration"),
        }
    }
}

impl std::error::Error for FitError {}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RansacConfig {
    /// Max point-to-model distance in pixels.
    pub inlier_threshold: f64,
    pub max_iterations: usize,
    pub min_inliers: usize,
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            inlier_threshold: 1.5,
            max_iterations: 200,
            min_inliers: 3,
            seed: 0x5eed,
        }
    }
}

impl RansacConfig {
    pub fn sanitized(self) -> Self {
        let threshold = if self.inlier_threshold.is_finite() && self.inlier_threshold > 0.0 {
            self.inlier_threshold
        } else {
            Self::default().inlier_threshold
        };
        Self {
            inlier_threshold: threshold,
            max_iterations: self.max_iterations.clamp(1, 100_000),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineModel {
    /// Centroid of the fitted points.
    pub point: Point2f,
    /// Unit direction.
    pub direction: Vec2f,
    /// RMS orthogonal distance of the inliers.
    pub rms: f64,
    pub inlier_mask: Vec<bool>,
    pub num_inliers: usize,
}

impl LineModel {
    pub fn distance(&self, q: Point2f) -> f64 {
        line_distance(self.point, self.direction, q)
    }

    /// Angle of `direction` in degrees, `(-180, 180]`.
    pub fn angle_deg(&self) -> f64 {
        (self.direction.y as f64).atan2(self.direction.x as f64).to_degrees()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleModel {
    pub center: Point2f,
    pub radius: f64,
    pub rms: f64,
    pub inlier_mask: Vec<bool>,
    pub num_inliers: usize,
}

impl CircleModel {
    pub fn distance(&self, q: Point2f) -> f64 {
        circle_distance(self.center, self.radius, q)
    }
}

fn line_distance(p: Point2f, dir: Vec2f, q: Point2f) -> f64 {
    let dx = q.x as f64 - p.x as f64;
    let dy = q.y as f64 - p.y as f64;
    (dir.x as f64 * dy - dir.y as f64 * dx).abs()
}

fn circle_distance(c: Point2f, r: f64, q: Point2f) -> f64 {
    let dx = q.x as f64 - c.x as f64;
    let dy = q.y as f64 - c.y as f64;
    ((dx * dx + dy * dy).sqrt() - r).abs()
}

fn mean(points: &[Point2f]) -> (f64, f64) {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    (sx / n, sy / n)
}

fn rms_of(distances: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = distances.fold((0.0, 0usize), |(s, n), d| (s + d * d, n + 1));
    if n == 0 { 0.0 } else { (sum / n as f64).sqrt() }
}

/// Total least squares line through `points`: the major principal axis.
pub fn fit_line_tls(points: &[Point2f]) -> Result<LineModel, FitError> {
    if points.len() < 2 {
        return Err(FitError::TooFewPoints {
            needed: 2,
            got: points.len(),
        });
    }
    let (mx, my) = mean(points);
    let mut cov = Matrix2::<f64>::zeros();
    for p in points {
        let dx = p.x as f64 - mx;
        let dy = p.y as f64 - my;
        cov[(0, 0)] += dx * dx;
        cov[(0, 1)] += dx * dy;
        cov[(1, 1)] += dy * dy;
    }
    cov[(1, 0)] = cov[(0, 1)];
    if cov.trace() < 1e-12 {
        return Err(FitError::Degenerate);
    }

    let eig = SymmetricEigen::new(cov);
    let major = if eig.eigenvalues[0] >= eig.eigenvalues[1] {
        0
    } else {
        1
    };
    let v = eig.eigenvectors.column(major);
    let direction = Vec2f::new(v[0] as f32, v[1] as f32).normalize();
    let point = Point2f::new(mx as f32, my as f32);

    let rms = rms_of(points.iter().map(|&q| line_distance(point, direction, q)));
    Ok(LineModel {
        point,
        direction,
        rms,
        inlier_mask: vec![true; points.len()],
        num_inliers: points.len(),
    })
}

/// Circle through three points; `None` when they are (nearly) collinear.
pub fn circle_from_3(a: Point2f, b: Point2f, c: Point2f) -> Option<(Point2f, f64)> {
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64 - ax, b.y as f64 - ay);
    let (cx, cy) = (c.x as f64 - ax, c.y as f64 - ay);
    let d = 2.0 * (bx * cy - by * cx);
    if d.abs() < 1e-9 {
        return None;
    }
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (cy * b2 - by * c2) / d;
    let uy = (bx * c2 - cx * b2) / d;
    let r = (ux * ux + uy * uy).sqrt();
    Some((Point2f::new((ux + ax) as f32, (uy + ay) as f32), r))
}

/// Least-squares circle minimizing `sum (x² + y² + D x + E y + F)²`.
pub fn fit_circle_algebraic(points: &[Point2f]) -> Result<CircleModel, FitError> {
    if points.len() < 3 {
        return Err(FitError::TooFewPoints {
            needed: 3,
            got: points.len(),
        });
    }
    let (mx, my) = mean(points);
    let mut ata = Matrix3::<f64>::zeros();
    let mut atb = Vector3::<f64>::zeros();
    for p in points {
        let x = p.x as f64 - mx;
        let y = p.y as f64 - my;
        let row = Vector3::new(x, y, 1.0);
        ata += row * row.transpose();
        atb -= row * (x * x + y * y);
    }
    let sol = ata.lu().solve(&atb).ok_or(FitError::Degenerate)?;
    let (cx, cy) = (-0.5 * sol[0], -0.5 * sol[1]);
    let r2 = cx * cx + cy * cy - sol[2];
    if !r2.is_finite() || r2 <= 0.0 {
        return Err(FitError::Degenerate);
    }
    let center = Point2f::new((cx + mx) as f32, (cy + my) as f32);
    let radius = r2.sqrt();

    let rms = rms_of(points.iter().map(|&q| circle_distance(center, radius, q)));
    Ok(CircleModel {
        center,
        radius,
        rms,
        inlier_mask: vec![true; points.len()],
        num_inliers: points.len(),
    })
}

fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

fn inliers(points: &[Point2f], threshold: f64, dist: impl Fn(Point2f) -> f64) -> (Vec<bool>, usize) {
    let mask: Vec<bool> = points.iter().map(|&q| dist(q) <= threshold).collect();
    let count = mask.iter().filter(|&&m| m).count();
    (mask, count)
}

fn select(points: &[Point2f], mask: &[bool]) -> Vec<Point2f> {
    points
        .iter()
        .zip(mask)
        .filter(|&(_, &m)| m)
        .map(|(&p, _)| p)
        .collect()
}

/// RANSAC over two-point line hypotheses, then a TLS refit on the best
/// consensus set. The returned mask and RMS refer to the refitted line.
pub fn fit_line_ransac(points: &[Point2f], config: &RansacConfig) -> Result<LineModel, FitError> {
    let n = points.len();
    let needed = config.min_inliers.max(2);
    if n < 2 {
        return Err(FitError::TooFewPoints { needed: 2, got: n });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best_count = 0usize;
    let mut best_mask = vec![false; n];

    for _ in 0..config.max_iterations.max(1) {
        let s = sample_indices(&mut rng, n, 2);
        let (a, b) = (points[s[0]], points[s[1]]);
        let d = b - a;
        if d.norm() < 1e-6 {
            continue;
        }
        let dir = d.normalize();
        let (mask, count) = inliers(points, config.inlier_threshold, |q| line_distance(a, dir, q));
        if count > best_count {
            best_count = count;
            best_mask = mask;
            if best_count * 10 > n * 9 {
                break;
            }
        }
    }

    if best_count < needed {
        return Err(FitError::InsufficientInliers {
            needed,
            found: best_count,
        });
    }

    let refit = fit_line_tls(&select(points, &best_mask))?;
    let (mask, count) = inliers(points, config.inlier_threshold, |q| refit.distance(q));
    if count < needed {
        return Err(FitError::InsufficientInliers { needed, found: count });
    }
    let rms = rms_of(select(points, &mask).into_iter().map(|q| refit.distance(q)));
    Ok(LineModel {
        rms,
        inlier_mask: mask,
        num_inliers: count,
        ..refit
    })
}

/// RANSAC over three-point circle hypotheses, then an algebraic refit on
/// the best consensus set.
pub fn fit_circle_ransac(points: &[Point2f], config: &RansacConfig) -> Result<CircleModel, FitError> {
    let n = points.len();
    let needed = config.min_inliers.max(3);
    if n < 3 {
        return Err(FitError::TooFewPoints { needed: 3, got: n });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best_count = 0usize;
    let mut best_mask = vec![false; n];

    for _ in 0..config.max_iterations.max(1) {
        let s = sample_indices(&mut rng, n, 3);
        let Some((c, r)) = circle_from_3(points[s[0]], points[s[1]], points[s[2]]) else {
            continue;
        };
        let (mask, count) = inliers(points, config.inlier_threshold, |q| circle_distance(c, r, q));
        if count > best_count {
            best_count = count;
            best_mask = mask;
            if best_count * 10 > n * 9 {
                break;
            }
        }
    }

    if best_count < needed {
        return Err(FitError::InsufficientInliers {
            needed,
            found: best_count,
        });
    }

    let refit = fit_circle_algebraic(&select(points, &best_mask))?;
    let (mask, count) = inliers(points, config.inlier_threshold, |q| refit.distance(q));
    if count < needed {
        return Err(FitError::InsufficientInliers { needed, found: count });
    }
    let rms = rms_of(select(points, &mask).into_iter().map(|q| refit.distance(q)));
    Ok(CircleModel {
        rms,
        inlier_mask: mask,
        num_inliers: count,
        ..refit
    })
}
