//! 2D edgel extraction at a single scale.
//!
//! Coordinate convention: pixel centers, so integer `(x, y)` is the center of
//! pixel index `(x, y)`.
//!
//! Normal direction: `n` is derived from image gradient `(gx, gy)` and points
//! from dark to bright (increasing intensity).
//!
//! Threshold behavior:
//! - If `high_thresh == 0.0` and `low_thresh == 0.0`, thresholds are chosen
//!   automatically as `high = 0.2 * max_nms`, `low = 0.1 * max_nms`.
//! - Otherwise provided thresholds are used as-is (with low/high ordering fixed
//!   if needed). Magnitudes are unnormalized, so with the Sobel operator an
//!   ideal 0/255 step gives `4 * 255`.

use vt_core::{BorderMode, Image, ImageView, Point2f, Vec2f, sample_bilinear_f32};

#[derive(Debug, Clone, PartialEq)]
pub struct Edgel {
    pub p: Point2f,
    pub n: Vec2f,
    pub strength: f32,
    pub idx: (usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subpix2D {
    None,
    ParabolicAlongNormal,
}

/// 3x3 derivative stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientOperator {
    /// `[1 2 1]` smoothing, `[-1 0 1]` derivative.
    Sobel,
    /// `[3 10 3]` smoothing, `[-1 0 1]` derivative.
    Scharr,
}

impl GradientOperator {
    fn weights(self) -> (f32, f32) {
        match self {
            Self::Sobel => (1.0, 2.0),
            Self::Scharr => (3.0, 10.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge2DConfig {
    /// Binomial 3x3 smoothing before differentiation.
    pub pre_smooth: bool,
    pub operator: GradientOperator,
    pub low_thresh: f32,
    pub high_thresh: f32,
    pub border: BorderMode<f32>,
    pub subpix: Subpix2D,
}

impl Default for Edge2DConfig {
    fn default() -> Self {
        Self {
            pre_smooth: true,
            operator: GradientOperator::Sobel,
            low_thresh: 0.0,
            high_thresh: 0.0,
            border: BorderMode::Clamp,
            subpix: Subpix2D::ParabolicAlongNormal,
        }
    }
}

/// Canny-style detector: gradient, non-maximum suppression, hysteresis.
/// Scratch buffers are reused across calls of the same size.
#[derive(Debug, Clone)]
pub struct Edge2DDetector {
    tmp: Image<f32>,
    gx: Image<f32>,
    gy: Image<f32>,
    mag: Image<f32>,
    nms: Image<f32>,
    weak: Vec<bool>,
    accepted: Vec<bool>,
    stack: Vec<usize>,
}

impl Edge2DDetector {
    pub fn new() -> Self {
        Self {
            tmp: Image::new_fill(0, 0, 0.0),
            gx: Image::new_fill(0, 0, 0.0),
            gy: Image::new_fill(0, 0, 0.0),
            mag: Image::new_fill(0, 0, 0.0),
            nms: Image::new_fill(0, 0, 0.0),
            weak: Vec::new(),
            accepted: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn detect_u8(&mut self, img: &ImageView<'_, u8>, cfg: &Edge2DConfig) -> Vec<Edgel> {
        self.load(img.width(), img.height(), |y, dst| {
            for (d, &s) in dst.iter_mut().zip(img.row(y)) {
                *d = s as f32;
            }
        });
        self.detect_loaded(cfg)
    }

    pub fn detect_f32(&mut self, img: &ImageView<'_, f32>, cfg: &Edge2DConfig) -> Vec<Edgel> {
        self.load(img.width(), img.height(), |y, dst| {
            dst.copy_from_slice(img.row(y));
        });
        self.detect_loaded(cfg)
    }

    /// Gradient magnitude of the last call.
    pub fn magnitude(&self) -> &Image<f32> {
        &self.mag
    }

    /// 255 where the last call accepted an edge pixel, 0 elsewhere.
    pub fn edge_mask(&self) -> Image<u8> {
        let data = self
            .accepted
            .iter()
            .map(|&a| if a { 255 } else { 0 })
            .collect();
        Image::from_vec(self.tmp.width(), self.tmp.height(), data)
            .unwrap_or_else(|_| Image::new_fill(0, 0, 0))
    }

    fn load(&mut self, w: usize, h: usize, mut fill_row: impl FnMut(usize, &mut [f32])) {
        if self.tmp.dims() != (w, h) {
            self.tmp = Image::new_fill(w, h, 0.0);
            self.gx = Image::new_fill(w, h, 0.0);
            self.gy = Image::new_fill(w, h, 0.0);
            self.mag = Image::new_fill(w, h, 0.0);
            self.nms = Image::new_fill(w, h, 0.0);
            self.weak = vec![false; w * h];
            self.accepted = vec![false; w * h];
        }
        for y in 0..h {
            fill_row(y, self.tmp.row_mut(y));
        }
    }

    fn detect_loaded(&mut self, cfg: &Edge2DConfig) -> Vec<Edgel> {
        if self.tmp.is_empty() {
            return Vec::new();
        }

        if cfg.pre_smooth {
            self.smooth_binomial3();
        }
        self.compute_gradient(cfg.operator);
        self.non_max_suppression();
        let count = self.hysteresis(cfg);
        self.build_edgels(cfg, count)
    }

    fn smooth_binomial3(&mut self) {
        let (w, h) = self.tmp.dims();

        for y in 0..h {
            let src = self.tmp.row(y);
            let dst = self.gx.row_mut(y);
            for x in 0..w {
                let xm1 = x.saturating_sub(1);
                let xp1 = (x + 1).min(w - 1);
                dst[x] = 0.25 * (src[xm1] + 2.0 * src[x] + src[xp1]);
            }
        }

        for y in 0..h {
            let ym1 = y.saturating_sub(1);
            let yp1 = (y + 1).min(h - 1);
            for x in 0..w {
                let s = self.gx.row(ym1)[x] + 2.0 * self.gx.row(y)[x] + self.gx.row(yp1)[x];
                self.tmp.row_mut(y)[x] = 0.25 * s;
            }
        }
    }

    fn compute_gradient(&mut self, op: GradientOperator) {
        let (w, h) = self.tmp.dims();
        let (a, b) = op.weights();
        let src = self.tmp.data();
        let gx = self.gx.data_mut();
        let gy = self.gy.data_mut();
        let mag = self.mag.data_mut();

        for y in 0..h {
            let ym1 = y.saturating_sub(1);
            let yp1 = (y + 1).min(h - 1);
            for x in 0..w {
                let xm1 = x.saturating_sub(1);
                let xp1 = (x + 1).min(w - 1);

                let p00 = src[ym1 * w + xm1];
                let p01 = src[ym1 * w + x];
                let p02 = src[ym1 * w + xp1];
                let p10 = src[y * w + xm1];
                let p12 = src[y * w + xp1];
                let p20 = src[yp1 * w + xm1];
                let p21 = src[yp1 * w + x];
                let p22 = src[yp1 * w + xp1];

                let dx = (a * p02 + b * p12 + a * p22) - (a * p00 + b * p10 + a * p20);
                let dy = (a * p20 + b * p21 + a * p22) - (a * p00 + b * p01 + a * p02);

                let idx = y * w + x;
                gx[idx] = dx;
                gy[idx] = dy;
                mag[idx] = (dx * dx + dy * dy).sqrt();
            }
        }
    }

    fn non_max_suppression(&mut self) {
        let (w, h) = self.tmp.dims();
        let gx = self.gx.data();
        let gy = self.gy.data();
        let mag = self.mag.data();
        let nms = self.nms.data_mut();

        nms.fill(0.0);
        if w < 3 || h < 3 {
            return;
        }

        const TAN22_5: f32 = 0.414_213_57;
        const TAN67_5: f32 = 2.414_213_7;

        for y in 1..(h - 1) {
            for x in 1..(w - 1) {
                let idx = y * w + x;
                let m = mag[idx];
                if m <= 0.0 {
                    continue;
                }

                let ax = gx[idx].abs();
                let ay = gy[idx].abs();
                let (i1, i2) = if ay <= ax * TAN22_5 {
                    (idx - 1, idx + 1)
                } else if ay >= ax * TAN67_5 {
                    (idx - w, idx + w)
                } else if gx[idx] * gy[idx] > 0.0 {
                    (idx - w - 1, idx + w + 1)
                } else {
                    (idx - w + 1, idx + w - 1)
                };

                if m >= mag[i1] && m >= mag[i2] {
                    nms[idx] = m;
                }
            }
        }
    }

    fn hysteresis(&mut self, cfg: &Edge2DConfig) -> usize {
        let (w, h) = self.tmp.dims();

        self.weak.fill(false);
        self.accepted.fill(false);
        self.stack.clear();

        let mut low = cfg.low_thresh;
        let mut high = cfg.high_thresh;

        if low == 0.0 && high == 0.0 {
            let max_nms = self.nms.data().iter().copied().fold(0.0f32, f32::max);
            if max_nms <= 0.0 {
                return 0;
            }
            high = 0.2 * max_nms;
            low = 0.1 * max_nms;
        }

        if high < low {
            core::mem::swap(&mut high, &mut low);
        }

        for (idx, &v) in self.nms.data().iter().enumerate() {
            if v <= 0.0 {
                continue;
            }
            if v >= low {
                self.weak[idx] = true;
            }
            if v >= high {
                self.accepted[idx] = true;
                self.stack.push(idx);
            }
        }

        let mut count = self.stack.len();

        while let Some(idx) = self.stack.pop() {
            let x = idx % w;
            let y = idx / w;

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let nidx = ny * w + nx;
                    if !self.accepted[nidx] && self.weak[nidx] {
                        self.accepted[nidx] = true;
                        self.stack.push(nidx);
                        count += 1;
                    }
                }
            }
        }

        count
    }

    fn build_edgels(&self, cfg: &Edge2DConfig, count_hint: usize) -> Vec<Edgel> {
        let (w, h) = self.tmp.dims();
        let gx = self.gx.data();
        let gy = self.gy.data();
        let mag = self.mag.data();
        let nms_data = self.nms.data();
        let nms_view = self.nms.as_view();

        let mut out = Vec::with_capacity(count_hint);

        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                if !self.accepted[idx] || mag[idx] <= 1e-12 {
                    continue;
                }

                let n = Vec2f::new(gx[idx], gy[idx]).normalize();
                if n.norm() <= 1e-6 {
                    continue;
                }

                let mut t = 0.0f32;
                if cfg.subpix == Subpix2D::ParabolicAlongNormal {
                    let s0 = nms_data[idx];
                    let sp = sample_bilinear_f32(
                        &nms_view,
                        x as f32 + n.x,
                        y as f32 + n.y,
                        &cfg.border,
                    );
                    let sm = sample_bilinear_f32(
                        &nms_view,
                        x as f32 - n.x,
                        y as f32 - n.y,
                        &cfg.border,
                    );
                    let denom = sm - 2.0 * s0 + sp;
                    if denom.abs() > 1e-12 {
                        let tt = 0.5 * (sm - sp) / denom;
                        if tt.is_finite() {
                            t = tt.clamp(-1.0, 1.0);
                        }
                    }
                }

                out.push(Edgel {
                    p: Point2f::new(x as f32 + t * n.x, y as f32 + t * n.y),
                    n,
                    strength: nms_data[idx],
                    idx: (x, y),
                });
            }
        }

        out
    }
}

impl Default for Edge2DDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Unnormalized Sobel gradient magnitude with clamped borders.
pub fn sobel_magnitude(img: &ImageView<'_, f32>) -> Image<f32> {
    let (w, h) = (img.width(), img.height());
    Image::from_fn(w, h, |x, y| {
        let at = |dx: isize, dy: isize| -> f32 {
            let xx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
            let yy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
            img.row(yy)[xx]
        };
        let gx = (at(1, -1) + 2.0 * at(1, 0) + at(1, 1)) - (at(-1, -1) + 2.0 * at(-1, 0) + at(-1, 1));
        let gy = (at(-1, 1) + 2.0 * at(0, 1) + at(1, 1)) - (at(-1, -1) + 2.0 * at(0, -1) + at(1, -1));
        (gx * gx + gy * gy).sqrt()
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use vt_core::Image;

    use crate::edge2d::{Edge2DConfig, Edge2DDetector, Edgel, GradientOperator, Subpix2D, sobel_magnitude};

    /// Smooth 0..255 step whose boundary is the line `n . p = t`.
    fn slanted_step(w: usize, h: usize, theta_deg: f32) -> (Image<u8>, [f32; 2], f32) {
        let th = theta_deg.to_radians();
        let n = [th.cos(), th.sin()];
        let t = n[0] * (0.5 * w as f32) + n[1] * (0.5 * h as f32);
        let img = Image::from_fn(w, h, |x, y| {
            let d = n[0] * x as f32 + n[1] * y as f32 - t;
            let v = 1.0 / (1.0 + (-1.6 * d).exp());
            (v * 255.0).round() as u8
        });
        (img, n, t)
    }

    fn median_abs_distance(edgels: &[Edgel], n: [f32; 2], t: f32) -> f32 {
        let mut d: Vec<f32> = edgels
            .iter()
            .map(|e| (n[0] * e.p.x + n[1] * e.p.y - t).abs())
            .collect();
        d.sort_by(f32::total_cmp);
        d[d.len() / 2]
    }

    #[test]
    fn slanted_edge_subpixel_is_accurate() {
        let (img, n, t) = slanted_step(128, 96, 20.0);
        let mut det = Edge2DDetector::new();

        let e_none = det.detect_u8(
            &img.as_view(),
            &Edge2DConfig {
                subpix: Subpix2D::None,
                ..Edge2DConfig::default()
            },
        );
        let e_sub = det.detect_u8(&img.as_view(), &Edge2DConfig::default());

        assert!(e_none.len() > 80);
        assert!(e_sub.len() > 80);
        assert!(median_abs_distance(&e_none, n, t) <= 0.5);
        assert!(median_abs_distance(&e_sub, n, t) <= 0.25);
    }

    #[test]
    fn normals_point_brightward_for_both_operators() {
        let img = Image::from_fn(64, 48, |x, _| if x >= 30 { 200u8 } else { 20 });
        let mut det = Edge2DDetector::new();
        for operator in [GradientOperator::Sobel, GradientOperator::Scharr] {
            let cfg = Edge2DConfig {
                operator,
                ..Edge2DConfig::default()
            };
            let edgels = det.detect_u8(&img.as_view(), &cfg);
            assert!(!edgels.is_empty());
            assert!(edgels.iter().all(|e| e.n.x > 0.9));
        }
    }

    #[test]
    fn threshold_levels_affect_edge_count_and_mask() {
        let (img, _, _) = slanted_step(128, 96, 20.0);
        let mut det = Edge2DDetector::new();

        let lo = Edge2DConfig {
            low_thresh: 25.0,
            high_thresh: 50.0,
            ..Edge2DConfig::default()
        };
        let c_lo = det.detect_u8(&img.as_view(), &lo).len();
        let mask_on = det.edge_mask().data().iter().filter(|&&v| v == 255).count();
        assert!(c_lo > 0);
        assert_eq!(mask_on, c_lo);

        let hi = Edge2DConfig {
            low_thresh: 1.0e9,
            high_thresh: 1.0e9,
            ..Edge2DConfig::default()
        };
        assert_eq!(det.detect_u8(&img.as_view(), &hi).len(), 0);
        assert!(det.edge_mask().data().iter().all(|&v| v == 0));
    }

    #[test]
    fn sobel_magnitude_of_vertical_step() {
        let img = Image::from_fn(8, 5, |x, _| if x >= 4 { 10.0f32 } else { 0.0 });
        let mag = sobel_magnitude(&img.as_view());
        assert_abs_diff_eq!(*mag.get(3, 2).expect("in bounds"), 40.0, epsilon = 1e-5);
        assert_abs_diff_eq!(*mag.get(4, 2).expect("in bounds"), 40.0, epsilon = 1e-5);
        assert_abs_diff_eq!(*mag.get(0, 2).expect("in bounds"), 0.0, epsilon = 1e-5);
    }
}
