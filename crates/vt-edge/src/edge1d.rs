use vt_core::BorderMode;

use crate::conv1d::convolve_f32;
use crate::kernels1d::DoGKernel1D;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubpixRefine {
    None,
    Parabolic3,
    Centroid { radius: usize },
}

/// Derivative filter settings. `sigma = 0` selects the raw central
/// difference instead of a derivative-of-Gaussian.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge1DConfig {
    pub sigma: f32,
    pub border: BorderMode<f32>,
    /// Minimum response for rising edges (inclusive).
    pub pos_thresh: f32,
    /// Minimum magnitude for falling edges (inclusive).
    pub neg_thresh: f32,
    pub refine: SubpixRefine,
}

impl Default for Edge1DConfig {
    fn default() -> Self {
        Self {
            sigma: 1.2,
            border: BorderMode::Reflect101,
            pos_thresh: 0.0,
            neg_thresh: 0.0,
            refine: SubpixRefine::Parabolic3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolarity {
    /// Dark to light along the profile.
    Rising,
    /// Light to dark along the profile.
    Falling,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgePeak {
    pub x: f32,
    pub idx: usize,
    pub value: f32,
    pub strength: f32,
    pub polarity: EdgePolarity,
}

/// Reusable 1D edge detector; keeps its kernel and scratch buffers between
/// calls.
#[derive(Debug, Clone)]
pub struct Edge1DDetector {
    kernel: DoGKernel1D,
    resp: Vec<f32>,
    peaks: Vec<EdgePeak>,
}

impl Edge1DDetector {
    pub fn new(sigma: f32) -> Self {
        Self {
            kernel: kernel_for(sigma),
            resp: Vec::new(),
            peaks: Vec::new(),
        }
    }

    pub fn set_sigma(&mut self, sigma: f32) {
        if (sigma - self.kernel.sigma).abs() > f32::EPSILON {
            self.kernel = kernel_for(sigma);
        }
    }

    /// Derivative response of the last detected signal.
    pub fn response(&self) -> &[f32] {
        &self.resp
    }

    pub fn detect_in_f32(&mut self, signal: &[f32], cfg: &Edge1DConfig) -> Vec<EdgePeak> {
        self.detect_in_f32_borrowed(signal, cfg).to_vec()
    }

    pub fn detect_in_u8(&mut self, signal: &[u8], cfg: &Edge1DConfig) -> Vec<EdgePeak> {
        let tmp: Vec<f32> = signal.iter().map(|&v| v as f32).collect();
        self.detect_in_f32(&tmp, cfg)
    }

    pub(crate) fn detect_in_f32_borrowed<'a>(
        &'a mut self,
        signal: &[f32],
        cfg: &Edge1DConfig,
    ) -> &'a [EdgePeak] {
        self.set_sigma(cfg.sigma);

        self.resp.clear();
        self.resp.resize(signal.len(), 0.0);
        if signal.is_empty() {
            self.peaks.clear();
            return &self.peaks;
        }

        convolve_f32(
            signal,
            &self.kernel.dg,
            self.kernel.radius,
            &cfg.border,
            &mut self.resp,
        );

        self.find_local_extrema(cfg)
    }

    fn find_local_extrema(&mut self, cfg: &Edge1DConfig) -> &[EdgePeak] {
        self.peaks.clear();

        if self.resp.len() < 3 {
            return &self.peaks;
        }

        for i in 1..(self.resp.len() - 1) {
            let a = self.resp[i - 1];
            let b = self.resp[i];
            let c = self.resp[i + 1];

            if b > 0.0 && b >= a && b > c && b >= cfg.pos_thresh {
                let x = refine_x(&self.resp, i, cfg.refine);
                self.peaks.push(EdgePeak {
                    x,
                    idx: i,
                    value: b,
                    strength: b,
                    polarity: EdgePolarity::Rising,
                });
            }

            if b < 0.0 && b <= a && b < c && -b >= cfg.neg_thresh {
                let x = refine_x(&self.resp, i, cfg.refine);
                self.peaks.push(EdgePeak {
                    x,
                    idx: i,
                    value: b,
                    strength: -b,
                    polarity: EdgePolarity::Falling,
                });
            }
        }

        &self.peaks
    }
}

fn kernel_for(sigma: f32) -> DoGKernel1D {
    if sigma > 0.0 && sigma.is_finite() {
        DoGKernel1D::new(sigma)
    } else {
        DoGKernel1D::central_difference()
    }
}

fn refine_x(resp: &[f32], idx: usize, method: SubpixRefine) -> f32 {
    match method {
        SubpixRefine::None => idx as f32,
        SubpixRefine::Parabolic3 => {
            let ym1 = resp[idx - 1];
            let y0 = resp[idx];
            let yp1 = resp[idx + 1];
            let denom = ym1 - 2.0 * y0 + yp1;
            if denom.abs() < 1e-12 {
                idx as f32
            } else {
                let delta = (0.5 * (ym1 - yp1) / denom).clamp(-1.0, 1.0);
                idx as f32 + delta
            }
        }
        SubpixRefine::Centroid { radius } => {
            let start = idx.saturating_sub(radius);
            let end = (idx + radius).min(resp.len() - 1);
            let mut sum_w = 0.0f32;
            let mut sum_xw = 0.0f32;
            for (j, &rv) in resp.iter().enumerate().take(end + 1).skip(start) {
                let w = rv.abs();
                sum_w += w;
                sum_xw += (j as f32) * w;
            }
            if sum_w <= f32::EPSILON {
                idx as f32
            } else {
                sum_xw / sum_w
            }
        }
    }
}
