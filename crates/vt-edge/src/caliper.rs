//! Caliper: 1D edge measurement along a search segment.
//!
//! A profile is sampled at unit steps from `start` to `end`, averaging
//! `search_width` bilinear samples across the segment. Edge candidates are
//! local gradient extrema; each is scored through an [`EdgeScorer`].
//!
//! Positions `t` are in pixels along the segment, `0` at `start`.

use std::fmt::Debug;
use std::sync::Arc;

use vt_core::{BorderMode, ImageView, Point2f, Vec2f, sample_bilinear_f32};

use crate::edge1d::{Edge1DConfig, Edge1DDetector, EdgePolarity, SubpixRefine};
use crate::pair::{EdgePair, EdgePairConfig, PairCandidate, best_edge_pair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaliperPolarity {
    #[default]
    Any,
    DarkToLight,
    LightToDark,
}

impl CaliperPolarity {
    pub fn accepts(self, p: EdgePolarity) -> bool {
        match self {
            Self::Any => true,
            Self::DarkToLight => p == EdgePolarity::Rising,
            Self::LightToDark => p == EdgePolarity::Falling,
        }
    }

    fn as_edge(self) -> Option<EdgePolarity> {
        match self {
            Self::Any => None,
            Self::DarkToLight => Some(EdgePolarity::Rising),
            Self::LightToDark => Some(EdgePolarity::Falling),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaliperConfig {
    pub start: Point2f,
    pub end: Point2f,
    /// Number of parallel sample lines averaged into the profile.
    pub search_width: usize,
    /// Smoothing extent; `0` is the raw central difference.
    pub filter_half_width: f32,
    pub edge_threshold: f32,
    pub polarity: CaliperPolarity,
    /// Fraction of the segment length, `0..=1`.
    pub expected_position: f32,
    /// Fraction of the segment length; `0` disables the position term.
    pub position_sigma: f32,
    pub max_edges: usize,
    /// Width measurement: the best opposite-polarity pair within span.
    pub pair: Option<EdgePairConfig>,
}

impl Default for CaliperConfig {
    fn default() -> Self {
        Self {
            start: Point2f::new(0.0, 0.0),
            end: Point2f::new(100.0, 0.0),
            search_width: 5,
            filter_half_width: 2.0,
            edge_threshold: 20.0,
            polarity: CaliperPolarity::Any,
            expected_position: 0.5,
            position_sigma: 0.0,
            max_edges: 1,
            pair: None,
        }
    }
}

impl CaliperConfig {
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    pub fn direction(&self) -> Vec2f {
        (self.end - self.start).normalize()
    }

    /// Derivative-of-Gaussian sigma: `max(h / 2, 0.5)`, or `0` for `h = 0`.
    pub fn smoothing_sigma(&self) -> f32 {
        if self.filter_half_width <= 0.0 {
            0.0
        } else {
            (0.5 * self.filter_half_width).max(0.5)
        }
    }
}

/// An unscored gradient extremum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCandidate {
    pub t: f32,
    pub gradient: f32,
    pub polarity: EdgePolarity,
}

/// Profile-wide values a scorer may normalize against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringContext {
    pub length: f32,
    pub max_abs_gradient: f32,
    pub expected_position: f32,
    pub position_sigma: f32,
    pub polarity: CaliperPolarity,
}

/// Scores a candidate edge into `[0, 1]`.
pub trait EdgeScorer: Debug + Send + Sync {
    fn score(&self, candidate: &EdgeCandidate, ctx: &ScoringContext) -> f32;
}

/// `(wc*c + wp*p + wq*q) / (wc + wp + wq)`:
/// `c` normalized contrast, `p` Gaussian proximity to the expected
/// position, `q` polarity agreement (`0.5` for [`CaliperPolarity::Any`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEdgeScorer {
    pub contrast_weight: f32,
    pub position_weight: f32,
    pub polarity_weight: f32,
}

impl Default for WeightedEdgeScorer {
    fn default() -> Self {
        Self {
            contrast_weight: 1.0,
            position_weight: 0.0,
            polarity_weight: 0.0,
        }
    }
}

impl WeightedEdgeScorer {
    pub fn contrast(candidate: &EdgeCandidate, ctx: &ScoringContext) -> f32 {
        if ctx.max_abs_gradient <= f32::EPSILON {
            return 0.0;
        }
        (candidate.gradient.abs() / ctx.max_abs_gradient).clamp(0.0, 1.0)
    }

    pub fn proximity(&self, candidate: &EdgeCandidate, ctx: &ScoringContext) -> f32 {
        let sigma = ctx.position_sigma * ctx.length;
        if sigma <= f32::EPSILON || self.position_weight <= 0.0 {
            return 1.0;
        }
        let d = candidate.t - ctx.expected_position * ctx.length;
        (-(d * d) / (2.0 * sigma * sigma)).exp()
    }

    pub fn polarity_agreement(candidate: &EdgeCandidate, ctx: &ScoringContext) -> f32 {
        match ctx.polarity {
            CaliperPolarity::Any => 0.5,
            p if p.accepts(candidate.polarity) => 1.0,
            _ => 0.0,
        }
    }
}

impl EdgeScorer for WeightedEdgeScorer {
    fn score(&self, candidate: &EdgeCandidate, ctx: &ScoringContext) -> f32 {
        let wc = self.contrast_weight.max(0.0);
        let wp = self.position_weight.max(0.0);
        let wq = self.polarity_weight.max(0.0);
        let c = Self::contrast(candidate, ctx);

        let total = wc + wp + wq;
        if total <= f32::EPSILON {
            return c;
        }
        let p = self.proximity(candidate, ctx);
        let q = Self::polarity_agreement(candidate, ctx);
        ((wc * c + wp * p + wq * q) / total).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaliperEdge {
    pub t: f32,
    /// Absolute image position.
    pub point: Point2f,
    pub gradient: f32,
    /// `|gradient| / max|gradient|` over the profile.
    pub contrast: f32,
    pub score: f32,
    pub polarity: EdgePolarity,
}

impl PairCandidate for CaliperEdge {
    fn position(&self) -> f32 {
        self.t
    }

    fn polarity(&self) -> EdgePolarity {
        self.polarity
    }

    fn pair_weight(&self) -> f32 {
        self.score
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaliperMeasurement {
    /// Best edges, descending score.
    pub edges: Vec<CaliperEdge>,
    pub pair: Option<EdgePair<CaliperEdge>>,
    pub profile: Vec<f32>,
    pub gradient: Vec<f32>,
}

/// Averages `width` bilinear lines parallel to `start -> end`, one sample
/// per pixel of length (`floor(L) + 1` samples).
pub fn sample_profile<T: Copy + Into<f32>>(
    img: &ImageView<'_, T>,
    start: Point2f,
    end: Point2f,
    width: usize,
) -> Vec<f32> {
    let length = start.distance(end);
    if !length.is_finite() || length < 1.0 {
        return Vec::new();
    }
    let u = (end - start).normalize();
    let v = u.perp();
    let width = width.max(1);
    let half = 0.5 * (width as f32 - 1.0);
    let border = BorderMode::Clamp;

    (0..=length.floor() as usize)
        .map(|i| {
            let base = start + u * i as f32;
            let sum: f32 = (0..width)
                .map(|k| {
                    let p = base + v * (k as f32 - half);
                    sample_bilinear_f32(img, p.x, p.y, &border)
                })
                .sum();
            sum / width as f32
        })
        .collect()
}

/// Configured caliper with a swappable scorer. Cloning shares the scorer.
#[derive(Debug, Clone)]
pub struct Caliper {
    pub config: CaliperConfig,
    scorer: Arc<dyn EdgeScorer>,
    detector: Edge1DDetector,
}

impl Caliper {
    pub fn new(config: CaliperConfig) -> Self {
        Self::with_scorer(config, Arc::new(WeightedEdgeScorer::default()))
    }

    pub fn with_scorer(config: CaliperConfig, scorer: Arc<dyn EdgeScorer>) -> Self {
        let sigma = config.smoothing_sigma();
        Self {
            config,
            scorer,
            detector: Edge1DDetector::new(sigma),
        }
    }

    pub fn set_scorer(&mut self, scorer: Arc<dyn EdgeScorer>) {
        self.scorer = scorer;
    }

    pub fn measure<T: Copy + Into<f32>>(&mut self, img: &ImageView<'_, T>) -> CaliperMeasurement {
        let cfg = &self.config;
        let profile = sample_profile(img, cfg.start, cfg.end, cfg.search_width);
        if profile.len() < 3 {
            return CaliperMeasurement {
                profile,
                ..CaliperMeasurement::default()
            };
        }

        let thresh = cfg.edge_threshold.max(0.0);
        let edge_cfg = Edge1DConfig {
            sigma: cfg.smoothing_sigma(),
            border: BorderMode::Reflect101,
            pos_thresh: thresh,
            neg_thresh: thresh,
            refine: SubpixRefine::Parabolic3,
        };
        let peaks = self.detector.detect_in_f32(&profile, &edge_cfg);
        let gradient = self.detector.response().to_vec();

        let ctx = ScoringContext {
            length: cfg.length(),
            max_abs_gradient: gradient.iter().fold(0.0f32, |m, g| m.max(g.abs())),
            expected_position: cfg.expected_position.clamp(0.0, 1.0),
            position_sigma: cfg.position_sigma.max(0.0),
            polarity: cfg.polarity,
        };

        let u = cfg.direction();
        let pair_mode = cfg.pair.is_some();
        let candidates: Vec<CaliperEdge> = peaks
            .iter()
            .filter(|p| pair_mode || cfg.polarity.accepts(p.polarity))
            .map(|p| {
                let cand = EdgeCandidate {
                    t: p.x,
                    gradient: p.value,
                    polarity: p.polarity,
                };
                CaliperEdge {
                    t: p.x,
                    point: cfg.start + u * p.x,
                    gradient: p.value,
                    contrast: WeightedEdgeScorer::contrast(&cand, &ctx),
                    score: self.scorer.score(&cand, &ctx),
                    polarity: p.polarity,
                }
            })
            .collect();

        let pair = cfg.pair.as_ref().and_then(|pc| {
            let pc = EdgePairConfig {
                first_polarity: cfg.polarity.as_edge(),
                ..*pc
            };
            best_edge_pair(&candidates, &pc)
        });

        let mut edges = candidates;
        // Candidates arrive in position order; a stable sort keeps earlier
        // positions first among equal scores.
        edges.sort_by(|a, b| b.score.total_cmp(&a.score));
        edges.truncate(cfg.max_edges.max(1));

        CaliperMeasurement {
            edges,
            pair,
            profile,
            gradient,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;
    use vt_core::{Image, Point2f};

    use super::{
        Caliper, CaliperConfig, CaliperPolarity, EdgeCandidate, EdgeScorer, ScoringContext,
        WeightedEdgeScorer, sample_profile,
    };
    use crate::edge1d::EdgePolarity;
    use crate::pair::EdgePairConfig;

    /// Vertical band `[x0, x1)` of value `hi` on `lo`.
    fn band(w: usize, h: usize, x0: usize, x1: usize, lo: u8, hi: u8) -> Image<u8> {
        Image::from_fn(w, h, |x, _| if x >= x0 && x < x1 { hi } else { lo })
    }

    fn horizontal(y: f32, x0: f32, x1: f32) -> CaliperConfig {
        CaliperConfig {
            start: Point2f::new(x0, y),
            end: Point2f::new(x1, y),
            ..CaliperConfig::default()
        }
    }

    #[test]
    fn profile_has_one_sample_per_pixel() {
        let img = Image::from_fn(20, 10, |x, _| x as f32);
        let p = sample_profile(&img.as_view(), Point2f::new(2.0, 5.0), Point2f::new(12.0, 5.0), 3);
        assert_eq!(p.len(), 11);
        assert_abs_diff_eq!(p[0], 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p[10], 12.0, epsilon = 1e-5);
    }

    #[test]
    fn finds_step_edge_within_half_pixel() {
        let img = band(100, 40, 40, 100, 20, 220);
        let mut cal = Caliper::new(horizontal(20.0, 10.0, 90.0));
        let m = cal.measure(&img.as_view());

        assert_eq!(m.edges.len(), 1);
        let e = &m.edges[0];
        // Step between pixel 39 and 40.
        assert!((e.point.x - 39.5).abs() <= 0.5, "x = {}", e.point.x);
        assert_eq!(e.polarity, EdgePolarity::Rising);
        assert_eq!(m.profile.len(), 81);
        assert_eq!(m.gradient.len(), 81);
    }

    #[test]
    fn polarity_filter_selects_matching_transition() {
        let img = band(120, 30, 40, 80, 30, 200);
        let base = CaliperConfig {
            max_edges: 4,
            ..horizontal(15.0, 10.0, 110.0)
        };

        let mut rising = Caliper::new(CaliperConfig {
            polarity: CaliperPolarity::DarkToLight,
            ..base.clone()
        });
        let m = rising.measure(&img.as_view());
        assert_eq!(m.edges.len(), 1);
        assert!((m.edges[0].point.x - 39.5).abs() <= 0.5);

        let mut falling = Caliper::new(CaliperConfig {
            polarity: CaliperPolarity::LightToDark,
            ..base.clone()
        });
        let m = falling.measure(&img.as_view());
        assert_eq!(m.edges.len(), 1);
        assert!((m.edges[0].point.x - 79.5).abs() <= 0.5);

        let mut any = Caliper::new(base);
        assert_eq!(any.measure(&img.as_view()).edges.len(), 2);
    }

    #[test]
    fn position_weight_prefers_expected_edge() {
        // Equal contrast on both sides; the expected position breaks the tie.
        let img = band(120, 30, 40, 80, 30, 200);
        let scorer = WeightedEdgeScorer {
            contrast_weight: 1.0,
            position_weight: 1.0,
            polarity_weight: 0.0,
        };
        let cfg = CaliperConfig {
            expected_position: 0.7,
            position_sigma: 0.1,
            ..horizontal(15.0, 10.0, 110.0)
        };
        let mut cal = Caliper::with_scorer(cfg, Arc::new(scorer));
        let m = cal.measure(&img.as_view());
        assert_eq!(m.edges.len(), 1);
        assert!((m.edges[0].point.x - 79.5).abs() <= 0.5);
        assert!(m.edges[0].score > 0.0 && m.edges[0].score <= 1.0);
    }

    #[test]
    fn pair_mode_validates_width() {
        let img = band(120, 30, 40, 70, 30, 200);
        let cfg = CaliperConfig {
            pair: Some(EdgePairConfig::around(30.0, 2.0)),
            ..horizontal(15.0, 10.0, 110.0)
        };
        let mut cal = Caliper::new(cfg.clone());
        let pair = cal.measure(&img.as_view()).pair.expect("30 px band");
        assert!((pair.width - 30.0).abs() <= 0.5);
        assert!(pair.bright_on_dark);

        let mut narrow = Caliper::new(CaliperConfig {
            pair: Some(EdgePairConfig::around(12.0, 2.0)),
            ..cfg
        });
        assert!(narrow.measure(&img.as_view()).pair.is_none());
    }

    #[test]
    fn weighted_score_formula() {
        let ctx = ScoringContext {
            length: 100.0,
            max_abs_gradient: 50.0,
            expected_position: 0.5,
            position_sigma: 0.1,
            polarity: CaliperPolarity::DarkToLight,
        };
        let cand = EdgeCandidate {
            t: 60.0,
            gradient: 25.0,
            polarity: EdgePolarity::Rising,
        };
        let s = WeightedEdgeScorer {
            contrast_weight: 1.0,
            position_weight: 1.0,
            polarity_weight: 2.0,
        };
        // c = 0.5, p = exp(-0.5), q = 1.
        let expected = (0.5 + (-0.5f32).exp() + 2.0) / 4.0;
        assert_abs_diff_eq!(s.score(&cand, &ctx), expected, epsilon = 1e-6);

        let any = ScoringContext {
            polarity: CaliperPolarity::Any,
            ..ctx
        };
        let q_only = WeightedEdgeScorer {
            contrast_weight: 0.0,
            position_weight: 0.0,
            polarity_weight: 1.0,
        };
        assert_abs_diff_eq!(q_only.score(&cand, &any), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn short_segment_yields_no_edges() {
        let img = band(10, 10, 5, 10, 0, 255);
        let mut cal = Caliper::new(horizontal(5.0, 4.0, 4.5));
        let m = cal.measure(&img.as_view());
        assert!(m.edges.is_empty());
        assert!(m.pair.is_none());
    }
}
