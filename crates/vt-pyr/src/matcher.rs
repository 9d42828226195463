//! Coarse-to-fine ZNCC template matching.
//!
//! The top pyramid level is searched exhaustively; every surviving
//! candidate is then refined inside a small window on each finer level.
//! Positions are the template's top-left corner in level-0 pixels.

use core::fmt;

use vt_core::{Image, ImageView};

use crate::pyramid::{PyramidF32, max_build_levels};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    EmptyTemplate,
    /// Template has (near) zero variance; ZNCC is undefined.
    FlatTemplate,
    TemplateLargerThanImage {
        template: (usize, usize),
        image: (usize, usize),
    },
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTemplate => write!(f, "template is empty"),
            Self::FlatTemplate => write!(f, "template has no contrast"),
            Self::TemplateLargerThanImage { template, image } => write!(
                f,
                "template {}x{} does not fit image {}x{}",
                template.0, template.1, image.0, image.1
            ),
        }
    }
}

impl std::error::Error for MatchError {}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Requested pyramid depth (1 = full resolution only).
    pub levels: usize,
    pub min_score: f32,
    pub max_matches: usize,
    /// Minimum distance between two reported matches, level-0 pixels.
    pub nms_radius: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            levels: 3,
            min_score: 0.7,
            max_matches: 1,
            nms_radius: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Template pixels with a precomputed pyramid.
#[derive(Debug, Clone)]
pub struct Template {
    pixels: Image<u8>,
    pyramid: PyramidF32,
}

impl Template {
    pub fn new(pixels: Image<u8>) -> Result<Self, MatchError> {
        if pixels.is_empty() {
            return Err(MatchError::EmptyTemplate);
        }
        let mut pyramid = PyramidF32::new();
        pyramid.build_from_u8(&pixels.as_view(), 8);
        let base = pyramid.level(0).ok_or(MatchError::EmptyTemplate)?;
        if stats(&base.as_view(), 0, 0, base.width(), base.height()).1 <= 1e-6 {
            return Err(MatchError::FlatTemplate);
        }
        Ok(Self { pixels, pyramid })
    }

    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &Image<u8> {
        &self.pixels
    }
}

#[derive(Debug, Clone)]
pub struct Matcher {
    template: Template,
    config: MatchConfig,
}

impl Matcher {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            config: MatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Matches sorted by descending score, at most `max_matches`.
    pub fn match_image(&self, img: &ImageView<'_, u8>) -> Result<Vec<Match>, MatchError> {
        let (tw, th) = (self.template.width(), self.template.height());
        if tw > img.width() || th > img.height() {
            return Err(MatchError::TemplateLargerThanImage {
                template: (tw, th),
                image: (img.width(), img.height()),
            });
        }

        let levels = self.usable_levels(img.width(), img.height());
        let mut pyr = PyramidF32::new();
        pyr.build_from_u8(img, levels);

        let top = levels - 1;
        let (Some(img_top), Some(tpl_top)) = (pyr.level(top), self.template.pyramid.level(top))
        else {
            return Ok(Vec::new());
        };

        let scale = (1usize << top) as f32;
        let coarse_floor = (self.config.min_score - 0.25).max(-1.0);
        let keep = self.config.max_matches.max(1) * 4 + 4;
        let mut candidates = exhaustive(&img_top.as_view(), &tpl_top.as_view(), coarse_floor);
        candidates = suppress(candidates, (self.config.nms_radius / scale).max(1.0), keep);

        for level in (0..top).rev() {
            let (Some(il), Some(tl)) = (pyr.level(level), self.template.pyramid.level(level)) else {
                return Ok(Vec::new());
            };
            candidates = candidates
                .into_iter()
                .map(|c| refine(&il.as_view(), &tl.as_view(), 2.0 * c.x, 2.0 * c.y, 2))
                .collect();
        }

        let mut found: Vec<Match> = candidates
            .into_iter()
            .filter(|m| m.score >= self.config.min_score)
            .collect();
        found = suppress(found, self.config.nms_radius.max(1.0), self.config.max_matches.max(1));

        if let Some(base) = pyr.level(0) {
            let tpl = self.template.pyramid.level(0);
            for m in &mut found {
                if let Some(tpl) = tpl {
                    subpixel(&base.as_view(), &tpl.as_view(), m);
                }
            }
        }
        Ok(found)
    }

    /// Deepest level at which the template stays at least 4 px on each side.
    fn usable_levels(&self, img_w: usize, img_h: usize) -> usize {
        let (mut tw, mut th) = (self.template.width(), self.template.height());
        let mut levels = 1;
        while levels < self.config.levels && tw / 2 >= 4 && th / 2 >= 4 {
            tw /= 2;
            th /= 2;
            levels += 1;
        }
        levels
            .min(max_build_levels(img_w, img_h, levels))
            .min(self.template.pyramid.num_levels())
            .max(1)
    }
}

/// Zero-normalized cross-correlation of `tpl` against `img` at `(x, y)`.
/// Flat windows score 0.
pub fn zncc_at(img: &ImageView<'_, f32>, tpl: &ImageView<'_, f32>, x: usize, y: usize) -> f32 {
    let (tw, th) = (tpl.width(), tpl.height());
    if x + tw > img.width() || y + th > img.height() || tw == 0 || th == 0 {
        return 0.0;
    }
    let (tm, ts) = stats(tpl, 0, 0, tw, th);
    let (im, is) = stats(img, x, y, tw, th);
    if ts <= 1e-6 || is <= 1e-6 {
        return 0.0;
    }

    let mut acc = 0.0f64;
    for ty in 0..th {
        let irow = &img.row(y + ty)[x..x + tw];
        for (&iv, &tv) in irow.iter().zip(tpl.row(ty)) {
            acc += (iv as f64 - im) * (tv as f64 - tm);
        }
    }
    ((acc / (is * ts)) as f32).clamp(-1.0, 1.0)
}

/// Mean and root of the centered sum of squares of a window.
fn stats(img: &ImageView<'_, f32>, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
    let n = (w * h) as f64;
    let mut sum = 0.0f64;
    let mut sum2 = 0.0f64;
    for yy in y..y + h {
        for &v in &img.row(yy)[x..x + w] {
            sum += v as f64;
            sum2 += v as f64 * v as f64;
        }
    }
    let mean = sum / n;
    let var = (sum2 - sum * mean).max(0.0);
    (mean, var.sqrt())
}

fn exhaustive(img: &ImageView<'_, f32>, tpl: &ImageView<'_, f32>, floor: f32) -> Vec<Match> {
    let mut out = Vec::new();
    for y in 0..=(img.height() - tpl.height()) {
        for x in 0..=(img.width() - tpl.width()) {
            let score = zncc_at(img, tpl, x, y);
            if score >= floor {
                out.push(Match {
                    x: x as f32,
                    y: y as f32,
                    score,
                });
            }
        }
    }
    out
}

fn refine(img: &ImageView<'_, f32>, tpl: &ImageView<'_, f32>, cx: f32, cy: f32, r: isize) -> Match {
    let max_x = (img.width() - tpl.width()) as isize;
    let max_y = (img.height() - tpl.height()) as isize;
    let mut best = Match {
        x: cx,
        y: cy,
        score: f32::NEG_INFINITY,
    };
    for dy in -r..=r {
        for dx in -r..=r {
            let x = (cx as isize + dx).clamp(0, max_x);
            let y = (cy as isize + dy).clamp(0, max_y);
            let score = zncc_at(img, tpl, x as usize, y as usize);
            if score > best.score {
                best = Match {
                    x: x as f32,
                    y: y as f32,
                    score,
                };
            }
        }
    }
    best
}

/// Parabolic refinement of an integer peak along x and y independently.
fn subpixel(img: &ImageView<'_, f32>, tpl: &ImageView<'_, f32>, m: &mut Match) {
    let (x, y) = (m.x as usize, m.y as usize);
    let offset = |s_m: f32, s_0: f32, s_p: f32| {
        let denom = s_m - 2.0 * s_0 + s_p;
        if denom.abs() < 1e-9 {
            0.0
        } else {
            (0.5 * (s_m - s_p) / denom).clamp(-0.5, 0.5)
        }
    };
    if x > 0 && x + tpl.width() < img.width() {
        let sm = zncc_at(img, tpl, x - 1, y);
        let sp = zncc_at(img, tpl, x + 1, y);
        m.x += offset(sm, m.score, sp);
    }
    if y > 0 && y + tpl.height() < img.height() {
        let sm = zncc_at(img, tpl, x, y - 1);
        let sp = zncc_at(img, tpl, x, y + 1);
        m.y += offset(sm, m.score, sp);
    }
}

/// Greedy non-maximum suppression: best first, drop anything closer than
/// `radius` to a kept match.
fn suppress(mut matches: Vec<Match>, radius: f32, keep: usize) -> Vec<Match> {
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    let r2 = radius * radius;
    let mut out: Vec<Match> = Vec::new();
    for m in matches {
        if out.len() >= keep {
            break;
        }
        let close = out.iter().any(|k| {
            let dx = k.x - m.x;
            let dy = k.y - m.y;
            dx * dx + dy * dy < r2
        });
        if !close {
            out.push(m);
        }
    }
    out
}
