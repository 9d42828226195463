use serde::{Deserialize, Serialize};
use vt_core::{Frame, Image, PixelFormat, Point2f, Rect};

use crate::error::ToolError;
use crate::result::{Color, GraphicOverlay, VisionResult};
use crate::stats::{Histogram256, IntensityStats, histogram_u8, rebin};
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::tool_basics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HistogramParams {
    /// `2..=256`.
    pub bin_count: usize,
    /// Output the histogram-equalized image instead of the plain gray one.
    pub equalize: bool,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            bin_count: 256,
            equalize: false,
        }
    }
}

impl HistogramParams {
    pub fn sanitized(self) -> Self {
        Self {
            bin_count: self.bin_count.clamp(2, 256),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistogramTool {
    common: ToolCommon,
    params: HistogramParams,
    cache: ToolCache,
}

tool_basics!(HistogramTool, HistogramParams, ToolKind::Histogram);

impl HistogramTool {
    pub fn set_bin_count(&mut self, bins: usize) {
        self.params.bin_count = bins.clamp(2, 256);
    }

    pub fn set_equalize(&mut self, equalize: bool) {
        self.params.equalize = equalize;
    }
}

/// Maps levels through the normalized CDF; a single-level image is
/// returned unchanged.
fn equalize(gray: &Image<u8>, hist: &Histogram256) -> Image<u8> {
    let total: u64 = hist.iter().sum();
    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    let cdf_min = hist.iter().copied().find(|&h| h > 0).unwrap_or(0);
    if total == cdf_min {
        return gray.clone();
    }
    let span = (total - cdf_min) as f64;
    for (v, &h) in hist.iter().enumerate() {
        cdf += h;
        let scaled = cdf.saturating_sub(cdf_min) as f64 / span * 255.0;
        lut[v] = scaled.round().clamp(0.0, 255.0) as u8;
    }
    gray.map(|&v| lut[v as usize])
}

/// Bar tops as a polyline across `rect`, baseline on its bottom row.
fn histogram_polyline(bins: &[u64], rect: Rect) -> Vec<Point2f> {
    let peak = bins.iter().copied().max().unwrap_or(0).max(1) as f32;
    let step = rect.width as f32 / bins.len() as f32;
    let bottom = (rect.y + rect.height - 1) as f32;
    let span = (rect.height - 1).max(0) as f32;
    bins.iter()
        .enumerate()
        .map(|(i, &c)| {
            let x = rect.x as f32 + (i as f32 + 0.5) * step;
            Point2f::new(x, bottom - c as f32 / peak * span)
        })
        .collect()
}

impl VisionTool for HistogramTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::Histogram
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let region = self.common.work_region(input, ctx);
        let gray = region.image.to_gray8();
        let hist = histogram_u8(&gray.as_view());
        let Some(stats) = IntensityStats::from_histogram(&hist) else {
            return Err(ToolError::InvalidInput("empty image".to_owned()));
        };
        let p = &self.params;
        let bins = rebin(&hist, p.bin_count);

        let processed = if p.equalize { equalize(&gray, &hist) } else { gray };
        let output = region.restore(&input.convert_to(PixelFormat::Gray8), Frame::Gray8(processed))?;

        let mut result = VisionResult::ok(format!(
            "mean {:.1}, std {:.1} over {} px",
            stats.mean, stats.std_dev, stats.count
        ));
        result.insert("Mean", stats.mean);
        result.insert("StdDev", stats.std_dev);
        result.insert("Min", stats.min as i64);
        result.insert("Max", stats.max as i64);
        result.insert("Median", stats.median as i64);
        result.insert("Mode", stats.mode as i64);
        result.insert("OtsuThreshold", stats.otsu as i64);
        result.push_graphic(GraphicOverlay::polyline(histogram_polyline(&bins, region.rect), Color::CYAN));
        result.push_graphic(GraphicOverlay::rectangle(region.rect, Color::BLUE));

        let series = bins.iter().map(|&c| c as f32).collect();
        Ok(result.with_output(output).with_series("Histogram", series))
    }
}
