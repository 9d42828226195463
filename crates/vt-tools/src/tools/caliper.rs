//! Caliper tool: edge positions along one search segment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vt_core::{Frame, Point2f};
use vt_edge::{Caliper, CaliperConfig, CaliperPolarity, EdgePairConfig, WeightedEdgeScorer};

use crate::error::ToolError;
use crate::result::{Color, GraphicOverlay, VisionResult};
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::tool_basics;

/// Transition accepted while walking from start to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgePolarityMode {
    #[default]
    Any,
    DarkToLight,
    LightToDark,
}

impl From<EdgePolarityMode> for CaliperPolarity {
    fn from(mode: EdgePolarityMode) -> Self {
        match mode {
            EdgePolarityMode::Any => CaliperPolarity::Any,
            EdgePolarityMode::DarkToLight => CaliperPolarity::DarkToLight,
            EdgePolarityMode::LightToDark => CaliperPolarity::LightToDark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CaliperParams {
    pub start_x: f32,
    pub start_y: f32,
    pub end_x: f32,
    pub end_y: f32,
    pub search_width: usize,
    pub filter_half_width: f32,
    pub edge_threshold: f32,
    pub polarity: EdgePolarityMode,
    pub contrast_weight: f32,
    pub position_weight: f32,
    pub polarity_weight: f32,
    /// Fraction of the segment length, `0..=1`.
    pub expected_position: f32,
    /// Fraction of the segment length.
    pub position_sigma: f32,
    pub max_edges: usize,
    pub pair_mode: bool,
    pub expected_width: f32,
    pub width_tolerance: f32,
}

impl Default for CaliperParams {
    fn default() -> Self {
        Self {
            start_x: 0.0,
            start_y: 0.0,
            end_x: 100.0,
            end_y: 0.0,
            search_width: 5,
            filter_half_width: 2.0,
            edge_threshold: 20.0,
            polarity: EdgePolarityMode::Any,
            contrast_weight: 1.0,
            position_weight: 0.0,
            polarity_weight: 0.0,
            expected_position: 0.5,
            position_sigma: 0.0,
            max_edges: 1,
            pair_mode: false,
            expected_width: 20.0,
            width_tolerance: 5.0,
        }
    }
}

fn non_negative(v: f32) -> f32 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

impl CaliperParams {
    pub fn sanitized(self) -> Self {
        Self {
            search_width: self.search_width.clamp(1, 255),
            filter_half_width: non_negative(self.filter_half_width),
            edge_threshold: non_negative(self.edge_threshold),
            contrast_weight: non_negative(self.contrast_weight),
            position_weight: non_negative(self.position_weight),
            polarity_weight: non_negative(self.polarity_weight),
            expected_position: non_negative(self.expected_position).min(1.0),
            position_sigma: non_negative(self.position_sigma),
            max_edges: self.max_edges.clamp(1, 256),
            expected_width: non_negative(self.expected_width),
            width_tolerance: non_negative(self.width_tolerance),
            ..self
        }
    }

    pub fn start(&self) -> Point2f {
        Point2f::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Point2f {
        Point2f::new(self.end_x, self.end_y)
    }

    pub fn scorer(&self) -> WeightedEdgeScorer {
        WeightedEdgeScorer {
            contrast_weight: self.contrast_weight,
            position_weight: self.position_weight,
            polarity_weight: self.polarity_weight,
        }
    }

    /// Measurement config for a segment given in work-region coordinates.
    pub(crate) fn caliper_config(&self, start: Point2f, end: Point2f) -> CaliperConfig {
        CaliperConfig {
            start,
            end,
            search_width: self.search_width,
            filter_half_width: self.filter_half_width,
            edge_threshold: self.edge_threshold,
            polarity: self.polarity.into(),
            expected_position: self.expected_position,
            position_sigma: self.position_sigma,
            max_edges: self.max_edges,
            pair: self
                .pair_mode
                .then(|| EdgePairConfig::around(self.expected_width, self.width_tolerance)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaliperTool {
    common: ToolCommon,
    params: CaliperParams,
    cache: ToolCache,
}

tool_basics!(CaliperTool, CaliperParams, ToolKind::Caliper);

impl CaliperTool {
    pub fn set_segment(&mut self, start: Point2f, end: Point2f) {
        self.params.start_x = start.x;
        self.params.start_y = start.y;
        self.params.end_x = end.x;
        self.params.end_y = end.y;
    }

    pub fn set_polarity(&mut self, polarity: EdgePolarityMode) {
        self.params.polarity = polarity;
    }

    pub fn set_pair_mode(&mut self, expected_width: f32, tolerance: f32) {
        self.set_params(CaliperParams {
            pair_mode: true,
            expected_width,
            width_tolerance: tolerance,
            ..self.params.clone()
        });
    }

    /// Averaged intensity profile of the last run.
    pub fn last_profile(&self) -> Option<&[f32]> {
        self.last_series("Profile")
    }

    /// Smoothed derivative of [`Self::last_profile`].
    pub fn last_gradient(&self) -> Option<&[f32]> {
        self.last_series("Gradient")
    }

    fn last_series(&self, name: &str) -> Option<&[f32]> {
        self.cache
            .last_result
            .as_ref()
            .and_then(|r| r.series.get(name))
            .map(Vec::as_slice)
    }
}

impl VisionTool for CaliperTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::Caliper
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let p = &self.params;
        let shift = self.common.geometry_shift(ctx, p.start().lerp(p.end(), 0.5));
        let (start, end) = (p.start() + shift, p.end() + shift);
        if start.distance(end) < 1.0 {
            return Err(ToolError::Degenerate("caliper segment shorter than one pixel".to_owned()));
        }

        let region = self.common.work_region(input, ctx);
        let gray = region.image.to_gray8();
        if gray.is_empty() {
            return Err(ToolError::InvalidInput("empty image".to_owned()));
        }
        let offset = region.offset();
        let cfg = p.caliper_config(start - offset, end - offset);
        let mut caliper = Caliper::with_scorer(cfg, Arc::new(p.scorer()));
        let m = caliper.measure(&gray.as_view());

        let mut result = if p.pair_mode {
            match &m.pair {
                Some(pair) => VisionResult::ok(format!("pair width {:.2} px", pair.width)),
                None => VisionResult::failure(format!(
                    "no edge pair within {} +/- {} px",
                    p.expected_width, p.width_tolerance
                )),
            }
        } else if m.edges.is_empty() {
            VisionResult::failure("no edge above threshold")
        } else {
            VisionResult::ok(format!("{} edge(s) found", m.edges.len()))
        };
        result.push_graphic(GraphicOverlay::line(start, end, Color::CYAN));

        result.insert("EdgeCount", m.edges.len());
        for (i, e) in m.edges.iter().enumerate() {
            let abs = region.to_absolute(e.point);
            result.insert(format!("Edge{i}.X"), abs.x);
            result.insert(format!("Edge{i}.Y"), abs.y);
            result.insert(format!("Edge{i}.Score"), e.score);
            result.insert(format!("Edge{i}.Contrast"), e.contrast);
            result.push_graphic(GraphicOverlay::cross(abs, 4.0, Color::GREEN).with_label(format!("Edge{i}")));
        }
        result.position = m.edges.first().map(|e| region.to_absolute(e.point));

        if let Some(pair) = &m.pair {
            let a = region.to_absolute(pair.first.point);
            let b = region.to_absolute(pair.second.point);
            let center = a.lerp(b, 0.5);
            result.insert("Width", pair.width);
            result.insert("PairScore", pair.score);
            result.insert("PairCenterX", center.x);
            result.insert("PairCenterY", center.y);
            result.push_graphic(GraphicOverlay::line(a, b, Color::MAGENTA));
            result.position = Some(center);
        }
        if region.scoped {
            result.push_graphic(GraphicOverlay::rectangle(region.rect, Color::BLUE));
        }

        tracing::debug!(edges = m.edges.len(), paired = m.pair.is_some(), "caliper measured");
        if result.success {
            result.render_overlay(input);
        }
        Ok(result
            .with_series("Profile", m.profile)
            .with_series("Gradient", m.gradient))
    }
}

#[cfg(test)]
mod tests {
    use vt_core::{Frame, Image, Point2f, Rect};

    use super::{CaliperParams, CaliperTool, EdgePolarityMode};
    use crate::tool::{ExecContext, VisionTool};

    /// Bright band `[x0, x1)` on a dark background.
    fn band(x0: usize, x1: usize) -> Frame {
        Frame::Gray8(Image::from_fn(120, 40, |x, _| if (x0..x1).contains(&x) { 200 } else { 30 }))
    }

    fn horizontal() -> CaliperParams {
        CaliperParams {
            start_x: 10.0,
            start_y: 20.0,
            end_x: 110.0,
            end_y: 20.0,
            ..CaliperParams::default()
        }
    }

    #[test]
    fn finds_step_edge_with_profile() {
        let mut tool = CaliperTool::with_params(horizontal());
        let r = tool.execute(&band(40, 120));
        assert!(r.success, "{}", r.message);
        assert_eq!(r.get_f64("EdgeCount"), Some(1.0));
        let x = r.get_f64("Edge0.X").expect("x");
        assert!((x - 39.5).abs() <= 0.5, "x = {x}");
        assert_eq!(r.get_f64("Edge0.Y"), Some(20.0));
        assert!(r.overlay_image.is_some());

        assert_eq!(tool.last_profile().map(<[f32]>::len), Some(101));
        assert_eq!(tool.last_gradient().map(<[f32]>::len), Some(101));
    }

    #[test]
    fn polarity_selects_transition() {
        let mut tool = CaliperTool::with_params(CaliperParams {
            polarity: EdgePolarityMode::LightToDark,
            ..horizontal()
        });
        let r = tool.execute(&band(40, 80));
        let x = r.get_f64("Edge0.X").expect("x");
        assert!((x - 79.5).abs() <= 0.5, "x = {x}");

        tool.set_polarity(EdgePolarityMode::DarkToLight);
        let r = tool.execute(&band(40, 80));
        let x = r.get_f64("Edge0.X").expect("x");
        assert!((x - 39.5).abs() <= 0.5, "x = {x}");
    }

    #[test]
    fn pair_width_and_tolerance() {
        let mut tool = CaliperTool::with_params(horizontal());
        tool.set_pair_mode(30.0, 2.0);
        let r = tool.execute(&band(40, 70));
        assert!(r.success, "{}", r.message);
        let w = r.get_f64("Width").expect("width");
        assert!((w - 30.0).abs() <= 0.5, "width = {w}");

        tool.set_pair_mode(12.0, 2.0);
        let r = tool.execute(&band(40, 70));
        assert!(!r.success);
        assert!(r.data.is_empty());
        // Diagnostics survive the failure.
        assert!(tool.last_profile().is_some());
    }

    #[test]
    fn flat_image_fails() {
        let mut tool = CaliperTool::with_params(horizontal());
        let r = tool.execute(&Frame::Gray8(Image::new_fill(120, 40, 90u8)));
        assert!(!r.success);
        assert!(r.position.is_none());
    }

    #[test]
    fn roi_and_reference_shift_keep_absolute_output() {
        let mut tool = CaliperTool::with_params(CaliperParams {
            start_x: 20.0,
            start_y: 20.0,
            end_x: 60.0,
            end_y: 20.0,
            ..CaliperParams::default()
        });
        tool.common_mut().roi = Rect::new(0, 0, 41, 21);
        tool.common_mut().use_roi = true;
        // ROI centre (20, 10) moved to (70, 20): geometry follows by (50, 10).
        let ctx = ExecContext::with_reference(Point2f::new(70.0, 20.0));
        let r = tool.execute_with(&band(80, 120), &ctx);
        assert!(r.success, "{}", r.message);
        let x = r.get_f64("Edge0.X").expect("x");
        assert!((x - 79.5).abs() <= 0.5, "x = {x}");
        assert_eq!(r.get_f64("Edge0.Y"), Some(30.0));
    }

    #[test]
    fn degenerate_segment_is_an_error() {
        let mut tool = CaliperTool::with_params(CaliperParams {
            end_x: 0.0,
            ..CaliperParams::default()
        });
        let r = tool.execute(&band(40, 80));
        assert!(!r.success);
        assert!(r.message.contains("degenerate"), "{}", r.message);
    }
}
