//! Line fit: calipers spread along a nominal segment, each searching
//! across it, then a RANSAC line through the edge points.

use serde::{Deserialize, Serialize};
use vt_core::{Frame, Point2f};

use crate::error::ToolError;
use crate::fit::{RansacConfig, fit_line_ransac};
use crate::result::{Color, GraphicOverlay, VisionResult};
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::probe::{EdgeSearch, Probes};
use crate::tools::tool_basics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LineFitParams {
    pub start_x: f32,
    pub start_y: f32,
    pub end_x: f32,
    pub end_y: f32,
    /// `2..=256`.
    pub caliper_count: usize,
    #[serde(flatten)]
    pub search: EdgeSearch,
    #[serde(flatten)]
    pub ransac: RansacConfig,
}

impl Default for LineFitParams {
    fn default() -> Self {
        Self {
            start_x: 0.0,
            start_y: 0.0,
            end_x: 100.0,
            end_y: 0.0,
            caliper_count: 10,
            search: EdgeSearch::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl LineFitParams {
    pub fn sanitized(self) -> Self {
        Self {
            caliper_count: self.caliper_count.clamp(2, 256),
            search: self.search.sanitized(),
            ransac: self.ransac.sanitized(),
            ..self
        }
    }

    pub fn start(&self) -> Point2f {
        Point2f::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Point2f {
        Point2f::new(self.end_x, self.end_y)
    }
}

#[derive(Debug, Clone)]
pub struct LineFitTool {
    common: ToolCommon,
    params: LineFitParams,
    cache: ToolCache,
}

tool_basics!(LineFitTool, LineFitParams, ToolKind::LineFit);

impl LineFitTool {
    pub fn set_segment(&mut self, start: Point2f, end: Point2f) {
        self.params.start_x = start.x;
        self.params.start_y = start.y;
        self.params.end_x = end.x;
        self.params.end_y = end.y;
    }

    pub fn set_caliper_count(&mut self, count: usize) {
        self.params.caliper_count = count.clamp(2, 256);
    }
}

impl VisionTool for LineFitTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::LineFit
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let p = &self.params;
        let shift = self.common.geometry_shift(ctx, p.start().lerp(p.end(), 0.5));
        let (start, end) = (p.start() + shift, p.end() + shift);
        if start.distance(end) < 1.0 {
            return Err(ToolError::Degenerate("line segment shorter than one pixel".to_owned()));
        }

        let region = self.common.work_region(input, ctx);
        let gray = region.image.to_gray8();
        if gray.is_empty() {
            return Err(ToolError::InvalidInput("empty image".to_owned()));
        }

        let dir = (end - start).normalize();
        let n = p.caliper_count;
        let segments = (0..n)
            .map(|i| {
                let center = start.lerp(end, (i as f32 + 0.5) / n as f32);
                p.search.segment(center, dir.perp())
            })
            .collect();
        let probes = Probes::run(&p.search, &region, &gray, segments);
        if probes.hits.len() < 2 {
            return Ok(VisionResult::failure(format!(
                "only {} of {n} calipers found an edge",
                probes.hits.len()
            )));
        }

        let model = fit_line_ransac(&probes.hits, &p.ransac)?;
        // Keep the fitted direction in the sense of the nominal segment.
        let u = if model.direction.dot(dir) < 0.0 {
            model.direction * -1.0
        } else {
            model.direction
        };
        let project = |q: Point2f| model.point + u * (q - model.point).dot(u);
        let (a, b) = (project(start), project(end));
        let angle = (u.y as f64).atan2(u.x as f64).to_degrees();

        let mut result = VisionResult::ok(format!(
            "line at {angle:.2} deg, {} of {} points",
            model.num_inliers,
            probes.hits.len()
        ));
        result.insert("Angle", angle);
        result.insert("Rms", model.rms);
        result.insert("InlierCount", model.num_inliers);
        result.insert("EdgePointCount", probes.hits.len());
        result.insert("StartX", a.x);
        result.insert("StartY", a.y);
        result.insert("EndX", b.x);
        result.insert("EndY", b.y);

        probes.annotate(&mut result, &model.inlier_mask);
        result.push_graphic(GraphicOverlay::line(a, b, Color::MAGENTA));
        if region.scoped {
            result.push_graphic(GraphicOverlay::rectangle(region.rect, Color::BLUE));
        }
        result.position = Some(a.lerp(b, 0.5));
        result.render_overlay(input);
        Ok(result)
    }
}
