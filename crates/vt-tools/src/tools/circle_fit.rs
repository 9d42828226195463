//! Circle fit: radial calipers around a nominal circle, then a RANSAC
//! circle through the edge points.

use core::f32::consts::TAU;

use serde::{Deserialize, Serialize};
use vt_core::{Frame, Point2f, Vec2f};

use crate::error::ToolError;
use crate::fit::{RansacConfig, fit_circle_ransac};
use crate::result::{Color, GraphicOverlay, VisionResult};
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::probe::{EdgeSearch, Probes};
use crate::tools::tool_basics;

/// Walking direction of every radial caliper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchDirection {
    #[default]
    Outward,
    Inward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CircleFitParams {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    /// `3..=360`.
    pub caliper_count: usize,
    pub direction: SearchDirection,
    #[serde(flatten)]
    pub search: EdgeSearch,
    #[serde(flatten)]
    pub ransac: RansacConfig,
}

impl Default for CircleFitParams {
    fn default() -> Self {
        Self {
            center_x: 50.0,
            center_y: 50.0,
            radius: 30.0,
            caliper_count: 16,
            direction: SearchDirection::Outward,
            search: EdgeSearch::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl CircleFitParams {
    pub fn sanitized(self) -> Self {
        Self {
            caliper_count: self.caliper_count.clamp(3, 360),
            search: self.search.sanitized(),
            ransac: self.ransac.sanitized(),
            ..self
        }
    }

    pub fn center(&self) -> Point2f {
        Point2f::new(self.center_x, self.center_y)
    }
}

#[derive(Debug, Clone)]
pub struct CircleFitTool {
    common: ToolCommon,
    params: CircleFitParams,
    cache: ToolCache,
}

tool_basics!(CircleFitTool, CircleFitParams, ToolKind::CircleFit);

impl CircleFitTool {
    pub fn set_circle(&mut self, center: Point2f, radius: f32) {
        self.params.center_x = center.x;
        self.params.center_y = center.y;
        self.params.radius = radius;
    }

    pub fn set_direction(&mut self, direction: SearchDirection) {
        self.params.direction = direction;
    }
}

impl VisionTool for CircleFitTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::CircleFit
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let p = &self.params;
        if !(p.radius.is_finite() && p.radius > 0.0) {
            return Err(ToolError::Degenerate(format!("radius {} is not positive", p.radius)));
        }
        let center = p.center() + self.common.geometry_shift(ctx, p.center());

        let region = self.common.work_region(input, ctx);
        let gray = region.image.to_gray8();
        if gray.is_empty() {
            return Err(ToolError::InvalidInput("empty image".to_owned()));
        }

        let n = p.caliper_count;
        let segments = (0..n)
            .map(|i| {
                let theta = TAU * i as f32 / n as f32;
                let u = Vec2f::new(theta.cos(), theta.sin());
                let on_circle = center + u * p.radius;
                match p.direction {
                    SearchDirection::Outward => p.search.segment(on_circle, u),
                    SearchDirection::Inward => p.search.segment(on_circle, u * -1.0),
                }
            })
            .collect();
        let probes = Probes::run(&p.search, &region, &gray, segments);
        if probes.hits.len() < 3 {
            return Ok(VisionResult::failure(format!(
                "only {} of {n} calipers found an edge",
                probes.hits.len()
            )));
        }

        let model = fit_circle_ransac(&probes.hits, &p.ransac)?;
        let mut result = VisionResult::ok(format!(
            "circle r = {:.2} at ({:.2}, {:.2})",
            model.radius, model.center.x, model.center.y
        ));
        result.insert("CenterX", model.center.x);
        result.insert("CenterY", model.center.y);
        result.insert("Radius", model.radius);
        result.insert("Diameter", 2.0 * model.radius);
        result.insert("Rms", model.rms);
        result.insert("InlierCount", model.num_inliers);
        result.insert("EdgePointCount", probes.hits.len());

        probes.annotate(&mut result, &model.inlier_mask);
        result.push_graphic(GraphicOverlay::circle(model.center, model.radius as f32, Color::MAGENTA));
        result.push_graphic(GraphicOverlay::cross(model.center, 5.0, Color::MAGENTA));
        if region.scoped {
            result.push_graphic(GraphicOverlay::rectangle(region.rect, Color::BLUE));
        }
        result.position = Some(model.center);
        result.render_overlay(input);
        Ok(result)
    }
}
