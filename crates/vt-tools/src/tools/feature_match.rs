//! Template matching. The trained template is configuration: clones carry
//! it, and a change of the template rectangle discards it.

use serde::{Deserialize, Serialize};
use vt_core::{Frame, Image, Point2f, Rect};
use vt_pyr::{MatchConfig, Matcher, Template};

use crate::error::ToolError;
use crate::params::{Parameters, merge_parameters, to_parameters};
use crate::result::{Color, GraphicOverlay, VisionResult};
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FeatureMatchParams {
    pub template_x: i32,
    pub template_y: i32,
    pub template_width: i32,
    pub template_height: i32,
    /// ZNCC acceptance, `-1..=1`.
    pub min_score: f32,
    /// `1..=100`.
    pub max_matches: usize,
    /// `1..=8`.
    pub pyramid_levels: usize,
    pub nms_radius: f32,
}

impl Default for FeatureMatchParams {
    fn default() -> Self {
        Self {
            template_x: 0,
            template_y: 0,
            template_width: 0,
            template_height: 0,
            min_score: 0.7,
            max_matches: 1,
            pyramid_levels: 3,
            nms_radius: 8.0,
        }
    }
}

impl FeatureMatchParams {
    pub fn sanitized(self) -> Self {
        Self {
            template_width: self.template_width.max(0),
            template_height: self.template_height.max(0),
            min_score: if self.min_score.is_finite() { self.min_score.clamp(-1.0, 1.0) } else { 0.7 },
            max_matches: self.max_matches.clamp(1, 100),
            pyramid_levels: self.pyramid_levels.clamp(1, 8),
            nms_radius: if self.nms_radius.is_finite() { self.nms_radius.max(0.0) } else { 0.0 },
            ..self
        }
    }

    pub fn template_rect(&self) -> Rect {
        Rect::new(self.template_x, self.template_y, self.template_width, self.template_height)
    }

    fn match_config(&self) -> MatchConfig {
        MatchConfig {
            levels: self.pyramid_levels,
            min_score: self.min_score,
            max_matches: self.max_matches,
            nms_radius: self.nms_radius,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureMatchTool {
    common: ToolCommon,
    params: FeatureMatchParams,
    template: Option<Template>,
    cache: ToolCache,
}

impl Default for FeatureMatchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureMatchTool {
    pub fn new() -> Self {
        Self::with_params(FeatureMatchParams::default())
    }

    pub fn with_params(params: FeatureMatchParams) -> Self {
        Self {
            common: ToolCommon::new(ToolKind::FeatureMatch.display_name()),
            params: params.sanitized(),
            template: None,
            cache: ToolCache::default(),
        }
    }

    pub fn params(&self) -> &FeatureMatchParams {
        &self.params
    }

    pub fn set_params(&mut self, params: FeatureMatchParams) {
        let params = params.sanitized();
        if params.template_rect() != self.params.template_rect() {
            self.template = None;
        }
        self.params = params;
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.template.is_some()
    }

    /// Cuts the template rectangle out of `frame`.
    pub fn train(&mut self, frame: &Frame) -> Result<(), ToolError> {
        let rect = self.params.template_rect();
        if rect.is_empty() {
            return Err(ToolError::InvalidParameter {
                name: "TemplateWidth".to_owned(),
                reason: "template rectangle is empty".to_owned(),
            });
        }
        let patch = frame.to_gray8().crop(rect)?;
        self.set_template(patch)
    }

    /// Uses `pixels` as the template as is.
    pub fn set_template(&mut self, pixels: Image<u8>) -> Result<(), ToolError> {
        let template = Template::new(pixels)?;
        tracing::debug!(
            tool = %self.common.name,
            width = template.width(),
            height = template.height(),
            "template trained"
        );
        self.template = Some(template);
        Ok(())
    }

    pub fn clear_template(&mut self) {
        self.template = None;
    }
}

impl VisionTool for FeatureMatchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::FeatureMatch
    }

    fn common(&self) -> &ToolCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut ToolCommon {
        &mut self.common
    }

    fn cache(&self) -> &ToolCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut ToolCache {
        &mut self.cache
    }

    fn clone_tool(&self) -> Box<dyn VisionTool> {
        Box::new(self.clone())
    }

    fn parameters(&self) -> Parameters {
        to_parameters(&self.params)
    }

    fn apply_parameters(&mut self, p: &Parameters) -> Result<(), ToolError> {
        let merged = merge_parameters(&self.params, p)?;
        self.set_params(merged);
        Ok(())
    }

    /// The first frame seen trains the template.
    fn prepare(&mut self, input: &Frame) -> Result<(), ToolError> {
        if self.template.is_none() {
            self.train(input)?;
        }
        Ok(())
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let Some(template) = &self.template else {
            return Err(ToolError::NotTrained);
        };
        let region = self.common.work_region(input, ctx);
        let gray = region.image.to_gray8();
        let (tw, th) = (template.width(), template.height());

        let matcher = Matcher::new(template.clone()).with_config(self.params.match_config());
        let found = matcher.match_image(&gray.as_view())?;
        if found.is_empty() {
            return Ok(VisionResult::failure(format!(
                "no match scored at least {:.2}",
                self.params.min_score
            )));
        }

        let half = Point2f::new(0.5 * (tw as f32 - 1.0), 0.5 * (th as f32 - 1.0));
        let mut result = VisionResult::ok(format!(
            "{} match(es), best score {:.3}",
            found.len(),
            found[0].score
        ));
        result.insert("MatchCount", found.len());
        for (i, m) in found.iter().enumerate() {
            let top_left = region.to_absolute(Point2f::new(m.x, m.y));
            let center = Point2f::new(top_left.x + half.x, top_left.y + half.y);
            result.insert(format!("Match{i}.X"), center.x);
            result.insert(format!("Match{i}.Y"), center.y);
            result.insert(format!("Match{i}.Score"), m.score);

            let rect = Rect::new(top_left.x.round() as i32, top_left.y.round() as i32, tw as i32, th as i32);
            result.push_graphic(GraphicOverlay::rectangle(rect, Color::GREEN));
            result.push_graphic(GraphicOverlay::cross(center, 5.0, Color::RED).with_label(format!("{:.2}", m.score)));
            if i == 0 {
                result.position = Some(center);
            }
        }
        if region.scoped {
            result.push_graphic(GraphicOverlay::rectangle(region.rect, Color::BLUE));
        }
        result.render_overlay(input);
        Ok(result)
    }
}
