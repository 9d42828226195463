use serde::{Deserialize, Serialize};
use vt_core::{Frame, PixelFormat, saturate_u8};
use vt_edge::{Edge2DConfig, Edge2DDetector, GradientOperator, Subpix2D, sobel_magnitude};

use crate::error::ToolError;
use crate::result::VisionResult;
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::tool_basics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeMethod {
    /// Non-maximum suppression plus hysteresis; binary edge map.
    #[default]
    Canny,
    /// Gradient magnitude, saturated to 8 bits.
    Sobel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeOperator {
    #[default]
    Sobel,
    Scharr,
}

impl From<EdgeOperator> for GradientOperator {
    fn from(op: EdgeOperator) -> Self {
        match op {
            EdgeOperator::Sobel => GradientOperator::Sobel,
            EdgeOperator::Scharr => GradientOperator::Scharr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EdgeDetectionParams {
    pub method: EdgeMethod,
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub pre_smooth: bool,
    pub operator: EdgeOperator,
}

impl Default for EdgeDetectionParams {
    fn default() -> Self {
        Self {
            method: EdgeMethod::Canny,
            low_threshold: 50.0,
            high_threshold: 150.0,
            pre_smooth: true,
            operator: EdgeOperator::Sobel,
        }
    }
}

impl EdgeDetectionParams {
    pub fn sanitized(self) -> Self {
        let low = if self.low_threshold.is_finite() { self.low_threshold.max(0.0) } else { 0.0 };
        let high = if self.high_threshold.is_finite() { self.high_threshold } else { low };
        Self {
            low_threshold: low,
            high_threshold: high.max(low),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeDetectionTool {
    common: ToolCommon,
    params: EdgeDetectionParams,
    cache: ToolCache,
}

tool_basics!(EdgeDetectionTool, EdgeDetectionParams, ToolKind::EdgeDetection);

impl EdgeDetectionTool {
    pub fn set_thresholds(&mut self, low: f32, high: f32) {
        self.set_params(EdgeDetectionParams {
            low_threshold: low,
            high_threshold: high,
            ..self.params.clone()
        });
    }

    pub fn set_method(&mut self, method: EdgeMethod) {
        self.params.method = method;
    }
}

impl VisionTool for EdgeDetectionTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::EdgeDetection
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let region = self.common.work_region(input, ctx);
        let gray = region.image.to_gray8();
        if gray.is_empty() {
            return Err(ToolError::InvalidInput("empty image".to_owned()));
        }
        let p = &self.params;

        let (map, count) = match p.method {
            EdgeMethod::Canny => {
                let cfg = Edge2DConfig {
                    pre_smooth: p.pre_smooth,
                    operator: p.operator.into(),
                    low_thresh: p.low_threshold,
                    high_thresh: p.high_threshold,
                    subpix: Subpix2D::None,
                    ..Edge2DConfig::default()
                };
                let mut detector = Edge2DDetector::new();
                let edgels = detector.detect_u8(&gray.as_view(), &cfg);
                (detector.edge_mask(), edgels.len())
            }
            EdgeMethod::Sobel => {
                let mag = sobel_magnitude(&gray.map(|&v| v as f32).as_view());
                let count = mag.data().iter().filter(|&&m| m >= p.high_threshold).count();
                (mag.map(|&m| saturate_u8(m)), count)
            }
        };

        let output = region.restore(&input.convert_to(PixelFormat::Gray8), Frame::Gray8(map))?;
        let mut result = VisionResult::ok(format!("{count} edge pixels"));
        result.insert("EdgePixelCount", count);
        Ok(result.with_output(output))
    }
}
