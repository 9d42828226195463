use serde::{Deserialize, Serialize};
use vt_core::{Frame, Image, PixelFormat};

use crate::error::ToolError;
use crate::result::{Color, GraphicOverlay, VisionResult};
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::tool_basics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HeightSlicerParams {
    pub min_height: f32,
    pub max_height: f32,
    /// Leave non-finite and zero (no return) samples out of the ratio.
    pub ignore_invalid: bool,
}

impl Default for HeightSlicerParams {
    fn default() -> Self {
        Self {
            min_height: 0.0,
            max_height: 100.0,
            ignore_invalid: true,
        }
    }
}

impl HeightSlicerParams {
    pub fn sanitized(self) -> Self {
        let min = if self.min_height.is_finite() { self.min_height } else { 0.0 };
        let max = if self.max_height.is_finite() { self.max_height } else { min };
        Self {
            min_height: min,
            max_height: max.max(min),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeightSlicerTool {
    common: ToolCommon,
    params: HeightSlicerParams,
    cache: ToolCache,
}

tool_basics!(HeightSlicerTool, HeightSlicerParams, ToolKind::HeightSlicer);

impl HeightSlicerTool {
    pub fn set_range(&mut self, min_height: f32, max_height: f32) {
        self.set_params(HeightSlicerParams {
            min_height,
            max_height,
            ..self.params.clone()
        });
    }
}

fn is_valid(z: f32) -> bool {
    z.is_finite() && z != 0.0
}

impl VisionTool for HeightSlicerTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::HeightSlicer
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        if input.format() != PixelFormat::Depth32 {
            return Err(ToolError::UnsupportedFormat {
                expected: PixelFormat::Depth32,
                actual: input.format(),
            });
        }
        let region = self.common.work_region(input, ctx);
        let Some(depth) = region.image.as_depth32() else {
            return Err(ToolError::InvalidInput("depth map missing".to_owned()));
        };
        if depth.is_empty() {
            return Err(ToolError::InvalidInput("empty depth map".to_owned()));
        }
        let p = &self.params;

        let (mut in_range, mut valid, mut sum) = (0usize, 0usize, 0.0f64);
        let mask = Image::from_fn(depth.width(), depth.height(), |x, y| {
            let z = depth.row(y)[x];
            if !is_valid(z) {
                return 0;
            }
            valid += 1;
            if (p.min_height..=p.max_height).contains(&z) {
                in_range += 1;
                sum += z as f64;
                255
            } else {
                0
            }
        });

        let total = depth.width() * depth.height();
        let denom = if p.ignore_invalid { valid } else { total };
        let ratio = if denom == 0 { 0.0 } else { in_range as f64 / denom as f64 };
        let mean = if in_range == 0 { 0.0 } else { sum / in_range as f64 };

        let blank = Frame::Gray8(Image::new_fill(input.width(), input.height(), 0u8));
        let output = region.restore(&blank, Frame::Gray8(mask))?;

        let mut result = VisionResult::ok(format!(
            "{in_range} samples in [{}, {}]",
            p.min_height, p.max_height
        ));
        result.insert("InRangeCount", in_range);
        result.insert("InRangeRatio", ratio);
        result.insert("MeanHeight", mean);
        result.insert("ValidCount", valid);
        if region.scoped {
            result.push_graphic(GraphicOverlay::rectangle(region.rect, Color::BLUE));
        }
        Ok(result.with_output(output))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use vt_core::{Frame, Image, PixelFormat, Rect};

    use super::{HeightSlicerParams, HeightSlicerTool};
    use crate::tool::VisionTool;

    /// Heights 1..=4 by column, with an invalid sample in the corner.
    fn terrain() -> Frame {
        Frame::Depth32(Image::from_fn(4, 4, |x, y| {
            if (x, y) == (0, 0) { f32::NAN } else { (x + 1) as f32 }
        }))
    }

    #[test]
    fn slices_height_band() {
        let mut tool = HeightSlicerTool::new();
        tool.set_range(2.0, 3.0);
        let r = tool.execute(&terrain());
        assert!(r.success);
        assert_eq!(r.get_f64("InRangeCount"), Some(8.0));
        assert_abs_diff_eq!(r.get_f64("InRangeRatio").expect("ratio"), 8.0 / 15.0);
        assert_abs_diff_eq!(r.get_f64("MeanHeight").expect("mean"), 2.5);

        let mask = r.output_image.expect("mask");
        assert_eq!(mask.format(), PixelFormat::Gray8);
        assert_eq!(mask.as_gray8().and_then(|m| m.get(1, 2)), Some(&255));
        assert_eq!(mask.as_gray8().and_then(|m| m.get(3, 2)), Some(&0));
    }

    #[test]
    fn invalid_samples_can_count_against_ratio() {
        let mut tool = HeightSlicerTool::with_params(HeightSlicerParams {
            min_height: 0.5,
            max_height: 10.0,
            ignore_invalid: false,
        });
        let r = tool.execute(&terrain());
        assert_abs_diff_eq!(r.get_f64("InRangeRatio").expect("ratio"), 15.0 / 16.0);
    }

    #[test]
    fn rejects_non_depth_input() {
        let mut tool = HeightSlicerTool::new();
        let r = tool.execute(&Frame::Gray8(Image::new_fill(4, 4, 1u8)));
        assert!(!r.success);
        assert!(r.message.contains("Depth32"), "{}", r.message);
    }

    #[test]
    fn roi_mask_is_zero_outside() {
        let mut tool = HeightSlicerTool::new();
        tool.set_range(0.0, 10.0);
        tool.common_mut().use_roi = true;
        tool.common_mut().roi = Rect::new(2, 0, 2, 4);
        let r = tool.execute(&terrain());
        assert_eq!(r.get_f64("InRangeCount"), Some(8.0));
        let mask = r.output_image.expect("mask");
        let m = mask.as_gray8().expect("gray");
        assert_eq!(m.get(0, 3), Some(&0));
        assert_eq!(m.get(2, 3), Some(&255));
    }
}
