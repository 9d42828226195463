use serde::{Deserialize, Serialize};
use vt_core::{Frame, Image, PixelFormat, luminosity, saturate_u8};

use crate::error::ToolError;
use crate::result::VisionResult;
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::tool_basics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GrayMethod {
    /// BT.601 weights.
    #[default]
    Luminosity,
    Average,
    Red,
    Green,
    Blue,
    /// Brightest channel.
    Max,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GrayscaleParams {
    pub method: GrayMethod,
}

impl GrayscaleParams {
    pub fn sanitized(self) -> Self {
        self
    }
}

#[derive(Debug, Clone)]
pub struct GrayscaleTool {
    common: ToolCommon,
    params: GrayscaleParams,
    cache: ToolCache,
}

tool_basics!(GrayscaleTool, GrayscaleParams, ToolKind::Grayscale);

impl GrayscaleTool {
    pub fn set_method(&mut self, method: GrayMethod) {
        self.params.method = method;
    }
}

fn reduce(px: [u8; 3], method: GrayMethod) -> u8 {
    let [r, g, b] = px;
    match method {
        GrayMethod::Luminosity => luminosity(px),
        GrayMethod::Average => ((r as u16 + g as u16 + b as u16 + 1) / 3) as u8,
        GrayMethod::Red => r,
        GrayMethod::Green => g,
        GrayMethod::Blue => b,
        GrayMethod::Max => r.max(g).max(b),
    }
}

fn to_gray(frame: &Frame, method: GrayMethod) -> Image<u8> {
    match frame {
        Frame::Gray8(img) => img.clone(),
        Frame::Rgb8(img) => img.map(|&px| reduce(px, method)),
        Frame::Depth32(img) => img.map(|&v| saturate_u8(v)),
    }
}

impl VisionTool for GrayscaleTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::Grayscale
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let region = self.common.work_region(input, ctx);
        let gray = to_gray(&region.image, self.params.method);

        let n = gray.width() * gray.height();
        let mean = if n == 0 {
            0.0
        } else {
            gray.data().iter().map(|&v| v as f64).sum::<f64>() / n as f64
        };

        let base = input.convert_to(PixelFormat::Gray8);
        let output = region.restore(&base, Frame::Gray8(gray))?;

        let mut result = VisionResult::ok(format!("converted to grayscale ({:?})", self.params.method));
        result.insert("Mean", mean);
        Ok(result.with_output(output))
    }
}
