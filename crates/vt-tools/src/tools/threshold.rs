use serde::{Deserialize, Serialize};
use vt_core::{BorderMode, Frame, Image, PixelFormat, saturate_u8};
use vt_edge::{box_kernel, convolve_separable, gaussian_kernel};

use crate::error::ToolError;
use crate::result::VisionResult;
use crate::stats::{histogram_u8, otsu_threshold};
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::{odd_in, tool_basics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThresholdMethod {
    #[default]
    Fixed,
    Otsu,
    /// Local mean over `BlockSize` minus `C`.
    AdaptiveMean,
    /// Gaussian-weighted local mean over `BlockSize` minus `C`.
    AdaptiveGaussian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThresholdType {
    #[default]
    Binary,
    BinaryInv,
    Trunc,
    ToZero,
    ToZeroInv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ThresholdParams {
    pub method: ThresholdMethod,
    pub threshold_type: ThresholdType,
    pub threshold: u8,
    pub max_value: u8,
    /// Odd, `>= 3`.
    pub block_size: usize,
    pub c: f32,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::Fixed,
            threshold_type: ThresholdType::Binary,
            threshold: 128,
            max_value: 255,
            block_size: 11,
            c: 2.0,
        }
    }
}

impl ThresholdParams {
    pub fn sanitized(self) -> Self {
        Self {
            block_size: odd_in(self.block_size, 3, 255),
            c: if self.c.is_finite() { self.c } else { 0.0 },
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdTool {
    common: ToolCommon,
    params: ThresholdParams,
    cache: ToolCache,
}

tool_basics!(ThresholdTool, ThresholdParams, ToolKind::Threshold);

impl ThresholdTool {
    pub fn set_threshold(&mut self, threshold: u8) {
        self.params.threshold = threshold;
    }

    pub fn set_method(&mut self, method: ThresholdMethod) {
        self.params.method = method;
    }

    pub fn set_threshold_type(&mut self, threshold_type: ThresholdType) {
        self.params.threshold_type = threshold_type;
    }
}

fn apply(v: u8, t: f32, max_value: u8, ty: ThresholdType) -> u8 {
    let above = v as f32 > t;
    match ty {
        ThresholdType::Binary => if above { max_value } else { 0 },
        ThresholdType::BinaryInv => if above { 0 } else { max_value },
        ThresholdType::Trunc => if above { saturate_u8(t) } else { v },
        ThresholdType::ToZero => if above { v } else { 0 },
        ThresholdType::ToZeroInv => if above { 0 } else { v },
    }
}

/// Per-pixel thresholds for the adaptive methods.
fn local_thresholds(gray: &Image<u8>, p: &ThresholdParams) -> Image<f32> {
    let f = gray.map(|&v| v as f32);
    let k = match p.method {
        ThresholdMethod::AdaptiveGaussian => gaussian_kernel(p.block_size, 0.0),
        _ => box_kernel(p.block_size),
    };
    let mut local = convolve_separable(&f.as_view(), &k, &k, &BorderMode::Reflect101);
    for v in local.data_mut() {
        *v -= p.c;
    }
    local
}

impl VisionTool for ThresholdTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::Threshold
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let region = self.common.work_region(input, ctx);
        let gray = region.image.to_gray8();
        let n = gray.width() * gray.height();
        if n == 0 {
            return Err(ToolError::InvalidInput("empty image".to_owned()));
        }
        let p = &self.params;

        let (out, used, above) = match p.method {
            ThresholdMethod::Fixed | ThresholdMethod::Otsu => {
                let t = if p.method == ThresholdMethod::Otsu {
                    otsu_threshold(&histogram_u8(&gray.as_view()))
                } else {
                    p.threshold
                };
                let tf = t as f32;
                let above = gray.data().iter().filter(|&&v| v > t).count();
                (gray.map(|&v| apply(v, tf, p.max_value, p.threshold_type)), tf as f64, above)
            }
            ThresholdMethod::AdaptiveMean | ThresholdMethod::AdaptiveGaussian => {
                let local = local_thresholds(&gray, p);
                let out = Image::from_fn(gray.width(), gray.height(), |x, y| {
                    apply(gray.row(y)[x], local.row(y)[x], p.max_value, p.threshold_type)
                });
                let above = gray
                    .data()
                    .iter()
                    .zip(local.data())
                    .filter(|&(&v, &t)| v as f32 > t)
                    .count();
                let mean_t = local.data().iter().map(|&t| t as f64).sum::<f64>() / n as f64;
                (out, mean_t, above)
            }
        };

        let output = region.restore(&input.convert_to(PixelFormat::Gray8), Frame::Gray8(out))?;
        let mut result = VisionResult::ok(format!("{:?} threshold at {used:.1}", p.method));
        result.insert("Threshold", used);
        result.insert("ForegroundRatio", above as f64 / n as f64);
        Ok(result.with_output(output))
    }
}
