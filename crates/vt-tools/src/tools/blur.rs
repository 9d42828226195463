use serde::{Deserialize, Serialize};
use vt_core::{BorderMode, Frame, Image};
use vt_edge::{box_kernel, convolve_separable, gaussian_kernel};

use crate::error::ToolError;
use crate::planes::{from_planes_f32, to_planes_f32};
use crate::result::VisionResult;
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::{odd_in, tool_basics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlurType {
    #[default]
    Gaussian,
    Box,
    Median,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BlurParams {
    pub blur_type: BlurType,
    /// Odd, `1..=99`.
    pub kernel_size: usize,
    /// Gaussian sigma; `0` derives it from the kernel size.
    pub sigma: f32,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            blur_type: BlurType::Gaussian,
            kernel_size: 5,
            sigma: 0.0,
        }
    }
}

impl BlurParams {
    pub fn sanitized(self) -> Self {
        Self {
            kernel_size: odd_in(self.kernel_size, 1, 99),
            sigma: if self.sigma.is_finite() { self.sigma.max(0.0) } else { 0.0 },
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlurTool {
    common: ToolCommon,
    params: BlurParams,
    cache: ToolCache,
}

tool_basics!(BlurTool, BlurParams, ToolKind::Blur);

impl BlurTool {
    pub fn set_kernel_size(&mut self, size: usize) {
        self.set_params(BlurParams {
            kernel_size: size,
            ..self.params.clone()
        });
    }

    pub fn set_blur_type(&mut self, blur_type: BlurType) {
        self.params.blur_type = blur_type;
    }
}

/// Median over a clamped square window.
fn median_filter(src: &Image<f32>, size: usize) -> Image<f32> {
    let r = (size / 2) as isize;
    let (w, h) = (src.width() as isize, src.height() as isize);
    let mut window = Vec::with_capacity(size * size);
    Image::from_fn(src.width(), src.height(), |x, y| {
        window.clear();
        for dy in -r..=r {
            let yy = (y as isize + dy).clamp(0, h - 1) as usize;
            let row = src.row(yy);
            for dx in -r..=r {
                let xx = (x as isize + dx).clamp(0, w - 1) as usize;
                window.push(row[xx]);
            }
        }
        let mid = window.len() / 2;
        let (_, m, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
        *m
    })
}

impl VisionTool for BlurTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::Blur
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let region = self.common.work_region(input, ctx);
        if region.image.is_empty() {
            return Err(ToolError::InvalidInput("empty image".to_owned()));
        }
        let p = &self.params;
        let border = BorderMode::Reflect101;

        let planes: Vec<Image<f32>> = to_planes_f32(&region.image)
            .iter()
            .map(|plane| match p.blur_type {
                BlurType::Gaussian => {
                    let k = gaussian_kernel(p.kernel_size, p.sigma);
                    convolve_separable(&plane.as_view(), &k, &k, &border)
                }
                BlurType::Box => {
                    let k = box_kernel(p.kernel_size);
                    convolve_separable(&plane.as_view(), &k, &k, &border)
                }
                BlurType::Median => median_filter(plane, p.kernel_size),
            })
            .collect();

        let blurred = from_planes_f32(region.image.format(), &planes);
        let output = region.restore(input, blurred)?;
        Ok(VisionResult::ok(format!("{:?} blur, kernel {}", p.blur_type, p.kernel_size)).with_output(output))
    }
}
