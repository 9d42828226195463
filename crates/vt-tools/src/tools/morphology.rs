use serde::{Deserialize, Serialize};
use vt_core::Frame;
use vt_morph::{ElementShape, MorphOp, StructuringElement, morphology};

use crate::error::ToolError;
use crate::planes::{from_planes_u8, to_planes_u8};
use crate::result::VisionResult;
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::{odd_in, tool_basics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MorphOperation {
    Erode,
    Dilate,
    #[default]
    Open,
    Close,
    Gradient,
    TopHat,
    BlackHat,
}

impl From<MorphOperation> for MorphOp {
    fn from(op: MorphOperation) -> Self {
        match op {
            MorphOperation::Erode => MorphOp::Erode,
            MorphOperation::Dilate => MorphOp::Dilate,
            MorphOperation::Open => MorphOp::Open,
            MorphOperation::Close => MorphOp::Close,
            MorphOperation::Gradient => MorphOp::Gradient,
            MorphOperation::TopHat => MorphOp::TopHat,
            MorphOperation::BlackHat => MorphOp::BlackHat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KernelShape {
    #[default]
    Rect,
    Cross,
    Ellipse,
}

impl From<KernelShape> for ElementShape {
    fn from(shape: KernelShape) -> Self {
        match shape {
            KernelShape::Rect => ElementShape::Rect,
            KernelShape::Cross => ElementShape::Cross,
            KernelShape::Ellipse => ElementShape::Ellipse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MorphologyParams {
    pub operation: MorphOperation,
    pub kernel_shape: KernelShape,
    /// Odd, `1..=51`.
    pub kernel_width: usize,
    /// Odd, `1..=51`.
    pub kernel_height: usize,
    /// `1..=20`.
    pub iterations: usize,
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self {
            operation: MorphOperation::Open,
            kernel_shape: KernelShape::Rect,
            kernel_width: 3,
            kernel_height: 3,
            iterations: 1,
        }
    }
}

impl MorphologyParams {
    pub fn sanitized(self) -> Self {
        Self {
            kernel_width: odd_in(self.kernel_width, 1, 51),
            kernel_height: odd_in(self.kernel_height, 1, 51),
            iterations: self.iterations.clamp(1, 20),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct MorphologyTool {
    common: ToolCommon,
    params: MorphologyParams,
    cache: ToolCache,
}

tool_basics!(MorphologyTool, MorphologyParams, ToolKind::Morphology);

impl MorphologyTool {
    pub fn set_operation(&mut self, operation: MorphOperation) {
        self.params.operation = operation;
    }

    /// Square kernel of `size`.
    pub fn set_kernel_size(&mut self, size: usize) {
        self.set_params(MorphologyParams {
            kernel_width: size,
            kernel_height: size,
            ..self.params.clone()
        });
    }

    pub fn set_iterations(&mut self, iterations: usize) {
        self.params.iterations = iterations.clamp(1, 20);
    }
}

impl VisionTool for MorphologyTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::Morphology
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let region = self.common.work_region(input, ctx);
        let Some(planes) = to_planes_u8(&region.image) else {
            return Err(ToolError::InvalidInput(format!(
                "morphology needs an 8-bit image, got {}",
                region.image.format()
            )));
        };
        let p = &self.params;
        let se = StructuringElement::new(p.kernel_shape.into(), p.kernel_width, p.kernel_height);

        let processed: Vec<_> = planes
            .iter()
            .map(|plane| morphology(&plane.as_view(), p.operation.into(), &se, p.iterations))
            .collect();

        let output = region.restore(input, from_planes_u8(&processed))?;
        Ok(VisionResult::ok(format!(
            "{:?} with {}x{} {:?} kernel, {} iteration(s)",
            p.operation, p.kernel_width, p.kernel_height, p.kernel_shape, p.iterations
        ))
        .with_output(output))
    }
}
