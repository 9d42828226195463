//! The concrete tools. Each one scopes its work to the ROI and hands back
//! full-frame outputs in absolute coordinates.

mod blob;
mod blur;
mod caliper;
mod circle_fit;
mod edge;
mod feature_match;
mod grayscale;
mod height;
mod histogram;
mod line_fit;
mod morphology;
mod probe;
mod threshold;

pub use blob::{Blob, BlobAnalysisTool, BlobParams, BlobPolarity, BlobSortKey, ContourApprox, ContourRetrieval};
pub use blur::{BlurParams, BlurTool, BlurType};
pub use caliper::{CaliperParams, CaliperTool, EdgePolarityMode};
pub use circle_fit::{CircleFitParams, CircleFitTool, SearchDirection};
pub use edge::{EdgeDetectionParams, EdgeDetectionTool, EdgeMethod, EdgeOperator};
pub use feature_match::{FeatureMatchParams, FeatureMatchTool};
pub use grayscale::{GrayMethod, GrayscaleParams, GrayscaleTool};
pub use height::{HeightSlicerParams, HeightSlicerTool};
pub use histogram::{HistogramParams, HistogramTool};
pub use line_fit::{LineFitParams, LineFitTool};
pub use morphology::{KernelShape, MorphOperation, MorphologyParams, MorphologyTool};
pub use probe::EdgeSearch;
pub use threshold::{ThresholdMethod, ThresholdParams, ThresholdTool, ThresholdType};

/// Constructors and parameter accessors for a tool struct with `common`,
/// `params` and `cache` fields whose params type has `sanitized()`.
macro_rules! tool_basics {
    ($tool:ident, $params:ty, $kind:expr) => {
        impl $tool {
            pub fn new() -> Self {
                Self::with_params(<$params>::default())
            }

            pub fn with_params(params: $params) -> Self {
                Self {
                    common: $crate::tool::ToolCommon::new($kind.display_name()),
                    params: params.sanitized(),
                    cache: $crate::tool::ToolCache::default(),
                }
            }

            pub fn params(&self) -> &$params {
                &self.params
            }

            pub fn set_params(&mut self, params: $params) {
                self.params = params.sanitized();
            }
        }

        impl Default for $tool {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

pub(crate) use tool_basics;

/// Odd value in `[min, max]`; even values round up.
pub(crate) fn odd_in(v: usize, min: usize, max: usize) -> usize {
    let v = v.clamp(min, max);
    if v % 2 == 1 {
        v
    } else if v < max {
        v + 1
    } else {
        v - 1
    }
}
