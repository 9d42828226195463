use core::fmt;

use vt_core::PixelFormat;
use vt_pyr::MatchError;

use crate::fit::FitError;

/// Per-tool execution fault. `VisionTool::execute` turns every one of
/// these into a failed result; nothing propagates out of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolError {
    InvalidInput(String),
    UnsupportedFormat {
        expected: PixelFormat,
        actual: PixelFormat,
    },
    /// Geometry that cannot be measured (zero-length segment, empty ROI, ...).
    Degenerate(String),
    InvalidParameter {
        name: String,
        reason: String,
    },
    MissingParameter(String),
    NotTrained,
    Core(vt_core::Error),
    Match(MatchError),
    Fit(FitError),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::UnsupportedFormat { expected, actual } => {
                write!(f, "unsupported input format {actual}, expected {expected}")
            }
            Self::Degenerate(msg) => write!(f, "degenerate geometry: {msg}"),
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter {name}: {reason}")
            }
            Self::MissingParameter(name) => write!(f, "missing required parameter {name}"),
            Self::NotTrained => write!(f, "no template trained"),
            Self::Core(e) => write!(f, "{e}"),
            Self::Match(e) => write!(f, "template match failed: {e}"),
            Self::Fit(e) => write!(f, "fit failed: {e}"),
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Core(e) => Some(e),
            Self::Match(e) => Some(e),
            Self::Fit(e) => Some(e),
            _ => None,
        }
    }
}

impl From<vt_core::Error> for ToolError {
    fn from(e: vt_core::Error) -> Self {
        Self::Core(e)
    }
}

impl From<MatchError> for ToolError {
    fn from(e: MatchError) -> Self {
        Self::Match(e)
    }
}

impl From<FitError> for ToolError {
    fn from(e: FitError) -> Self {
        Self::Fit(e)
    }
}
