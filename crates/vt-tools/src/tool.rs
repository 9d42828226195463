//! The uniform tool contract.
//!
//! Concrete tools implement [`VisionTool::run`] as a pure function of the
//! input frame, the context and their configuration. The provided
//! [`VisionTool::execute_with`] wraps it: timing, panic containment, the
//! diagnostic cache and logging.

use core::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use vt_core::{Frame, Point2f, Rect, Vec2f, WorkRegion};

use crate::error::ToolError;
use crate::params::Parameters;
use crate::result::VisionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolKind {
    Grayscale,
    Blur,
    Threshold,
    EdgeDetection,
    Morphology,
    Histogram,
    HeightSlicer,
    BlobAnalysis,
    Caliper,
    LineFit,
    CircleFit,
    FeatureMatch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 12] = [
        Self::Grayscale,
        Self::Blur,
        Self::Threshold,
        Self::EdgeDetection,
        Self::Morphology,
        Self::Histogram,
        Self::HeightSlicer,
        Self::BlobAnalysis,
        Self::Caliper,
        Self::LineFit,
        Self::CircleFit,
        Self::FeatureMatch,
    ];

    /// Persisted `toolType` string.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale",
            Self::Blur => "Blur",
            Self::Threshold => "Threshold",
            Self::EdgeDetection => "EdgeDetection",
            Self::Morphology => "Morphology",
            Self::Histogram => "Histogram",
            Self::HeightSlicer => "HeightSlicer",
            Self::BlobAnalysis => "BlobAnalysis",
            Self::Caliper => "Caliper",
            Self::LineFit => "LineFit",
            Self::CircleFit => "CircleFit",
            Self::FeatureMatch => "FeatureMatch",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale",
            Self::Blur => "Blur",
            Self::Threshold => "Threshold",
            Self::EdgeDetection => "Edge Detection",
            Self::Morphology => "Morphology",
            Self::Histogram => "Histogram",
            Self::HeightSlicer => "Height Slicer",
            Self::BlobAnalysis => "Blob Analysis",
            Self::Caliper => "Caliper",
            Self::LineFit => "Line Fit",
            Self::CircleFit => "Circle Fit",
            Self::FeatureMatch => "Feature Match",
        }
    }

    /// Tools that consume the depth map instead of the 2D image.
    pub fn requires_depth(self) -> bool {
        self == Self::HeightSlicer
    }

    /// Keys a persisted configuration must spell out.
    pub fn required_parameters(self) -> &'static [&'static str] {
        match self {
            Self::Caliper | Self::LineFit => &["StartX", "StartY", "EndX", "EndY"],
            Self::CircleFit => &["CenterX", "CenterY", "Radius"],
            Self::FeatureMatch => &["TemplateWidth", "TemplateHeight"],
            _ => &[],
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToolKind(pub String);

impl fmt::Display for UnknownToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tool type '{}'", self.0)
    }
}

impl std::error::Error for UnknownToolKind {}

impl FromStr for ToolKind {
    type Err = UnknownToolKind;

    /// Accepts the type name or the display name, ignoring case and spaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.type_name().to_ascii_lowercase() == key)
            .ok_or_else(|| UnknownToolKind(s.to_owned()))
    }
}

/// Identity, enable flag and ROI shared by every tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommon {
    pub name: String,
    pub is_enabled: bool,
    pub use_roi: bool,
    pub roi: Rect,
}

impl ToolCommon {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_enabled: true,
            use_roi: false,
            roi: Rect::default(),
        }
    }

    /// ROI actually applied for this call. A reference position re-centres
    /// a non-empty ROI on it (size kept) and forces scoping on.
    pub fn effective_roi(&self, ctx: &ExecContext) -> (bool, Rect) {
        match ctx.reference {
            Some(p) if !self.roi.is_empty() => {
                let x = (p.x - 0.5 * (self.roi.width - 1) as f32).round() as i32;
                let y = (p.y - 0.5 * (self.roi.height - 1) as f32).round() as i32;
                (true, Rect { x, y, ..self.roi })
            }
            _ => (self.use_roi, self.roi),
        }
    }

    pub fn work_region<'a>(&self, input: &'a Frame, ctx: &ExecContext) -> WorkRegion<'a> {
        let (use_roi, roi) = self.effective_roi(ctx);
        WorkRegion::new(input, use_roi, roi)
    }

    /// Translation to apply to configured search geometry. The anchor is
    /// the ROI centre when one is configured, else `fallback`.
    pub fn geometry_shift(&self, ctx: &ExecContext, fallback: Point2f) -> Vec2f {
        let anchor = if self.roi.is_empty() {
            fallback
        } else {
            self.roi.center()
        };
        ctx.shift_from(anchor)
    }
}

/// Per-instance diagnostics. Cloning yields an empty cache: diagnostics
/// belong to the instance that produced them.
#[derive(Debug, Default)]
pub struct ToolCache {
    pub last_result: Option<VisionResult>,
    pub execution_time: Duration,
}

impl Clone for ToolCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Inputs from upstream tools besides the image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExecContext {
    /// Position delivered over a `Coordinates` connection.
    pub reference: Option<Point2f>,
}

impl ExecContext {
    pub fn with_reference(p: Point2f) -> Self {
        Self { reference: Some(p) }
    }

    pub fn shift_from(&self, anchor: Point2f) -> Vec2f {
        self.reference
            .map_or(Vec2f::new(0.0, 0.0), |p| p - anchor)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

pub trait VisionTool: Send + fmt::Debug {
    fn kind(&self) -> ToolKind;

    fn common(&self) -> &ToolCommon;

    fn common_mut(&mut self) -> &mut ToolCommon;

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError>;

    /// Deep copy of the configuration; the cache starts empty.
    fn clone_tool(&self) -> Box<dyn VisionTool>;

    fn parameters(&self) -> Parameters;

    /// Merges `p` into the current parameters, then sanitizes them.
    fn apply_parameters(&mut self, p: &Parameters) -> Result<(), ToolError>;

    fn cache(&self) -> &ToolCache;

    fn cache_mut(&mut self) -> &mut ToolCache;

    /// Stateful preparation before `run` (template training).
    fn prepare(&mut self, _input: &Frame) -> Result<(), ToolError> {
        Ok(())
    }

    fn requires_depth(&self) -> bool {
        self.kind().requires_depth()
    }

    fn name(&self) -> &str {
        &self.common().name
    }

    fn is_enabled(&self) -> bool {
        self.common().is_enabled
    }

    fn execute(&mut self, input: &Frame) -> VisionResult {
        self.execute_with(input, &ExecContext::default())
    }

    /// Never fails and never panics outward: errors and panics become a
    /// failed result. Updates the cache.
    fn execute_with(&mut self, input: &Frame, ctx: &ExecContext) -> VisionResult {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.prepare(input)?;
            self.run(input, ctx)
        }));
        let elapsed = start.elapsed();

        let result = match outcome {
            Ok(Ok(r)) if r.success => r,
            Ok(Ok(r)) => r.into_failure(),
            Ok(Err(e)) => VisionResult::failure(e.to_string()),
            Err(payload) => {
                VisionResult::failure(format!("tool panicked: {}", panic_message(payload.as_ref())))
            }
        };

        if result.success {
            tracing::debug!(
                tool = %self.name(),
                kind = %self.kind(),
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                "{}",
                result.message
            );
        } else {
            tracing::warn!(
                tool = %self.name(),
                kind = %self.kind(),
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                "tool failed: {}",
                result.message
            );
        }

        let cache = self.cache_mut();
        cache.execution_time = elapsed;
        cache.last_result = Some(result.clone());
        result
    }

    fn last_result(&self) -> Option<&VisionResult> {
        self.cache().last_result.as_ref()
    }

    fn execution_time(&self) -> Duration {
        self.cache().execution_time
    }
}

/// Implements the state accessors and parameter plumbing for a tool struct
/// with `common`, `params` and `cache` fields.
macro_rules! tool_state {
    () => {
        fn common(&self) -> &$crate::tool::ToolCommon {
            &self.common
        }

        fn common_mut(&mut self) -> &mut $crate::tool::ToolCommon {
            &mut self.common
        }

        fn cache(&self) -> &$crate::tool::ToolCache {
            &self.cache
        }

        fn cache_mut(&mut self) -> &mut $crate::tool::ToolCache {
            &mut self.cache
        }

        fn clone_tool(&self) -> Box<dyn $crate::tool::VisionTool> {
            Box::new(self.clone())
        }

        fn parameters(&self) -> $crate::params::Parameters {
            $crate::params::to_parameters(&self.params)
        }

        fn apply_parameters(
            &mut self,
            p: &$crate::params::Parameters,
        ) -> Result<(), $crate::error::ToolError> {
            self.params = $crate::params::merge_parameters(&self.params, p)?.sanitized();
            Ok(())
        }
    };
}

pub(crate) use tool_state;

#[cfg(test)]
mod tests {
    use vt_core::{Frame, Image, Point2f, Rect};

    use super::{ExecContext, ToolCommon, ToolKind, VisionTool};
    use crate::error::ToolError;
    use crate::tools::GrayscaleTool;

    #[test]
    fn kind_names_parse_back() {
        for kind in ToolKind::ALL {
            assert_eq!(kind.type_name().parse::<ToolKind>(), Ok(kind));
            assert_eq!(kind.display_name().parse::<ToolKind>(), Ok(kind));
        }
        assert!("Laser".parse::<ToolKind>().is_err());
    }

    #[test]
    fn reference_recentres_roi() {
        let mut common = ToolCommon::new("t");
        common.roi = Rect::new(0, 0, 11, 21);
        let ctx = ExecContext::with_reference(Point2f::new(50.0, 60.0));
        let (scoped, roi) = common.effective_roi(&ctx);
        assert!(scoped);
        assert_eq!(roi, Rect::new(45, 50, 11, 21));
        assert_eq!(roi.center(), Point2f::new(50.0, 60.0));

        let shift = common.geometry_shift(&ctx, Point2f::new(0.0, 0.0));
        assert_eq!((shift.x, shift.y), (45.0, 50.0));
    }

    #[test]
    fn reference_without_roi_keeps_scope() {
        let common = ToolCommon::new("t");
        let ctx = ExecContext::with_reference(Point2f::new(5.0, 5.0));
        assert_eq!(common.effective_roi(&ctx), (false, Rect::default()));
        let shift = common.geometry_shift(&ctx, Point2f::new(2.0, 1.0));
        assert_eq!((shift.x, shift.y), (3.0, 4.0));
    }

    #[derive(Debug, Clone)]
    struct Panicky {
        common: ToolCommon,
        cache: super::ToolCache,
    }

    impl VisionTool for Panicky {
        fn kind(&self) -> ToolKind {
            ToolKind::Grayscale
        }
        fn common(&self) -> &ToolCommon {
            &self.common
        }
        fn common_mut(&mut self) -> &mut ToolCommon {
            &mut self.common
        }
        fn run(&self, _input: &Frame, _ctx: &ExecContext) -> Result<crate::VisionResult, ToolError> {
            panic!("boom")
        }
        fn clone_tool(&self) -> Box<dyn VisionTool> {
            Box::new(self.clone())
        }
        fn parameters(&self) -> crate::Parameters {
            crate::Parameters::new()
        }
        fn apply_parameters(&mut self, _p: &crate::Parameters) -> Result<(), ToolError> {
            Ok(())
        }
        fn cache(&self) -> &super::ToolCache {
            &self.cache
        }
        fn cache_mut(&mut self) -> &mut super::ToolCache {
            &mut self.cache
        }
    }

    #[test]
    fn panics_become_failed_results() {
        let mut tool = Panicky {
            common: ToolCommon::new("panicky"),
            cache: super::ToolCache::default(),
        };
        let r = tool.execute(&Frame::Gray8(Image::new_fill(2, 2, 0u8)));
        assert!(!r.success);
        assert!(r.message.contains("boom"), "{}", r.message);
        assert_eq!(tool.last_result().map(|r| r.success), Some(false));
    }

    #[test]
    fn execute_caches_and_clone_starts_empty() {
        let mut tool = GrayscaleTool::new();
        let r = tool.execute(&Frame::Gray8(Image::new_fill(4, 4, 7u8)));
        assert!(r.success);
        assert!(tool.last_result().is_some());

        let copy = tool.clone_tool();
        assert!(copy.last_result().is_none());
        assert_eq!(copy.parameters(), tool.parameters());
    }

    #[test]
    fn editing_a_clone_leaves_the_original_alone() {
        let mut tool = GrayscaleTool::new();
        tool.common_mut().roi = Rect::new(1, 1, 4, 4);
        let before = tool.parameters();

        let mut copy = tool.clone_tool();
        let mut edited = copy.parameters();
        edited.insert("Method".into(), crate::DataValue::Text("Max".into()));
        copy.apply_parameters(&edited).expect("apply");
        copy.common_mut().name = "copy".to_owned();
        copy.common_mut().use_roi = true;
        copy.common_mut().roi = Rect::new(10, 20, 30, 40);

        assert_ne!(copy.parameters(), before);
        assert_eq!(tool.parameters(), before);
        assert!(!tool.common().use_roi);
        assert_eq!(tool.common().roi, Rect::new(1, 1, 4, 4));
        assert_ne!(tool.common().name, "copy");
    }
}
