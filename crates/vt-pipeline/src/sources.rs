//! Seams to the acquisition hardware and the configuration store.

use std::collections::{BTreeMap, VecDeque};

use vt_core::{Frame, Image};
use vt_tools::{ConfigError, ConfigErrors};

use crate::step::StepConfig;

/// One acquisition: a 2D image, a depth map in millimetres, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredFrame {
    pub success: bool,
    pub message: String,
    pub image2d: Option<Frame>,
    pub point_cloud: Option<Image<f32>>,
}

impl AcquiredFrame {
    pub fn from_image(image: Frame) -> Self {
        Self {
            success: true,
            message: String::new(),
            image2d: Some(image),
            point_cloud: None,
        }
    }

    pub fn with_point_cloud(mut self, depth: Image<f32>) -> Self {
        self.point_cloud = Some(depth);
        self
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            image2d: None,
            point_cloud: None,
        }
    }
}

pub trait FrameSource {
    /// Never blocks indefinitely; a failed acquisition is reported in the
    /// returned frame.
    fn acquire(&mut self) -> AcquiredFrame;
}

/// Replays a fixed list of acquisitions, then reports exhaustion.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    frames: VecDeque<AcquiredFrame>,
}

impl FrameQueue {
    pub fn new(frames: impl IntoIterator<Item = AcquiredFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: AcquiredFrame) {
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for FrameQueue {
    fn acquire(&mut self) -> AcquiredFrame {
        self.frames
            .pop_front()
            .unwrap_or_else(|| AcquiredFrame::failed("no more frames"))
    }
}

pub trait StepSource {
    fn load_step(&self, name: &str) -> Result<StepConfig, ConfigErrors>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStepSource {
    steps: BTreeMap<String, StepConfig>,
}

impl MemoryStepSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `step` under its own name, replacing an earlier one.
    pub fn insert(&mut self, step: StepConfig) {
        self.steps.insert(step.name.clone(), step);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }
}

impl StepSource for MemoryStepSource {
    fn load_step(&self, name: &str) -> Result<StepConfig, ConfigErrors> {
        self.steps
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownStep(name.to_owned()).into())
    }
}

#[cfg(test)]
mod tests {
    use vt_core::{Frame, Image};
    use vt_tools::ConfigError;

    use super::{AcquiredFrame, FrameQueue, FrameSource, MemoryStepSource, StepSource};
    use crate::step::StepConfig;

    #[test]
    fn queue_reports_exhaustion() {
        let mut q = FrameQueue::new([AcquiredFrame::from_image(Frame::Gray8(Image::new_fill(2, 2, 1u8)))]);
        assert!(q.acquire().success);
        let last = q.acquire();
        assert!(!last.success);
        assert_eq!(last.message, "no more frames");
        assert!(q.is_empty());
    }

    #[test]
    fn memory_source_looks_up_by_name() {
        let mut src = MemoryStepSource::new();
        src.insert(StepConfig::new("Inspect"));
        assert_eq!(src.load_step("Inspect").map(|s| s.name), Ok("Inspect".to_owned()));
        let err = src.load_step("Other").err().expect("unknown");
        assert_eq!(err.0, vec![ConfigError::UnknownStep("Other".to_owned())]);
    }
}
