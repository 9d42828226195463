//! Inspection steps: tools wired by typed connections and run once per
//! acquired frame in dependency order.
//!
//! ```no_run
//! use vt_pipeline::{AcquiredFrame, InspectionStep, StepConfig};
//!
//! # fn demo(text: &str, frame: AcquiredFrame) -> Result<(), Box<dyn std::error::Error>> {
//! let mut step = InspectionStep::from_config(&StepConfig::from_json(text)?)?;
//! let out = step.run(&frame)?;
//! println!("{}: passed = {}", out.step, out.all_passed());
//! # Ok(())
//! # }
//! ```

pub mod graph;
pub mod sources;
pub mod step;

pub use graph::{GraphError, ToolConnection, ToolGraph};
pub use sources::{AcquiredFrame, FrameQueue, FrameSource, MemoryStepSource, StepSource};
pub use step::{InspectionStep, RunStatus, StepConfig, StepError, StepResult, ToolRun};
