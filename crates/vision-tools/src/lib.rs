//! Umbrella crate for the vision tool execution engine.
//!
//! Re-exports the image model, the tool contract with its concrete tools,
//! and the step executor. The algorithm crates stay reachable as modules.

pub use vt_core::*;
pub use vt_pipeline::*;
pub use vt_tools::*;

pub use vt_contour as contour;
pub use vt_edge as edge;
pub use vt_morph as morph;
pub use vt_pyr as pyr;
