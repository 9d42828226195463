//! The vision tool contract and the twelve concrete tools.
//!
//! Every tool implements [`VisionTool`]: it scopes its work to an optional
//! ROI (re-centred on a reference position when one arrives over a
//! `Coordinates` connection), never panics outward, and reports a
//! [`VisionResult`] whose positions, graphics and images are in absolute
//! frame coordinates.
//!
//! Tools are configured through typed parameter structs that round-trip
//! through a flat [`Parameters`] map with PascalCase keys; [`factory`]
//! builds them from persisted [`ToolConfig`] records.

pub mod config;
pub mod draw;
pub mod error;
pub mod factory;
pub mod fit;
pub mod params;
pub mod planes;
pub mod result;
pub mod stats;
pub mod tool;
pub mod tools;

pub use config::{ConfigError, ConfigErrors, ConnectionConfig, ConnectionType, ToolConfig, ToolId};
pub use error::ToolError;
pub use factory::{create_tool, default_parameters, tool_from_config, tool_to_config};
pub use fit::{CircleModel, FitError, LineModel, RansacConfig};
pub use params::{Parameters, from_parameters, merge_parameters, to_parameters};
pub use result::{Color, DataValue, GraphicOverlay, OverlayKind, VisionResult};
pub use tool::{ExecContext, ToolCache, ToolCommon, ToolKind, UnknownToolKind, VisionTool};
pub use tools::*;
