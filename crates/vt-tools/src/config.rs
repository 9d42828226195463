//! Persisted tool records (camelCase JSON) and configuration faults.

use core::fmt;

use serde::{Deserialize, Serialize};
use vt_core::Rect;

use crate::params::Parameters;

pub type ToolId = u32;

/// Which facet of the upstream result feeds the downstream tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectionType {
    /// Upstream `output_image` replaces the frame as input.
    Image,
    /// Upstream `position` becomes the reference position.
    Coordinates,
    /// Upstream success gates execution.
    Result,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Image => "Image",
            Self::Coordinates => "Coordinates",
            Self::Result => "Result",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub source_tool_id: ToolId,
    pub connection_type: ConnectionType,
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub id: ToolId,
    pub tool_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sequence: i32,
    #[serde(default = "enabled_default")]
    pub is_enabled: bool,
    #[serde(rename = "useROI", default)]
    pub use_roi: bool,
    #[serde(default)]
    pub roi_x: i32,
    #[serde(default)]
    pub roi_y: i32,
    #[serde(default)]
    pub roi_width: i32,
    #[serde(default)]
    pub roi_height: i32,
    #[serde(default)]
    pub parameters: Parameters,
    /// Incoming connections.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl ToolConfig {
    pub fn new(id: ToolId, tool_type: impl Into<String>) -> Self {
        Self {
            id,
            tool_type: tool_type.into(),
            name: String::new(),
            sequence: 0,
            is_enabled: true,
            use_roi: false,
            roi_x: 0,
            roi_y: 0,
            roi_width: 0,
            roi_height: 0,
            parameters: Parameters::new(),
            connections: Vec::new(),
        }
    }

    pub fn roi(&self) -> Rect {
        Rect::new(self.roi_x, self.roi_y, self.roi_width, self.roi_height)
    }

    pub fn set_roi(&mut self, roi: Rect) {
        self.roi_x = roi.x;
        self.roi_y = roi.y;
        self.roi_width = roi.width;
        self.roi_height = roi.height;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    UnknownToolType {
        tool: ToolId,
        tool_type: String,
    },
    InvalidRoi {
        tool: ToolId,
        width: i32,
        height: i32,
    },
    MissingParameter {
        tool: ToolId,
        name: String,
    },
    InvalidParameter {
        tool: ToolId,
        reason: String,
    },
    DuplicateToolId(ToolId),
    SelfConnection(ToolId),
    DanglingConnection {
        tool: ToolId,
        source: ToolId,
    },
    DuplicateConnection {
        tool: ToolId,
        source: ToolId,
        kind: ConnectionType,
    },
    Cycle(Vec<ToolId>),
    UnknownStep(String),
    /// Unreadable or malformed step document.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownToolType { tool, tool_type } => {
                write!(f, "tool {tool}: unknown tool type '{tool_type}'")
            }
            Self::InvalidRoi { tool, width, height } => write!(
                f,
                "tool {tool}: ROI size must be positive when useROI is set, got {width}x{height}"
            ),
            Self::MissingParameter { tool, name } => {
                write!(f, "tool {tool}: missing required parameter {name}")
            }
            Self::InvalidParameter { tool, reason } => {
                write!(f, "tool {tool}: bad parameter value: {reason}")
            }
            Self::DuplicateToolId(id) => write!(f, "tool id {id} is used more than once"),
            Self::SelfConnection(id) => write!(f, "tool {id}: connection to itself"),
            Self::DanglingConnection { tool, source } => {
                write!(f, "tool {tool}: connection from unknown tool {source}")
            }
            Self::DuplicateConnection { tool, source, kind } => {
                write!(f, "tool {tool}: duplicate {kind} connection from {source}")
            }
            Self::Cycle(ids) => {
                let list: Vec<String> = ids.iter().map(ToString::to_string).collect();
                write!(f, "connection cycle through tools {}", list.join(", "))
            }
            Self::UnknownStep(name) => write!(f, "unknown step '{name}'"),
            Self::Parse(msg) => write!(f, "malformed step configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Every fault found while building a step, in discovery order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl ConfigErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, e: ConfigError) {
        self.0.push(e);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }
}

impl From<ConfigError> for ConfigErrors {
    fn from(e: ConfigError) -> Self {
        Self(vec![e])
    }
}

impl From<Vec<ConfigError>> for ConfigErrors {
    fn from(v: Vec<ConfigError>) -> Self {
        Self(v)
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no configuration errors"),
            [one] => write!(f, "{one}"),
            many => {
                write!(f, "{} configuration errors:", many.len())?;
                for e in many {
                    write!(f, "\n  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigErrors {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ConfigErrors, ConnectionType, ToolConfig};
    use crate::result::DataValue;

    #[test]
    fn tool_config_json_is_camel_case() {
        let json = r#"{
            "id": 3,
            "toolType": "BlobAnalysis",
            "name": "Holes",
            "sequence": 2,
            "isEnabled": true,
            "useROI": true,
            "roiX": 10, "roiY": 20, "roiWidth": 100, "roiHeight": 50,
            "parameters": { "MinArea": 25, "UseOtsu": true, "Polarity": "Dark" },
            "connections": [ { "sourceToolId": 1, "connectionType": "Coordinates" } ]
        }"#;
        let cfg: ToolConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(cfg.id, 3);
        assert!(cfg.use_roi);
        assert_eq!(cfg.roi().width, 100);
        assert_eq!(cfg.parameters["MinArea"], DataValue::Int(25));
        assert_eq!(cfg.connections[0].connection_type, ConnectionType::Coordinates);

        let out = serde_json::to_value(&cfg).expect("serialize");
        assert_eq!(out["useROI"], serde_json::json!(true));
        assert_eq!(out["toolType"], serde_json::json!("BlobAnalysis"));
        assert_eq!(out["connections"][0]["sourceToolId"], serde_json::json!(1));
    }

    #[test]
    fn minimal_record_takes_defaults() {
        let cfg: ToolConfig = serde_json::from_str(r#"{"id":1,"toolType":"Blur"}"#).expect("parse");
        assert!(cfg.is_enabled);
        assert!(!cfg.use_roi);
        assert!(cfg.parameters.is_empty());
    }

    #[test]
    fn errors_render_as_a_list() {
        let errs = ConfigErrors(vec![
            ConfigError::SelfConnection(4),
            ConfigError::Cycle(vec![1, 2]),
        ]);
        let text = errs.to_string();
        assert!(text.starts_with("2 configuration errors:"));
        assert!(text.contains("tool 4: connection to itself"));
        assert!(text.contains("cycle through tools 1, 2"));
    }
}
