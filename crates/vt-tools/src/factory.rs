//! Tool construction from a kind or a persisted record.

use crate::config::{ConfigError, ToolConfig, ToolId};
use crate::params::Parameters;
use crate::tool::{ToolKind, VisionTool};
use crate::tools::{
    BlobAnalysisTool, BlurTool, CaliperTool, CircleFitTool, EdgeDetectionTool, FeatureMatchTool,
    GrayscaleTool, HeightSlicerTool, HistogramTool, LineFitTool, MorphologyTool, ThresholdTool,
};

/// A tool of `kind` with default parameters.
pub fn create_tool(kind: ToolKind) -> Box<dyn VisionTool> {
    match kind {
        ToolKind::Grayscale => Box::new(GrayscaleTool::new()),
        ToolKind::Blur => Box::new(BlurTool::new()),
        ToolKind::Threshold => Box::new(ThresholdTool::new()),
        ToolKind::EdgeDetection => Box::new(EdgeDetectionTool::new()),
        ToolKind::Morphology => Box::new(MorphologyTool::new()),
        ToolKind::Histogram => Box::new(HistogramTool::new()),
        ToolKind::HeightSlicer => Box::new(HeightSlicerTool::new()),
        ToolKind::BlobAnalysis => Box::new(BlobAnalysisTool::new()),
        ToolKind::Caliper => Box::new(CaliperTool::new()),
        ToolKind::LineFit => Box::new(LineFitTool::new()),
        ToolKind::CircleFit => Box::new(CircleFitTool::new()),
        ToolKind::FeatureMatch => Box::new(FeatureMatchTool::new()),
    }
}

pub fn default_parameters(kind: ToolKind) -> Parameters {
    create_tool(kind).parameters()
}

/// Builds and configures a tool, collecting every fault in the record.
pub fn tool_from_config(cfg: &ToolConfig) -> Result<Box<dyn VisionTool>, Vec<ConfigError>> {
    let kind: ToolKind = cfg.tool_type.parse().map_err(|_| {
        vec![ConfigError::UnknownToolType {
            tool: cfg.id,
            tool_type: cfg.tool_type.clone(),
        }]
    })?;

    let mut errors = Vec::new();
    if cfg.use_roi && (cfg.roi_width <= 0 || cfg.roi_height <= 0) {
        errors.push(ConfigError::InvalidRoi {
            tool: cfg.id,
            width: cfg.roi_width,
            height: cfg.roi_height,
        });
    }
    for &name in kind.required_parameters() {
        if !cfg.parameters.contains_key(name) {
            errors.push(ConfigError::MissingParameter {
                tool: cfg.id,
                name: name.to_owned(),
            });
        }
    }

    let mut tool = create_tool(kind);
    if let Err(e) = tool.apply_parameters(&cfg.parameters) {
        errors.push(ConfigError::InvalidParameter {
            tool: cfg.id,
            reason: e.to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let common = tool.common_mut();
    if !cfg.name.is_empty() {
        common.name = cfg.name.clone();
    }
    common.is_enabled = cfg.is_enabled;
    common.use_roi = cfg.use_roi;
    common.roi = cfg.roi();
    Ok(tool)
}

/// Persisted record of `tool`; connections are left to the caller.
pub fn tool_to_config(id: ToolId, sequence: i32, tool: &dyn VisionTool) -> ToolConfig {
    let common = tool.common();
    let mut cfg = ToolConfig::new(id, tool.kind().type_name());
    cfg.name = common.name.clone();
    cfg.sequence = sequence;
    cfg.is_enabled = common.is_enabled;
    cfg.use_roi = common.use_roi;
    cfg.set_roi(common.roi);
    cfg.parameters = tool.parameters();
    cfg
}

#[cfg(test)]
mod tests {
    use vt_core::Rect;

    use super::{create_tool, default_parameters, tool_from_config, tool_to_config};
    use crate::config::{ConfigError, ToolConfig};
    use crate::result::DataValue;
    use crate::tool::ToolKind;

    #[test]
    fn every_kind_is_constructible() {
        for kind in ToolKind::ALL {
            let tool = create_tool(kind);
            assert_eq!(tool.kind(), kind);
            assert_eq!(tool.name(), kind.display_name());
            assert!(!default_parameters(kind).is_empty(), "{kind} has no parameters");
        }
    }

    #[test]
    fn config_round_trip_preserves_parameters() {
        let mut cfg = ToolConfig::new(7, "BlobAnalysis");
        cfg.name = "Holes".to_owned();
        cfg.sequence = 3;
        cfg.use_roi = true;
        cfg.set_roi(Rect::new(5, 6, 70, 80));
        cfg.parameters.insert("MinArea".to_owned(), DataValue::Int(40));
        cfg.parameters.insert("Polarity".to_owned(), DataValue::from("Dark"));
        cfg.parameters.insert("SomethingElse".to_owned(), DataValue::Int(1));

        let tool = tool_from_config(&cfg).expect("valid");
        assert_eq!(tool.name(), "Holes");
        assert_eq!(tool.common().roi, Rect::new(5, 6, 70, 80));

        let back = tool_to_config(7, 3, tool.as_ref());
        assert_eq!(back.parameters["MinArea"], DataValue::Float(40.0));
        assert_eq!(back.parameters["Polarity"], DataValue::from("Dark"));
        assert!(!back.parameters.contains_key("SomethingElse"));
        assert_eq!(back.roi(), cfg.roi());

        let again = tool_from_config(&back).expect("valid");
        assert_eq!(again.parameters(), tool.parameters());
    }

    #[test]
    fn collects_every_fault() {
        let mut cfg = ToolConfig::new(2, "Caliper");
        cfg.use_roi = true;
        cfg.parameters.insert("StartX".to_owned(), DataValue::Int(1));
        cfg.parameters.insert("MaxEdges".to_owned(), DataValue::from("many"));
        let errors = tool_from_config(&cfg).err().expect("invalid");
        assert!(errors.contains(&ConfigError::InvalidRoi { tool: 2, width: 0, height: 0 }));
        let missing: Vec<_> = errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::MissingParameter { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, ["StartY", "EndX", "EndY"]);
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidParameter { tool: 2, .. })));
    }

    #[test]
    fn unknown_type_is_reported() {
        let errors = tool_from_config(&ToolConfig::new(9, "Laser")).err().expect("invalid");
        assert_eq!(
            errors,
            vec![ConfigError::UnknownToolType {
                tool: 9,
                tool_type: "Laser".to_owned()
            }]
        );
    }

    #[test]
    fn display_name_is_accepted_as_type() {
        let tool = tool_from_config(&ToolConfig::new(1, "Edge Detection")).expect("valid");
        assert_eq!(tool.kind(), ToolKind::EdgeDetection);
    }
}
