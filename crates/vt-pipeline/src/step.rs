//! One inspection step: a set of configured tools wired into an acyclic
//! graph and executed against a single acquisition.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use vt_core::Frame;
use vt_tools::{
    ConfigError, ConfigErrors, ConnectionConfig, ConnectionType, ExecContext, ToolConfig, ToolId,
    ToolKind, VisionResult, VisionTool, tool_from_config, tool_to_config,
};

use crate::graph::{GraphError, ToolConnection, ToolGraph};
use crate::sources::{AcquiredFrame, StepSource};

/// Persisted step: a name and its tool records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

impl StepConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigErrors> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    pub fn to_json(&self) -> Result<String, ConfigErrors> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepError {
    /// The acquisition reported failure.
    Acquisition(String),
    /// Neither a 2D image nor a depth map was delivered.
    NoImage,
    Graph(GraphError),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquisition(msg) => write!(f, "acquisition failed: {msg}"),
            Self::NoImage => write!(f, "acquisition delivered no image"),
            Self::Graph(e) => write!(f, "tool graph: {e}"),
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Graph(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GraphError> for StepError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Executed,
    /// Not run; names the upstream that prevented it.
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRun {
    pub tool_id: ToolId,
    pub name: String,
    pub kind: ToolKind,
    pub status: RunStatus,
    pub result: VisionResult,
}

impl ToolRun {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, RunStatus::Skipped(_))
    }
}

/// Per-tool outcomes in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step: String,
    pub results: Vec<ToolRun>,
    pub elapsed: Duration,
}

impl StepResult {
    /// Every enabled tool ran and succeeded.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.result.success)
    }

    pub fn get(&self, id: ToolId) -> Option<&ToolRun> {
        self.results.iter().find(|r| r.tool_id == id)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.result.success).count()
    }
}

#[derive(Debug)]
struct Slot {
    tool: Box<dyn VisionTool>,
    sequence: i32,
}

/// Tools keyed by id plus the connections between them.
#[derive(Debug, Default)]
pub struct InspectionStep {
    name: String,
    tools: BTreeMap<ToolId, Slot>,
    graph: ToolGraph,
}

impl InspectionStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &ToolGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn add_tool(&mut self, id: ToolId, sequence: i32, tool: Box<dyn VisionTool>) -> Result<(), GraphError> {
        self.graph.add_tool(id, sequence)?;
        self.tools.insert(id, Slot { tool, sequence });
        Ok(())
    }

    /// Removes the tool and every connection touching it.
    pub fn remove_tool(&mut self, id: ToolId) -> Option<Box<dyn VisionTool>> {
        self.graph.remove_tool(id);
        self.tools.remove(&id).map(|slot| slot.tool)
    }

    pub fn tool(&self, id: ToolId) -> Option<&dyn VisionTool> {
        self.tools.get(&id).map(|slot| slot.tool.as_ref())
    }

    pub fn tool_mut(&mut self, id: ToolId) -> Option<&mut (dyn VisionTool + 'static)> {
        self.tools.get_mut(&id).map(|slot| slot.tool.as_mut())
    }

    pub fn tool_ids(&self) -> impl Iterator<Item = ToolId> + '_ {
        self.tools.keys().copied()
    }

    pub fn connect(&mut self, source: ToolId, target: ToolId, kind: ConnectionType) -> Result<(), GraphError> {
        self.graph.add_connection(ToolConnection::new(source, target, kind))
    }

    pub fn disconnect(&mut self, source: ToolId, target: ToolId, kind: ConnectionType) -> bool {
        self.graph.remove_connection(&ToolConnection::new(source, target, kind))
    }

    pub fn load(source: &dyn StepSource, name: &str) -> Result<Self, ConfigErrors> {
        Self::from_config(&source.load_step(name)?)
    }

    /// Builds every tool and wires every connection, reporting all faults
    /// at once.
    pub fn from_config(cfg: &StepConfig) -> Result<Self, ConfigErrors> {
        let mut errors = ConfigErrors::default();
        let mut step = Self::new(cfg.name.clone());

        // Nodes first, so connection checks do not depend on record order
        // or on whether a tool record itself was valid.
        for tc in &cfg.tools {
            if step.graph.add_tool(tc.id, tc.sequence).is_err() {
                errors.push(ConfigError::DuplicateToolId(tc.id));
                continue;
            }
            match tool_from_config(tc) {
                Ok(tool) => {
                    step.tools.insert(
                        tc.id,
                        Slot {
                            tool,
                            sequence: tc.sequence,
                        },
                    );
                }
                Err(faults) => faults.into_iter().for_each(|e| errors.push(e)),
            }
        }

        let mut wired = BTreeSet::new();
        for tc in &cfg.tools {
            if !wired.insert(tc.id) {
                continue;
            }
            for conn in &tc.connections {
                let edge = ToolConnection::new(conn.source_tool_id, tc.id, conn.connection_type);
                if let Err(e) = step.graph.add_connection(edge) {
                    errors.push(match e {
                        GraphError::SelfConnection(id) => ConfigError::SelfConnection(id),
                        GraphError::UnknownTool(source) => ConfigError::DanglingConnection { tool: tc.id, source },
                        GraphError::DuplicateConnection(c) => ConfigError::DuplicateConnection {
                            tool: c.target,
                            source: c.source,
                            kind: c.kind,
                        },
                        GraphError::Cycle(ids) => ConfigError::Cycle(ids),
                        GraphError::DuplicateTool(id) => ConfigError::DuplicateToolId(id),
                    });
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        tracing::debug!(
            step = %step.name,
            tools = step.tools.len(),
            connections = step.graph.connections().len(),
            "step configured"
        );
        Ok(step)
    }

    /// Persisted form; incoming connections live on their target record.
    pub fn to_config(&self) -> StepConfig {
        let tools = self
            .tools
            .iter()
            .map(|(&id, slot)| {
                let mut tc = tool_to_config(id, slot.sequence, slot.tool.as_ref());
                tc.connections = self
                    .graph
                    .connections_into(id)
                    .map(|c| ConnectionConfig {
                        source_tool_id: c.source,
                        connection_type: c.kind,
                    })
                    .collect();
                tc
            })
            .collect();
        StepConfig {
            name: self.name.clone(),
            tools,
        }
    }

    /// Runs every enabled tool once in dependency order. Tool failures are
    /// reported per tool and never abort the step.
    pub fn run(&mut self, frame: &AcquiredFrame) -> Result<StepResult, StepError> {
        if !frame.success {
            return Err(StepError::Acquisition(frame.message.clone()));
        }
        let depth = frame.point_cloud.clone().map(Frame::Depth32);
        let Some(primary) = frame.image2d.as_ref().or(depth.as_ref()) else {
            return Err(StepError::NoImage);
        };

        let start = Instant::now();
        let tools = &mut self.tools;
        let order = self
            .graph
            .topological_order(|id| tools.get(&id).is_some_and(|slot| slot.tool.is_enabled()))?;

        let mut runs: Vec<ToolRun> = Vec::with_capacity(order.len());
        let mut index: BTreeMap<ToolId, usize> = BTreeMap::new();

        for id in order {
            let Some(slot) = tools.get_mut(&id) else {
                continue;
            };
            let tool = slot.tool.as_mut();
            let base = if tool.requires_depth() {
                depth.as_ref().unwrap_or(primary)
            } else {
                frame.image2d.as_ref().unwrap_or(primary)
            };

            let mut input = base;
            let mut ctx = ExecContext::default();
            let mut blocked = None;
            let mut fed_image = false;
            for c in self.graph.connections_into(id) {
                // Disabled upstream tools never ran; their edges are inert.
                let Some(&i) = index.get(&c.source) else {
                    continue;
                };
                let upstream = &runs[i];
                if let RunStatus::Skipped(_) = upstream.status {
                    blocked = Some(format!("upstream tool {} ({}) was skipped", upstream.name, c.source));
                    break;
                }
                if !upstream.result.success {
                    blocked = Some(format!("upstream tool {} ({}) failed", upstream.name, c.source));
                    break;
                }
                match c.kind {
                    ConnectionType::Image => {
                        // Measurement tools only produce an overlay; the
                        // frame stays the input then.
                        if let (false, Some(img)) = (fed_image, upstream.result.output_image.as_ref()) {
                            input = img;
                            fed_image = true;
                        }
                    }
                    ConnectionType::Coordinates => match upstream.result.position {
                        Some(p) => ctx.reference = Some(p),
                        None => {
                            blocked = Some(format!(
                                "upstream tool {} ({}) reported no position",
                                upstream.name, c.source
                            ));
                            break;
                        }
                    },
                    ConnectionType::Result => {}
                }
            }

            let run = match blocked {
                Some(reason) => {
                    tracing::warn!(step = %self.name, tool = %tool.name(), "skipped: {reason}");
                    ToolRun {
                        tool_id: id,
                        name: tool.name().to_owned(),
                        kind: tool.kind(),
                        result: VisionResult::failure(reason.clone()),
                        status: RunStatus::Skipped(reason),
                    }
                }
                None => {
                    let result = tool.execute_with(input, &ctx);
                    ToolRun {
                        tool_id: id,
                        name: tool.name().to_owned(),
                        kind: tool.kind(),
                        status: RunStatus::Executed,
                        result,
                    }
                }
            };
            index.insert(id, runs.len());
            runs.push(run);
        }

        let result = StepResult {
            step: self.name.clone(),
            results: runs,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            step = %result.step,
            tools = result.results.len(),
            passed = result.passed_count(),
            skipped = result.results.iter().filter(|r| r.is_skipped()).count(),
            elapsed_ms = result.elapsed.as_secs_f64() * 1e3,
            "step finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use vt_core::{Frame, Image, Rect};
    use vt_tools::{
        ConfigError, ConnectionConfig, ConnectionType, DataValue, ToolConfig, ToolKind,
        create_tool,
    };

    use super::{InspectionStep, RunStatus, StepConfig, StepError};
    use crate::graph::GraphError;
    use crate::sources::{AcquiredFrame, MemoryStepSource};

    /// Bright disks of radius 20 at (60, 60) and radius 10 at (150, 140).
    fn disks() -> Frame {
        Frame::Gray8(Image::from_fn(200, 180, |x, y| {
            let d = |cx: f32, cy: f32| {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                dx * dx + dy * dy
            };
            if d(60.0, 60.0) <= 400.0 || d(150.0, 140.0) <= 100.0 { 220 } else { 25 }
        }))
    }

    fn record(id: u32, tool_type: &str, sequence: i32) -> ToolConfig {
        let mut tc = ToolConfig::new(id, tool_type);
        tc.sequence = sequence;
        tc
    }

    fn connect(tc: &mut ToolConfig, source: u32, kind: ConnectionType) {
        tc.connections.push(ConnectionConfig {
            source_tool_id: source,
            connection_type: kind,
        });
    }

    fn circle_fit(id: u32, center: (f32, f32), radius: f32) -> ToolConfig {
        let mut tc = record(id, "CircleFit", 0);
        tc.parameters.insert("CenterX".to_owned(), DataValue::Float(center.0 as f64));
        tc.parameters.insert("CenterY".to_owned(), DataValue::Float(center.1 as f64));
        tc.parameters.insert("Radius".to_owned(), DataValue::Float(radius as f64));
        tc
    }

    #[test]
    fn threshold_feeds_blob_analysis() {
        let mut cfg = StepConfig::new("Holes");
        let mut th = record(1, "Threshold", 0);
        th.parameters.insert("Threshold".to_owned(), DataValue::Int(100));
        let mut blob = record(2, "BlobAnalysis", 1);
        blob.parameters.insert("InputIsBinary".to_owned(), DataValue::Bool(true));
        connect(&mut blob, 1, ConnectionType::Image);
        cfg.tools = vec![blob, th];

        let mut step = InspectionStep::from_config(&cfg).expect("valid");
        let out = step.run(&AcquiredFrame::from_image(disks())).expect("run");
        assert!(out.all_passed());
        assert_eq!(out.results.iter().map(|r| r.tool_id).collect::<Vec<_>>(), [1, 2]);
        let blobs = &out.results[1].result;
        assert_eq!(blobs.get_f64("BlobCount"), Some(2.0));
        let x = blobs.get_f64("Blob0.X").expect("x");
        assert!((x - 60.0).abs() < 0.5, "x = {x}");
    }

    #[test]
    fn failed_upstream_skips_downstream_transitively() {
        let mut cfg = StepConfig::new("Gate");
        // Nominal circle far from any edge.
        let fit = circle_fit(1, (20.0, 160.0), 5.0);
        let mut blob = record(2, "BlobAnalysis", 1);
        connect(&mut blob, 1, ConnectionType::Result);
        let mut hist = record(3, "Histogram", 2);
        connect(&mut hist, 2, ConnectionType::Result);
        let gray = record(4, "Grayscale", 3);
        cfg.tools = vec![fit, blob, hist, gray];

        let mut step = InspectionStep::from_config(&cfg).expect("valid");
        let out = step.run(&AcquiredFrame::from_image(disks())).expect("run");
        assert!(!out.all_passed());

        let fit = out.get(1).expect("fit");
        assert_eq!(fit.status, RunStatus::Executed);
        assert!(!fit.result.success);

        let blob = out.get(2).expect("blob");
        assert!(blob.is_skipped());
        assert!(!blob.result.success);
        assert!(blob.result.message.contains("Circle Fit"), "{}", blob.result.message);
        assert!(step.tool(2).and_then(|t| t.last_result()).is_none());

        let hist = out.get(3).expect("hist");
        assert!(matches!(&hist.status, RunStatus::Skipped(r) if r.contains("was skipped")));
        // Unconnected tools are unaffected.
        assert!(out.get(4).expect("gray").result.success);
    }

    #[test]
    fn coordinates_connection_recentres_roi() {
        let mut cfg = StepConfig::new("Locate");
        let fit = circle_fit(1, (58.0, 62.0), 24.0);
        let mut blob = record(2, "BlobAnalysis", 1);
        // Nothing bright in the configured ROI; the reference moves it.
        blob.use_roi = true;
        blob.set_roi(Rect::new(0, 100, 61, 61));
        connect(&mut blob, 1, ConnectionType::Coordinates);
        cfg.tools = vec![fit, blob];

        let mut step = InspectionStep::from_config(&cfg).expect("valid");
        let out = step.run(&AcquiredFrame::from_image(disks())).expect("run");
        let fit = &out.get(1).expect("fit").result;
        assert!(fit.success, "{}", fit.message);
        let blob = &out.get(2).expect("blob").result;
        assert!(blob.success, "{}", blob.message);
        let x = blob.get_f64("Blob0.X").expect("x");
        let y = blob.get_f64("Blob0.Y").expect("y");
        assert!((x - 60.0).abs() < 1.0 && (y - 60.0).abs() < 1.0, "({x}, {y})");

        // Without the upstream the same ROI sees only background.
        step.tool_mut(1).expect("fit").common_mut().is_enabled = false;
        let out = step.run(&AcquiredFrame::from_image(disks())).expect("run");
        assert_eq!(out.results.len(), 1);
        assert!(!out.results[0].result.success);
    }

    #[test]
    fn depth_tools_get_the_point_cloud() {
        let mut cfg = StepConfig::new("Height");
        let mut slicer = record(1, "HeightSlicer", 0);
        slicer.parameters.insert("MinHeight".to_owned(), DataValue::Float(5.0));
        slicer.parameters.insert("MaxHeight".to_owned(), DataValue::Float(15.0));
        cfg.tools = vec![slicer, record(2, "Grayscale", 1)];
        let mut step = InspectionStep::from_config(&cfg).expect("valid");

        let cloud = Image::from_fn(40, 30, |x, _| if x < 10 { 10.0f32 } else { 30.0 });
        let frame = AcquiredFrame::from_image(disks()).with_point_cloud(cloud.clone());
        let out = step.run(&frame).expect("run");
        assert!(out.all_passed());
        assert_eq!(out.get(1).and_then(|r| r.result.get_f64("InRangeCount")), Some(300.0));

        // Depth-only acquisition: the 2D tool falls back to the depth map
        // and fails on its own.
        let depth_only = AcquiredFrame {
            image2d: None,
            ..AcquiredFrame::from_image(disks()).with_point_cloud(cloud)
        };
        let out = step.run(&depth_only).expect("run");
        assert!(out.get(1).expect("slicer").result.success);

        // No depth at all: the slicer reports the wrong format.
        let out = step.run(&AcquiredFrame::from_image(disks())).expect("run");
        assert!(!out.get(1).expect("slicer").result.success);
    }

    #[test]
    fn unusable_frames_are_errors() {
        let mut step = InspectionStep::new("Empty");
        step.add_tool(1, 0, create_tool(ToolKind::Grayscale)).expect("add");
        assert_eq!(
            step.run(&AcquiredFrame::failed("camera timeout")),
            Err(StepError::Acquisition("camera timeout".to_owned()))
        );
        let blank = AcquiredFrame {
            success: true,
            message: String::new(),
            image2d: None,
            point_cloud: None,
        };
        assert_eq!(step.run(&blank), Err(StepError::NoImage));
    }

    #[test]
    fn config_faults_are_collected() {
        let mut cfg = StepConfig::new("Broken");
        let mut a = record(1, "Blur", 0);
        connect(&mut a, 1, ConnectionType::Image);
        connect(&mut a, 2, ConnectionType::Image);
        let mut b = record(2, "Threshold", 1);
        connect(&mut b, 1, ConnectionType::Image);
        connect(&mut b, 9, ConnectionType::Result);
        let c = record(3, "Laser", 2);
        let mut dup = record(2, "Blur", 3);
        dup.use_roi = true;
        cfg.tools = vec![a, b, c, dup];

        let errors = InspectionStep::from_config(&cfg).err().expect("invalid");
        let list: Vec<ConfigError> = errors.iter().cloned().collect();
        assert_eq!(list.iter().filter(|e| **e == ConfigError::DuplicateToolId(2)).count(), 1);
        assert!(list.contains(&ConfigError::UnknownToolType {
            tool: 3,
            tool_type: "Laser".to_owned()
        }));
        assert!(list.contains(&ConfigError::SelfConnection(1)));
        assert!(list.contains(&ConfigError::DanglingConnection { tool: 2, source: 9 }));
        assert!(list.iter().any(|e| matches!(e, ConfigError::Cycle(ids) if ids.contains(&1) && ids.contains(&2))));
        // The duplicate record is not validated further.
        assert!(!list.iter().any(|e| matches!(e, ConfigError::InvalidRoi { .. })));
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut cfg = StepConfig::new("RoundTrip");
        let mut th = record(4, "Threshold", 0);
        th.name = "Binarize".to_owned();
        th.parameters.insert("Method".to_owned(), DataValue::from("Otsu"));
        let mut blob = record(7, "BlobAnalysis", 1);
        blob.use_roi = true;
        blob.set_roi(Rect::new(10, 10, 100, 80));
        connect(&mut blob, 4, ConnectionType::Image);
        connect(&mut blob, 4, ConnectionType::Result);
        cfg.tools = vec![th, blob];

        let step = InspectionStep::from_config(&cfg).expect("valid");
        let saved = step.to_config();
        let text = saved.to_json().expect("json");
        assert!(text.contains("\"useROI\": true"), "{text}");

        let loaded = StepConfig::from_json(&text).expect("parse");
        assert_eq!(loaded, saved);
        let again = InspectionStep::from_config(&loaded).expect("valid");
        assert_eq!(again.to_config(), saved);
        assert_eq!(again.graph().connections_into(7).count(), 2);
        assert_eq!(again.tool(4).map(|t| t.name().to_owned()), Some("Binarize".to_owned()));
    }

    #[test]
    fn editing_keeps_graph_consistent() {
        let mut step = InspectionStep::new("Edit");
        for (id, kind) in [(1, ToolKind::Grayscale), (2, ToolKind::Blur), (3, ToolKind::Threshold)] {
            step.add_tool(id, id as i32, create_tool(kind)).expect("add");
        }
        step.connect(1, 2, ConnectionType::Image).expect("edge");
        step.connect(2, 3, ConnectionType::Image).expect("edge");
        assert_eq!(step.connect(2, 2, ConnectionType::Result), Err(GraphError::SelfConnection(2)));
        assert!(matches!(step.connect(3, 1, ConnectionType::Result), Err(GraphError::Cycle(_))));

        assert!(step.remove_tool(2).is_some());
        assert!(step.graph().connections().is_empty());
        assert!(!step.disconnect(1, 2, ConnectionType::Image));
        let out = step.run(&AcquiredFrame::from_image(disks())).expect("run");
        assert_eq!(out.results.len(), 2);
        assert!(out.all_passed());
    }

    #[test]
    fn loads_from_a_step_source() {
        let mut src = MemoryStepSource::new();
        let mut cfg = StepConfig::new("Stored");
        cfg.tools.push(record(1, "Histogram", 0));
        src.insert(cfg);
        let step = InspectionStep::load(&src, "Stored").expect("load");
        assert_eq!(step.len(), 1);
        assert!(InspectionStep::load(&src, "Missing").is_err());
    }
}
