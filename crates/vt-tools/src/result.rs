//! What a tool hands back: images, descriptive graphics and named scalars.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vt_core::{Ellipse, Frame, Point2f, Rect};

use crate::draw::render_overlays;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);
    pub const YELLOW: Self = Self::new(255, 255, 0);
    pub const CYAN: Self = Self::new(0, 255, 255);
    pub const MAGENTA: Self = Self::new(255, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayKind {
    Point,
    Line,
    Polyline,
    Polygon,
    /// `points[0]` and `points[1]` are opposite corners.
    Rectangle,
    /// Centre in `points[0]`, `radius` set.
    Circle,
    /// Closed outline sampled along the ellipse.
    Ellipse,
    /// Centre in `points[0]`, arm length in `radius`.
    Cross,
    /// Anchor in `points[0]`, text in `label`.
    Text,
}

/// Purely descriptive annotation in absolute frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicOverlay {
    pub kind: OverlayKind,
    pub points: Vec<Point2f>,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
}

impl GraphicOverlay {
    fn new(kind: OverlayKind, points: Vec<Point2f>, color: Color) -> Self {
        Self {
            kind,
            points,
            color,
            label: None,
            radius: None,
        }
    }

    pub fn point(p: Point2f, color: Color) -> Self {
        Self::new(OverlayKind::Point, vec![p], color)
    }

    pub fn line(a: Point2f, b: Point2f, color: Color) -> Self {
        Self::new(OverlayKind::Line, vec![a, b], color)
    }

    pub fn polyline(points: Vec<Point2f>, color: Color) -> Self {
        Self::new(OverlayKind::Polyline, points, color)
    }

    pub fn polygon(points: Vec<Point2f>, color: Color) -> Self {
        Self::new(OverlayKind::Polygon, points, color)
    }

    pub fn rectangle(rect: Rect, color: Color) -> Self {
        let [tl, _, br, _] = rect.corners();
        Self::new(OverlayKind::Rectangle, vec![tl, br], color)
    }

    pub fn circle(center: Point2f, radius: f32, color: Color) -> Self {
        Self {
            radius: Some(radius),
            ..Self::new(OverlayKind::Circle, vec![center], color)
        }
    }

    pub fn ellipse(ellipse: &Ellipse, color: Color) -> Self {
        Self::new(OverlayKind::Ellipse, ellipse.sample_points(48), color)
    }

    pub fn cross(center: Point2f, arm: f32, color: Color) -> Self {
        Self {
            radius: Some(arm),
            ..Self::new(OverlayKind::Cross, vec![center], color)
        }
    }

    pub fn text(anchor: Point2f, text: impl Into<String>, color: Color) -> Self {
        Self {
            label: Some(text.into()),
            ..Self::new(OverlayKind::Text, vec![anchor], color)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Scalar measurement value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl DataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for DataValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for DataValue {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Outcome of one tool execution.
///
/// A failed result never carries images, graphics or data; only the
/// diagnostic `series` may survive a failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VisionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip)]
    pub output_image: Option<Frame>,
    /// Always RGB when present.
    #[serde(skip)]
    pub overlay_image: Option<Frame>,
    pub graphics: Vec<GraphicOverlay>,
    pub data: BTreeMap<String, DataValue>,
    /// Primary found location, absolute frame coordinates.
    pub position: Option<Point2f>,
    /// Named diagnostic arrays (caliper profile, histogram bins, ...).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub series: BTreeMap<String, Vec<f32>>,
}

impl VisionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, frame: Frame) -> Self {
        self.output_image = Some(frame);
        self
    }

    pub fn with_position(mut self, p: Point2f) -> Self {
        self.position = Some(p);
        self
    }

    pub fn with_series(mut self, name: &str, values: Vec<f32>) -> Self {
        self.series.insert(name.to_owned(), values);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn push_graphic(&mut self, g: GraphicOverlay) {
        self.graphics.push(g);
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.data.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(DataValue::as_f64)
    }

    /// Rasterizes the current graphics over `base` into `overlay_image`.
    pub fn render_overlay(&mut self, base: &Frame) {
        self.overlay_image = Some(render_overlays(base, &self.graphics));
    }

    /// Strips everything a failure must not carry.
    pub(crate) fn into_failure(self) -> Self {
        Self {
            success: false,
            message: self.message,
            series: self.series,
            ..Self::default()
        }
    }
}
