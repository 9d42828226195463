//! Caliper probes shared by the fitting tools: one best edge per search
//! segment.

use serde::{Deserialize, Serialize};
use vt_core::{Image, Point2f, WorkRegion};
use vt_edge::{Caliper, CaliperConfig};

use crate::result::{Color, GraphicOverlay, VisionResult};
use crate::tools::EdgePolarityMode;

/// Edge search settings common to every probe of a fitting tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EdgeSearch {
    pub search_length: f32,
    pub search_width: usize,
    pub filter_half_width: f32,
    pub edge_threshold: f32,
    pub polarity: EdgePolarityMode,
}

impl Default for EdgeSearch {
    fn default() -> Self {
        Self {
            search_length: 40.0,
            search_width: 5,
            filter_half_width: 2.0,
            edge_threshold: 20.0,
            polarity: EdgePolarityMode::Any,
        }
    }
}

impl EdgeSearch {
    pub fn sanitized(self) -> Self {
        let finite = |v: f32, fallback: f32| if v.is_finite() { v.max(0.0) } else { fallback };
        Self {
            search_length: finite(self.search_length, 40.0).max(2.0),
            search_width: self.search_width.clamp(1, 255),
            filter_half_width: finite(self.filter_half_width, 0.0),
            edge_threshold: finite(self.edge_threshold, 0.0),
            ..self
        }
    }

    /// Segment of `search_length` centred on `center`, walking along `dir`.
    pub(crate) fn segment(&self, center: Point2f, dir: vt_core::Vec2f) -> (Point2f, Point2f) {
        let half = dir * (0.5 * self.search_length);
        (center - half, center + half)
    }
}

/// Probe segments (absolute) and the edge each one found.
pub(crate) struct Probes {
    pub segments: Vec<(Point2f, Point2f)>,
    /// Absolute edge positions, one per probe that found an edge.
    pub hits: Vec<Point2f>,
}

impl Probes {
    pub(crate) fn run(
        search: &EdgeSearch,
        region: &WorkRegion<'_>,
        gray: &Image<u8>,
        segments: Vec<(Point2f, Point2f)>,
    ) -> Self {
        let offset = region.offset();
        let view = gray.as_view();
        let hits = segments
            .iter()
            .filter_map(|&(a, b)| {
                let mut caliper = Caliper::new(CaliperConfig {
                    start: a - offset,
                    end: b - offset,
                    search_width: search.search_width,
                    filter_half_width: search.filter_half_width,
                    edge_threshold: search.edge_threshold,
                    polarity: search.polarity.into(),
                    max_edges: 1,
                    ..CaliperConfig::default()
                });
                let m = caliper.measure(&view);
                m.edges.first().map(|e| region.to_absolute(e.point))
            })
            .collect();
        Self { segments, hits }
    }

    /// Search segments, then hits coloured by `inlier_mask` (all green
    /// when it is empty).
    pub(crate) fn annotate(&self, result: &mut VisionResult, inlier_mask: &[bool]) {
        for &(a, b) in &self.segments {
            result.push_graphic(GraphicOverlay::line(a, b, Color::CYAN));
        }
        for (i, &p) in self.hits.iter().enumerate() {
            let color = match inlier_mask.get(i) {
                Some(false) => Color::RED,
                _ => Color::GREEN,
            };
            result.push_graphic(GraphicOverlay::point(p, color));
        }
    }
}
