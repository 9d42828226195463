//! Blob analysis: binarize, trace borders, measure, filter, sort.
//!
//! Contours are translated into frame coordinates before any property is
//! computed, so every reported value is absolute.

use serde::{Deserialize, Serialize};
use vt_contour::{ApproxMode, RetrievalMode, ShapeMetrics, find_contours};
use vt_core::{Ellipse, Frame, Image, PixelFormat, Point2f, Rect, RotatedRect, Vec2f};

use crate::error::ToolError;
use crate::result::{Color, GraphicOverlay, VisionResult};
use crate::stats::{histogram_u8, otsu_threshold};
use crate::tool::{ExecContext, ToolCache, ToolCommon, ToolKind, VisionTool, tool_state};
use crate::tools::tool_basics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlobPolarity {
    /// Foreground is `> Threshold`.
    #[default]
    Bright,
    /// Foreground is `<= Threshold`.
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourRetrieval {
    #[default]
    External,
    List,
    Tree,
}

impl From<ContourRetrieval> for RetrievalMode {
    fn from(mode: ContourRetrieval) -> Self {
        match mode {
            ContourRetrieval::External => RetrievalMode::External,
            ContourRetrieval::List => RetrievalMode::List,
            ContourRetrieval::Tree => RetrievalMode::Tree,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourApprox {
    None,
    #[default]
    Simple,
}

impl From<ContourApprox> for ApproxMode {
    fn from(mode: ContourApprox) -> Self {
        match mode {
            ContourApprox::None => ApproxMode::None,
            ContourApprox::Simple => ApproxMode::Simple,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlobSortKey {
    #[default]
    Area,
    Perimeter,
    CenterX,
    CenterY,
    Circularity,
    AspectRatio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BlobParams {
    pub threshold: u8,
    pub polarity: BlobPolarity,
    pub use_otsu: bool,
    /// Any non-zero pixel is foreground; thresholding is skipped.
    pub input_is_binary: bool,
    pub retrieval_mode: ContourRetrieval,
    pub approx_mode: ContourApprox,
    pub min_area: f64,
    pub max_area: f64,
    pub min_circularity: f64,
    pub max_circularity: f64,
    pub min_convexity: f64,
    pub min_perimeter: f64,
    pub max_perimeter: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub sort_by: BlobSortKey,
    pub sort_descending: bool,
    pub max_blob_count: usize,
    pub draw_contours: bool,
    pub draw_bounding_boxes: bool,
    pub draw_centroids: bool,
    pub draw_labels: bool,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            threshold: 128,
            polarity: BlobPolarity::Bright,
            use_otsu: false,
            input_is_binary: false,
            retrieval_mode: ContourRetrieval::External,
            approx_mode: ContourApprox::Simple,
            min_area: 10.0,
            max_area: 1.0e9,
            min_circularity: 0.0,
            max_circularity: 1.0,
            min_convexity: 0.0,
            min_perimeter: 0.0,
            max_perimeter: 1.0e9,
            min_aspect_ratio: 0.0,
            max_aspect_ratio: 1.0e9,
            sort_by: BlobSortKey::Area,
            sort_descending: true,
            max_blob_count: 100,
            draw_contours: true,
            draw_bounding_boxes: true,
            draw_centroids: true,
            draw_labels: true,
        }
    }
}

/// `(lo, hi)` made finite, non-negative and ordered.
fn range(lo: f64, hi: f64) -> (f64, f64) {
    let lo = if lo.is_finite() { lo.max(0.0) } else { 0.0 };
    let hi = if hi.is_nan() { lo } else { hi.max(lo) };
    (lo, hi)
}

impl BlobParams {
    pub fn sanitized(self) -> Self {
        let (min_area, max_area) = range(self.min_area, self.max_area);
        let (min_perimeter, max_perimeter) = range(self.min_perimeter, self.max_perimeter);
        let (min_aspect_ratio, max_aspect_ratio) = range(self.min_aspect_ratio, self.max_aspect_ratio);
        let (min_circularity, max_circularity) = range(self.min_circularity.min(1.0), self.max_circularity.min(1.0));
        Self {
            min_area,
            max_area,
            min_perimeter,
            max_perimeter,
            min_aspect_ratio,
            max_aspect_ratio,
            min_circularity,
            max_circularity,
            min_convexity: if self.min_convexity.is_finite() { self.min_convexity.clamp(0.0, 1.0) } else { 0.0 },
            max_blob_count: self.max_blob_count.max(1),
            ..self
        }
    }
}

/// One measured region, in frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blob {
    /// Index in the sorted, truncated result.
    pub id: usize,
    pub contour: Vec<Point2f>,
    pub is_hole: bool,
    pub centroid: Point2f,
    pub area: f64,
    pub perimeter: f64,
    pub circularity: f64,
    pub aspect_ratio: f64,
    pub convexity: f64,
    pub solidity: f64,
    pub extent: f64,
    pub equivalent_diameter: f64,
    pub angle: f64,
    pub bounding_rect: Rect,
    pub min_area_rect: Option<RotatedRect>,
    pub ellipse: Option<Ellipse>,
    pub hull_area: f64,
}

impl Blob {
    fn from_metrics(contour: Vec<Point2f>, is_hole: bool, m: ShapeMetrics) -> Self {
        Self {
            id: 0,
            contour,
            is_hole,
            centroid: m.centroid,
            area: m.area,
            perimeter: m.perimeter,
            circularity: m.circularity,
            aspect_ratio: m.aspect_ratio,
            convexity: m.convexity,
            solidity: m.convexity,
            extent: m.extent,
            equivalent_diameter: m.equivalent_diameter,
            angle: m.angle,
            bounding_rect: m.bounding_rect,
            min_area_rect: m.min_area_rect,
            ellipse: m.ellipse,
            hull_area: m.hull_area,
        }
    }

    fn sort_value(&self, key: BlobSortKey) -> f64 {
        match key {
            BlobSortKey::Area => self.area,
            BlobSortKey::Perimeter => self.perimeter,
            BlobSortKey::CenterX => self.centroid.x as f64,
            BlobSortKey::CenterY => self.centroid.y as f64,
            BlobSortKey::Circularity => self.circularity,
            BlobSortKey::AspectRatio => self.aspect_ratio,
        }
    }
}

struct Detection {
    blobs: Vec<Blob>,
    candidates: usize,
    /// Binarized region, 0/255.
    mask: Image<u8>,
    threshold: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct BlobAnalysisTool {
    common: ToolCommon,
    params: BlobParams,
    cache: ToolCache,
}

tool_basics!(BlobAnalysisTool, BlobParams, ToolKind::BlobAnalysis);

impl BlobAnalysisTool {
    pub fn set_threshold(&mut self, threshold: u8) {
        self.params.threshold = threshold;
    }

    pub fn set_polarity(&mut self, polarity: BlobPolarity) {
        self.params.polarity = polarity;
    }

    pub fn set_min_area(&mut self, min_area: f64) {
        self.set_params(BlobParams {
            min_area,
            ..self.params.clone()
        });
    }

    pub fn set_max_blob_count(&mut self, count: usize) {
        self.params.max_blob_count = count.max(1);
    }

    /// Blobs that pass the filters, sorted and truncated.
    pub fn analyze(&self, input: &Frame, ctx: &ExecContext) -> Result<Vec<Blob>, ToolError> {
        let region = self.common.work_region(input, ctx);
        Ok(self.detect(&region.image, region.offset())?.blobs)
    }

    fn binarize(&self, gray: &Image<u8>) -> (Image<u8>, Option<u8>) {
        let p = &self.params;
        if p.input_is_binary {
            return (gray.map(|&v| if v != 0 { 255 } else { 0 }), None);
        }
        let t = if p.use_otsu {
            otsu_threshold(&histogram_u8(&gray.as_view()))
        } else {
            p.threshold
        };
        let mask = match p.polarity {
            BlobPolarity::Bright => gray.map(|&v| if v > t { 255 } else { 0 }),
            BlobPolarity::Dark => gray.map(|&v| if v <= t { 255 } else { 0 }),
        };
        (mask, Some(t))
    }

    fn passes(&self, b: &Blob) -> bool {
        let p = &self.params;
        (p.min_area..=p.max_area).contains(&b.area)
            && (p.min_circularity..=p.max_circularity).contains(&b.circularity)
            && b.convexity >= p.min_convexity
            && (p.min_perimeter..=p.max_perimeter).contains(&b.perimeter)
            && (p.min_aspect_ratio..=p.max_aspect_ratio).contains(&b.aspect_ratio)
    }

    fn detect(&self, image: &Frame, offset: Vec2f) -> Result<Detection, ToolError> {
        let gray = image.to_gray8();
        if gray.is_empty() {
            return Err(ToolError::InvalidInput("empty image".to_owned()));
        }
        let p = &self.params;
        let (mask, threshold) = self.binarize(&gray);
        let (ox, oy) = (offset.x as i32, offset.y as i32);

        let contours = find_contours(&mask.as_view(), p.retrieval_mode.into(), p.approx_mode.into());
        let candidates = contours.len();
        let mut blobs: Vec<Blob> = contours
            .iter()
            .map(|c| {
                let abs = c.translated(ox, oy);
                let metrics = if abs.is_hole {
                    ShapeMetrics::measure_hole(&abs.points)
                } else {
                    ShapeMetrics::measure(&abs.points)
                };
                Blob::from_metrics(abs.to_points2f(), abs.is_hole, metrics)
            })
            .filter(|b| self.passes(b))
            .collect();

        let key = p.sort_by;
        blobs.sort_by(|a, b| {
            let ord = a.sort_value(key).total_cmp(&b.sort_value(key));
            if p.sort_descending { ord.reverse() } else { ord }
        });
        blobs.truncate(p.max_blob_count);
        for (i, b) in blobs.iter_mut().enumerate() {
            b.id = i;
        }
        tracing::debug!("{} of {} contours kept as blobs", blobs.len(), candidates);

        Ok(Detection {
            blobs,
            candidates,
            mask,
            threshold,
        })
    }

    fn annotate(&self, result: &mut VisionResult, blob: &Blob) {
        let p = &self.params;
        if p.draw_contours {
            result.push_graphic(GraphicOverlay::polygon(blob.contour.clone(), Color::GREEN));
        }
        if p.draw_bounding_boxes {
            result.push_graphic(GraphicOverlay::rectangle(blob.bounding_rect, Color::YELLOW));
        }
        if p.draw_centroids {
            result.push_graphic(GraphicOverlay::cross(blob.centroid, 4.0, Color::RED));
        }
        if p.draw_labels {
            let r = blob.bounding_rect;
            let anchor = Point2f::new(r.x as f32, (r.y - 7).max(0) as f32);
            result.push_graphic(GraphicOverlay::text(anchor, blob.id.to_string(), Color::WHITE));
        }
    }
}

impl VisionTool for BlobAnalysisTool {
    tool_state!();

    fn kind(&self) -> ToolKind {
        ToolKind::BlobAnalysis
    }

    fn run(&self, input: &Frame, ctx: &ExecContext) -> Result<VisionResult, ToolError> {
        let region = self.common.work_region(input, ctx);
        let det = self.detect(&region.image, region.offset())?;
        let count = det.blobs.len();

        if count == 0 {
            return Ok(VisionResult::failure(format!(
                "no blobs passed the filters ({} contours)",
                det.candidates
            )));
        }

        let mut result = VisionResult::ok(format!("{count} blob(s) found"));
        result.insert("BlobCount", count);
        if let Some(t) = det.threshold {
            result.insert("Threshold", t as i64);
        }
        for b in &det.blobs {
            let i = b.id;
            result.insert(format!("Blob{i}.X"), b.centroid.x);
            result.insert(format!("Blob{i}.Y"), b.centroid.y);
            result.insert(format!("Blob{i}.Area"), b.area);
            result.insert(format!("Blob{i}.Perimeter"), b.perimeter);
            result.insert(format!("Blob{i}.Circularity"), b.circularity);
            result.insert(format!("Blob{i}.Convexity"), b.convexity);
            result.insert(format!("Blob{i}.AspectRatio"), b.aspect_ratio);
            result.insert(format!("Blob{i}.Angle"), b.angle);
            self.annotate(&mut result, b);
        }
        if region.scoped {
            result.push_graphic(GraphicOverlay::rectangle(region.rect, Color::BLUE));
        }
        result.position = det.blobs.first().map(|b| b.centroid);

        let output = region.restore(&input.convert_to(PixelFormat::Gray8), Frame::Gray8(det.mask))?;
        result.render_overlay(input);
        Ok(result.with_output(output))
    }
}
