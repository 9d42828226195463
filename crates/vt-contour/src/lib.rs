//! Border following and shape measurement on binary masks.
//!
//! [`find_contours`] implements Suzuki-Abe topological border following:
//! - foreground is 8-connected, background 4-connected;
//! - every chain runs through pixel centres and is closed implicitly;
//! - [`RetrievalMode`] selects outer borders only, a flat list, or the
//!   full outer/hole nesting.
//!
//! [`ShapeMetrics`] turns one chain into the area, perimeter, moments, hull
//! and fitted primitives used by blob analysis.

mod shape;
mod trace;

pub use shape::{
    Moments, ShapeMetrics, arc_length, boundary_points, bounding_rect, circularity, convex_hull,
    digital_perimeter, fit_ellipse, interior_area, min_area_rect, pixel_area, signed_area,
};
pub use trace::{ApproxMode, Contour, PixelPoint, RetrievalMode, find_contours};
