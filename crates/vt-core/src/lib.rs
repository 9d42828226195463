//! Foundational primitives for the vision tool engine.
//!
//! ## Image Views and Stride
//! Images use element stride (not byte stride). `stride` is the distance, in
//! elements, between adjacent row starts and may be greater than `width`.
//! This allows borrowed views over padded buffers and subviews.
//!
//! ## Frames
//! [`Frame`] is the buffer tools exchange: 8-bit gray, 8-bit RGB or a 32-bit
//! depth map. Conversions between formats always allocate.
//!
//! ## Sampling Coordinates
//! Sampling uses pixel-center coordinates where integer coordinates refer to
//! pixel centers. Bilinear uses the standard floor-based 2x2 neighborhood.
//!
//! ## ROI Scoping
//! [`adjust_roi`], [`extract_work_region`] and [`composite_result`] implement
//! the work-inside-ROI, return-full-frame discipline.

mod border;
mod error;
mod frame;
mod geom;
mod image;
mod roi;
mod sample;

pub use border::{BorderMode, map_index};
pub use error::Error;
pub use frame::{Frame, PixelFormat, luminosity, saturate_u8};
pub use geom::{Ellipse, Line2f, Point2f, Polyline2f, Rect, RotatedRect, Vec2f};
pub use image::{Image, ImageView, ImageViewMut, to_f32};
pub use roi::{WorkRegion, adjust_roi, composite_result, extract_work_region};
pub use sample::{sample_bilinear_f32, sample_nearest};
