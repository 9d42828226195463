//! Region-of-interest scoping shared by every tool.
//!
//! A tool works only inside its (clamped) ROI and always hands back a
//! full-frame buffer: [`extract_work_region`] narrows the input,
//! [`composite_result`] restores the full size.

use std::borrow::Cow;

use crate::Error;
use crate::frame::Frame;
use crate::geom::{Point2f, Rect, Vec2f};

/// Clamps `roi` to a `width x height` image. A rectangle fully outside
/// the image becomes empty (zero size, origin clamped inside).
pub fn adjust_roi(width: usize, height: usize, roi: Rect) -> Rect {
    let w = i32::try_from(width).unwrap_or(i32::MAX);
    let h = i32::try_from(height).unwrap_or(i32::MAX);

    let x0 = roi.x.clamp(0, w);
    let y0 = roi.y.clamp(0, h);
    let x1 = roi.x.saturating_add(roi.width.max(0)).clamp(0, w);
    let y1 = roi.y.saturating_add(roi.height.max(0)).clamp(0, h);

    Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
}

/// Borrowed input when unscoped (or the clamped ROI is empty), an owned
/// crop otherwise. The borrowed alias must never be mutated.
pub fn extract_work_region<'a>(frame: &'a Frame, use_roi: bool, roi: Rect) -> Cow<'a, Frame> {
    WorkRegion::new(frame, use_roi, roi).image
}

/// Returns a new full-size frame: `original` outside the clamped ROI,
/// `processed` (converted to `original`'s format) inside it.
pub fn composite_result(original: &Frame, processed: &Frame, roi: Rect) -> Result<Frame, Error> {
    let rect = adjust_roi(original.width(), original.height(), roi);
    let expected = (rect.width as usize, rect.height as usize);
    if processed.dims() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: processed.dims(),
        });
    }

    let mut out = original.clone();
    if rect.is_empty() {
        return Ok(out);
    }

    let converted: Cow<'_, Frame> = if processed.format() == original.format() {
        Cow::Borrowed(processed)
    } else {
        Cow::Owned(processed.convert_to(original.format()))
    };
    out.paste(&converted, rect.x as usize, rect.y as usize)?;
    Ok(out)
}

/// The region a tool actually processes, with the rectangle it came from.
#[derive(Debug, Clone)]
pub struct WorkRegion<'a> {
    pub image: Cow<'a, Frame>,
    /// Clamped ROI, or the full frame when unscoped.
    pub rect: Rect,
    pub scoped: bool,
}

impl<'a> WorkRegion<'a> {
    pub fn new(frame: &'a Frame, use_roi: bool, roi: Rect) -> Self {
        let full = Rect::new(0, 0, frame.width() as i32, frame.height() as i32);
        if !use_roi {
            return Self::unscoped(frame, full);
        }

        let rect = adjust_roi(frame.width(), frame.height(), roi);
        if rect.is_empty() {
            return Self::unscoped(frame, full);
        }
        match frame.crop(rect) {
            Ok(cropped) => Self {
                image: Cow::Owned(cropped),
                rect,
                scoped: true,
            },
            Err(_) => Self::unscoped(frame, full),
        }
    }

    fn unscoped(frame: &'a Frame, full: Rect) -> Self {
        Self {
            image: Cow::Borrowed(frame),
            rect: full,
            scoped: false,
        }
    }

    /// ROI origin in frame coordinates; `(0, 0)` when unscoped.
    pub fn offset(&self) -> Vec2f {
        Vec2f::new(self.rect.x as f32, self.rect.y as f32)
    }

    pub fn to_absolute(&self, p: Point2f) -> Point2f {
        p + self.offset()
    }

    /// Puts a processed region back into a full-size copy of `original`.
    /// Unscoped regions return `processed` unchanged.
    pub fn restore(&self, original: &Frame, processed: Frame) -> Result<Frame, Error> {
        if !self.scoped {
            return Ok(processed);
        }
        composite_result(original, &processed, self.rect)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::{WorkRegion, adjust_roi, composite_result, extract_work_region};
    use crate::Error;
    use crate::frame::Frame;
    use crate::geom::{Point2f, Rect};
    use crate::image::Image;

    fn ramp(w: usize, h: usize) -> Frame {
        Frame::Gray8(Image::from_fn(w, h, |x, y| ((x + y * w) % 251) as u8))
    }

    #[test]
    fn adjust_clamps_to_image_bounds() {
        assert_eq!(adjust_roi(100, 80, Rect::new(10, 10, 20, 20)), Rect::new(10, 10, 20, 20));
        assert_eq!(adjust_roi(100, 80, Rect::new(-5, -5, 20, 20)), Rect::new(0, 0, 15, 15));
        assert_eq!(adjust_roi(100, 80, Rect::new(90, 70, 50, 50)), Rect::new(90, 70, 10, 10));
        assert!(adjust_roi(100, 80, Rect::new(200, 10, 5, 5)).is_empty());
        assert!(adjust_roi(100, 80, Rect::new(10, 10, -5, 5)).is_empty());
    }

    #[test]
    fn extract_aliases_when_unscoped_or_empty() {
        let frame = ramp(16, 16);
        assert!(matches!(
            extract_work_region(&frame, false, Rect::new(2, 2, 4, 4)),
            Cow::Borrowed(_)
        ));
        assert!(matches!(
            extract_work_region(&frame, true, Rect::new(40, 40, 4, 4)),
            Cow::Borrowed(_)
        ));

        let owned = extract_work_region(&frame, true, Rect::new(2, 3, 4, 5));
        assert!(matches!(owned, Cow::Owned(_)));
        assert_eq!(owned.dims(), (4, 5));
    }

    #[test]
    fn composite_matches_original_outside_and_processed_inside() {
        let original = ramp(20, 12);
        let roi = Rect::new(5, 4, 6, 3);
        let processed = Frame::Gray8(Image::new_fill(6, 3, 200u8));

        let out = composite_result(&original, &processed, roi).expect("sizes agree");
        let (Frame::Gray8(o), Frame::Gray8(src)) = (&out, &original) else {
            panic!("format must be preserved");
        };
        for y in 0..12 {
            for x in 0..20 {
                let inside = roi.contains(x as i32, y as i32);
                let expected = if inside { 200 } else { *src.get(x, y).expect("in bounds") };
                assert_eq!(*o.get(x, y).expect("in bounds"), expected, "({x},{y})");
            }
        }
    }

    #[test]
    fn composite_converts_channel_count() {
        let original = Frame::Rgb8(Image::new_fill(8, 8, [10u8, 20, 30]));
        let processed = Frame::Gray8(Image::new_fill(2, 2, 99u8));
        let out = composite_result(&original, &processed, Rect::new(1, 1, 2, 2)).expect("ok");

        let Frame::Rgb8(img) = out else {
            panic!("composite keeps the original format");
        };
        assert_eq!(img.get(1, 1), Some(&[99, 99, 99]));
        assert_eq!(img.get(0, 0), Some(&[10, 20, 30]));
    }

    #[test]
    fn composite_rejects_wrong_processed_size() {
        let original = ramp(10, 10);
        let processed = Frame::Gray8(Image::new_fill(3, 3, 0u8));
        assert_eq!(
            composite_result(&original, &processed, Rect::new(0, 0, 4, 4)),
            Err(Error::DimensionMismatch {
                expected: (4, 4),
                actual: (3, 3)
            })
        );
    }

    #[test]
    fn work_region_offset_restores_absolute_coordinates() {
        let frame = ramp(32, 32);
        let region = WorkRegion::new(&frame, true, Rect::new(7, 9, 10, 10));
        assert!(region.scoped);
        assert_eq!(region.to_absolute(Point2f::new(1.0, 2.0)), Point2f::new(8.0, 11.0));

        let unscoped = WorkRegion::new(&frame, false, Rect::new(7, 9, 10, 10));
        assert_eq!(unscoped.to_absolute(Point2f::new(1.0, 2.0)), Point2f::new(1.0, 2.0));
        assert_eq!(unscoped.rect, Rect::new(0, 0, 32, 32));
    }
}
