//! Per-channel views of a frame for channel-wise filters.

use vt_core::{Frame, Image, PixelFormat, saturate_u8};

/// One f32 plane per channel.
pub(crate) fn to_planes_f32(frame: &Frame) -> Vec<Image<f32>> {
    match frame {
        Frame::Gray8(img) => vec![img.map(|&v| v as f32)],
        Frame::Rgb8(img) => (0..3).map(|c| img.map(|px| px[c] as f32)).collect(),
        Frame::Depth32(img) => vec![img.clone()],
    }
}

/// Reassembles planes produced by [`to_planes_f32`]; 8-bit formats are
/// rounded and saturated.
pub(crate) fn from_planes_f32(format: PixelFormat, planes: &[Image<f32>]) -> Frame {
    match (format, planes) {
        (PixelFormat::Rgb8, [r, g, b]) => Frame::Rgb8(Image::from_fn(r.width(), r.height(), |x, y| {
            [
                saturate_u8(r.row(y)[x]),
                saturate_u8(g.row(y)[x]),
                saturate_u8(b.row(y)[x]),
            ]
        })),
        (PixelFormat::Depth32, [d, ..]) => Frame::Depth32(d.clone()),
        (_, [g, ..]) => Frame::Gray8(g.map(|&v| saturate_u8(v))),
        (_, []) => Frame::Gray8(Image::new_fill(0, 0, 0)),
    }
}

/// One u8 plane per channel; `None` for depth frames.
pub(crate) fn to_planes_u8(frame: &Frame) -> Option<Vec<Image<u8>>> {
    match frame {
        Frame::Gray8(img) => Some(vec![img.clone()]),
        Frame::Rgb8(img) => Some((0..3).map(|c| img.map(|px| px[c])).collect()),
        Frame::Depth32(_) => None,
    }
}

pub(crate) fn from_planes_u8(planes: &[Image<u8>]) -> Frame {
    match planes {
        [r, g, b] => Frame::Rgb8(Image::from_fn(r.width(), r.height(), |x, y| {
            [r.row(y)[x], g.row(y)[x], b.row(y)[x]]
        })),
        [g, ..] => Frame::Gray8(g.clone()),
        [] => Frame::Gray8(Image::new_fill(0, 0, 0)),
    }
}

#[cfg(test)]
mod tests {
    use vt_core::{Frame, Image, PixelFormat};

    use super::{from_planes_f32, from_planes_u8, to_planes_f32, to_planes_u8};

    #[test]
    fn rgb_planes_round_trip() {
        let frame = Frame::Rgb8(Image::from_fn(3, 2, |x, y| [x as u8, y as u8, 9]));
        let planes = to_planes_f32(&frame);
        assert_eq!(planes.len(), 3);
        assert_eq!(from_planes_f32(PixelFormat::Rgb8, &planes), frame);

        let u8_planes = to_planes_u8(&frame).expect("8-bit");
        assert_eq!(from_planes_u8(&u8_planes), frame);
    }

    #[test]
    fn depth_has_no_u8_planes() {
        let frame = Frame::Depth32(Image::new_fill(2, 2, 1.5f32));
        assert!(to_planes_u8(&frame).is_none());
        let planes = to_planes_f32(&frame);
        assert_eq!(from_planes_f32(PixelFormat::Depth32, &planes), frame);
    }
}
