use core::fmt;

use crate::Error;
use crate::geom::Rect;
use crate::image::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Depth32,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Gray8 | Self::Depth32 => 1,
            Self::Rgb8 => 3,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gray8 => "Gray8",
            Self::Rgb8 => "Rgb8",
            Self::Depth32 => "Depth32",
        };
        f.write_str(name)
    }
}

/// Owned frame buffer in one of the supported pixel formats.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Gray8(Image<u8>),
    Rgb8(Image<[u8; 3]>),
    /// Single-channel height / depth map.
    Depth32(Image<f32>),
}

impl From<Image<u8>> for Frame {
    fn from(img: Image<u8>) -> Self {
        Self::Gray8(img)
    }
}

impl From<Image<[u8; 3]>> for Frame {
    fn from(img: Image<[u8; 3]>) -> Self {
        Self::Rgb8(img)
    }
}

impl From<Image<f32>> for Frame {
    fn from(img: Image<f32>) -> Self {
        Self::Depth32(img)
    }
}

impl Frame {
    pub fn width(&self) -> usize {
        match self {
            Self::Gray8(i) => i.width(),
            Self::Rgb8(i) => i.width(),
            Self::Depth32(i) => i.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Self::Gray8(i) => i.height(),
            Self::Rgb8(i) => i.height(),
            Self::Depth32(i) => i.height(),
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn format(&self) -> PixelFormat {
        match self {
            Self::Gray8(_) => PixelFormat::Gray8,
            Self::Rgb8(_) => PixelFormat::Rgb8,
            Self::Depth32(_) => PixelFormat::Depth32,
        }
    }

    pub fn channels(&self) -> usize {
        self.format().channels()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_gray8(&self) -> Option<&Image<u8>> {
        match self {
            Self::Gray8(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_depth32(&self) -> Option<&Image<f32>> {
        match self {
            Self::Depth32(i) => Some(i),
            _ => None,
        }
    }

    /// Single-channel 8-bit copy. RGB uses BT.601 luminosity, depth is
    /// rounded and saturated to `[0, 255]`.
    pub fn to_gray8(&self) -> Image<u8> {
        match self {
            Self::Gray8(i) => i.clone(),
            Self::Rgb8(i) => i.map(|&px| luminosity(px)),
            Self::Depth32(i) => i.map(|&v| saturate_u8(v)),
        }
    }

    pub fn to_rgb8(&self) -> Image<[u8; 3]> {
        match self {
            Self::Gray8(i) => i.map(|&v| [v, v, v]),
            Self::Rgb8(i) => i.clone(),
            Self::Depth32(i) => i.map(|&v| {
                let g = saturate_u8(v);
                [g, g, g]
            }),
        }
    }

    pub fn to_depth32(&self) -> Image<f32> {
        match self {
            Self::Gray8(i) => i.map(|&v| v as f32),
            Self::Rgb8(i) => i.map(|&px| luminosity(px) as f32),
            Self::Depth32(i) => i.clone(),
        }
    }

    pub fn convert_to(&self, format: PixelFormat) -> Frame {
        match format {
            PixelFormat::Gray8 => Frame::Gray8(self.to_gray8()),
            PixelFormat::Rgb8 => Frame::Rgb8(self.to_rgb8()),
            PixelFormat::Depth32 => Frame::Depth32(self.to_depth32()),
        }
    }

    pub fn crop(&self, rect: Rect) -> Result<Frame, Error> {
        Ok(match self {
            Self::Gray8(i) => Frame::Gray8(i.crop(rect)?),
            Self::Rgb8(i) => Frame::Rgb8(i.crop(rect)?),
            Self::Depth32(i) => Frame::Depth32(i.crop(rect)?),
        })
    }

    /// Writes `src` at `(x, y)`; `src` must already share this frame's format.
    pub fn paste(&mut self, src: &Frame, x: usize, y: usize) -> Result<(), Error> {
        match (self, src) {
            (Self::Gray8(d), Frame::Gray8(s)) => d.paste(&s.as_view(), x, y),
            (Self::Rgb8(d), Frame::Rgb8(s)) => d.paste(&s.as_view(), x, y),
            (Self::Depth32(d), Frame::Depth32(s)) => d.paste(&s.as_view(), x, y),
            (d, s) => Err(Error::FormatMismatch {
                expected: d.format(),
                actual: s.format(),
            }),
        }
    }
}

pub fn luminosity(px: [u8; 3]) -> u8 {
    let v = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
    v.round().clamp(0.0, 255.0) as u8
}

pub fn saturate_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::{Frame, PixelFormat, luminosity};
    use crate::Error;
    use crate::geom::Rect;
    use crate::image::Image;

    #[test]
    fn format_channels_and_dims() {
        let rgb = Frame::from(Image::new_fill(4, 3, [1u8, 2, 3]));
        assert_eq!(rgb.format(), PixelFormat::Rgb8);
        assert_eq!(rgb.channels(), 3);
        assert_eq!(rgb.dims(), (4, 3));
        assert_eq!(PixelFormat::Depth32.to_string(), "Depth32");
    }

    #[test]
    fn gray_conversion_uses_luminosity_weights() {
        assert_eq!(luminosity([255, 0, 0]), 76);
        assert_eq!(luminosity([0, 255, 0]), 150);
        assert_eq!(luminosity([0, 0, 255]), 29);
        assert_eq!(luminosity([200, 200, 200]), 200);

        let depth = Frame::Depth32(Image::from_vec(3, 1, vec![-4.0, 12.6, 900.0]).expect("valid"));
        assert_eq!(depth.to_gray8().data(), &[0, 13, 255]);
    }

    #[test]
    fn crop_and_paste_keep_format() {
        let mut frame = Frame::Gray8(Image::from_fn(8, 8, |x, y| (x + 8 * y) as u8));
        let patch = frame.crop(Rect::new(2, 2, 2, 2)).expect("inside");
        assert_eq!(patch.as_gray8().map(|i| i.data().to_vec()), Some(vec![18, 19, 26, 27]));

        let rgb_patch = patch.convert_to(PixelFormat::Rgb8);
        assert_eq!(
            frame.paste(&rgb_patch, 0, 0),
            Err(Error::FormatMismatch {
                expected: PixelFormat::Gray8,
                actual: PixelFormat::Rgb8
            })
        );
        frame.paste(&patch, 6, 6).expect("fits");
        assert_eq!(frame.as_gray8().and_then(|i| i.get(7, 7).copied()), Some(27));
    }
}
