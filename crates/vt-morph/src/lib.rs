//! Grayscale morphology with configurable structuring elements.
//!
//! Erosion is a neighbourhood minimum, dilation a maximum. Pixels outside
//! the image are ignored, so borders neither erode nor grow. Binary images
//! (0/255) behave as classic binary morphology.

use vt_core::{Image, ImageView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementShape {
    Rect,
    Cross,
    Ellipse,
}

/// Odd-sized boolean footprint anchored at its centre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    width: usize,
    height: usize,
    mask: Vec<bool>,
    shape: ElementShape,
}

impl StructuringElement {
    /// Even sizes are bumped to the next odd value; zero becomes 1.
    pub fn new(shape: ElementShape, width: usize, height: usize) -> Self {
        let w = width.max(1) | 1;
        let h = height.max(1) | 1;
        let (cx, cy) = ((w / 2) as isize, (h / 2) as isize);
        let (rx, ry) = ((w as f32) / 2.0, (h as f32) / 2.0);

        let mut mask = Vec::with_capacity(w * h);
        for y in 0..h as isize {
            for x in 0..w as isize {
                let on = match shape {
                    ElementShape::Rect => true,
                    ElementShape::Cross => x == cx || y == cy,
                    ElementShape::Ellipse => {
                        let dx = (x - cx) as f32 / rx;
                        let dy = (y - cy) as f32 / ry;
                        dx * dx + dy * dy <= 1.0
                    }
                };
                mask.push(on);
            }
        }
        Self {
            width: w,
            height: h,
            mask,
            shape,
        }
    }

    pub fn rect(width: usize, height: usize) -> Self {
        Self::new(ElementShape::Rect, width, height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.mask[y * self.width + x]
    }

    /// Active offsets relative to the anchor.
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let (cx, cy) = ((self.width / 2) as isize, (self.height / 2) as isize);
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.contains(x, y))
            .map(|(x, y)| (x as isize - cx, y as isize - cy))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    Erode,
    Dilate,
    /// Erode then dilate: removes bright specks.
    Open,
    /// Dilate then erode: fills dark holes.
    Close,
    /// Dilate minus erode.
    Gradient,
    /// Source minus its opening.
    TopHat,
    /// Closing minus source.
    BlackHat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Min,
    Max,
}

pub fn erode(src: &ImageView<'_, u8>, se: &StructuringElement) -> Image<u8> {
    extremum_filter(src, se, Extremum::Min)
}

pub fn dilate(src: &ImageView<'_, u8>, se: &StructuringElement) -> Image<u8> {
    extremum_filter(src, se, Extremum::Max)
}

/// Applies `op` with `iterations` repetitions of each erode/dilate stage
/// (OpenCV semantics: open with 2 iterations is erode, erode, dilate,
/// dilate).
pub fn morphology(
    src: &ImageView<'_, u8>,
    op: MorphOp,
    se: &StructuringElement,
    iterations: usize,
) -> Image<u8> {
    let n = iterations.max(1);
    let repeat = |img: Image<u8>, ex: Extremum| -> Image<u8> {
        (0..n).fold(img, |acc, _| extremum_filter(&acc.as_view(), se, ex))
    };

    let source = src.to_image();
    match op {
        MorphOp::Erode => repeat(source, Extremum::Min),
        MorphOp::Dilate => repeat(source, Extremum::Max),
        MorphOp::Open => repeat(repeat(source, Extremum::Min), Extremum::Max),
        MorphOp::Close => repeat(repeat(source, Extremum::Max), Extremum::Min),
        MorphOp::Gradient => {
            let d = repeat(source.clone(), Extremum::Max);
            let e = repeat(source, Extremum::Min);
            saturating_diff(&d, &e)
        }
        MorphOp::TopHat => {
            let opened = repeat(repeat(source.clone(), Extremum::Min), Extremum::Max);
            saturating_diff(&source, &opened)
        }
        MorphOp::BlackHat => {
            let closed = repeat(repeat(source.clone(), Extremum::Max), Extremum::Min);
            saturating_diff(&closed, &source)
        }
    }
}

fn saturating_diff(a: &Image<u8>, b: &Image<u8>) -> Image<u8> {
    Image::from_fn(a.width(), a.height(), |x, y| {
        a.row(y)[x].saturating_sub(b.row(y)[x])
    })
}

fn extremum_filter(src: &ImageView<'_, u8>, se: &StructuringElement, ex: Extremum) -> Image<u8> {
    if se.shape() == ElementShape::Rect {
        // A rectangle decomposes into a row pass and a column pass.
        let rows = line_filter(src, se.width(), true, ex);
        return line_filter(&rows.as_view(), se.height(), false, ex);
    }

    let (w, h) = (src.width(), src.height());
    let offsets = se.offsets();
    Image::from_fn(w, h, |x, y| {
        let mut acc = match ex {
            Extremum::Min => u8::MAX,
            Extremum::Max => u8::MIN,
        };
        for &(dx, dy) in &offsets {
            let nx = x as isize + dx;
            let ny = y as isize + dy;
            if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                continue;
            }
            let v = src.row(ny as usize)[nx as usize];
            acc = match ex {
                Extremum::Min => acc.min(v),
                Extremum::Max => acc.max(v),
            };
        }
        acc
    })
}

fn line_filter(src: &ImageView<'_, u8>, len: usize, horizontal: bool, ex: Extremum) -> Image<u8> {
    let (w, h) = (src.width(), src.height());
    let r = (len / 2) as isize;
    Image::from_fn(w, h, |x, y| {
        let (pos, limit) = if horizontal { (x, w) } else { (y, h) };
        let lo = (pos as isize - r).max(0) as usize;
        let hi = ((pos as isize + r) as usize).min(limit - 1);
        let values = (lo..=hi).map(|i| {
            if horizontal {
                src.row(y)[i]
            } else {
                src.row(i)[x]
            }
        });
        match ex {
            Extremum::Min => values.min().unwrap_or(u8::MAX),
            Extremum::Max => values.max().unwrap_or(u8::MIN),
        }
    })
}
