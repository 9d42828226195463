use crate::Error;
use crate::geom::Rect;

/// Owned, tightly packed row-major image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> Image<T> {
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self, Error> {
        let expected = width.checked_mul(height).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;

        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x)
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get_mut(y * self.width + x)
    }

    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row index out of bounds");
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        assert!(y < self.height, "row index out of bounds");
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Image<U> {
        Image {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn as_view(&self) -> ImageView<'_, T> {
        ImageView {
            width: self.width,
            height: self.height,
            stride: self.width,
            data: &self.data,
        }
    }

    pub fn as_view_mut(&mut self) -> ImageViewMut<'_, T> {
        ImageViewMut {
            width: self.width,
            height: self.height,
            stride: self.width,
            data: &mut self.data,
        }
    }
}

impl<T: Clone> Image<T> {
    pub fn new_fill(width: usize, height: usize, value: T) -> Self {
        let len = width.checked_mul(height).expect("image size overflow");
        Self {
            width,
            height,
            data: vec![value; len],
        }
    }

    /// Copies the pixels covered by `rect`, which must lie inside the image.
    pub fn crop(&self, rect: Rect) -> Result<Image<T>, Error> {
        let (x, y, w, h) = rect_to_usize(rect)?;
        Ok(self.as_view().subview(x, y, w, h)?.to_image())
    }

    /// Overwrites the pixels at `(x, y)` with `src`. `src` must fit.
    pub fn paste(&mut self, src: &ImageView<'_, T>, x: usize, y: usize) -> Result<(), Error> {
        let mut parent = self.as_view_mut();
        let mut dst = parent.subview_mut(x, y, src.width(), src.height())?;
        for row in 0..src.height() {
            dst.row_mut(row).clone_from_slice(src.row(row));
        }
        Ok(())
    }
}

/// Borrowed image with element stride (not byte stride).
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a, T> {
    width: usize,
    height: usize,
    stride: usize,
    data: &'a [T],
}

impl<'a, T> ImageView<'a, T> {
    pub fn from_slice(
        width: usize,
        height: usize,
        stride: usize,
        data: &'a [T],
    ) -> Result<Self, Error> {
        if stride < width {
            return Err(Error::InvalidStride);
        }

        let min_len = min_required_len(width, height, stride).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;

        if data.len() < min_len {
            return Err(Error::SizeMismatch {
                expected: min_len,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn row(&self, y: usize) -> &'a [T] {
        assert!(y < self.height, "row index out of bounds");
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.stride + x)
    }

    pub fn subview(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<ImageView<'a, T>, Error> {
        if x > self.width
            || y > self.height
            || width > (self.width - x)
            || height > (self.height - y)
        {
            return Err(Error::OutOfBounds);
        }

        if width == 0 || height == 0 {
            return Ok(ImageView {
                width,
                height,
                stride: self.stride,
                data: &[],
            });
        }

        let start = y
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(x))
            .ok_or(Error::OutOfBounds)?;
        let tail = self.data.get(start..).ok_or(Error::OutOfBounds)?;

        Ok(ImageView {
            width,
            height,
            stride: self.stride,
            data: tail,
        })
    }

    pub fn subview_rect(&self, rect: Rect) -> Result<ImageView<'a, T>, Error> {
        let (x, y, w, h) = rect_to_usize(rect)?;
        self.subview(x, y, w, h)
    }

    pub fn is_contiguous(&self) -> bool {
        self.stride == self.width
    }

    pub fn as_contiguous_slice(&self) -> Option<&'a [T]> {
        if !self.is_contiguous() {
            return None;
        }
        self.data.get(0..self.width * self.height)
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [T]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }
}

impl<T: Clone> ImageView<'_, T> {
    pub fn to_image(&self) -> Image<T> {
        if let Some(contig) = self.as_contiguous_slice() {
            return Image {
                width: self.width,
                height: self.height,
                data: contig.to_vec(),
            };
        }

        let mut data = Vec::with_capacity(self.width * self.height);
        for row in self.rows() {
            data.extend_from_slice(row);
        }
        Image {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

#[derive(Debug)]
pub struct ImageViewMut<'a, T> {
    width: usize,
    height: usize,
    stride: usize,
    data: &'a mut [T],
}

impl<'a, T> ImageViewMut<'a, T> {
    pub fn from_slice_mut(
        width: usize,
        height: usize,
        stride: usize,
        data: &'a mut [T],
    ) -> Result<Self, Error> {
        if stride < width {
            return Err(Error::InvalidStride);
        }

        let min_len = min_required_len(width, height, stride).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;

        if data.len() < min_len {
            return Err(Error::SizeMismatch {
                expected: min_len,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row index out of bounds");
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        assert!(y < self.height, "row index out of bounds");
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get_mut(y * self.stride + x)
    }

    pub fn subview_mut(
        &mut self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<ImageViewMut<'_, T>, Error> {
        if x > self.width
            || y > self.height
            || width > (self.width - x)
            || height > (self.height - y)
        {
            return Err(Error::OutOfBounds);
        }

        if width == 0 || height == 0 {
            return Ok(ImageViewMut {
                width,
                height,
                stride: self.stride,
                data: &mut [],
            });
        }

        let start = y
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(x))
            .ok_or(Error::OutOfBounds)?;
        if start > self.data.len() {
            return Err(Error::OutOfBounds);
        }

        let (_, tail) = self.data.split_at_mut(start);
        Ok(ImageViewMut {
            width,
            height,
            stride: self.stride,
            data: tail,
        })
    }

    pub fn as_view(&self) -> ImageView<'_, T> {
        ImageView {
            width: self.width,
            height: self.height,
            stride: self.stride,
            data: self.data,
        }
    }
}

fn min_required_len(width: usize, height: usize, stride: usize) -> Option<usize> {
    if width == 0 || height == 0 {
        return Some(0);
    }

    let rows_before_last = height.checked_sub(1)?;
    rows_before_last.checked_mul(stride)?.checked_add(width)
}

fn rect_to_usize(rect: Rect) -> Result<(usize, usize, usize, usize), Error> {
    if rect.x < 0 || rect.y < 0 || rect.width < 0 || rect.height < 0 {
        return Err(Error::OutOfBounds);
    }
    Ok((
        rect.x as usize,
        rect.y as usize,
        rect.width as usize,
        rect.height as usize,
    ))
}

pub fn to_f32(img: &ImageView<'_, u8>) -> Image<f32> {
    let mut out = Vec::with_capacity(img.width() * img.height());
    for row in img.rows() {
        out.extend(row.iter().map(|&px| px as f32));
    }

    Image {
        width: img.width(),
        height: img.height(),
        data: out,
    }
}

#[cfg(test)]
mod tests {
    use super::{Image, ImageView, ImageViewMut, to_f32};
    use crate::geom::Rect;

    #[test]
    fn view_indexing_with_stride() {
        let data = vec![1u8, 2, 3, 99, 4, 5, 6, 88];
        let view = ImageView::from_slice(3, 2, 4, &data).expect("valid view");

        assert_eq!(view.row(1), &[4, 5, 6]);
        assert_eq!(view.get(2, 1), Some(&6));
        assert_eq!(view.get(3, 1), None);
        assert!(view.as_contiguous_slice().is_none());
        assert_eq!(view.to_image().data(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn subview_rect_aliases_parent_rows() {
        let img = Image::from_fn(5, 4, |x, y| (10 * y + x) as u8);
        let sub = img
            .as_view()
            .subview_rect(Rect::new(1, 2, 3, 2))
            .expect("inside image");

        assert_eq!(sub.stride(), 5);
        assert_eq!(sub.row(0), &[21, 22, 23]);
        assert_eq!(sub.row(1), &[31, 32, 33]);
        assert!(img.as_view().subview_rect(Rect::new(3, 0, 3, 1)).is_err());
        assert!(img.as_view().subview_rect(Rect::new(-1, 0, 2, 1)).is_err());
    }

    #[test]
    fn crop_and_paste_round_trip() {
        let src = Image::from_fn(6, 6, |x, y| (x + 6 * y) as u8);
        let patch = src.crop(Rect::new(2, 1, 3, 2)).expect("valid crop");
        assert_eq!(patch.data(), &[8, 9, 10, 14, 15, 16]);

        let mut canvas = Image::new_fill(6, 6, 0u8);
        canvas.paste(&patch.as_view(), 2, 1).expect("fits");
        assert_eq!(canvas.get(3, 2), Some(&15));
        assert_eq!(canvas.get(1, 1), Some(&0));
        assert!(canvas.paste(&patch.as_view(), 5, 5).is_err());
    }

    #[test]
    fn subview_mut_writes_through() {
        let mut data = vec![0u8; 12];
        let mut parent = ImageViewMut::from_slice_mut(4, 3, 4, &mut data).expect("valid");
        let mut sub = parent.subview_mut(1, 1, 2, 2).expect("valid subview");
        *sub.get_mut(1, 1).expect("in bounds") = 42;
        assert_eq!(data[2 * 4 + 2], 42);
    }

    #[test]
    fn convert_to_f32() {
        let img = Image::from_vec(2, 2, vec![1u8, 2, 3, 4]).expect("valid image");
        assert_eq!(to_f32(&img.as_view()).data(), &[1.0, 2.0, 3.0, 4.0]);
    }
}
