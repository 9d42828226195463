use vt_core::{Image, ImageView};

use crate::downsample::downsample2x2_mean_f32_into;

/// Reusable f32 image pyramid.
///
/// Level 0 is a f32 copy of the input. Each next level is a 2x2 mean
/// downsample of the previous level.
///
/// If a requested level cannot be built because `width < 2` or `height < 2`,
/// building stops early.
#[derive(Debug, Default, Clone)]
pub struct PyramidF32 {
    levels: Vec<Image<f32>>,
}

impl PyramidF32 {
    pub fn new() -> Self {
        Self { levels: Vec::new() }
    }

    pub fn build_from_u8(&mut self, src: &ImageView<'_, u8>, num_levels: usize) {
        self.build_with(src.width(), src.height(), num_levels, |y, dst| {
            for (d, &s) in dst.iter_mut().zip(src.row(y)) {
                *d = s as f32;
            }
        });
    }

    pub fn build_from_f32(&mut self, src: &ImageView<'_, f32>, num_levels: usize) {
        self.build_with(src.width(), src.height(), num_levels, |y, dst| {
            dst.copy_from_slice(src.row(y));
        });
    }

    fn build_with(
        &mut self,
        base_w: usize,
        base_h: usize,
        num_levels: usize,
        mut fill_row: impl FnMut(usize, &mut [f32]),
    ) {
        let build_levels = max_build_levels(base_w, base_h, num_levels);
        self.ensure(base_w, base_h, build_levels);
        if build_levels == 0 {
            return;
        }

        for y in 0..base_h {
            fill_row(y, self.levels[0].row_mut(y));
        }

        for level_idx in 1..build_levels {
            let (prev_levels, curr_and_tail) = self.levels.split_at_mut(level_idx);
            downsample2x2_mean_f32_into(&prev_levels[level_idx - 1].as_view(), &mut curr_and_tail[0]);
        }
    }

    /// Resizes internal buffers to the chain `(w, h), (w/2, h/2), ...`.
    fn ensure(&mut self, base_w: usize, base_h: usize, num_levels: usize) {
        self.levels.truncate(num_levels);
        self.levels
            .resize_with(num_levels, || Image::new_fill(0, 0, 0.0f32));

        let (mut w, mut h) = (base_w, base_h);
        for level in &mut self.levels {
            if level.dims() != (w, h) {
                *level = Image::new_fill(w, h, 0.0f32);
            }
            w /= 2;
            h /= 2;
        }
    }

    pub fn level(&self, i: usize) -> Option<&Image<f32>> {
        self.levels.get(i)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

pub(crate) fn max_build_levels(base_w: usize, base_h: usize, requested_levels: usize) -> usize {
    if requested_levels == 0 || base_w == 0 || base_h == 0 {
        return 0;
    }

    let mut levels = 1usize;
    let (mut w, mut h) = (base_w, base_h);
    while levels < requested_levels && w >= 2 && h >= 2 {
        w /= 2;
        h /= 2;
        levels += 1;
    }
    levels
}

#[cfg(test)]
mod tests {
    use vt_core::Image;

    use crate::PyramidF32;

    #[test]
    fn pyramid_build_from_u8_stops_at_1x1() {
        let src = Image::from_fn(16, 16, |x, y| ((x + 16 * y) % 251) as u8);

        let mut pyr = PyramidF32::new();
        pyr.build_from_u8(&src.as_view(), 10);

        let dims: Vec<(usize, usize)> = (0..pyr.num_levels())
            .filter_map(|i| pyr.level(i).map(|l| l.dims()))
            .collect();
        assert_eq!(dims, vec![(16, 16), (8, 8), (4, 4), (2, 2), (1, 1)]);
    }

    #[test]
    fn pyramid_level_zero_is_f32_copy() {
        let src = Image::from_vec(3, 2, vec![1u8, 2, 3, 4, 5, 6]).expect("valid image");
        let mut pyr = PyramidF32::new();
        pyr.build_from_u8(&src.as_view(), 3);

        let l0 = pyr.level(0).expect("level 0");
        assert_eq!(l0.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(pyr.level(1).map(|l| l.data().to_vec()), Some(vec![3.0]));
    }

    #[test]
    fn build_zero_levels_clears_pyramid() {
        let src = Image::new_fill(4, 4, 1.0f32);
        let mut pyr = PyramidF32::new();
        pyr.build_from_f32(&src.as_view(), 2);
        assert_eq!(pyr.num_levels(), 2);
        pyr.build_from_f32(&src.as_view(), 0);
        assert_eq!(pyr.num_levels(), 0);
    }
}
