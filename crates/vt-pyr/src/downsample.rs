use vt_core::{Image, ImageView};

#[inline]
fn dst_dims(src_w: usize, src_h: usize) -> (usize, usize) {
    (src_w / 2, src_h / 2)
}

pub fn downsample2x2_mean_u8_to_f32(src: &ImageView<'_, u8>) -> Image<f32> {
    let (dst_w, dst_h) = dst_dims(src.width(), src.height());
    Image::from_fn(dst_w, dst_h, |x, y| {
        block_sum(src, x, y, |v| v as u32) as f32 * 0.25
    })
}

pub fn downsample2x2_mean_f32(src: &ImageView<'_, f32>) -> Image<f32> {
    let mut dst = Image::new_fill(src.width() / 2, src.height() / 2, 0.0f32);
    downsample2x2_mean_f32_into(src, &mut dst);
    dst
}

/// Rounds half up: `(sum + 2) / 4`.
pub fn downsample2x2_mean_u8(src: &ImageView<'_, u8>) -> Image<u8> {
    let (dst_w, dst_h) = dst_dims(src.width(), src.height());
    Image::from_fn(dst_w, dst_h, |x, y| {
        ((block_sum(src, x, y, |v| v as u32) + 2) / 4) as u8
    })
}

pub(crate) fn downsample2x2_mean_f32_into(src: &ImageView<'_, f32>, dst: &mut Image<f32>) {
    let (dst_w, dst_h) = dst_dims(src.width(), src.height());
    debug_assert_eq!(dst.dims(), (dst_w, dst_h));

    for y in 0..dst_h {
        let r0 = src.row(2 * y);
        let r1 = src.row(2 * y + 1);
        for (x, out) in dst.row_mut(y).iter_mut().enumerate() {
            let sx = 2 * x;
            *out = (r0[sx] + r0[sx + 1] + r1[sx] + r1[sx + 1]) * 0.25;
        }
    }
}

#[inline]
fn block_sum<T: Copy, S: core::ops::Add<Output = S>>(
    src: &ImageView<'_, T>,
    x: usize,
    y: usize,
    f: impl Fn(T) -> S,
) -> S {
    let r0 = src.row(2 * y);
    let r1 = src.row(2 * y + 1);
    let sx = 2 * x;
    f(r0[sx]) + f(r0[sx + 1]) + f(r1[sx]) + f(r1[sx + 1])
}

#[cfg(test)]
mod tests {
    use vt_core::Image;

    use crate::downsample::{downsample2x2_mean_f32, downsample2x2_mean_u8, downsample2x2_mean_u8_to_f32};

    #[test]
    fn downsample_u8_to_f32_on_4x4_known_values() {
        let src = Image::from_fn(4, 4, |x, y| (x + 4 * y) as u8);
        let dst = downsample2x2_mean_u8_to_f32(&src.as_view());
        assert_eq!(dst.dims(), (2, 2));
        assert_eq!(dst.data(), &[2.5, 4.5, 10.5, 12.5]);
    }

    #[test]
    fn odd_dimensions_drop_last_row_col() {
        let src = Image::from_fn(5, 3, |x, y| (1 + x + 5 * y) as f32);
        let dst = downsample2x2_mean_f32(&src.as_view());
        assert_eq!(dst.dims(), (2, 1));
        assert_eq!(dst.data(), &[4.0, 6.0]);
    }

    #[test]
    fn downsample_non_contiguous_view() {
        let src = Image::from_fn(6, 4, |x, y| (x + 6 * y) as u8);
        let sub = src.as_view().subview(1, 1, 4, 2).expect("valid subview");
        assert!(!sub.is_contiguous());

        let dst = downsample2x2_mean_u8_to_f32(&sub);
        assert_eq!(dst.data(), &[10.5, 12.5]);
    }

    #[test]
    fn integer_rounding_rule() {
        let src = Image::from_vec(2, 2, vec![1u8, 2, 2, 3]).expect("valid image");
        assert_eq!(downsample2x2_mean_u8(&src.as_view()).data(), &[2u8]);
    }
}
