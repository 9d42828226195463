use vt_core::{BorderMode, Image, ImageView};

/// `out[i] = sum_k signal[i + radius - k] * kernel[k]` with `border` for
/// out-of-range taps.
pub fn convolve_f32(
    signal: &[f32],
    kernel: &[f32],
    radius: usize,
    border: &BorderMode<f32>,
    out: &mut [f32],
) {
    assert_eq!(out.len(), signal.len(), "out must match signal length");
    assert_eq!(
        kernel.len(),
        2 * radius + 1,
        "kernel len must be 2*radius+1"
    );

    let n = signal.len();
    if n == 0 {
        return;
    }

    let interior_start = radius.min(n);
    let interior_end = n.saturating_sub(radius).max(interior_start);

    for (i, out_i) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        if i >= interior_start && i < interior_end {
            let window = &signal[i - radius..=i + radius];
            for (s, kv) in window.iter().zip(kernel.iter().rev()) {
                acc += s * kv;
            }
        } else {
            for (k, &kv) in kernel.iter().enumerate() {
                let idx = i as isize + radius as isize - k as isize;
                let v = match border.map(idx, n) {
                    Some(j) => signal[j],
                    None => match border {
                        BorderMode::Constant(c) => *c,
                        _ => 0.0,
                    },
                };
                acc += v * kv;
            }
        }
        *out_i = acc;
    }
}

/// Separable 2D convolution: rows with `kx`, then columns with `ky`.
/// Both kernels must have odd length.
pub fn convolve_separable(
    img: &ImageView<'_, f32>,
    kx: &[f32],
    ky: &[f32],
    border: &BorderMode<f32>,
) -> Image<f32> {
    let (w, h) = (img.width(), img.height());
    let mut tmp = Image::new_fill(w, h, 0.0f32);
    if w == 0 || h == 0 {
        return tmp;
    }

    for y in 0..h {
        convolve_f32(img.row(y), kx, kx.len() / 2, border, tmp.row_mut(y));
    }

    let mut out = Image::new_fill(w, h, 0.0f32);
    let mut col = vec![0.0f32; h];
    let mut col_out = vec![0.0f32; h];
    for x in 0..w {
        for (y, c) in col.iter_mut().enumerate() {
            *c = tmp.row(y)[x];
        }
        convolve_f32(&col, ky, ky.len() / 2, border, &mut col_out);
        for (y, &v) in col_out.iter().enumerate() {
            out.row_mut(y)[x] = v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use vt_core::{BorderMode, Image};

    use crate::conv1d::{convolve_f32, convolve_separable};

    #[test]
    fn convolve_matches_expected_identity() {
        let signal = [1.0f32, 2.0, 3.0, 4.0];
        let kernel = [1.0f32];
        let mut out = vec![0.0f32; signal.len()];
        convolve_f32(&signal, &kernel, 0, &BorderMode::Clamp, &mut out);
        assert_eq!(&out, &signal);
    }

    #[test]
    fn convolve_constant_border() {
        let signal = [1.0f32, 2.0, 3.0];
        let kernel = [1.0f32, 1.0, 1.0];
        let mut out = vec![0.0f32; signal.len()];
        convolve_f32(&signal, &kernel, 1, &BorderMode::Constant(0.0), &mut out);
        assert_eq!(out, vec![3.0, 6.0, 5.0]);
    }

    #[test]
    fn convolve_orientation_and_reflect() {
        // Asymmetric kernel exposes the flip: out[i] = 0.5 * (s[i+1] - s[i-1]).
        let signal = [0.0f32, 1.0, 4.0, 9.0];
        let kernel = [0.5f32, 0.0, -0.5];
        let mut out = vec![0.0f32; 4];
        convolve_f32(&signal, &kernel, 1, &BorderMode::Reflect101, &mut out);
        assert_abs_diff_eq!(out[1], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[2], 4.0, epsilon = 1e-6);
        // s[-1] reflects to s[1].
        assert_abs_diff_eq!(out[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn separable_box_blur_of_constant_is_constant() {
        let img = Image::new_fill(7, 5, 3.0f32);
        let k = [1.0 / 3.0f32; 3];
        let out = convolve_separable(&img.as_view(), &k, &k, &BorderMode::Reflect101);
        for &v in out.data() {
            assert_abs_diff_eq!(v, 3.0, epsilon = 1e-5);
        }
    }
}
