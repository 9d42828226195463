use crate::border::BorderMode;
use crate::image::ImageView;

/// Nearest-neighbour sample; `None` when the image is empty or the
/// coordinate falls outside under a non-constant policy that cannot map it.
pub fn sample_nearest<T: Copy>(
    img: &ImageView<'_, T>,
    x: f32,
    y: f32,
    border: &BorderMode<T>,
) -> Option<T> {
    let xi = x.round() as isize;
    let yi = y.round() as isize;
    fetch(img, xi, yi, border)
}

/// Floor-based 2x2 bilinear interpolation at pixel-centre coordinates.
///
/// Empty images return the constant fill (or `0.0` for other modes).
pub fn sample_bilinear_f32<T: Copy + Into<f32>>(
    img: &ImageView<'_, T>,
    x: f32,
    y: f32,
    border: &BorderMode<f32>,
) -> f32 {
    let fill = match border {
        BorderMode::Constant(v) => *v,
        _ => 0.0,
    };
    if img.width() == 0 || img.height() == 0 {
        return fill;
    }

    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let dx = x - x0 as f32;
    let dy = y - y0 as f32;

    let at = |xx: isize, yy: isize| -> f32 {
        let mx = border.map(xx, img.width());
        let my = border.map(yy, img.height());
        match (mx, my) {
            (Some(mx), Some(my)) => img.get(mx, my).map(|&v| v.into()).unwrap_or(fill),
            _ => fill,
        }
    };

    let top = at(x0, y0) * (1.0 - dx) + at(x0 + 1, y0) * dx;
    let bottom = at(x0, y0 + 1) * (1.0 - dx) + at(x0 + 1, y0 + 1) * dx;
    top * (1.0 - dy) + bottom * dy
}

fn fetch<T: Copy>(img: &ImageView<'_, T>, x: isize, y: isize, border: &BorderMode<T>) -> Option<T> {
    if let BorderMode::Constant(v) = border {
        if x < 0 || y < 0 || x >= img.width() as isize || y >= img.height() as isize {
            return Some(*v);
        }
    }
    let mx = border.map(x, img.width())?;
    let my = border.map(y, img.height())?;
    img.get(mx, my).copied()
}
