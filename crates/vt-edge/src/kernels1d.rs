/// 1D Gaussian and first-derivative-of-Gaussian kernels.
///
/// Conventions:
/// - `radius = ceil(3*sigma)`, minimum 1.
/// - `g` is normalized such that `sum(g) ~= 1`.
/// - `dg[i] = -(x/sigma^2) * g[i]` (using normalized `g`), so convolving a
///   rising step yields a positive response.
/// - `dg` is not normalized to unit sum; numerically `sum(dg) ~= 0`.
#[derive(Debug, Clone)]
pub struct DoGKernel1D {
    pub sigma: f32,
    pub radius: usize,
    pub g: Vec<f32>,
    pub dg: Vec<f32>,
}

impl DoGKernel1D {
    pub fn new(sigma: f32) -> Self {
        assert!(
            sigma.is_finite() && sigma > 0.0,
            "sigma must be > 0 and finite"
        );

        let radius = ((3.0 * sigma).ceil() as usize).max(1);
        let g = gaussian_taps(radius, sigma);
        let sigma2 = sigma * sigma;
        let dg = g
            .iter()
            .enumerate()
            .map(|(i, &gi)| {
                let x = i as f32 - radius as f32;
                -(x / sigma2) * gi
            })
            .collect();

        Self {
            sigma,
            radius,
            g,
            dg,
        }
    }

    /// Unsmoothed `(s[i+1] - s[i-1]) / 2`; `sigma` is reported as 0.
    pub fn central_difference() -> Self {
        Self {
            sigma: 0.0,
            radius: 1,
            g: vec![0.0, 1.0, 0.0],
            dg: vec![0.5, 0.0, -0.5],
        }
    }
}

/// Normalized Gaussian of odd length `size`. `sigma <= 0` derives it from
/// the size as `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let radius = size / 2;
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };
    gaussian_taps(radius, sigma)
}

pub fn box_kernel(size: usize) -> Vec<f32> {
    let size = size.max(1) | 1;
    vec![1.0 / size as f32; size]
}

fn gaussian_taps(radius: usize, sigma: f32) -> Vec<f32> {
    let sigma2 = sigma * sigma;
    let mut g: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-(x * x) / (2.0 * sigma2)).exp()
        })
        .collect();
    let sum: f32 = g.iter().sum();
    for gi in &mut g {
        *gi /= sum;
    }
    g
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{DoGKernel1D, box_kernel, gaussian_kernel};

    #[test]
    fn gaussian_and_derivative_properties() {
        let k = DoGKernel1D::new(1.2);

        let sum_g: f32 = k.g.iter().sum();
        assert_abs_diff_eq!(sum_g, 1.0, epsilon = 1e-5);

        let sum_dg: f32 = k.dg.iter().sum();
        assert_abs_diff_eq!(sum_dg, 0.0, epsilon = 1e-6);

        for i in 1..=k.radius {
            assert_abs_diff_eq!(k.dg[k.radius + i], -k.dg[k.radius - i], epsilon = 1e-6);
        }
    }

    #[test]
    fn sized_kernels_are_normalized_and_odd() {
        let g = gaussian_kernel(4, 0.0);
        assert_eq!(g.len(), 5);
        assert_abs_diff_eq!(g.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert!(g[2] > g[1] && g[1] > g[0]);

        let b = box_kernel(3);
        assert_eq!(b, vec![1.0 / 3.0; 3]);
        assert_eq!(gaussian_kernel(1, 0.0), vec![1.0]);
    }
}
