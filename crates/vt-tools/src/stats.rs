//! Intensity histograms and the statistics derived from them.

use vt_core::ImageView;

pub type Histogram256 = [u64; 256];

pub fn histogram_u8(img: &ImageView<'_, u8>) -> Histogram256 {
    let mut hist = [0u64; 256];
    for row in img.rows() {
        for &v in row {
            hist[v as usize] += 1;
        }
    }
    hist
}

/// Otsu's threshold: the level `t` maximizing the between-class variance
/// of `[0, t]` versus `(t, 255]`. Pixels `> t` are foreground.
pub fn otsu_threshold(hist: &Histogram256) -> u8 {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 0;
    }
    let total = total as f64;
    let mu: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum::<f64>()
        / total;

    let (mut q1, mut mu1) = (0.0f64, 0.0f64);
    let mut best = (0u8, 0.0f64);
    for (i, &h) in hist.iter().enumerate() {
        let p = h as f64 / total;
        let q1_next = q1 + p;
        if q1_next > f64::EPSILON {
            mu1 = (mu1 * q1 + i as f64 * p) / q1_next;
        }
        q1 = q1_next;
        let q2 = 1.0 - q1;
        if q1 < f64::EPSILON || q2 < f64::EPSILON {
            continue;
        }
        let mu2 = (mu - q1 * mu1) / q2;
        let sigma = q1 * q2 * (mu1 - mu2) * (mu1 - mu2);
        if sigma > best.1 {
            best = (i as u8, sigma);
        }
    }
    best.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: u8,
    pub max: u8,
    pub median: u8,
    /// Most frequent level; the lowest one on ties.
    pub mode: u8,
    pub otsu: u8,
}

impl IntensityStats {
    /// `None` for an empty histogram.
    pub fn from_histogram(hist: &Histogram256) -> Option<Self> {
        let count: u64 = hist.iter().sum();
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let mean = hist
            .iter()
            .enumerate()
            .map(|(i, &h)| i as f64 * h as f64)
            .sum::<f64>()
            / n;
        let var = hist
            .iter()
            .enumerate()
            .map(|(i, &h)| (i as f64 - mean).powi(2) * h as f64)
            .sum::<f64>()
            / n;

        let min = hist.iter().position(|&h| h > 0).unwrap_or(0) as u8;
        let max = hist.iter().rposition(|&h| h > 0).unwrap_or(0) as u8;

        let half = count.div_ceil(2);
        let mut acc = 0u64;
        let mut median = 0u8;
        for (i, &h) in hist.iter().enumerate() {
            acc += h;
            if acc >= half {
                median = i as u8;
                break;
            }
        }

        let mut mode = 0usize;
        for (i, &h) in hist.iter().enumerate() {
            if h > hist[mode] {
                mode = i;
            }
        }

        Some(Self {
            count,
            mean,
            std_dev: var.sqrt(),
            min,
            max,
            median,
            mode: mode as u8,
            otsu: otsu_threshold(hist),
        })
    }
}

/// Groups 256 levels into `bins` equal-width bins.
pub fn rebin(hist: &Histogram256, bins: usize) -> Vec<u64> {
    let bins = bins.clamp(1, 256);
    let mut out = vec![0u64; bins];
    for (i, &h) in hist.iter().enumerate() {
        out[i * bins / 256] += h;
    }
    out
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use vt_core::Image;

    use super::{IntensityStats, histogram_u8, otsu_threshold, rebin};

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let img = Image::from_fn(20, 10, |x, _| if x < 12 { 50u8 } else { 200 });
        let hist = histogram_u8(&img.as_view());
        let t = otsu_threshold(&hist);
        assert!((50..200).contains(&t), "t = {t}");
    }

    #[test]
    fn otsu_on_noisy_modes() {
        let img = Image::from_fn(64, 64, |x, y| {
            let jitter = ((x * 7 + y * 13) % 11) as u8;
            if x < 32 { 60 + jitter } else { 180 + jitter }
        });
        let t = otsu_threshold(&histogram_u8(&img.as_view()));
        assert!((70..180).contains(&t), "t = {t}");
    }

    #[test]
    fn stats_of_known_values() {
        let img = Image::from_vec(5, 1, vec![1u8, 2, 2, 3, 10]).expect("image");
        let s = IntensityStats::from_histogram(&histogram_u8(&img.as_view())).expect("stats");
        assert_eq!(s.count, 5);
        assert_abs_diff_eq!(s.mean, 3.6);
        assert_eq!((s.min, s.max, s.median, s.mode), (1, 10, 2, 2));
        assert_abs_diff_eq!(s.std_dev, (53.2f64 / 5.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn empty_histogram_has_no_stats() {
        assert!(IntensityStats::from_histogram(&[0; 256]).is_none());
    }

    #[test]
    fn rebin_preserves_total() {
        let img = Image::from_fn(16, 16, |x, y| (x * 16 + y) as u8);
        let hist = histogram_u8(&img.as_view());
        let bins = rebin(&hist, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().sum::<u64>(), 256);
    }
}
