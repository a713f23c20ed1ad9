//! Time-domain and statistical features over one EOG window.
//!
//! Ten features per channel; the dual-channel vector concatenates the
//! vertical then horizontal channel so the model can separate horizontal
//! gaze (which only shows on the second channel) from everything else.

/// Features per channel.
pub const FEATURE_COUNT: usize = 10;

/// Length of the dual-channel feature vector.
pub const DUAL_FEATURE_COUNT: usize = 2 * FEATURE_COUNT;

/// Feature names, index-aligned with [`extract`]'s output.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "peak_amplitude",
    "zero_crossings",
    "slope",
    "max_derivative",
    "mean",
    "std",
    "skewness",
    "kurtosis",
    "rms",
    "derivative_variance",
];

/// Extract the per-channel feature vector from one window of samples.
pub fn extract(window: &[f64]) -> [f64; FEATURE_COUNT] {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &x in window {
        min = min.min(x);
        max = max.max(x);
    }

    // Sign changes of the mean-centered signal.
    let mut zero_crossings = 0.0;
    let mut prev_sign: Option<i8> = None;
    for &x in window {
        let sign = if x > mean {
            1
        } else if x < mean {
            -1
        } else {
            0
        };
        if let Some(prev) = prev_sign {
            if prev != sign {
                zero_crossings += 1.0;
            }
        }
        prev_sign = Some(sign);
    }

    // Least-squares slope against the sample index.
    let x_mean = (n - 1.0) / 2.0;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &y) in window.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - mean);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    let mut max_derivative = 0.0f64;
    let mut deriv_sum = 0.0;
    let mut deriv_sq_sum = 0.0;
    let deriv_n = window.len().saturating_sub(1);
    for pair in window.windows(2) {
        let d = pair[1] - pair[0];
        max_derivative = max_derivative.max(d.abs());
        deriv_sum += d;
        deriv_sq_sum += d * d;
    }
    let derivative_variance = if deriv_n > 0 {
        let dn = deriv_n as f64;
        let dmean = deriv_sum / dn;
        deriv_sq_sum / dn - dmean * dmean
    } else {
        0.0
    };

    let (skewness, kurtosis) = if std > 0.0 {
        let m3 = window.iter().map(|x| ((x - mean) / std).powi(3)).sum::<f64>() / n;
        let m4 = window.iter().map(|x| ((x - mean) / std).powi(4)).sum::<f64>() / n;
        (m3, m4 - 3.0)
    } else {
        (0.0, 0.0)
    };

    let rms = (window.iter().map(|x| x * x).sum::<f64>() / n).sqrt();

    [
        max - min,
        zero_crossings,
        slope,
        max_derivative,
        mean,
        std,
        skewness,
        kurtosis,
        rms,
        derivative_variance,
    ]
}

/// Concatenated vertical + horizontal feature vector.
pub fn extract_dual(eog_v: &[f64], eog_h: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(DUAL_FEATURE_COUNT);
    out.extend_from_slice(&extract(eog_v));
    out.extend_from_slice(&extract(eog_h));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn output_dimensions() {
        let window = vec![2048.0; 100];
        assert_eq!(extract(&window).len(), FEATURE_COUNT);
        assert_eq!(extract_dual(&window, &window).len(), DUAL_FEATURE_COUNT);
    }

    #[test]
    fn constant_signal_features() {
        let f = extract(&vec![2048.0; 100]);
        assert_eq!(f[0], 0.0); // peak-to-peak
        assert_eq!(f[1], 0.0); // zero crossings
        assert_relative_eq!(f[2], 0.0); // slope
        assert_eq!(f[3], 0.0); // max derivative
        assert_relative_eq!(f[4], 2048.0); // mean
        assert_eq!(f[5], 0.0); // std
        assert_relative_eq!(f[8], 2048.0); // rms
    }

    #[test]
    fn blink_window_has_high_amplitude_and_derivative() {
        let mut window = vec![2048.0; 100];
        for x in window[40..60].iter_mut() {
            *x = 3500.0;
        }
        let f = extract(&window);
        assert_relative_eq!(f[0], 1452.0); // peak-to-peak
        assert_relative_eq!(f[3], 1452.0); // max derivative at the edge
        assert!(f[5] > 100.0); // std well off zero
    }

    #[test]
    fn ramp_has_positive_slope_and_no_nan() {
        let window: Vec<f64> = (0..100).map(|i| 2000.0 + i as f64 * 3.0).collect();
        let f = extract(&window);
        assert_relative_eq!(f[2], 3.0, epsilon = 1e-9);
        assert!(f.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn alternating_signal_has_many_crossings() {
        let window: Vec<f64> = (0..100)
            .map(|i| if i % 2 == 0 { 2000.0 } else { 2100.0 })
            .collect();
        let f = extract(&window);
        assert!(f[1] >= 98.0, "crossings {}", f[1]);
    }
}
