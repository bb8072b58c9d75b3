//! NaN-aware reductions. Non-finite inputs are skipped, never counted as zero,
//! and an empty reduction yields NaN so callers can tell "nothing to score"
//! apart from a genuine zero.

/// Mean of the finite values in `data`; NaN when there are none.
pub fn mean_finite(data: &[f64]) -> f64 {
    let (sum, n) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Weighted mean over `(value, weight)` pairs with the weights of non-finite
/// values dropped and the rest renormalised. NaN if no weight remains.
pub fn weighted_mean<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (num, den) = pairs
        .into_iter()
        .filter(|(v, w)| v.is_finite() && w.is_finite() && *w > 0.0)
        .fold((0.0, 0.0), |(num, den), (v, w)| (num + v * w, den + w));
    if den > 0.0 {
        num / den
    } else {
        f64::NAN
    }
}

/// Clamp to the 0..=100 score range, passing NaN through.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        value
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Linear interpolation between two points, evaluated at `x`.
pub fn interpolate(x: f64, (x0, y0): (f64, f64), (x1, y1): (f64, f64)) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}
