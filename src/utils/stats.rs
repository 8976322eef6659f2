//! Statistical utility functions.

use statrs::distribution::{ContinuousCDF, Normal};

/// Quantile function of the standard normal distribution.
///
/// # Arguments
/// * `p` - Probability value (0.0 to 1.0)
///
/// # Returns
/// The z-score corresponding to the given probability.
///
/// # Example
/// ```
/// use cellcast::utils::quantile_normal;
///
/// // 95% confidence level -> z ≈ 1.96
/// let z = quantile_normal(0.975);
/// assert!((z - 1.96).abs() < 0.01);
/// ```
pub fn quantile_normal(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the variance of a slice (sample variance with n-1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

/// Calculate the standard deviation of a slice.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Summary of the present values of an optional column.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

impl ColumnStats {
    /// Summarize the `Some` values; `None` when there are none.
    pub fn from_options<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let present: Vec<f64> = values.into_iter().flatten().collect();
        if present.is_empty() {
            return None;
        }
        let std = std_dev(&present);
        Some(Self {
            count: present.len(),
            mean: mean(&present),
            std: if std.is_finite() { Some(std) } else { None },
            min: present.iter().copied().fold(f64::INFINITY, f64::min),
            max: present.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Mean of the present values, `None` if there are none.
pub fn mean_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantile_normal_known_values() {
        assert_relative_eq!(quantile_normal(0.5), 0.0, epsilon = 1e-9);
        assert_relative_eq!(quantile_normal(0.975), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(quantile_normal(0.025), -1.959964, epsilon = 1e-5);
        assert_eq!(quantile_normal(0.0), f64::NEG_INFINITY);
        assert_eq!(quantile_normal(1.0), f64::INFINITY);
    }

    #[test]
    fn basic_moments() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v), 5.0);
        assert_relative_eq!(variance(&v), 32.0 / 7.0, epsilon = 1e-12);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn column_stats_ignore_missing() {
        let stats = ColumnStats::from_options(vec![Some(1.0), None, Some(3.0)]).unwrap();
        assert_eq!(stats.count, 2);
        assert_relative_eq!(stats.mean, 2.0);
        assert_relative_eq!(stats.std.unwrap(), 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_eq!((stats.min, stats.max), (1.0, 3.0));

        let single = ColumnStats::from_options(vec![Some(4.0)]).unwrap();
        assert_eq!(single.std, None);
        assert!(ColumnStats::from_options(vec![None, None]).is_none());
    }

    #[test]
    fn mean_present_skips_none() {
        assert_eq!(mean_present(vec![Some(2.0), None, Some(4.0)]), Some(3.0));
        assert_eq!(mean_present(Vec::<Option<f64>>::new()), None);
    }
}
