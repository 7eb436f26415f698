//! Null-propagating arithmetic shared by the views.
//!
//! A result is `None` whenever an operand is missing, a denominator is zero,
//! or the result is not finite.

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// `numerator / denominator`.
#[must_use]
pub fn quotient(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    finite(n / d)
}

/// `numerator / denominator * 100`.
#[must_use]
pub fn percent(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    quotient(numerator, denominator).and_then(|q| finite(q * 100.0))
}

/// Percentage change from `base` to `current`.
#[must_use]
pub fn pct_change(current: Option<f64>, base: Option<f64>) -> Option<f64> {
    percent(diff(current, base), base)
}

/// `a - b`.
#[must_use]
pub fn diff(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    finite(a? - b?)
}

/// Sum of the present values; `None` when every value is missing.
#[must_use]
pub fn sum_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    finite(present.iter().sum())
}

/// Mean of the present values.
#[must_use]
pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let count = values.iter().flatten().count();
    sum_present(values).map(|sum| sum / count as f64)
}

/// Population standard deviation of the present values.
#[must_use]
pub fn std_present(values: &[Option<f64>]) -> Option<f64> {
    let mean = mean_present(values)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let variance =
        present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / present.len() as f64;
    finite(variance.sqrt())
}

/// True when `latest > previous > earliest`; false if any value is missing.
#[must_use]
pub fn rising_twice(latest: Option<f64>, previous: Option<f64>, earliest: Option<f64>) -> bool {
    matches!((latest, previous, earliest), (Some(a), Some(b), Some(c)) if a > b && b > c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_propagates_missing_values() {
        assert_eq!(percent(Some(1.0), Some(4.0)), Some(25.0));
        assert_eq!(percent(Some(1.0), Some(0.0)), None);
        assert_eq!(percent(None, Some(4.0)), None);
        assert_eq!(percent(Some(1.0), None), None);
        assert_eq!(quotient(Some(600.0), Some(120.0)), Some(5.0));
        assert_eq!(quotient(Some(f64::MAX), Some(f64::MIN_POSITIVE)), None);
    }

    #[test]
    fn test_pct_change() {
        let yoy = pct_change(Some(120.0), Some(90.0)).unwrap();
        assert!((yoy - 33.333_333).abs() < 1e-4);
        assert_eq!(pct_change(Some(1.0), Some(0.0)), None);
    }

    #[test]
    fn test_skip_missing_aggregates() {
        let values = [Some(1.0), None, Some(3.0)];
        assert_eq!(sum_present(&values), Some(4.0));
        assert_eq!(mean_present(&values), Some(2.0));
        assert_eq!(std_present(&values), Some(1.0));
        assert_eq!(sum_present(&[None, None]), None);
        assert_eq!(std_present(&[Some(2.0)]), Some(0.0));
    }

    #[test]
    fn test_rising_twice() {
        assert!(rising_twice(Some(120.0), Some(100.0), Some(80.0)));
        assert!(!rising_twice(Some(120.0), Some(100.0), Some(100.0)));
        assert!(!rising_twice(Some(120.0), None, Some(80.0)));
    }
}
