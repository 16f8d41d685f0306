/// Estimate the `p`th percentile (`0 < p <= 100`) of `values`.
///
/// Uses the `(n + 1)` position estimator: positions below the first rank
/// clamp to the minimum, positions at or beyond the last rank clamp to the
/// maximum, and anything in between interpolates linearly between the two
/// neighbouring order statistics.
pub(crate) fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let (&first, &last) = (sorted.first()?, sorted.last()?);
    let n = sorted.len();
    if n == 1 {
        return Some(first);
    }

    let pos = p * (n as f64 + 1.0) / 100.0;
    if pos < 1.0 {
        return Some(first);
    }
    if pos >= n as f64 {
        return Some(last);
    }

    let floor = pos.floor();
    let rank = floor as usize;
    let lower = sorted[rank - 1];
    let upper = sorted[rank];

    Some(lower + (pos - floor) * (upper - lower))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_no_percentile() {
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn single_value_is_every_percentile() {
        assert_eq!(percentile(&[7.0], 1.0), Some(7.0));
        assert_eq!(percentile(&[7.0], 100.0), Some(7.0));
    }

    #[test]
    fn median_interpolates_between_middle_values() {
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 50.0), Some(2.5));
        assert_eq!(percentile(&[5.0, 1.0, 3.0], 50.0), Some(3.0));
    }

    #[test]
    fn extreme_positions_clamp_to_min_and_max() {
        let values = [10.0, 20.0, 30.0];

        // pos = 1 * 4 / 100 < 1
        assert_eq!(percentile(&values, 1.0), Some(10.0));
        // pos = 100 * 4 / 100 >= 3
        assert_eq!(percentile(&values, 100.0), Some(30.0));
    }

    #[test]
    fn interior_position_interpolates() {
        // pos = 25 * 5 / 100 = 1.25 -> 10 + 0.25 * (20 - 10)
        let got = percentile(&[40.0, 10.0, 30.0, 20.0], 25.0).expect("percentile");
        assert!((got - 12.5).abs() < 1e-12);
    }
}
