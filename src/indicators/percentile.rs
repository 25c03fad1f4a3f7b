// =============================================================================
// Percentile rank
// =============================================================================
//
// The INCLUSIVE variant (count of history values <= the probe) is used
// everywhere in the engine. Earlier generations of this system mixed `<`
// and `<=` in different call sites; the single shared implementation is the
// guard against that drift.

/// Minimum history size for a meaningful rank.
const MIN_HISTORY: usize = 10;

/// Percentage of `history` values `<= value`, in `[0, 100]`.
///
/// Returns the neutral 50.0 when the history holds fewer than 10 samples,
/// so thin histories never read as extreme.
pub fn percentile_rank(value: f64, history: &[f64]) -> f64 {
    if history.len() < MIN_HISTORY {
        return 50.0;
    }

    let at_or_below = history.iter().filter(|h| **h <= value).count();
    100.0 * at_or_below as f64 / history.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_is_neutral() {
        assert_eq!(percentile_rank(5.0, &[1.0; 9]), 50.0);
        assert_eq!(percentile_rank(5.0, &[]), 50.0);
    }

    #[test]
    fn rank_of_maximum_is_100() {
        let history: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        assert_eq!(percentile_rank(20.0, &history), 100.0);
        assert_eq!(percentile_rank(25.0, &history), 100.0);
    }

    #[test]
    fn rank_below_minimum_is_0() {
        let history: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        assert_eq!(percentile_rank(0.5, &history), 0.0);
    }

    #[test]
    fn inclusive_counting() {
        // 10 samples of the same value: probe equal to them ranks 100, the
        // inclusive convention.
        let history = vec![3.0; 10];
        assert_eq!(percentile_rank(3.0, &history), 100.0);
    }

    #[test]
    fn median_value_ranks_midway() {
        let history: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        assert!((percentile_rank(50.0, &history) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn monotone_in_value() {
        let history: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
        let mut prev = f64::NEG_INFINITY;
        for i in -20..=20 {
            let rank = percentile_rank(i as f64, &history);
            assert!(rank >= prev, "rank must not decrease as value grows");
            prev = rank;
        }
    }
}
