//! Score normalization for a single score column.
//!
//! Only strictly positive, finite scores take part: a zero means "this
//! technique did not return the candidate" and must stay zero after
//! rescaling, so the statistics (min, max, mean, deviation, rank) are computed
//! over the positive entries and only those entries are rewritten.
//!
//! Degenerate columns (all positive scores equal) are returned unchanged
//! rather than divided by zero.

use ragfuse_core::NormalizationMethod;

/// Rescale `scores` with `method`, returning a new column of the same length.
///
/// # Example
///
/// ```
/// use ragfuse_core::NormalizationMethod;
/// use ragfuse_engine::normalize::normalize_scores;
///
/// let out = normalize_scores(&[2.0, 0.0, 4.0, 3.0], NormalizationMethod::MinMax);
/// assert_eq!(out, vec![0.0, 0.0, 1.0, 0.5]);
/// ```
#[must_use]
pub fn normalize_scores(scores: &[f64], method: NormalizationMethod) -> Vec<f64> {
    let contributing: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| is_contributing(**s))
        .map(|(i, _)| i)
        .collect();

    if contributing.is_empty() {
        return scores.to_vec();
    }

    match method {
        NormalizationMethod::MinMax => min_max(scores, &contributing),
        NormalizationMethod::ZScore => z_score(scores, &contributing),
        NormalizationMethod::RankBased => rank_based(scores, &contributing),
    }
}

fn is_contributing(score: f64) -> bool {
    score.is_finite() && score > 0.0
}

fn min_max(scores: &[f64], contributing: &[usize]) -> Vec<f64> {
    let min = contributing
        .iter()
        .map(|&i| scores[i])
        .fold(f64::INFINITY, f64::min);
    let max = contributing
        .iter()
        .map(|&i| scores[i])
        .fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range.abs() <= f64::EPSILON {
        return scores.to_vec();
    }

    let mut out = scores.to_vec();
    for &i in contributing {
        out[i] = (scores[i] - min) / range;
    }
    out
}

fn z_score(scores: &[f64], contributing: &[usize]) -> Vec<f64> {
    let n = contributing.len() as f64;
    let mean = contributing.iter().map(|&i| scores[i]).sum::<f64>() / n;
    let variance = contributing
        .iter()
        .map(|&i| (scores[i] - mean).powi(2))
        .sum::<f64>()
        / n;
    let stddev = variance.sqrt();

    if stddev <= f64::EPSILON {
        return scores.to_vec();
    }

    let mut out = scores.to_vec();
    for &i in contributing {
        out[i] = (scores[i] - mean) / stddev;
    }
    out
}

fn rank_based(scores: &[f64], contributing: &[usize]) -> Vec<f64> {
    let mut order = contributing.to_vec();
    // Stable sort: equal scores keep their original relative order.
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut out = scores.to_vec();
    for (pos, &i) in order.iter().enumerate() {
        out[i] = 1.0 / (pos + 1) as f64;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx_eq(actual: f64, expected: f64) {
        let tolerance = 1e-10;
        assert!(
            (actual - expected).abs() <= tolerance,
            "actual ({actual}) != expected ({expected})"
        );
    }

    #[test]
    fn min_max_rescales_positive_scores_only() {
        let out = normalize_scores(&[3.0, 0.0, 1.0, 5.0], NormalizationMethod::MinMax);
        assert_approx_eq(out[0], 0.5);
        assert_approx_eq(out[1], 0.0);
        assert_approx_eq(out[2], 0.0);
        assert_approx_eq(out[3], 1.0);
    }

    #[test]
    fn min_max_equal_values_are_unchanged() {
        let out = normalize_scores(&[2.0, 2.0, 0.0], NormalizationMethod::MinMax);
        assert_eq!(out, vec![2.0, 2.0, 0.0]);
    }

    #[test]
    fn z_score_centres_positive_scores() {
        let out = normalize_scores(&[1.0, 3.0, 0.0], NormalizationMethod::ZScore);
        // mean 2, population stddev 1
        assert_approx_eq(out[0], -1.0);
        assert_approx_eq(out[1], 1.0);
        assert_approx_eq(out[2], 0.0);
    }

    #[test]
    fn z_score_zero_deviation_is_unchanged() {
        let out = normalize_scores(&[0.4], NormalizationMethod::ZScore);
        assert_eq!(out, vec![0.4]);
    }

    #[test]
    fn rank_based_uses_reciprocal_rank_with_stable_ties() {
        let out = normalize_scores(&[0.2, 0.9, 0.0, 0.2], NormalizationMethod::RankBased);
        assert_approx_eq(out[1], 1.0);
        assert_approx_eq(out[0], 0.5);
        assert_approx_eq(out[3], 1.0 / 3.0);
        assert_approx_eq(out[2], 0.0);
    }

    #[test]
    fn all_zero_column_passes_through() {
        for method in NormalizationMethod::ALL {
            assert_eq!(normalize_scores(&[0.0, 0.0], *method), vec![0.0, 0.0]);
        }
    }

    #[test]
    fn empty_column_stays_empty() {
        assert!(normalize_scores(&[], NormalizationMethod::MinMax).is_empty());
    }
}
