//! Inverse-rank scoring for merged results.
//!
//! Each engine that returned a URL contributes
//! `engine_weight * rank_decay(rank)`; a merged result's score is the sum
//! of its contributions. The decay is strictly decreasing in rank and every
//! contribution is positive, so agreement between engines always raises a
//! score.
//!
//! ```text
//! rank_decay(rank) = 1.0 / (1.0 + (rank - 1) * 0.1)
//! ```

/// Decay applied per rank step.
pub const RANK_DECAY: f64 = 0.1;

/// Weight of a hit at 1-based `rank`. Rank 0 is treated as rank 1.
///
/// - rank 1 → 1.0
/// - rank 10 → ~0.53
pub fn rank_decay(rank: u32) -> f64 {
    let position = rank.max(1) - 1;
    1.0 / (1.0 + f64::from(position) * RANK_DECAY)
}

/// Contribution of one engine's hit to a merged score.
pub fn contribution(engine_weight: f64, rank: u32) -> f64 {
    engine_weight * rank_decay(rank)
}

/// Sum of contributions from `(engine_weight, rank)` pairs.
pub fn combined_score<I>(contributions: I) -> f64
where
    I: IntoIterator<Item = (f64, u32)>,
{
    contributions
        .into_iter()
        .map(|(weight, rank)| contribution(weight, rank))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_one_has_full_weight() {
        assert!((rank_decay(1) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rank_zero_treated_as_rank_one() {
        assert!((rank_decay(0) - rank_decay(1)).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_formula_correctness() {
        let expected_10 = 1.0 / (1.0 + 9.0 * 0.1);
        assert!((rank_decay(10) - expected_10).abs() < f64::EPSILON);
        assert!(rank_decay(10) < 0.53 && rank_decay(10) > 0.52);
    }

    #[test]
    fn decay_strictly_decreasing() {
        let scores: Vec<f64> = (1..=50).map(rank_decay).collect();
        for i in 1..scores.len() {
            assert!(scores[i] < scores[i - 1]);
        }
    }

    #[test]
    fn engine_weight_scales_contribution() {
        assert!((contribution(1.5, 1) - 1.5).abs() < f64::EPSILON);
        assert!(contribution(1.5, 1) > contribution(1.0, 1));
    }

    #[test]
    fn two_engines_at_rank_one_beat_one() {
        let two = combined_score([(1.0, 1), (1.0, 1)]);
        let one = combined_score([(1.0, 1)]);
        assert!(two > one);
        assert!((two - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn agreement_beats_any_single_rank() {
        // Two low-ranked agreeing engines vs one top-ranked engine.
        let agreeing = combined_score([(1.0, 10), (1.0, 10)]);
        let single = combined_score([(1.0, 1)]);
        assert!(agreeing > single);
    }

    #[test]
    fn empty_contributions_score_zero() {
        assert_eq!(combined_score(std::iter::empty()), 0.0);
    }
}
