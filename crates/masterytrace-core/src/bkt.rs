//! Bayesian Knowledge Tracing.
//!
//! A single-step recurrence: all history for a (user, skill) pair is
//! summarized by `p_know` and `exposure_count`. Each observation is folded in
//! with a Bayesian posterior followed by the learning-opportunity term, and
//! the result is clamped so the belief never collapses to certainty.

use chrono::{DateTime, Utc};

use crate::model::{MasteryRecord, SkillParameters};

/// Lower bound of `p_know` after every update.
pub const P_KNOW_FLOOR: f64 = 0.01;
/// Upper bound of `p_know` after every update.
pub const P_KNOW_CEIL: f64 = 0.99;
/// Smallest denominator used by the posterior.
pub const MIN_DENOMINATOR: f64 = 1e-9;

/// Intermediate values of one update, kept for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BktStep {
    /// Belief before the observation.
    pub prior: f64,
    /// Belief conditioned on the observation, before the learning term.
    pub posterior: f64,
    /// Belief after the learning term and clamp.
    pub next: f64,
}

/// P(know | observation).
///
/// The denominator is floored at [`MIN_DENOMINATOR`], so a prior of exactly
/// 0 or 1 or degenerate slip/guess values still produce a finite result.
pub fn posterior(p0: f64, correct: bool, params: &SkillParameters) -> f64 {
    let (numerator, denominator) = if correct {
        let known = (1.0 - params.p_slip) * p0;
        (known, known + params.p_guess * (1.0 - p0))
    } else {
        let known = params.p_slip * p0;
        (known, known + (1.0 - params.p_guess) * (1.0 - p0))
    };

    let value = numerator / denominator.max(MIN_DENOMINATOR);
    if value.is_finite() {
        value
    } else {
        p0
    }
}

/// Apply the learning-opportunity term to a posterior.
pub fn learn(posterior: f64, p_transit: f64) -> f64 {
    posterior + (1.0 - posterior) * p_transit
}

/// Run one BKT step from a prior belief.
pub fn step(p0: f64, correct: bool, params: &SkillParameters) -> BktStep {
    let posterior = posterior(p0, correct, params);
    let learned = learn(posterior, params.p_transit);
    let next = if learned.is_nan() {
        p0.clamp(P_KNOW_FLOOR, P_KNOW_CEIL)
    } else {
        learned.clamp(P_KNOW_FLOOR, P_KNOW_CEIL)
    };
    BktStep {
        prior: p0,
        posterior,
        next,
    }
}

/// Fold one observation into a mastery record.
///
/// A missing record starts from the prior. The returned record is what the
/// storage collaborator should upsert for (user, skill).
pub fn update_mastery(
    current: Option<&MasteryRecord>,
    user_id: &str,
    skill_id: &str,
    correct: bool,
    params: &SkillParameters,
    now: DateTime<Utc>,
) -> MasteryRecord {
    let base = match current {
        Some(record) => record.clone(),
        None => MasteryRecord::prior(user_id, skill_id, now),
    };

    let step = step(base.p_know, correct, params);
    tracing::debug!(
        user = user_id,
        skill = skill_id,
        correct,
        prior = step.prior,
        posterior = step.posterior,
        next = step.next,
        "bkt update"
    );

    MasteryRecord {
        p_know: step.next,
        exposure_count: base.exposure_count.saturating_add(1),
        updated_at: now,
        ..base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PRIOR_P_KNOW;
    use proptest::prelude::*;

    fn params() -> SkillParameters {
        SkillParameters {
            p_transit: 0.1,
            p_slip: 0.1,
            p_guess: 0.25,
        }
    }

    #[test]
    fn fresh_skill_correct_observation() {
        let now = Utc::now();
        let record = update_mastery(None, "alice", "arrays", true, &params(), now);

        // p_correct = 0.9 * 0.1 + 0.25 * 0.9 = 0.315
        let posterior = 0.09 / 0.315;
        let expected = posterior + (1.0 - posterior) * 0.1;
        assert!((record.p_know - expected).abs() < 1e-12);
        assert!((record.p_know - 0.3571).abs() < 1e-4);
        assert_eq!(record.exposure_count, 1);
        assert_eq!(record.updated_at, now);
        assert_eq!(record.user_id, "alice");
        assert_eq!(record.skill_id, "arrays");
    }

    #[test]
    fn fresh_skill_incorrect_observation() {
        let record = update_mastery(None, "alice", "arrays", false, &params(), Utc::now());

        // p_incorrect = 0.1 * 0.1 + 0.75 * 0.9 = 0.685
        let posterior: f64 = 0.01 / 0.685;
        assert!((posterior - 0.0146).abs() < 1e-4);
        let expected = posterior + (1.0 - posterior) * 0.1;
        assert!((record.p_know - expected).abs() < 1e-12);
        assert!((record.p_know - 0.1131).abs() < 1e-4);
        assert!(record.p_know > P_KNOW_FLOOR);
    }

    #[test]
    fn existing_record_is_continued() {
        let now = Utc::now();
        let mut record = MasteryRecord::prior("alice", "arrays", now);
        record.p_know = 0.5;
        record.exposure_count = 4;

        let next = update_mastery(Some(&record), "alice", "arrays", true, &params(), now);
        assert_eq!(next.exposure_count, 5);
        assert!(next.p_know > 0.5);
    }

    #[test]
    fn repeated_success_saturates_at_ceiling() {
        let now = Utc::now();
        let mut record = None;
        for _ in 0..50 {
            record = Some(update_mastery(
                record.as_ref(),
                "alice",
                "arrays",
                true,
                &params(),
                now,
            ));
        }
        let record = record.unwrap();
        assert_eq!(record.p_know, P_KNOW_CEIL);
        assert_eq!(record.exposure_count, 50);
    }

    #[test]
    fn degenerate_inputs_do_not_divide_by_zero() {
        let zero = SkillParameters {
            p_transit: 0.0,
            p_slip: 0.0,
            p_guess: 0.0,
        };
        // Incorrect answer with p_slip = 0 and p_know = 1: denominator is 0.
        let s = step(1.0, false, &zero);
        assert!(s.next.is_finite());
        assert!((P_KNOW_FLOOR..=P_KNOW_CEIL).contains(&s.next));

        let one = SkillParameters {
            p_transit: 1.0,
            p_slip: 1.0,
            p_guess: 1.0,
        };
        for p0 in [0.0, 1.0] {
            for correct in [true, false] {
                let s = step(p0, correct, &one);
                assert!((P_KNOW_FLOOR..=P_KNOW_CEIL).contains(&s.next));
            }
        }
    }

    #[test]
    fn externally_written_boundary_belief() {
        let now = Utc::now();
        let mut record = MasteryRecord::prior("alice", "arrays", now);
        record.p_know = 0.0;
        let next = update_mastery(Some(&record), "alice", "arrays", true, &params(), now);
        assert!((P_KNOW_FLOOR..=P_KNOW_CEIL).contains(&next.p_know));
        assert_eq!(next.exposure_count, 1);
    }

    #[test]
    fn prior_matches_documented_value() {
        let s = step(PRIOR_P_KNOW, true, &params());
        assert_eq!(s.prior, 0.10);
    }

    fn probability() -> impl Strategy<Value = f64> {
        (1u32..1000u32).prop_map(|v| v as f64 / 1000.0)
    }

    fn any_params() -> impl Strategy<Value = SkillParameters> {
        (0u32..=1000u32, 0u32..=1000u32, 0u32..=1000u32).prop_map(|(t, s, g)| SkillParameters {
            p_transit: t as f64 / 1000.0,
            p_slip: s as f64 / 1000.0,
            p_guess: g as f64 / 1000.0,
        })
    }

    proptest! {
        #[test]
        fn output_stays_within_clamp(
            p0 in 0u32..=1000u32,
            params in any_params(),
            correct in any::<bool>(),
        ) {
            let s = step(p0 as f64 / 1000.0, correct, &params);
            prop_assert!(s.next >= P_KNOW_FLOOR && s.next <= P_KNOW_CEIL);
        }

        #[test]
        fn correct_posterior_not_below_incorrect(
            p0 in probability(),
            slip in probability(),
            guess in probability(),
        ) {
            // Non-degenerate region: a learner who knows the skill is at
            // least as likely to answer correctly as one who guesses.
            prop_assume!(slip + guess <= 1.0);
            let params = SkillParameters { p_transit: 0.1, p_slip: slip, p_guess: guess };
            let right = posterior(p0, true, &params);
            let wrong = posterior(p0, false, &params);
            prop_assert!(right >= wrong - 1e-12, "right={right} wrong={wrong}");
        }

        #[test]
        fn exposure_count_increments_by_one(
            start in 0u32..10_000u32,
            params in any_params(),
            correct in any::<bool>(),
        ) {
            let now = Utc::now();
            let mut record = MasteryRecord::prior("u", "s", now);
            record.exposure_count = start;
            let next = update_mastery(Some(&record), "u", "s", correct, &params, now);
            prop_assert_eq!(next.exposure_count, start + 1);
        }
    }
}
