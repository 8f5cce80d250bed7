//! Property tests for the spaced-repetition ladder.
//!
//! - Correct outcomes climb one rung up to the top; incorrect ones reset to 0.
//! - `mastered` tracks `interval_index >= 4` after every call.
//! - `next_review_at` is exactly `now + ladder[index]` days.
//! - Counter deltas stay consistent with the progress they describe.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use danci_drill::services::scheduler::{
    record_outcome, record_rating, Rating, MASTERY_INTERVAL_INDEX, SR_INTERVAL_DAYS,
};
use danci_drill::types::{CounterDelta, UserStats, WordProgress};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_now() -> impl Strategy<Value = DateTime<Utc>> {
    (1_600_000_000i64..=1_900_000_000i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn arb_progress() -> impl Strategy<Value = WordProgress> {
    (0usize..SR_INTERVAL_DAYS.len(), 0u32..500, arb_now()).prop_map(|(interval_index, reviewed, at)| {
        WordProgress {
            word_id: "w".to_string(),
            last_reviewed_at: at,
            next_review_at: at + Duration::days(SR_INTERVAL_DAYS[interval_index]),
            interval_index,
            times_reviewed: reviewed + 1,
            times_correct: reviewed / 2,
            mastered: interval_index >= MASTERY_INTERVAL_INDEX,
        }
    })
}

fn arb_rating() -> impl Strategy<Value = Rating> {
    (1u8..=5).prop_map(|v| Rating::new(v).unwrap())
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn test_ladder_step_follows_outcome(progress in arb_progress(), correct in any::<bool>(), now in arb_now()) {
        let next = record_outcome(Some(&progress), "w", correct, now);
        let expected = if correct { (progress.interval_index + 1).min(5) } else { 0 };
        prop_assert_eq!(next.interval_index, expected);
        prop_assert_eq!(next.mastered, next.interval_index >= 4);
        prop_assert_eq!(next.next_review_at, now + Duration::days(SR_INTERVAL_DAYS[expected]));
        prop_assert_eq!(next.last_reviewed_at, now);
        prop_assert_eq!(next.times_reviewed, progress.times_reviewed + 1);
        prop_assert_eq!(next.times_correct, progress.times_correct + u32::from(correct));
    }

    #[test]
    fn test_rating_sequence_keeps_invariants(ratings in proptest::collection::vec(arb_rating(), 1..40), now in arb_now()) {
        let mut current: Option<WordProgress> = None;
        let mut stats = UserStats::new("u");
        for (step, rating) in ratings.iter().enumerate() {
            let at = now + Duration::days(step as i64);
            let next = record_rating(current.as_ref(), "w", *rating, at);
            prop_assert!(next.interval_index < SR_INTERVAL_DAYS.len());
            prop_assert_eq!(next.mastered, next.interval_index >= MASTERY_INTERVAL_INDEX);
            if let Some(prev) = &current {
                prop_assert!(next.times_correct >= prev.times_correct);
            }
            stats.apply(&CounterDelta::for_outcome(current.as_ref(), &next));
            current = Some(next);
        }

        let last = current.unwrap();
        let correct = ratings.iter().filter(|r| r.is_correct()).count() as u64;
        prop_assert_eq!(stats.total_attempts, ratings.len() as u64);
        prop_assert_eq!(stats.total_correct, correct);
        prop_assert_eq!(u64::from(last.times_correct), correct);
        prop_assert_eq!(stats.words_learned, 1);
    }

    #[test]
    fn test_out_of_ladder_index_is_clamped(index in 6usize..10_000, correct in any::<bool>(), now in arb_now()) {
        let progress = WordProgress {
            word_id: "w".to_string(),
            last_reviewed_at: now,
            next_review_at: now,
            interval_index: index,
            times_reviewed: 1,
            times_correct: 1,
            mastered: true,
        };
        let next = record_outcome(Some(&progress), "w", correct, now);
        prop_assert_eq!(next.interval_index, if correct { 5 } else { 0 });
    }
}

#[test]
fn test_first_review_lands_on_first_rung() {
    let now = Utc.with_ymd_and_hms(2026, 2, 14, 7, 0, 0).unwrap();
    for correct in [true, false] {
        let first = record_outcome(None, "w", correct, now);
        assert_eq!(first.interval_index, 0);
        assert_eq!(first.next_review_at, now + Duration::days(1));
        assert!(!first.mastered);
    }
}
