use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::WordProgress;

/// Review spacing in days, indexed by `WordProgress::interval_index`.
pub const SR_INTERVAL_DAYS: [i64; 6] = [1, 3, 7, 14, 30, 90];
/// Reaching the 30-day rung marks a word mastered.
pub const MASTERY_INTERVAL_INDEX: usize = 4;
/// Ratings at or above this value count as a correct recall.
pub const CORRECT_RATING_THRESHOLD: u8 = 3;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RatingError {
    #[error("rating {0} outside 1..=5")]
    OutOfRange(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const QUIZ_CORRECT: Rating = Rating(5);
    pub const QUIZ_INCORRECT: Rating = Rating(1);
    pub const DIDNT_KNOW: Rating = Rating(1);
    pub const GOT_IT: Rating = Rating(3);
    pub const EASY: Rating = Rating(5);

    pub fn new(value: u8) -> Result<Self, RatingError> {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RatingError::OutOfRange(value))
        }
    }

    pub fn from_quiz_answer(is_correct: bool) -> Self {
        if is_correct {
            Self::QUIZ_CORRECT
        } else {
            Self::QUIZ_INCORRECT
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_correct(self) -> bool {
        self.0 >= CORRECT_RATING_THRESHOLD
    }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

pub fn interval_days(interval_index: usize) -> i64 {
    SR_INTERVAL_DAYS[interval_index.min(SR_INTERVAL_DAYS.len() - 1)]
}

pub fn is_mastered_index(interval_index: usize) -> bool {
    interval_index >= MASTERY_INTERVAL_INDEX
}

/// Next interval rung for an outcome. A word seen for the first time starts on
/// rung 0 regardless of the outcome.
pub fn next_interval_index(existing: Option<&WordProgress>, was_correct: bool) -> usize {
    let last = SR_INTERVAL_DAYS.len() - 1;
    match existing {
        None => 0,
        Some(_) if !was_correct => 0,
        Some(progress) => (progress.interval_index.min(last) + 1).min(last),
    }
}

/// Applies one review outcome. Pure: persisting the record and the
/// matching `CounterDelta` is the caller's job.
pub fn record_outcome(
    existing: Option<&WordProgress>,
    word_id: &str,
    was_correct: bool,
    now: DateTime<Utc>,
) -> WordProgress {
    let interval_index = next_interval_index(existing, was_correct);
    let (times_reviewed, times_correct) = existing
        .map(|p| (p.times_reviewed, p.times_correct))
        .unwrap_or((0, 0));

    WordProgress {
        word_id: word_id.to_string(),
        last_reviewed_at: now,
        next_review_at: now + Duration::days(interval_days(interval_index)),
        interval_index,
        times_reviewed: times_reviewed.saturating_add(1),
        times_correct: times_correct.saturating_add(u32::from(was_correct)),
        mastered: is_mastered_index(interval_index),
    }
}

pub fn record_rating(
    existing: Option<&WordProgress>,
    word_id: &str,
    rating: Rating,
    now: DateTime<Utc>,
) -> WordProgress {
    record_outcome(existing, word_id, rating.is_correct(), now)
}
