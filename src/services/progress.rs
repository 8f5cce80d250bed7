use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::services::scheduler::{self, Rating};
use crate::store::{ProgressStore, StoreError};
use crate::types::{
    percent, CounterDelta, ProgressMap, UserStats, WordProgress, WordRecord, MAX_WORD_LEVEL,
    MIN_WORD_LEVEL,
};

pub use crate::store::WrongAnswerAction;

const LEVEL_NAMES: [&str; 5] = ["Basic", "Elementary", "Intermediate", "Advanced", "Expert"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutcome {
    pub previous: Option<WordProgress>,
    pub progress: WordProgress,
    pub delta: CounterDelta,
}

/// Runs the scheduler and persists the result. All mutations for one user go
/// through a per-user async lock, so read-modify-write cycles never overlap.
pub struct ProgressRecorder<S: ?Sized> {
    store: Arc<S>,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: ProgressStore + ?Sized> ProgressRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock();
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    pub async fn record(
        &self,
        user_id: &str,
        word_id: &str,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<RecordedOutcome, StoreError> {
        self.record_with(user_id, word_id, rating, WrongAnswerAction::None, now)
            .await
    }

    /// Records an outcome and applies `action` to the wrong-answer list in
    /// the same store commit. A failed commit leaves both untouched.
    pub async fn record_with(
        &self,
        user_id: &str,
        word_id: &str,
        rating: Rating,
        action: WrongAnswerAction,
        now: DateTime<Utc>,
    ) -> Result<RecordedOutcome, StoreError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let previous = self.store.word_progress(user_id, word_id).await?;
        let progress = scheduler::record_rating(previous.as_ref(), word_id, rating, now);
        let delta = CounterDelta::for_outcome(previous.as_ref(), &progress);

        self.store
            .commit_outcome(user_id, &progress, delta, action)
            .await
            .inspect_err(|err| {
                tracing::warn!(user_id, word_id, ?action, error = %err, "progress commit failed")
            })?;

        tracing::debug!(
            user_id,
            word_id,
            rating = rating.value(),
            interval_index = progress.interval_index,
            mastered = progress.mastered,
            ?action,
            "recorded outcome"
        );

        Ok(RecordedOutcome {
            previous,
            progress,
            delta,
        })
    }

    /// Extends the user's daily streak for `today` and returns the new value.
    /// A second call on the same day writes nothing.
    pub async fn mark_study_day(&self, user_id: &str, today: NaiveDate) -> Result<u32, StoreError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let stats = self.store.user_stats(user_id).await?;
        if stats.last_study_date == Some(today) {
            return Ok(stats.current_streak);
        }
        let streak = next_daily_streak(stats.current_streak, stats.last_study_date, today);
        self.store.set_daily_streak(user_id, streak, today).await?;
        tracing::debug!(user_id, streak, %today, "study streak updated");
        Ok(streak)
    }
}

/// Streak after studying on `today`: unchanged on the same day, one longer
/// when the last study day was yesterday, otherwise restarted at 1.
pub fn next_daily_streak(current: u32, last_study_date: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_study_date {
        Some(last) if last == today => current.max(1),
        Some(last) if last.succ_opt() == Some(today) => current.saturating_add(1),
        _ => 1,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOverview {
    pub words_learned: u64,
    pub words_mastered: u64,
    pub accuracy_percent: u32,
    pub current_streak: u32,
}

impl From<&UserStats> for ProgressOverview {
    fn from(stats: &UserStats) -> Self {
        Self {
            words_learned: stats.words_learned,
            words_mastered: stats.words_mastered,
            accuracy_percent: stats.accuracy_percent(),
            current_streak: stats.current_streak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u8,
    pub name: &'static str,
    pub learned: u64,
    pub total: u64,
    pub percent: u32,
}

pub fn level_name(level: u8) -> Option<&'static str> {
    let idx = usize::from(level.checked_sub(MIN_WORD_LEVEL)?);
    LEVEL_NAMES.get(idx).copied()
}

/// Per-level counts of words with any recorded progress against the catalog size.
pub fn level_progress(words: &[WordRecord], progress: &ProgressMap) -> Vec<LevelProgress> {
    let level_of: HashMap<&str, u8> = words.iter().map(|w| (w.id.as_str(), w.level)).collect();

    (MIN_WORD_LEVEL..=MAX_WORD_LEVEL)
        .map(|level| {
            let total = words.iter().filter(|w| w.level == level).count() as u64;
            let learned = progress
                .keys()
                .filter(|id| level_of.get(id.as_str()) == Some(&level))
                .count() as u64;
            LevelProgress {
                level,
                name: level_name(level).unwrap_or_default(),
                learned,
                total,
                percent: percent(learned, total),
            }
        })
        .collect()
}
