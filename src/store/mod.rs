//! Storage collaborators for the drill core.
//!
//! The core only talks to [`WordCatalog`] and [`ProgressStore`]. Two
//! implementations ship with the crate: an in-process [`memory::MemoryStore`]
//! and a SQLite-backed [`sqlite::SqliteStore`] for desktop use.

pub mod memory;
pub mod schema;
pub mod sqlite;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{CounterDelta, ProgressMap, UserStats, WordProgress, WordRecord, WrongAnswerEntry};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid stored data: {0}")]
    InvalidData(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog format error: {0}")]
    CatalogFormat(#[from] serde_json::Error),
}

/// Change to the wrong-answer list that is committed together with an outcome.
/// Appended entries take the outcome's `last_reviewed_at` as their timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrongAnswerAction {
    None,
    Append,
    Clear,
}

#[async_trait]
pub trait WordCatalog: Send + Sync {
    async fn all_words(&self) -> Result<Vec<WordRecord>, StoreError>;

    async fn words_by_level(&self, level: u8) -> Result<Vec<WordRecord>, StoreError>;

    async fn word_by_id(&self, word_id: &str) -> Result<Option<WordRecord>, StoreError>;

    /// Inserts or replaces a word by id.
    async fn upsert_word(&self, word: WordRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn progress(&self, user_id: &str) -> Result<ProgressMap, StoreError>;

    async fn word_progress(
        &self,
        user_id: &str,
        word_id: &str,
    ) -> Result<Option<WordProgress>, StoreError>;

    async fn put_progress(&self, user_id: &str, progress: &WordProgress) -> Result<(), StoreError>;

    /// Adds `delta` to the user's aggregate counters, creating the user row if needed.
    async fn increment_user_counters(
        &self,
        user_id: &str,
        delta: CounterDelta,
    ) -> Result<(), StoreError>;

    /// Writes a progress record, its counter delta and the wrong-answer change
    /// as one unit. Both shipped stores override this atomically. The default
    /// runs the steps in sequence with the clear and the append first, so a
    /// retry after a partial failure never counts the outcome twice.
    async fn commit_outcome(
        &self,
        user_id: &str,
        progress: &WordProgress,
        delta: CounterDelta,
        wrong_answer: WrongAnswerAction,
    ) -> Result<(), StoreError> {
        match wrong_answer {
            WrongAnswerAction::None => {}
            WrongAnswerAction::Clear => {
                self.remove_wrong_answers(user_id, &progress.word_id).await?;
            }
            WrongAnswerAction::Append => {
                let entry = WrongAnswerEntry::new(progress.word_id.clone(), progress.last_reviewed_at);
                self.append_wrong_answer(user_id, entry).await?;
            }
        }
        self.put_progress(user_id, progress).await?;
        self.increment_user_counters(user_id, delta).await
    }

    /// Zeroed stats for users the store has never seen.
    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError>;

    async fn top_users_by_correct(&self, limit: usize) -> Result<Vec<UserStats>, StoreError>;

    /// Every known user, most words learned first, ties by id.
    async fn users_by_words_learned(&self) -> Result<Vec<UserStats>, StoreError>;

    /// Stores the daily streak and the day it was last extended.
    async fn set_daily_streak(
        &self,
        user_id: &str,
        current_streak: u32,
        study_date: NaiveDate,
    ) -> Result<(), StoreError>;

    /// Appends without deduplication.
    async fn append_wrong_answer(
        &self,
        user_id: &str,
        entry: WrongAnswerEntry,
    ) -> Result<(), StoreError>;

    /// Removes every entry for `word_id`, returning how many were removed.
    async fn remove_wrong_answers(&self, user_id: &str, word_id: &str)
        -> Result<usize, StoreError>;

    /// Oldest first.
    async fn wrong_answers(&self, user_id: &str) -> Result<Vec<WrongAnswerEntry>, StoreError>;

    async fn difficult_words(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError>;

    async fn set_difficult_words(
        &self,
        user_id: &str,
        word_ids: &BTreeSet<String>,
    ) -> Result<(), StoreError>;
}
