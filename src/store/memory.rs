use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;

use super::{ProgressStore, StoreError, WordCatalog, WrongAnswerAction};
use crate::types::{CounterDelta, ProgressMap, UserStats, WordProgress, WordRecord, WrongAnswerEntry};

#[derive(Debug, Default)]
struct UserDoc {
    stats: UserStats,
    progress: ProgressMap,
    wrong_answers: Vec<WrongAnswerEntry>,
    difficult_words: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    words: RwLock<BTreeMap<String, WordRecord>>,
    users: RwLock<HashMap<String, UserDoc>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_words(words: impl IntoIterator<Item = WordRecord>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.words.write();
            for word in words {
                guard.insert(word.id.clone(), word);
            }
        }
        store
    }

    /// Loads a JSON array of word records.
    pub async fn load_catalog_json(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let words = parse_catalog_json(&raw)?;
        tracing::info!(path = %path.as_ref().display(), words = words.len(), "loaded word catalog");
        Ok(Self::with_words(words))
    }

    pub fn register_user(&self, user_id: &str, display_name: &str, is_admin: bool) {
        let mut users = self.users.write();
        let doc = users.entry(user_id.to_string()).or_default();
        doc.stats.user_id = user_id.to_string();
        doc.stats.display_name = display_name.to_string();
        doc.stats.is_admin = is_admin;
    }

    /// While set, every mutating call fails with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn with_user_mut<T>(&self, user_id: &str, f: impl FnOnce(&mut UserDoc) -> T) -> T {
        let mut users = self.users.write();
        let doc = users.entry(user_id.to_string()).or_insert_with(|| UserDoc {
            stats: UserStats::new(user_id),
            ..Default::default()
        });
        f(doc)
    }
}

pub fn parse_catalog_json(raw: &str) -> Result<Vec<WordRecord>, StoreError> {
    let words: Vec<WordRecord> = serde_json::from_str(raw)?;
    Ok(words)
}

#[async_trait]
impl WordCatalog for MemoryStore {
    async fn all_words(&self) -> Result<Vec<WordRecord>, StoreError> {
        Ok(self.words.read().values().cloned().collect())
    }

    async fn words_by_level(&self, level: u8) -> Result<Vec<WordRecord>, StoreError> {
        Ok(self
            .words
            .read()
            .values()
            .filter(|w| w.level == level)
            .cloned()
            .collect())
    }

    async fn word_by_id(&self, word_id: &str) -> Result<Option<WordRecord>, StoreError> {
        Ok(self.words.read().get(word_id).cloned())
    }

    async fn upsert_word(&self, word: WordRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.words.write().insert(word.id.clone(), word);
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn progress(&self, user_id: &str) -> Result<ProgressMap, StoreError> {
        Ok(self
            .users
            .read()
            .get(user_id)
            .map(|doc| doc.progress.clone())
            .unwrap_or_default())
    }

    async fn word_progress(
        &self,
        user_id: &str,
        word_id: &str,
    ) -> Result<Option<WordProgress>, StoreError> {
        Ok(self
            .users
            .read()
            .get(user_id)
            .and_then(|doc| doc.progress.get(word_id).cloned()))
    }

    async fn put_progress(&self, user_id: &str, progress: &WordProgress) -> Result<(), StoreError> {
        self.check_writable()?;
        self.with_user_mut(user_id, |doc| {
            doc.progress
                .insert(progress.word_id.clone(), progress.clone());
        });
        Ok(())
    }

    async fn increment_user_counters(
        &self,
        user_id: &str,
        delta: CounterDelta,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.with_user_mut(user_id, |doc| doc.stats.apply(&delta));
        Ok(())
    }

    async fn commit_outcome(
        &self,
        user_id: &str,
        progress: &WordProgress,
        delta: CounterDelta,
        wrong_answer: WrongAnswerAction,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.with_user_mut(user_id, |doc| {
            match wrong_answer {
                WrongAnswerAction::None => {}
                WrongAnswerAction::Append => doc.wrong_answers.push(WrongAnswerEntry::new(
                    progress.word_id.clone(),
                    progress.last_reviewed_at,
                )),
                WrongAnswerAction::Clear => {
                    doc.wrong_answers.retain(|entry| entry.word_id != progress.word_id)
                }
            }
            doc.progress
                .insert(progress.word_id.clone(), progress.clone());
            doc.stats.apply(&delta);
        });
        Ok(())
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        Ok(self
            .users
            .read()
            .get(user_id)
            .map(|doc| doc.stats.clone())
            .unwrap_or_else(|| UserStats::new(user_id)))
    }

    async fn top_users_by_correct(&self, limit: usize) -> Result<Vec<UserStats>, StoreError> {
        let mut stats: Vec<UserStats> = self
            .users
            .read()
            .values()
            .map(|doc| doc.stats.clone())
            .collect();
        stats.sort_by(|a, b| {
            b.total_correct
                .cmp(&a.total_correct)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        stats.truncate(limit);
        Ok(stats)
    }

    async fn users_by_words_learned(&self) -> Result<Vec<UserStats>, StoreError> {
        let mut stats: Vec<UserStats> = self
            .users
            .read()
            .values()
            .map(|doc| doc.stats.clone())
            .collect();
        stats.sort_by(|a, b| {
            b.words_learned
                .cmp(&a.words_learned)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(stats)
    }

    async fn set_daily_streak(
        &self,
        user_id: &str,
        current_streak: u32,
        study_date: NaiveDate,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.with_user_mut(user_id, |doc| {
            doc.stats.current_streak = current_streak;
            doc.stats.last_study_date = Some(study_date);
        });
        Ok(())
    }

    async fn append_wrong_answer(
        &self,
        user_id: &str,
        entry: WrongAnswerEntry,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.with_user_mut(user_id, |doc| doc.wrong_answers.push(entry));
        Ok(())
    }

    async fn remove_wrong_answers(
        &self,
        user_id: &str,
        word_id: &str,
    ) -> Result<usize, StoreError> {
        self.check_writable()?;
        let removed = self.with_user_mut(user_id, |doc| {
            let before = doc.wrong_answers.len();
            doc.wrong_answers.retain(|entry| entry.word_id != word_id);
            before - doc.wrong_answers.len()
        });
        Ok(removed)
    }

    async fn wrong_answers(&self, user_id: &str) -> Result<Vec<WrongAnswerEntry>, StoreError> {
        Ok(self
            .users
            .read()
            .get(user_id)
            .map(|doc| doc.wrong_answers.clone())
            .unwrap_or_default())
    }

    async fn difficult_words(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .users
            .read()
            .get(user_id)
            .map(|doc| doc.difficult_words.clone())
            .unwrap_or_default())
    }

    async fn set_difficult_words(
        &self,
        user_id: &str,
        word_ids: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.with_user_mut(user_id, |doc| doc.difficult_words = word_ids.clone());
        Ok(())
    }
}
