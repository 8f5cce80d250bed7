use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::progress::{ProgressRecorder, RecordedOutcome, WrongAnswerAction};
use crate::services::scheduler::Rating;
use crate::store::{ProgressStore, StoreError, WordCatalog};
use crate::types::{ProgressMap, WordProgress, WordRecord, WrongAnswerEntry};

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("review session has no remaining items")]
    Finished,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub word: WordRecord,
    pub is_wrong_answer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrong_answer_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<WordProgress>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCounts {
    pub wrong_answers: usize,
    pub due: usize,
}

/// Wrong answers in list order, then every due progress record in map order.
/// A word appears once, at its first position; ids `lookup` cannot resolve
/// are dropped.
pub fn build_review_queue<F>(
    wrong_answers: &[WrongAnswerEntry],
    progress: &ProgressMap,
    now: DateTime<Utc>,
    lookup: F,
) -> Vec<ReviewItem>
where
    F: Fn(&str) -> Option<WordRecord>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut items = Vec::new();

    for entry in wrong_answers {
        if !seen.insert(entry.word_id.as_str()) {
            continue;
        }
        if let Some(word) = lookup(&entry.word_id) {
            items.push(ReviewItem {
                word,
                is_wrong_answer: true,
                wrong_answer_at: Some(entry.timestamp),
                progress: None,
            });
        }
    }

    for record in progress.values().filter(|p| p.is_due(now)) {
        if !seen.insert(record.word_id.as_str()) {
            continue;
        }
        if let Some(word) = lookup(&record.word_id) {
            items.push(ReviewItem {
                word,
                is_wrong_answer: false,
                wrong_answer_at: None,
                progress: Some(record.clone()),
            });
        }
    }

    items
}

/// Reads the user's wrong answers and progress and builds the queue against
/// the full catalog.
pub async fn load_review_queue<C, S>(
    catalog: &C,
    store: &S,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<ReviewItem>, StoreError>
where
    C: WordCatalog + ?Sized,
    S: ProgressStore + ?Sized,
{
    let wrong_answers = store.wrong_answers(user_id).await?;
    let progress = store.progress(user_id).await?;
    let words: HashMap<String, WordRecord> = catalog
        .all_words()
        .await?
        .into_iter()
        .map(|w| (w.id.clone(), w))
        .collect();

    let items = build_review_queue(&wrong_answers, &progress, now, |id| words.get(id).cloned());
    tracing::debug!(
        user_id,
        wrong_answers = wrong_answers.len(),
        progress = progress.len(),
        items = items.len(),
        "built review queue"
    );
    Ok(items)
}

#[derive(Debug, Clone, Default)]
pub struct ReviewSession {
    items: Vec<ReviewItem>,
    cursor: usize,
}

impl ReviewSession {
    pub fn new(items: Vec<ReviewItem>) -> Self {
        Self { items, cursor: 0 }
    }

    pub fn items(&self) -> &[ReviewItem] {
        &self.items
    }

    pub fn current(&self) -> Option<&ReviewItem> {
        self.items.get(self.cursor)
    }

    /// Index of the current item, equal to `len` once finished.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.cursor)
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.items.len()
    }

    pub fn counts(&self) -> ReviewCounts {
        let wrong_answers = self.items.iter().filter(|i| i.is_wrong_answer).count();
        ReviewCounts {
            wrong_answers,
            due: self.items.len() - wrong_answers,
        }
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + 1).min(self.items.len());
    }
}

/// Rates the current item. Wrong-answer items also drop every wrong-answer
/// entry for the word. The cursor only moves once the store has accepted both.
pub async fn submit_review<S: ProgressStore + ?Sized>(
    session: &mut ReviewSession,
    recorder: &ProgressRecorder<S>,
    user_id: &str,
    rating: Rating,
    now: DateTime<Utc>,
) -> Result<RecordedOutcome, ReviewError> {
    let item = session.current().ok_or(ReviewError::Finished)?;
    let action = if item.is_wrong_answer {
        WrongAnswerAction::Clear
    } else {
        WrongAnswerAction::None
    };
    let word_id = item.word.id.clone();

    let outcome = recorder
        .record_with(user_id, &word_id, rating, action, now)
        .await?;
    session.advance();
    Ok(outcome)
}
