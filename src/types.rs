use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_WORD_LEVEL: u8 = 1;
pub const MAX_WORD_LEVEL: u8 = 5;

fn default_level() -> u8 {
    MIN_WORD_LEVEL
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    pub id: String,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tldr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub korean: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
}

impl WordRecord {
    pub fn new(id: impl Into<String>, word: impl Into<String>, level: u8) -> Self {
        Self {
            id: id.into(),
            word: word.into(),
            part_of_speech: None,
            level,
            definition: None,
            tldr: None,
            korean: None,
            example: None,
            passage: None,
        }
    }

    pub fn with_part_of_speech(mut self, pos: impl Into<String>) -> Self {
        self.part_of_speech = Some(pos.into());
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_passage(mut self, passage: impl Into<String>) -> Self {
        self.passage = Some(passage.into());
        self
    }

    /// Lowercased part of speech, empty when unknown.
    pub fn pos_key(&self) -> String {
        self.part_of_speech
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    /// The short gloss shown on the back of a card, falling back to the definition.
    pub fn gloss(&self) -> Option<&str> {
        non_blank(self.tldr.as_deref()).or_else(|| non_blank(self.definition.as_deref()))
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordProgress {
    pub word_id: String,
    pub last_reviewed_at: DateTime<Utc>,
    pub next_review_at: DateTime<Utc>,
    pub interval_index: usize,
    pub times_reviewed: u32,
    pub times_correct: u32,
    pub mastered: bool,
}

impl WordProgress {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }
}

/// Per-user progress keyed by word id. Iteration order is the store order.
pub type ProgressMap = BTreeMap<String, WordProgress>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswerEntry {
    pub word_id: String,
    pub timestamp: DateTime<Utc>,
}

impl WrongAnswerEntry {
    pub fn new(word_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            word_id: word_id.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub display_name: String,
    pub is_admin: bool,
    pub total_attempts: u64,
    pub total_correct: u64,
    pub words_learned: u64,
    pub words_mastered: u64,
    /// Consecutive study days ending at `last_study_date`.
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_study_date: Option<NaiveDate>,
}

impl UserStats {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn apply(&mut self, delta: &CounterDelta) {
        self.total_attempts += delta.total_attempts;
        self.total_correct += delta.total_correct;
        self.words_learned += delta.words_learned;
        self.words_mastered += delta.words_mastered;
    }

    pub fn accuracy_percent(&self) -> u32 {
        percent(self.total_correct, self.total_attempts)
    }

    pub fn studied_on_or_after(&self, day: NaiveDate) -> bool {
        self.last_study_date.is_some_and(|last| last >= day)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDelta {
    pub total_attempts: u64,
    pub total_correct: u64,
    pub words_learned: u64,
    pub words_mastered: u64,
}

impl CounterDelta {
    /// Counter increments implied by replacing `before` with `after`.
    pub fn for_outcome(before: Option<&WordProgress>, after: &WordProgress) -> Self {
        let was_correct = match before {
            Some(prev) => after.times_correct > prev.times_correct,
            None => after.times_correct > 0,
        };
        let was_mastered = before.map(|p| p.mastered).unwrap_or(false);
        Self {
            total_attempts: 1,
            total_correct: u64::from(was_correct),
            words_learned: u64::from(before.is_none()),
            words_mastered: u64::from(after.mastered && !was_mastered),
        }
    }
}

/// Rounded integer percentage, 0 when the denominator is 0.
pub fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}
