//! Module-based multiple-choice quiz sessions.
//!
//! A run is a fixed number of modules, each with a fixed number of questions.
//! Words answered wrongly in one module are asked again at the start of the
//! next; everything else is sampled from the active pool without repeating a
//! word within the run. The session is a plain value owned by the caller.
//! Answers that must be persisted go through [`QuizSession::answer`] and
//! [`QuizSession::commit_answer`] so the in-memory state only moves once the
//! store write has succeeded.

use std::collections::{BTreeSet, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::services::cloze::{build_cloze, ClozePrompt};
use crate::services::distractor::{self, DISTRACTOR_COUNT};
use crate::services::progress::{ProgressRecorder, WrongAnswerAction};
use crate::services::scheduler::Rating;
use crate::store::{ProgressStore, StoreError};
use crate::types::{percent, WordRecord};

pub const DEFAULT_TOTAL_MODULES: u32 = 5;
pub const DEFAULT_QUESTIONS_PER_MODULE: usize = 20;
/// A question needs the target plus a full set of distractors.
pub const MIN_POOL_SIZE: usize = DISTRACTOR_COUNT + 1;

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("need at least 4 distinct words, pool has {available}")]
    InsufficientPool { available: usize },
    #[error("no words are marked difficult")]
    NoDifficultWords,
    #[error("no question is awaiting an answer")]
    NoActiveQuestion,
    #[error("current question has not been answered yet")]
    QuestionPending,
    #[error("answer does not belong to the current question")]
    StaleAnswer,
    #[error("module {0} is still in progress")]
    ModuleInProgress(u32),
    #[error("module is not in progress")]
    NotInProgress,
    #[error("module has not been started")]
    ModuleNotStarted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfig {
    pub total_modules: u32,
    pub questions_per_module: usize,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            total_modules: DEFAULT_TOTAL_MODULES,
            questions_per_module: DEFAULT_QUESTIONS_PER_MODULE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "level", rename_all = "camelCase")]
pub enum PoolFilter {
    Level(u8),
    Difficult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "module", rename_all = "camelCase")]
pub enum SessionState {
    InProgress,
    ModuleComplete(u32),
    AllModulesComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "camelCase")]
pub enum StreakTier {
    None,
    Fire { intensity: u32 },
    Plasma { intensity: u32 },
}

impl StreakTier {
    pub fn for_streak(streak: u32) -> Self {
        match streak {
            0..=2 => Self::None,
            3..=9 => Self::Fire {
                intensity: (streak - 2).min(5),
            },
            _ => Self::Plasma {
                intensity: (streak - 9).min(5),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EncouragementTier {
    Perfect,
    Great,
    Good,
    KeepGoing,
}

impl EncouragementTier {
    pub fn for_accuracy(accuracy_percent: u32) -> Self {
        if accuracy_percent >= 100 {
            Self::Perfect
        } else if accuracy_percent >= 80 {
            Self::Great
        } else if accuracy_percent >= 60 {
            Self::Good
        } else {
            Self::KeepGoing
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub module_number: u32,
    /// 1-based position within the module.
    pub question_number: usize,
    pub target: WordRecord,
    pub options: Vec<WordRecord>,
    pub cloze: ClozePrompt,
}

impl QuizQuestion {
    pub fn option_labels(&self) -> Vec<String> {
        self.cloze.option_labels(&self.options)
    }
}

/// An evaluated answer that has not yet been applied to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    seq: u64,
    pub word_id: String,
    pub selected_id: String,
    pub is_correct: bool,
    pub rating: Rating,
    /// True when this is the first miss of the word in this session.
    pub first_miss: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub correct_word: WordRecord,
    pub streak: u32,
    pub streak_tier: StreakTier,
    pub module_answered: usize,
    pub module_correct: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    pub module_number: u32,
    pub total_modules: u32,
    pub answered: usize,
    pub correct: usize,
    pub accuracy_percent: u32,
    pub perfect: bool,
    pub missed: usize,
    pub has_next_module: bool,
    pub encouragement: EncouragementTier,
}

#[derive(Debug, Clone)]
struct CurrentQuestion {
    seq: u64,
    question: QuizQuestion,
    answered: bool,
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    config: QuizConfig,
    catalog: Vec<WordRecord>,
    filter: PoolFilter,
    difficult_marked: usize,
    pool: Vec<WordRecord>,
    state: SessionState,
    module_started: bool,
    module_number: u32,
    queue: VecDeque<WordRecord>,
    module_answered: usize,
    module_correct: usize,
    session_answered: u64,
    session_correct: u64,
    streak: u32,
    used_word_ids: HashSet<String>,
    requeue: Vec<WordRecord>,
    missed_word_ids: HashSet<String>,
    current: Option<CurrentQuestion>,
    next_seq: u64,
}

fn pool_for(catalog: &[WordRecord], filter: PoolFilter, difficult: &BTreeSet<String>) -> Vec<WordRecord> {
    catalog
        .iter()
        .filter(|w| match filter {
            PoolFilter::Level(level) => w.level == level,
            PoolFilter::Difficult => difficult.contains(&w.id),
        })
        .cloned()
        .collect()
}

impl QuizSession {
    /// A session over `catalog` filtered to level 1. No module is started yet.
    pub fn new(config: QuizConfig, catalog: Vec<WordRecord>) -> Self {
        let filter = PoolFilter::Level(1);
        let pool = pool_for(&catalog, filter, &BTreeSet::new());
        Self {
            config,
            catalog,
            filter,
            difficult_marked: 0,
            pool,
            state: SessionState::InProgress,
            module_started: false,
            module_number: 1,
            queue: VecDeque::new(),
            module_answered: 0,
            module_correct: 0,
            session_answered: 0,
            session_correct: 0,
            streak: 0,
            used_word_ids: HashSet::new(),
            requeue: Vec::new(),
            missed_word_ids: HashSet::new(),
            current: None,
            next_seq: 0,
        }
    }

    fn check_pool(&self) -> Result<(), QuizError> {
        if self.filter == PoolFilter::Difficult && self.difficult_marked == 0 {
            return Err(QuizError::NoDifficultWords);
        }
        let distinct: HashSet<&str> = self.pool.iter().map(|w| w.id.as_str()).collect();
        if distinct.len() < MIN_POOL_SIZE {
            return Err(QuizError::InsufficientPool {
                available: distinct.len(),
            });
        }
        Ok(())
    }

    /// Fills the queue for the current module number: last module's misses
    /// first, then fresh words not used earlier in the run, then shuffles.
    pub fn start_module<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), QuizError> {
        self.check_pool()?;

        let limit = self.config.questions_per_module;
        let mut queued: HashSet<String> = HashSet::new();
        let mut queue: Vec<WordRecord> = Vec::with_capacity(limit);

        for word in self.requeue.drain(..) {
            if queued.insert(word.id.clone()) {
                queue.push(word);
            }
        }

        let mut fresh: Vec<&WordRecord> = self
            .pool
            .iter()
            .filter(|w| !self.used_word_ids.contains(&w.id) && !queued.contains(&w.id))
            .collect();
        fresh.shuffle(rng);
        for word in fresh {
            if queue.len() >= limit {
                break;
            }
            if queued.insert(word.id.clone()) {
                queue.push(word.clone());
            }
        }

        self.used_word_ids.extend(queued);
        queue.shuffle(rng);

        self.queue = queue.into();
        self.module_answered = 0;
        self.module_correct = 0;
        self.current = None;
        self.state = SessionState::InProgress;
        self.module_started = true;

        tracing::debug!(
            module = self.module_number,
            queued = self.queue.len(),
            used = self.used_word_ids.len(),
            "quiz module started"
        );
        Ok(())
    }

    /// Presents the next word, or completes the module and returns `None`.
    pub fn next_question<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Option<QuizQuestion>, QuizError> {
        if self.state != SessionState::InProgress {
            return Err(QuizError::NotInProgress);
        }
        if !self.module_started {
            return Err(QuizError::ModuleNotStarted);
        }
        if self.current.as_ref().is_some_and(|c| !c.answered) {
            return Err(QuizError::QuestionPending);
        }

        let target = match self.queue.pop_front() {
            Some(word) if self.module_answered < self.config.questions_per_module => word,
            Some(word) => {
                self.queue.push_front(word);
                self.complete_module();
                return Ok(None);
            }
            None => {
                self.complete_module();
                return Ok(None);
            }
        };

        let options = distractor::build_options(&target, &self.catalog, rng);
        let question = QuizQuestion {
            module_number: self.module_number,
            question_number: self.module_answered + 1,
            cloze: build_cloze(&target),
            target,
            options,
        };
        self.next_seq += 1;
        self.current = Some(CurrentQuestion {
            seq: self.next_seq,
            question: question.clone(),
            answered: false,
        });
        Ok(Some(question))
    }

    fn complete_module(&mut self) {
        self.state = if self.module_number < self.config.total_modules {
            SessionState::ModuleComplete(self.module_number)
        } else {
            SessionState::AllModulesComplete
        };
        self.streak = 0;
        self.current = None;
        tracing::debug!(
            module = self.module_number,
            answered = self.module_answered,
            correct = self.module_correct,
            "quiz module complete"
        );
    }

    /// Evaluates `selected_id` against the current question without changing
    /// the session.
    pub fn answer(&self, selected_id: &str) -> Result<PendingAnswer, QuizError> {
        let current = self
            .current
            .as_ref()
            .filter(|c| !c.answered)
            .ok_or(QuizError::NoActiveQuestion)?;
        let word_id = current.question.target.id.clone();
        let is_correct = selected_id == word_id;
        Ok(PendingAnswer {
            seq: current.seq,
            first_miss: !is_correct && !self.missed_word_ids.contains(&word_id),
            word_id,
            selected_id: selected_id.to_string(),
            is_correct,
            rating: Rating::from_quiz_answer(is_correct),
        })
    }

    /// Applies an answer produced by [`QuizSession::answer`] for the question
    /// that is still current.
    pub fn commit_answer(&mut self, pending: PendingAnswer) -> Result<AnswerFeedback, QuizError> {
        let current = self
            .current
            .as_mut()
            .filter(|c| !c.answered && c.seq == pending.seq)
            .ok_or(QuizError::StaleAnswer)?;
        current.answered = true;
        let target = current.question.target.clone();

        self.module_answered += 1;
        self.session_answered += 1;
        if pending.is_correct {
            self.module_correct += 1;
            self.session_correct += 1;
            self.streak += 1;
        } else {
            self.streak = 0;
            if !self.requeue.iter().any(|w| w.id == target.id) {
                self.requeue.push(target.clone());
            }
            self.missed_word_ids.insert(target.id.clone());
        }

        Ok(AnswerFeedback {
            is_correct: pending.is_correct,
            correct_word: target,
            streak: self.streak,
            streak_tier: StreakTier::for_streak(self.streak),
            module_answered: self.module_answered,
            module_correct: self.module_correct,
        })
    }

    /// Switches the active pool and rewinds the run to an unstarted module 1.
    pub fn change_filter(&mut self, filter: PoolFilter, difficult: &BTreeSet<String>) {
        self.filter = filter;
        self.difficult_marked = difficult.len();
        self.pool = pool_for(&self.catalog, filter, difficult);
        self.reset_run();
        tracing::debug!(?filter, pool = self.pool.len(), "quiz filter changed");
    }

    fn reset_run(&mut self) {
        self.module_number = 1;
        self.queue.clear();
        self.used_word_ids.clear();
        self.requeue.clear();
        self.module_answered = 0;
        self.module_correct = 0;
        self.current = None;
        self.state = SessionState::InProgress;
        self.module_started = false;
    }

    /// Moves past a completed module. After the last one the run restarts.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), QuizError> {
        match self.state {
            SessionState::InProgress => Err(QuizError::ModuleInProgress(self.module_number)),
            SessionState::ModuleComplete(n) => {
                self.module_number = n + 1;
                self.start_module(rng)
            }
            SessionState::AllModulesComplete => {
                self.reset_run();
                self.start_module(rng)
            }
        }
    }

    pub fn module_summary(&self) -> ModuleSummary {
        let accuracy_percent = percent(self.module_correct as u64, self.module_answered as u64);
        ModuleSummary {
            module_number: self.module_number,
            total_modules: self.config.total_modules,
            answered: self.module_answered,
            correct: self.module_correct,
            accuracy_percent,
            perfect: accuracy_percent == 100,
            missed: self.requeue.len(),
            has_next_module: self.module_number < self.config.total_modules,
            encouragement: EncouragementTier::for_accuracy(accuracy_percent),
        }
    }

    pub fn config(&self) -> QuizConfig {
        self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn filter(&self) -> PoolFilter {
        self.filter
    }

    pub fn module_number(&self) -> u32 {
        self.module_number
    }

    pub fn pool(&self) -> &[WordRecord] {
        &self.pool
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_word_ids(&self) -> Vec<&str> {
        self.queue.iter().map(|w| w.id.as_str()).collect()
    }

    pub fn used_word_ids(&self) -> &HashSet<String> {
        &self.used_word_ids
    }

    /// Words missed in the current module, asked again next module.
    pub fn requeued(&self) -> &[WordRecord] {
        &self.requeue
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.current.as_ref().map(|c| &c.question)
    }

    pub fn module_started(&self) -> bool {
        self.module_started
    }

    pub fn awaiting_answer(&self) -> bool {
        self.current.as_ref().is_some_and(|c| !c.answered)
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn streak_tier(&self) -> StreakTier {
        StreakTier::for_streak(self.streak)
    }

    pub fn module_counts(&self) -> (usize, usize) {
        (self.module_answered, self.module_correct)
    }

    /// Answered and correct totals across every module of this session.
    pub fn session_totals(&self) -> (u64, u64) {
        (self.session_answered, self.session_correct)
    }
}

/// Records the answer to the current question and only then applies it to
/// the session. A store failure leaves the question current for a retry.
pub async fn submit_quiz_answer<S: ProgressStore + ?Sized>(
    session: &mut QuizSession,
    recorder: &ProgressRecorder<S>,
    user_id: &str,
    selected_id: &str,
    now: DateTime<Utc>,
) -> Result<AnswerFeedback, QuizError> {
    let pending = session.answer(selected_id)?;
    let action = if pending.first_miss {
        WrongAnswerAction::Append
    } else {
        WrongAnswerAction::None
    };

    recorder
        .record_with(user_id, &pending.word_id, pending.rating, action, now)
        .await?;

    session.commit_answer(pending)
}
