use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, SqlitePool};

use super::schema::{split_sql_statements, SCHEMA_VERSION, SQLITE_SCHEMA_SQL, UPGRADE_FROM_V1};
use super::{ProgressStore, StoreError, WordCatalog, WrongAnswerAction};
use crate::types::{CounterDelta, ProgressMap, UserStats, WordProgress, WordRecord, WrongAnswerEntry};

const WORD_COLUMNS: &str = r#""id","word","partOfSpeech","level","definition","tldr","korean","example","passage""#;
const PROGRESS_COLUMNS: &str = r#""wordId","lastReviewedAt","nextReviewAt","intervalIndex","timesReviewed","timesCorrect","mastered""#;
const USER_COLUMNS: &str = r#""id","displayName","isAdmin","totalAttempts","totalCorrect","wordsLearned","wordsMastered","currentStreak","lastStudyDate""#;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("danci-drill")
        .join("drill.db")
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        tracing::debug!(path = %db_path.display(), "sqlite store ready");
        Ok(store)
    }

    /// A private in-memory database. One connection, since every SQLite
    /// memory connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let version: Option<String> =
            sqlx::query_scalar(r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#)
                .fetch_optional(&self.pool)
                .await
                .unwrap_or(None);

        if version.as_deref() == Some(SCHEMA_VERSION) {
            return Ok(());
        }

        if version.as_deref() == Some("1") {
            for stmt in UPGRADE_FROM_V1 {
                sqlx::query(*stmt).execute(&self.pool).await?;
            }
        }

        for stmt in split_sql_statements(SQLITE_SCHEMA_SQL) {
            sqlx::query(&stmt).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', ?)"#,
        )
        .bind(SCHEMA_VERSION)
        .execute(&self.pool)
        .await?;

        tracing::info!(version = SCHEMA_VERSION, "applied sqlite schema");
        Ok(())
    }

    pub async fn register_user(
        &self,
        user_id: &str,
        display_name: &str,
        is_admin: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO "users" ("id", "displayName", "isAdmin") VALUES (?, ?, ?)
            ON CONFLICT ("id") DO UPDATE SET
              "displayName" = excluded."displayName",
              "isAdmin" = excluded."isAdmin"
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(is_admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upserts a batch of words in one transaction.
    pub async fn seed_words(&self, words: &[WordRecord]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for word in words {
            upsert_word_query(word).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(words.len())
    }
}

fn upsert_word_query(word: &WordRecord) -> SqliteQuery<'_> {
    sqlx::query(
        r#"
        INSERT INTO "words"
          ("id","word","partOfSpeech","level","definition","tldr","korean","example","passage")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("id") DO UPDATE SET
          "word" = excluded."word",
          "partOfSpeech" = excluded."partOfSpeech",
          "level" = excluded."level",
          "definition" = excluded."definition",
          "tldr" = excluded."tldr",
          "korean" = excluded."korean",
          "example" = excluded."example",
          "passage" = excluded."passage"
        "#,
    )
    .bind(&word.id)
    .bind(&word.word)
    .bind(word.part_of_speech.as_deref())
    .bind(i64::from(word.level))
    .bind(word.definition.as_deref())
    .bind(word.tldr.as_deref())
    .bind(word.korean.as_deref())
    .bind(word.example.as_deref())
    .bind(word.passage.as_deref())
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {ms}")))
}

fn non_negative(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative {column}: {value}")))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn map_word_row(row: &SqliteRow) -> Result<WordRecord, StoreError> {
    let level: i64 = row.try_get("level")?;
    let level = u8::try_from(level)
        .map_err(|_| StoreError::InvalidData(format!("word level out of range: {level}")))?;
    Ok(WordRecord {
        id: row.try_get("id")?,
        word: row.try_get("word")?,
        part_of_speech: row.try_get("partOfSpeech")?,
        level,
        definition: row.try_get("definition")?,
        tldr: row.try_get("tldr")?,
        korean: row.try_get("korean")?,
        example: row.try_get("example")?,
        passage: row.try_get("passage")?,
    })
}

fn map_progress_row(row: &SqliteRow) -> Result<WordProgress, StoreError> {
    let interval_index: i64 = row.try_get("intervalIndex")?;
    let times_reviewed: i64 = row.try_get("timesReviewed")?;
    let times_correct: i64 = row.try_get("timesCorrect")?;
    Ok(WordProgress {
        word_id: row.try_get("wordId")?,
        last_reviewed_at: millis_to_datetime(row.try_get("lastReviewedAt")?)?,
        next_review_at: millis_to_datetime(row.try_get("nextReviewAt")?)?,
        interval_index: non_negative(interval_index, "intervalIndex")? as usize,
        times_reviewed: u32::try_from(times_reviewed)
            .map_err(|_| StoreError::InvalidData(format!("timesReviewed: {times_reviewed}")))?,
        times_correct: u32::try_from(times_correct)
            .map_err(|_| StoreError::InvalidData(format!("timesCorrect: {times_correct}")))?,
        mastered: row.try_get("mastered")?,
    })
}

fn map_user_row(row: &SqliteRow) -> Result<UserStats, StoreError> {
    Ok(UserStats {
        user_id: row.try_get("id")?,
        display_name: row.try_get("displayName")?,
        is_admin: row.try_get("isAdmin")?,
        total_attempts: non_negative(row.try_get("totalAttempts")?, "totalAttempts")?,
        total_correct: non_negative(row.try_get("totalCorrect")?, "totalCorrect")?,
        words_learned: non_negative(row.try_get("wordsLearned")?, "wordsLearned")?,
        words_mastered: non_negative(row.try_get("wordsMastered")?, "wordsMastered")?,
        current_streak: u32::try_from(row.try_get::<i64, _>("currentStreak")?)
            .map_err(|_| StoreError::InvalidData("currentStreak out of range".to_string()))?,
        last_study_date: row.try_get::<Option<NaiveDate>, _>("lastStudyDate")?,
    })
}

fn put_progress_query<'a>(
    user_id: &'a str,
    progress: &'a WordProgress,
) -> SqliteQuery<'a> {
    sqlx::query(
        r#"
        INSERT INTO "word_progress"
          ("userId","wordId","lastReviewedAt","nextReviewAt","intervalIndex","timesReviewed","timesCorrect","mastered")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("userId","wordId") DO UPDATE SET
          "lastReviewedAt" = excluded."lastReviewedAt",
          "nextReviewAt" = excluded."nextReviewAt",
          "intervalIndex" = excluded."intervalIndex",
          "timesReviewed" = excluded."timesReviewed",
          "timesCorrect" = excluded."timesCorrect",
          "mastered" = excluded."mastered"
        "#,
    )
    .bind(user_id)
    .bind(&progress.word_id)
    .bind(progress.last_reviewed_at.timestamp_millis())
    .bind(progress.next_review_at.timestamp_millis())
    .bind(progress.interval_index as i64)
    .bind(i64::from(progress.times_reviewed))
    .bind(i64::from(progress.times_correct))
    .bind(progress.mastered)
}

fn increment_counters_query(
    user_id: &str,
    delta: CounterDelta,
) -> SqliteQuery<'_> {
    sqlx::query(
        r#"
        INSERT INTO "users" ("id","totalAttempts","totalCorrect","wordsLearned","wordsMastered")
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT ("id") DO UPDATE SET
          "totalAttempts" = "totalAttempts" + excluded."totalAttempts",
          "totalCorrect" = "totalCorrect" + excluded."totalCorrect",
          "wordsLearned" = "wordsLearned" + excluded."wordsLearned",
          "wordsMastered" = "wordsMastered" + excluded."wordsMastered"
        "#,
    )
    .bind(user_id)
    .bind(to_i64(delta.total_attempts))
    .bind(to_i64(delta.total_correct))
    .bind(to_i64(delta.words_learned))
    .bind(to_i64(delta.words_mastered))
}

fn append_wrong_answer_query<'a>(
    user_id: &'a str,
    word_id: &'a str,
    recorded_at: DateTime<Utc>,
) -> SqliteQuery<'a> {
    sqlx::query(r#"INSERT INTO "wrong_answers" ("userId","wordId","recordedAt") VALUES (?, ?, ?)"#)
        .bind(user_id)
        .bind(word_id)
        .bind(recorded_at.timestamp_millis())
}

fn remove_wrong_answers_query<'a>(user_id: &'a str, word_id: &'a str) -> SqliteQuery<'a> {
    sqlx::query(r#"DELETE FROM "wrong_answers" WHERE "userId" = ? AND "wordId" = ?"#)
        .bind(user_id)
        .bind(word_id)
}

#[async_trait]
impl WordCatalog for SqliteStore {
    async fn all_words(&self) -> Result<Vec<WordRecord>, StoreError> {
        let sql = format!(r#"SELECT {WORD_COLUMNS} FROM "words" ORDER BY "id""#);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(map_word_row).collect()
    }

    async fn words_by_level(&self, level: u8) -> Result<Vec<WordRecord>, StoreError> {
        let sql = format!(r#"SELECT {WORD_COLUMNS} FROM "words" WHERE "level" = ? ORDER BY "id""#);
        let rows = sqlx::query(&sql)
            .bind(i64::from(level))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_word_row).collect()
    }

    async fn word_by_id(&self, word_id: &str) -> Result<Option<WordRecord>, StoreError> {
        let sql = format!(r#"SELECT {WORD_COLUMNS} FROM "words" WHERE "id" = ? LIMIT 1"#);
        let row = sqlx::query(&sql)
            .bind(word_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_word_row).transpose()
    }

    async fn upsert_word(&self, word: WordRecord) -> Result<(), StoreError> {
        upsert_word_query(&word).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn progress(&self, user_id: &str) -> Result<ProgressMap, StoreError> {
        let sql = format!(
            r#"SELECT {PROGRESS_COLUMNS} FROM "word_progress" WHERE "userId" = ? ORDER BY "wordId""#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        let mut out = ProgressMap::new();
        for row in &rows {
            let progress = map_progress_row(row)?;
            out.insert(progress.word_id.clone(), progress);
        }
        Ok(out)
    }

    async fn word_progress(
        &self,
        user_id: &str,
        word_id: &str,
    ) -> Result<Option<WordProgress>, StoreError> {
        let sql = format!(
            r#"SELECT {PROGRESS_COLUMNS} FROM "word_progress" WHERE "userId" = ? AND "wordId" = ? LIMIT 1"#
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(word_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_progress_row).transpose()
    }

    async fn put_progress(&self, user_id: &str, progress: &WordProgress) -> Result<(), StoreError> {
        put_progress_query(user_id, progress)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_user_counters(
        &self,
        user_id: &str,
        delta: CounterDelta,
    ) -> Result<(), StoreError> {
        increment_counters_query(user_id, delta)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn commit_outcome(
        &self,
        user_id: &str,
        progress: &WordProgress,
        delta: CounterDelta,
        wrong_answer: WrongAnswerAction,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        match wrong_answer {
            WrongAnswerAction::None => {}
            WrongAnswerAction::Append => {
                append_wrong_answer_query(user_id, &progress.word_id, progress.last_reviewed_at)
                    .execute(&mut *tx)
                    .await?;
            }
            WrongAnswerAction::Clear => {
                remove_wrong_answers_query(user_id, &progress.word_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        put_progress_query(user_id, progress)
            .execute(&mut *tx)
            .await?;
        increment_counters_query(user_id, delta)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn user_stats(&self, user_id: &str) -> Result<UserStats, StoreError> {
        let sql = format!(r#"SELECT {USER_COLUMNS} FROM "users" WHERE "id" = ? LIMIT 1"#);
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => map_user_row(&row),
            None => Ok(UserStats::new(user_id)),
        }
    }

    async fn top_users_by_correct(&self, limit: usize) -> Result<Vec<UserStats>, StoreError> {
        let sql = format!(
            r#"SELECT {USER_COLUMNS} FROM "users" ORDER BY "totalCorrect" DESC, "id" ASC LIMIT ?"#
        );
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_user_row).collect()
    }

    async fn users_by_words_learned(&self) -> Result<Vec<UserStats>, StoreError> {
        let sql = format!(
            r#"SELECT {USER_COLUMNS} FROM "users" ORDER BY "wordsLearned" DESC, "id" ASC"#
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(map_user_row).collect()
    }

    async fn set_daily_streak(
        &self,
        user_id: &str,
        current_streak: u32,
        study_date: NaiveDate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO "users" ("id","currentStreak","lastStudyDate") VALUES (?, ?, ?)
            ON CONFLICT ("id") DO UPDATE SET
              "currentStreak" = excluded."currentStreak",
              "lastStudyDate" = excluded."lastStudyDate"
            "#,
        )
        .bind(user_id)
        .bind(i64::from(current_streak))
        .bind(study_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_wrong_answer(
        &self,
        user_id: &str,
        entry: WrongAnswerEntry,
    ) -> Result<(), StoreError> {
        append_wrong_answer_query(user_id, &entry.word_id, entry.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_wrong_answers(
        &self,
        user_id: &str,
        word_id: &str,
    ) -> Result<usize, StoreError> {
        let result = remove_wrong_answers_query(user_id, word_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn wrong_answers(&self, user_id: &str) -> Result<Vec<WrongAnswerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT "wordId","recordedAt" FROM "wrong_answers" WHERE "userId" = ? ORDER BY "seq""#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<WrongAnswerEntry, StoreError> {
                Ok(WrongAnswerEntry {
                    word_id: row.try_get("wordId")?,
                    timestamp: millis_to_datetime(row.try_get("recordedAt")?)?,
                })
            })
            .collect()
    }

    async fn difficult_words(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar(r#"SELECT "wordId" FROM "difficult_words" WHERE "userId" = ?"#)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn set_difficult_words(
        &self,
        user_id: &str,
        word_ids: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(r#"DELETE FROM "difficult_words" WHERE "userId" = ?"#)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for word_id in word_ids {
            sqlx::query(r#"INSERT INTO "difficult_words" ("userId","wordId") VALUES (?, ?)"#)
                .bind(user_id)
                .bind(word_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
