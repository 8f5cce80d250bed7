mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tempfile::TempDir;

use danci_drill::services::admin::{load_admin_stats, load_student_roster};
use danci_drill::services::catalog::{save_word, search_words, SEARCH_LIMIT};
use danci_drill::services::flashcards::{load_flashcard_pool, toggle_difficult, CardFilter};
use danci_drill::services::leaderboard::load_leaderboard;
use danci_drill::services::progress::{level_progress, ProgressRecorder, WrongAnswerAction};
use danci_drill::services::quiz_session::{submit_quiz_answer, QuizConfig, QuizSession};
use danci_drill::services::review_queue::load_review_queue;
use danci_drill::services::scheduler::Rating;
use danci_drill::store::{ProgressStore, SqliteStore, WordCatalog};
use danci_drill::types::{WordRecord, WrongAnswerEntry};

use common::{fixed_now, level_words, seeded_rng};

async fn open_temp_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let store = SqliteStore::open(dir.path().join("nested").join("drill.db"))
        .await
        .expect("failed to open sqlite store");
    (dir, store)
}

#[tokio::test]
async fn test_catalog_round_trips_optional_fields() {
    let (_dir, store) = open_temp_store().await;
    let word = WordRecord::new("w1", "laconic", 4)
        .with_part_of_speech("adjective")
        .with_definition("using very few words")
        .with_passage("His laconic reply ended the debate.");
    store.upsert_word(word.clone()).await.unwrap();
    store.seed_words(&level_words(2, 3)).await.unwrap();

    assert_eq!(store.word_by_id("w1").await.unwrap(), Some(word));
    assert_eq!(store.words_by_level(2).await.unwrap().len(), 3);
    assert_eq!(store.all_words().await.unwrap().len(), 4);
    assert!(store.word_by_id("missing").await.unwrap().is_none());

    let mut renamed = WordRecord::new("w1", "terse", 3);
    renamed.korean = Some("간결한".to_string());
    store.upsert_word(renamed.clone()).await.unwrap();
    assert_eq!(store.word_by_id("w1").await.unwrap(), Some(renamed));
}

#[tokio::test]
async fn test_progress_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("drill.db");
    {
        let store = Arc::new(SqliteStore::open(&path).await.unwrap());
        let recorder = ProgressRecorder::new(Arc::clone(&store));
        recorder.record("u", "w1", Rating::EASY, fixed_now()).await.unwrap();
        recorder
            .record("u", "w1", Rating::EASY, fixed_now() + Duration::days(1))
            .await
            .unwrap();
        store.pool().close().await;
    }

    let store = SqliteStore::open(&path).await.unwrap();
    let progress = store.word_progress("u", "w1").await.unwrap().unwrap();
    assert_eq!(progress.interval_index, 1);
    assert_eq!(progress.times_reviewed, 2);
    assert_eq!(progress.times_correct, 2);
    assert_eq!(progress.last_reviewed_at, fixed_now() + Duration::days(1));
    assert_eq!(progress.next_review_at, fixed_now() + Duration::days(4));

    let stats = store.user_stats("u").await.unwrap();
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.words_learned, 1);
    assert_eq!(stats.accuracy_percent(), 100);
}

#[tokio::test]
async fn test_unknown_user_has_zeroed_stats() {
    let (_dir, store) = open_temp_store().await;
    let stats = store.user_stats("nobody").await.unwrap();
    assert_eq!(stats.user_id, "nobody");
    assert_eq!(stats.total_attempts, 0);
    assert!(store.progress("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_answers_keep_append_order_and_duplicates() {
    let (_dir, store) = open_temp_store().await;
    for (word, minutes) in [("b", 1), ("a", 2), ("b", 3)] {
        store
            .append_wrong_answer("u", WrongAnswerEntry::new(word, fixed_now() + Duration::minutes(minutes)))
            .await
            .unwrap();
    }
    let ids: Vec<String> = store
        .wrong_answers("u")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.word_id)
        .collect();
    assert_eq!(ids, vec!["b", "a", "b"]);

    assert_eq!(store.remove_wrong_answers("u", "b").await.unwrap(), 2);
    let remaining = store.wrong_answers("u").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].timestamp, fixed_now() + Duration::minutes(2));
    assert!(store.wrong_answers("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_difficult_words_replace_whole_set() {
    let (_dir, store) = open_temp_store().await;
    store.seed_words(&level_words(1, 5)).await.unwrap();

    assert!(toggle_difficult(&store, "u", "L1-001").await.unwrap());
    assert!(toggle_difficult(&store, "u", "L1-003").await.unwrap());
    assert!(!toggle_difficult(&store, "u", "L1-001").await.unwrap());
    let expected: BTreeSet<String> = ["L1-003".to_string()].into_iter().collect();
    assert_eq!(store.difficult_words("u").await.unwrap(), expected);

    let cards = load_flashcard_pool(&store, &store, "u", CardFilter::Difficult)
        .await
        .unwrap();
    assert_eq!(cards.len(), 1);
    let all = load_flashcard_pool(&store, &store, "u", CardFilter::All).await.unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn test_leaderboard_skips_admins() {
    let (_dir, store) = open_temp_store().await;
    store.register_user("admin", "Teacher", true).await.unwrap();
    store.register_user("s1", "Student One", false).await.unwrap();
    store.register_user("s2", "Student Two", false).await.unwrap();
    let store = Arc::new(store);
    let recorder = ProgressRecorder::new(Arc::clone(&store));

    for word in ["a", "b", "c"] {
        recorder.record("admin", word, Rating::EASY, fixed_now()).await.unwrap();
    }
    for word in ["a", "b"] {
        recorder.record("s2", word, Rating::EASY, fixed_now()).await.unwrap();
    }
    recorder.record("s1", "a", Rating::EASY, fixed_now()).await.unwrap();
    recorder.record("s1", "b", Rating::DIDNT_KNOW, fixed_now()).await.unwrap();

    let rows = load_leaderboard(&*store, "s1").await.unwrap();
    let ranked: Vec<(usize, &str)> = rows.iter().map(|r| (r.rank, r.user_id.as_str())).collect();
    assert_eq!(ranked, vec![(1, "s2"), (2, "s1")]);
    assert_eq!(rows[1].display_name, "Student One");
    assert_eq!(rows[1].accuracy_percent, 50);
    assert!(rows[1].is_current_user);
}

#[tokio::test]
async fn test_quiz_and_review_run_against_sqlite() {
    let (_dir, store) = open_temp_store().await;
    store.seed_words(&level_words(1, 12)).await.unwrap();
    let store = Arc::new(store);
    let recorder = ProgressRecorder::new(Arc::clone(&store));
    let mut rng = seeded_rng(21);

    let catalog = store.all_words().await.unwrap();
    let mut session = QuizSession::new(
        QuizConfig {
            total_modules: 1,
            questions_per_module: 3,
        },
        catalog.clone(),
    );
    session.start_module(&mut rng).unwrap();

    let mut missed = None;
    while let Some(question) = session.next_question(&mut rng).unwrap() {
        let choice = if missed.is_none() {
            missed = Some(question.target.id.clone());
            "wrong".to_string()
        } else {
            question.target.id.clone()
        };
        submit_quiz_answer(&mut session, &recorder, "u", &choice, fixed_now())
            .await
            .unwrap();
    }
    let missed = missed.unwrap();

    let items = load_review_queue(&*store, &*store, "u", fixed_now()).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].word.id, missed);

    let later = fixed_now() + Duration::days(1);
    let items = load_review_queue(&*store, &*store, "u", later).await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(items[0].is_wrong_answer);
    assert!(items[1..].iter().all(|i| !i.is_wrong_answer));

    let progress = store.progress("u").await.unwrap();
    let levels = level_progress(&catalog, &progress);
    assert_eq!((levels[0].learned, levels[0].total, levels[0].percent), (3, 12, 25));
}

#[tokio::test]
async fn test_admin_save_and_search() {
    let (_dir, store) = open_temp_store().await;
    save_word(&store, WordRecord::new("x1", "zealous", 5).with_definition("showing zeal"))
        .await
        .unwrap();
    save_word(&store, WordRecord::new("x2", "affable", 5).with_definition("friendly"))
        .await
        .unwrap();
    assert!(save_word(&store, WordRecord::new("x3", "", 5)).await.is_err());

    let words = store.all_words().await.unwrap();
    let hits = search_words(&words, Some("ZEAL"), Some(5), SEARCH_LIMIT);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "x1");
    assert_eq!(search_words(&words, None, None, SEARCH_LIMIT)[0].word, "affable");
}

#[tokio::test]
async fn test_daily_streak_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("drill.db");
    let day = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    {
        let store = Arc::new(SqliteStore::open(&path).await.unwrap());
        let recorder = ProgressRecorder::new(Arc::clone(&store));
        recorder.record("u", "w1", Rating::EASY, fixed_now()).await.unwrap();
        assert_eq!(recorder.mark_study_day("u", day).await.unwrap(), 1);
        assert_eq!(recorder.mark_study_day("u", day.succ_opt().unwrap()).await.unwrap(), 2);
        store.pool().close().await;
    }

    let store = SqliteStore::open(&path).await.unwrap();
    let stats = store.user_stats("u").await.unwrap();
    assert_eq!(stats.current_streak, 2);
    assert_eq!(stats.last_study_date, day.succ_opt());
    assert_eq!(stats.total_attempts, 1);
}

#[tokio::test]
async fn test_roster_and_admin_stats() {
    let (_dir, store) = open_temp_store().await;
    store.seed_words(&level_words(1, 6)).await.unwrap();
    store.register_user("admin", "Teacher", true).await.unwrap();
    store.register_user("s1", "Sam", false).await.unwrap();
    store.register_user("s2", "Kim", false).await.unwrap();
    let store = Arc::new(store);
    let recorder = ProgressRecorder::new(Arc::clone(&store));

    for word in ["L1-000", "L1-001", "L1-002", "L1-003"] {
        recorder.record("admin", word, Rating::EASY, fixed_now()).await.unwrap();
    }
    for word in ["L1-000", "L1-001", "L1-002"] {
        recorder.record("s2", word, Rating::EASY, fixed_now()).await.unwrap();
    }
    recorder.record("s1", "L1-000", Rating::DIDNT_KNOW, fixed_now()).await.unwrap();
    let today = fixed_now().date_naive();
    recorder.mark_study_day("s1", today).await.unwrap();
    recorder.mark_study_day("s2", today - Duration::days(1)).await.unwrap();

    let roster = load_student_roster(&*store).await.unwrap();
    let rows: Vec<(&str, u64, u32)> = roster
        .iter()
        .map(|r| (r.user_id.as_str(), r.words_learned, r.accuracy_percent))
        .collect();
    assert_eq!(rows, vec![("s2", 3, 100), ("s1", 1, 0)]);
    assert_eq!(roster[1].display_name, "Sam");

    let stats = load_admin_stats(&*store, &*store, today).await.unwrap();
    assert_eq!(stats.total_students, 2);
    assert_eq!(stats.total_words, 6);
    assert_eq!(stats.average_words_learned, 2);
    assert_eq!(stats.active_today, 1);
}

#[tokio::test]
async fn test_clear_commits_with_progress() {
    let (_dir, store) = open_temp_store().await;
    for minutes in [1, 2] {
        store
            .append_wrong_answer("u", WrongAnswerEntry::new("w1", fixed_now() - Duration::minutes(minutes)))
            .await
            .unwrap();
    }
    let store = Arc::new(store);
    let recorder = ProgressRecorder::new(Arc::clone(&store));

    recorder
        .record_with("u", "w1", Rating::GOT_IT, WrongAnswerAction::Clear, fixed_now())
        .await
        .unwrap();
    assert!(store.wrong_answers("u").await.unwrap().is_empty());

    recorder
        .record_with("u", "w1", Rating::QUIZ_INCORRECT, WrongAnswerAction::Append, fixed_now())
        .await
        .unwrap();
    let entries = store.wrong_answers("u").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].timestamp, fixed_now());
    assert_eq!(store.user_stats("u").await.unwrap().total_attempts, 2);
}

#[tokio::test]
async fn test_sqlite_schema_upgrade_from_v1() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.db");
    {
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = sqlx::SqlitePool::connect(&url).await.unwrap();
        for stmt in [
            r#"CREATE TABLE "_db_metadata" ("key" TEXT PRIMARY KEY NOT NULL, "value" TEXT NOT NULL)"#,
            r#"INSERT INTO "_db_metadata" VALUES ('schema_version', '1')"#,
            r#"CREATE TABLE "users" (
                "id" TEXT PRIMARY KEY NOT NULL,
                "displayName" TEXT NOT NULL DEFAULT '',
                "isAdmin" INTEGER NOT NULL DEFAULT 0,
                "totalAttempts" INTEGER NOT NULL DEFAULT 0,
                "totalCorrect" INTEGER NOT NULL DEFAULT 0,
                "wordsLearned" INTEGER NOT NULL DEFAULT 0,
                "wordsMastered" INTEGER NOT NULL DEFAULT 0
            )"#,
            r#"INSERT INTO "users" ("id","displayName","wordsLearned") VALUES ('old', 'Old Timer', 9)"#,
        ] {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool.close().await;
    }

    let store = SqliteStore::open(&path).await.unwrap();
    let stats = store.user_stats("old").await.unwrap();
    assert_eq!(stats.words_learned, 9);
    assert_eq!(stats.current_streak, 0);
    assert!(stats.last_study_date.is_none());

    let day = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
    store.set_daily_streak("old", 3, day).await.unwrap();
    assert_eq!(store.user_stats("old").await.unwrap().current_streak, 3);
    assert!(store.wrong_answers("old").await.unwrap().is_empty());
}
