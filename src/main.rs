use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;

use danci_drill::config::DrillConfig;
use danci_drill::logging;
use danci_drill::services::progress::{ProgressOverview, ProgressRecorder};
use danci_drill::services::review_queue::{load_review_queue, ReviewSession};
use danci_drill::store::memory::parse_catalog_json;
use danci_drill::store::{ProgressStore, SqliteStore, StoreError};

async fn seed_catalog(store: &SqliteStore, path: &Path) -> Result<usize, StoreError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let words = parse_catalog_json(&raw)?;
    store.seed_words(&words).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = DrillConfig::load();
    let _log_guard = logging::init_tracing(&config.log_level, config.log_file_dir.as_deref());

    let store = match SqliteStore::open(&config.database_path).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, path = %config.database_path.display(), "failed to open database");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = config.catalog_path.as_deref() {
        match seed_catalog(&store, path).await {
            Ok(count) => tracing::info!(count, path = %path.display(), "seeded word catalog"),
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "catalog seed failed");
            }
        }
    }

    let Some(user_id) = std::env::args().nth(1) else {
        tracing::info!("no user id given, nothing to report");
        return ExitCode::SUCCESS;
    };

    let now = Utc::now();
    let store = Arc::new(store);
    let recorder = ProgressRecorder::new(Arc::clone(&store));
    if let Err(err) = recorder.mark_study_day(&user_id, now.date_naive()).await {
        tracing::warn!(error = %err, user_id = %user_id, "failed to update study streak");
    }
    let items = match load_review_queue(&*store, &*store, &user_id, now).await {
        Ok(items) => items,
        Err(err) => {
            tracing::error!(error = %err, user_id = %user_id, "failed to build review queue");
            return ExitCode::FAILURE;
        }
    };
    let session = ReviewSession::new(items);
    let counts = session.counts();

    match store.user_stats(&user_id).await {
        Ok(stats) => {
            let overview = ProgressOverview::from(&stats);
            tracing::info!(
                user_id = %user_id,
                wrong_answers = counts.wrong_answers,
                due = counts.due,
                words_learned = overview.words_learned,
                words_mastered = overview.words_mastered,
                accuracy_percent = overview.accuracy_percent,
                current_streak = overview.current_streak,
                "review status"
            );
        }
        Err(err) => {
            tracing::warn!(error = %err, user_id = %user_id, "failed to load user stats");
            tracing::info!(
                user_id = %user_id,
                wrong_answers = counts.wrong_answers,
                due = counts.due,
                "review status"
            );
        }
    }

    ExitCode::SUCCESS
}
