use std::path::PathBuf;

use crate::logging::DEFAULT_LOG_DIRECTIVE;
use crate::services::quiz_session::{QuizConfig, DEFAULT_QUESTIONS_PER_MODULE, DEFAULT_TOTAL_MODULES};
use crate::store::sqlite::default_db_path;

#[derive(Debug, Clone)]
pub struct DrillConfig {
    pub questions_per_module: usize,
    pub total_modules: u32,
    pub database_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub log_level: String,
    /// Directory for the daily log file, set only when file logging is on.
    pub log_file_dir: Option<PathBuf>,
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn flag_env(key: &str) -> bool {
    non_empty_env(key)
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn positive_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default,
{
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
        .unwrap_or(default)
}

impl DrillConfig {
    pub fn from_env() -> Self {
        let questions_per_module = positive_env("DRILL_QUESTIONS_PER_MODULE", DEFAULT_QUESTIONS_PER_MODULE);
        let total_modules = positive_env("DRILL_TOTAL_MODULES", DEFAULT_TOTAL_MODULES);

        let database_path = non_empty_env("DRILL_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let catalog_path = non_empty_env("DRILL_CATALOG_PATH").map(PathBuf::from);

        let log_level = non_empty_env("DRILL_LOG_LEVEL")
            .or_else(|| non_empty_env("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_DIRECTIVE.to_string());

        let log_file_dir = flag_env("DRILL_FILE_LOGS").then(|| {
            non_empty_env("DRILL_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs"))
        });

        Self {
            questions_per_module,
            total_modules,
            database_path,
            catalog_path,
            log_level,
            log_file_dir,
        }
    }

    /// Reads a `.env` file when present, then the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn quiz_config(&self) -> QuizConfig {
        QuizConfig {
            total_modules: self.total_modules,
            questions_per_module: self.questions_per_module,
        }
    }
}
