pub mod config;
pub mod logging;
pub mod services;
pub mod store;
pub mod types;

pub use services::progress::ProgressRecorder;
pub use services::quiz_session::{QuizConfig, QuizError, QuizSession};
pub use services::review_queue::{ReviewError, ReviewSession};
pub use services::scheduler::{record_outcome, Rating};
pub use store::{MemoryStore, ProgressStore, SqliteStore, StoreError, WordCatalog};
