pub mod admin;
pub mod catalog;
pub mod cloze;
pub mod distractor;
pub mod flashcards;
pub mod leaderboard;
pub mod progress;
pub mod quiz_session;
pub mod review_queue;
pub mod scheduler;
