//! Admin console aggregates over student accounts.

use chrono::NaiveDate;
use serde::Serialize;

use crate::store::{ProgressStore, StoreError, WordCatalog};
use crate::types::UserStats;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub user_id: String,
    pub display_name: String,
    pub words_learned: u64,
    pub words_mastered: u64,
    pub accuracy_percent: u32,
    pub current_streak: u32,
}

impl From<&UserStats> for StudentRow {
    fn from(stats: &UserStats) -> Self {
        Self {
            user_id: stats.user_id.clone(),
            display_name: stats.display_name.clone(),
            words_learned: stats.words_learned,
            words_mastered: stats.words_mastered,
            accuracy_percent: stats.accuracy_percent(),
            current_streak: stats.current_streak,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_students: usize,
    pub total_words: usize,
    /// Rounded mean of `words_learned` over students, 0 with no students.
    pub average_words_learned: u64,
    pub active_today: usize,
}

/// Non-admin users in the order given, which callers fetch by words learned.
pub fn student_roster(users: &[UserStats]) -> Vec<StudentRow> {
    users
        .iter()
        .filter(|u| !u.is_admin)
        .map(StudentRow::from)
        .collect()
}

pub fn admin_stats(users: &[UserStats], total_words: usize, today: NaiveDate) -> AdminStats {
    let students: Vec<&UserStats> = users.iter().filter(|u| !u.is_admin).collect();
    let learned: u64 = students.iter().map(|u| u.words_learned).sum();
    let average_words_learned = if students.is_empty() {
        0
    } else {
        (learned as f64 / students.len() as f64).round() as u64
    };

    AdminStats {
        total_students: students.len(),
        total_words,
        average_words_learned,
        active_today: students
            .iter()
            .filter(|u| u.studied_on_or_after(today))
            .count(),
    }
}

pub async fn load_student_roster<S: ProgressStore + ?Sized>(
    store: &S,
) -> Result<Vec<StudentRow>, StoreError> {
    let users = store.users_by_words_learned().await?;
    Ok(student_roster(&users))
}

pub async fn load_admin_stats<C, S>(
    catalog: &C,
    store: &S,
    today: NaiveDate,
) -> Result<AdminStats, StoreError>
where
    C: WordCatalog + ?Sized,
    S: ProgressStore + ?Sized,
{
    let total_words = catalog.all_words().await?.len();
    let users = store.users_by_words_learned().await?;
    let stats = admin_stats(&users, total_words, today);
    tracing::debug!(
        students = stats.total_students,
        words = stats.total_words,
        active_today = stats.active_today,
        "admin stats"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, learned: u64, last: Option<NaiveDate>) -> UserStats {
        UserStats {
            user_id: id.to_string(),
            display_name: id.to_uppercase(),
            words_learned: learned,
            last_study_date: last,
            ..Default::default()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    #[test]
    fn test_roster_skips_admins_and_keeps_order() {
        let mut admin = student("root", 500, None);
        admin.is_admin = true;
        let mut ana = student("ana", 12, None);
        ana.total_attempts = 8;
        ana.total_correct = 6;
        let users = vec![admin, ana, student("bo", 3, None)];

        let rows = student_roster(&users);
        let ids: Vec<&str> = rows.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["ana", "bo"]);
        assert_eq!(rows[0].accuracy_percent, 75);
        assert_eq!(rows[1].accuracy_percent, 0);
    }

    #[test]
    fn test_admin_stats_rounds_average_and_counts_today() {
        let mut admin = student("root", 900, Some(day(10)));
        admin.is_admin = true;
        let users = vec![
            admin,
            student("a", 10, Some(day(10))),
            student("b", 5, Some(day(9))),
            student("c", 0, None),
        ];
        let stats = admin_stats(&users, 42, day(10));
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.total_words, 42);
        assert_eq!(stats.average_words_learned, 5);
        assert_eq!(stats.active_today, 1);
    }

    #[test]
    fn test_admin_stats_without_students() {
        let stats = admin_stats(&[], 7, day(1));
        assert_eq!(stats, AdminStats { total_words: 7, ..Default::default() });
    }
}
