use serde::Serialize;

use crate::store::{ProgressStore, StoreError};
use crate::types::UserStats;

pub const LEADERBOARD_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    pub fn for_rank(rank: usize) -> Option<Self> {
        match rank {
            1 => Some(Self::Gold),
            2 => Some(Self::Silver),
            3 => Some(Self::Bronze),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: usize,
    pub user_id: String,
    pub display_name: String,
    pub total_correct: u64,
    pub words_mastered: u64,
    pub accuracy_percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medal: Option<Medal>,
    pub is_current_user: bool,
}

/// Ranks `users` in the given order, skipping admins. Ranks are assigned
/// after the skip so they stay contiguous.
pub fn rank_users(users: &[UserStats], current_user_id: &str) -> Vec<LeaderboardRow> {
    users
        .iter()
        .filter(|u| !u.is_admin)
        .enumerate()
        .map(|(idx, user)| {
            let rank = idx + 1;
            LeaderboardRow {
                rank,
                user_id: user.user_id.clone(),
                display_name: user.display_name.clone(),
                total_correct: user.total_correct,
                words_mastered: user.words_mastered,
                accuracy_percent: user.accuracy_percent(),
                medal: Medal::for_rank(rank),
                is_current_user: user.user_id == current_user_id,
            }
        })
        .collect()
}

/// The top users by total correct answers. Admins occupy slots in the fetch
/// but not in the ranking.
pub async fn load_leaderboard<S: ProgressStore + ?Sized>(
    store: &S,
    current_user_id: &str,
) -> Result<Vec<LeaderboardRow>, StoreError> {
    let users = store.top_users_by_correct(LEADERBOARD_LIMIT).await?;
    Ok(rank_users(&users, current_user_id))
}
