//! In-memory sorted-set double mirroring the Redis engine's observable
//! semantics: descending score order with reverse-lexicographic member
//! tiebreak, set-not-increment writes, and global trimming.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ::common::errors::AppError;

use leaderboard_service::repository::{
    LeaderboardRepository, ScoreEntry, GLOBAL_LEADERBOARD_LIMIT,
};

#[derive(Default)]
pub struct MemoryLeaderboardRepository {
    pub global: Mutex<HashMap<String, i64>>,
    pub groups: Mutex<HashMap<(String, String), HashMap<String, i64>>>,
    pub usernames: Mutex<HashMap<String, String>>,
    pub user_group: Mutex<HashMap<(String, String), String>>,
}

impl MemoryLeaderboardRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn global_len(&self) -> usize {
        self.global.lock().unwrap().len()
    }
}

/// ZREVRANGE order: score descending, equal scores in reverse-lexicographic
/// member order.
fn sorted(entries: &HashMap<String, i64>) -> Vec<ScoreEntry> {
    let mut entries: Vec<ScoreEntry> = entries
        .iter()
        .map(|(user_id, score)| ScoreEntry {
            user_id: user_id.clone(),
            score: *score,
        })
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score).then(b.user_id.cmp(&a.user_id)));
    entries
}

fn trim_global(global: &mut HashMap<String, i64>) {
    let limit = GLOBAL_LEADERBOARD_LIMIT as usize;
    while global.len() > limit {
        let lowest = sorted(global).last().unwrap().user_id.clone();
        global.remove(&lowest);
    }
}

#[async_trait]
impl LeaderboardRepository for MemoryLeaderboardRepository {
    async fn add_global_user(&self, user_id: &str, display_name: &str) -> Result<(), AppError> {
        let mut global = self.global.lock().unwrap();
        global.insert(user_id.to_string(), 0);
        trim_global(&mut global);
        self.usernames
            .lock()
            .unwrap()
            .insert(user_id.to_string(), display_name.to_string());
        Ok(())
    }

    async fn add_user_to_tournament(
        &self,
        user_id: &str,
        display_name: &str,
        group_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        self.usernames
            .lock()
            .unwrap()
            .insert(user_id.to_string(), display_name.to_string());
        self.user_group.lock().unwrap().insert(
            (user_id.to_string(), tournament_id.to_string()),
            group_id.to_string(),
        );
        self.groups
            .lock()
            .unwrap()
            .entry((tournament_id.to_string(), group_id.to_string()))
            .or_default()
            .insert(user_id.to_string(), 0);
        Ok(())
    }

    async fn update_tournament_score(
        &self,
        user_id: &str,
        tournament_id: &str,
        new_score: i64,
    ) -> Result<(), AppError> {
        let group_id = self
            .user_group
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), tournament_id.to_string()))
            .cloned()
            .ok_or_else(|| AppError::not_found("no group mapping"))?;

        self.groups
            .lock()
            .unwrap()
            .entry((tournament_id.to_string(), group_id))
            .or_default()
            .insert(user_id.to_string(), new_score);

        let mut global = self.global.lock().unwrap();
        global.insert(user_id.to_string(), new_score);
        trim_global(&mut global);
        Ok(())
    }

    async fn global_leaderboard(&self) -> Result<Vec<ScoreEntry>, AppError> {
        Ok(sorted(&self.global.lock().unwrap()))
    }

    async fn group_leaderboard(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Vec<ScoreEntry>, AppError> {
        let group_id = self
            .user_group
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), tournament_id.to_string()))
            .cloned()
            .ok_or_else(|| AppError::not_found("no group mapping"))?;

        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(&(tournament_id.to_string(), group_id))
            .map(sorted)
            .unwrap_or_default())
    }

    async fn tournament_rank(&self, user_id: &str, tournament_id: &str) -> Result<i64, AppError> {
        let group_id = self
            .user_group
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), tournament_id.to_string()))
            .cloned()
            .ok_or_else(|| AppError::not_found("no group mapping"))?;

        let groups = self.groups.lock().unwrap();
        let Some(members) = groups.get(&(tournament_id.to_string(), group_id)) else {
            return Ok(-1);
        };

        Ok(sorted(members)
            .iter()
            .position(|entry| entry.user_id == user_id)
            .map(|idx| idx as i64 + 1)
            .unwrap_or(-1))
    }

    async fn display_names(&self, user_ids: &[String]) -> Result<Vec<Option<String>>, AppError> {
        let usernames = self.usernames.lock().unwrap();
        Ok(user_ids
            .iter()
            .map(|user_id| usernames.get(user_id).cloned())
            .collect())
    }
}
