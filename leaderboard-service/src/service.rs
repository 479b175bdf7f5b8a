use std::sync::Arc;

use tracing::info;

use common::errors::AppError;

use crate::repository::LeaderboardRepository;

/// A joined, rank-annotated leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardUser {
    pub rank: i64,
    pub user_id: String,
    pub display_name: String,
    pub score: i64,
}

pub struct LeaderboardService {
    repo: Arc<dyn LeaderboardRepository>,
}

impl LeaderboardService {
    pub fn new(repo: Arc<dyn LeaderboardRepository>) -> Self {
        Self { repo }
    }

    pub async fn add_global_user(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<(), AppError> {
        self.repo.add_global_user(user_id, display_name).await?;
        info!(user_id, "Global user added");
        Ok(())
    }

    pub async fn add_user_to_tournament(
        &self,
        user_id: &str,
        display_name: &str,
        group_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        self.repo
            .add_user_to_tournament(user_id, display_name, group_id, tournament_id)
            .await?;
        info!(user_id, tournament_id, "Tournament user added");
        Ok(())
    }

    pub async fn update_tournament_score(
        &self,
        user_id: &str,
        tournament_id: &str,
        new_score: i64,
    ) -> Result<(), AppError> {
        self.repo
            .update_tournament_score(user_id, tournament_id, new_score)
            .await?;
        info!(user_id, tournament_id, new_score, "Tournament score updated");
        Ok(())
    }

    pub async fn get_global_leaderboard(&self) -> Result<Vec<LeaderboardUser>, AppError> {
        let entries = self.repo.global_leaderboard().await?;
        self.join_names(entries).await
    }

    pub async fn get_tournament_leaderboard(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Vec<LeaderboardUser>, AppError> {
        let entries = self.repo.group_leaderboard(user_id, tournament_id).await?;
        self.join_names(entries).await
    }

    pub async fn get_tournament_rank(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<i64, AppError> {
        self.repo.tournament_rank(user_id, tournament_id).await
    }

    async fn join_names(
        &self,
        entries: Vec<crate::repository::ScoreEntry>,
    ) -> Result<Vec<LeaderboardUser>, AppError> {
        let user_ids: Vec<String> = entries.iter().map(|e| e.user_id.clone()).collect();
        let names = self.repo.display_names(&user_ids).await?;

        Ok(entries
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(idx, (entry, name))| LeaderboardUser {
                rank: idx as i64 + 1,
                display_name: name.unwrap_or_else(|| entry.user_id.clone()),
                user_id: entry.user_id,
                score: entry.score,
            })
            .collect())
    }
}
