//! Sorted-set leaderboard engine over Redis. Keys carry a sliding 7-day TTL
//! refreshed on every write; the global set is trimmed on every write so it
//! never exceeds [`GLOBAL_LEADERBOARD_LIMIT`] members.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use common::errors::{AppError, ErrorCode};

pub const GLOBAL_LEADERBOARD_LIMIT: isize = 1000;
pub const LEADERBOARD_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

pub fn global_leaderboard_key() -> String {
    "leaderboard:global".to_string()
}

pub fn group_leaderboard_key(tournament_id: &str, group_id: &str) -> String {
    format!("leaderboard:group:{}:{}", tournament_id, group_id)
}

pub fn usernames_key() -> String {
    "usernames".to_string()
}

pub fn user_group_key() -> String {
    "user:group".to_string()
}

pub fn user_group_field(user_id: &str, tournament_id: &str) -> String {
    format!("{}:{}", user_id, tournament_id)
}

/// One member of a sorted set, highest score first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    pub user_id: String,
    pub score: i64,
}

#[async_trait]
pub trait LeaderboardRepository: Send + Sync {
    /// Register a user in the global set at score 0.
    async fn add_global_user(&self, user_id: &str, display_name: &str) -> Result<(), AppError>;

    /// Register a user in their group set at score 0 and record the
    /// user → group mapping.
    async fn add_user_to_tournament(
        &self,
        user_id: &str,
        display_name: &str,
        group_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError>;

    /// Set (not increment) the authoritative score in both the group set and
    /// the global set. NOT_FOUND when the user has no group mapping.
    async fn update_tournament_score(
        &self,
        user_id: &str,
        tournament_id: &str,
        new_score: i64,
    ) -> Result<(), AppError>;

    async fn global_leaderboard(&self) -> Result<Vec<ScoreEntry>, AppError>;

    /// Full group set for the group the user belongs to. NOT_FOUND when the
    /// user has no group mapping.
    async fn group_leaderboard(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Vec<ScoreEntry>, AppError>;

    /// 1-based rank within the user's group; -1 when the user is absent from
    /// the set. NOT_FOUND when the user has no group mapping.
    async fn tournament_rank(&self, user_id: &str, tournament_id: &str) -> Result<i64, AppError>;

    /// Display names for the given users, in order; `None` for unknown ids.
    async fn display_names(&self, user_ids: &[String]) -> Result<Vec<Option<String>>, AppError>;
}

pub struct RedisLeaderboardRepository {
    conn: ConnectionManager,
}

impl RedisLeaderboardRepository {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn resolve_group(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        conn.hget::<_, _, Option<String>>(user_group_key(), user_group_field(user_id, tournament_id))
            .await
            .map_err(redis_error)
    }
}

fn redis_error(err: redis::RedisError) -> AppError {
    AppError::wrap(ErrorCode::Redis, "redis operation failed", err)
}

#[async_trait]
impl LeaderboardRepository for RedisLeaderboardRepository {
    async fn add_global_user(&self, user_id: &str, display_name: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let global = global_leaderboard_key();

        redis::pipe()
            .zadd(&global, user_id, 0)
            .ignore()
            .zremrangebyrank(&global, 0, -GLOBAL_LEADERBOARD_LIMIT - 1)
            .ignore()
            .expire(&global, LEADERBOARD_TTL_SECONDS)
            .ignore()
            .hset(usernames_key(), user_id, display_name)
            .ignore()
            .expire(usernames_key(), LEADERBOARD_TTL_SECONDS)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(redis_error)?;

        debug!(user_id, "Added user to global leaderboard");
        Ok(())
    }

    async fn add_user_to_tournament(
        &self,
        user_id: &str,
        display_name: &str,
        group_id: &str,
        tournament_id: &str,
    ) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let group_key = group_leaderboard_key(tournament_id, group_id);

        redis::pipe()
            .hset(usernames_key(), user_id, display_name)
            .ignore()
            .expire(usernames_key(), LEADERBOARD_TTL_SECONDS)
            .ignore()
            .hset(
                user_group_key(),
                user_group_field(user_id, tournament_id),
                group_id,
            )
            .ignore()
            .expire(user_group_key(), LEADERBOARD_TTL_SECONDS)
            .ignore()
            .zadd(&group_key, user_id, 0)
            .ignore()
            .expire(&group_key, LEADERBOARD_TTL_SECONDS)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(redis_error)?;

        debug!(user_id, tournament_id, group_id, "Added user to tournament leaderboard");
        Ok(())
    }

    async fn update_tournament_score(
        &self,
        user_id: &str,
        tournament_id: &str,
        new_score: i64,
    ) -> Result<(), AppError> {
        let group_id = self
            .resolve_group(user_id, tournament_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "no group mapping for user {} in tournament {}",
                    user_id, tournament_id
                ))
            })?;

        let mut conn = self.conn.clone();
        let group_key = group_leaderboard_key(tournament_id, &group_id);
        let global = global_leaderboard_key();

        redis::pipe()
            .zadd(&group_key, user_id, new_score)
            .ignore()
            .expire(&group_key, LEADERBOARD_TTL_SECONDS)
            .ignore()
            .zadd(&global, user_id, new_score)
            .ignore()
            .zremrangebyrank(&global, 0, -GLOBAL_LEADERBOARD_LIMIT - 1)
            .ignore()
            .expire(&global, LEADERBOARD_TTL_SECONDS)
            .ignore()
            .expire(user_group_key(), LEADERBOARD_TTL_SECONDS)
            .ignore()
            .expire(usernames_key(), LEADERBOARD_TTL_SECONDS)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(redis_error)?;

        debug!(user_id, tournament_id, new_score, "Updated tournament score");
        Ok(())
    }

    async fn global_leaderboard(&self) -> Result<Vec<ScoreEntry>, AppError> {
        let mut conn = self.conn.clone();
        let entries: Vec<(String, i64)> = conn
            .zrevrange_withscores(global_leaderboard_key(), 0, GLOBAL_LEADERBOARD_LIMIT - 1)
            .await
            .map_err(redis_error)?;

        Ok(entries
            .into_iter()
            .map(|(user_id, score)| ScoreEntry { user_id, score })
            .collect())
    }

    async fn group_leaderboard(
        &self,
        user_id: &str,
        tournament_id: &str,
    ) -> Result<Vec<ScoreEntry>, AppError> {
        let group_id = self
            .resolve_group(user_id, tournament_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "no group mapping for user {} in tournament {}",
                    user_id, tournament_id
                ))
            })?;

        let mut conn = self.conn.clone();
        let entries: Vec<(String, i64)> = conn
            .zrevrange_withscores(group_leaderboard_key(tournament_id, &group_id), 0, -1)
            .await
            .map_err(redis_error)?;

        Ok(entries
            .into_iter()
            .map(|(user_id, score)| ScoreEntry { user_id, score })
            .collect())
    }

    async fn tournament_rank(&self, user_id: &str, tournament_id: &str) -> Result<i64, AppError> {
        let group_id = self
            .resolve_group(user_id, tournament_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "no group mapping for user {} in tournament {}",
                    user_id, tournament_id
                ))
            })?;

        let mut conn = self.conn.clone();
        let rank: Option<i64> = conn
            .zrevrank(group_leaderboard_key(tournament_id, &group_id), user_id)
            .await
            .map_err(redis_error)?;

        Ok(match rank {
            Some(rank) => rank + 1,
            None => -1,
        })
    }

    async fn display_names(&self, user_ids: &[String]) -> Result<Vec<Option<String>>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        redis::cmd("HMGET")
            .arg(usernames_key())
            .arg(user_ids)
            .query_async(&mut conn)
            .await
            .map_err(redis_error)
    }
}
