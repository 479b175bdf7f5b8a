use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Rank-key to coin reward. Keys are either literal ranks ("1") or inclusive
/// ranges ("4-10"). Ordered so range scans are deterministic.
pub type RewardingMap = BTreeMap<String, i64>;

#[derive(Debug, Clone, PartialEq)]
pub struct Tournament {
    pub tournament_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub last_allowed_participation_date: DateTime<Utc>,
    pub user_level_limit: i64,
    pub group_size: i64,
    pub entrance_fee: i64,
    pub score_reward_per_level_upgrade: i64,
    pub rewarding_map: RewardingMap,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    /// A daily tournament with the standard defaults: a 24h − 1min window and
    /// a participation cutoff 12h in.
    pub fn daily(starts_at: DateTime<Utc>) -> Self {
        let mut rewarding_map = RewardingMap::new();
        rewarding_map.insert("1".to_string(), 5000);
        rewarding_map.insert("2".to_string(), 3000);
        rewarding_map.insert("3".to_string(), 2000);
        rewarding_map.insert("4-10".to_string(), 1000);

        Self {
            tournament_id: Uuid::new_v4().to_string(),
            starts_at,
            ends_at: starts_at + Duration::hours(24) - Duration::minutes(1),
            last_allowed_participation_date: starts_at + Duration::hours(12),
            user_level_limit: 10,
            group_size: 35,
            entrance_fee: 500,
            score_reward_per_level_upgrade: 1,
            rewarding_map,
            created_at: Utc::now(),
        }
    }
}

pub fn tournament_pk(tournament_id: &str) -> String {
    format!("TOURNAMENT#{}", tournament_id)
}

pub fn current_tournament_gsi1pk() -> String {
    "CURRENT_TOURNAMENT".to_string()
}

pub fn start_gsi1sk(starts_at: DateTime<Utc>) -> String {
    format!("START#{}", starts_at.to_rfc3339())
}
