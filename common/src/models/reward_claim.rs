use chrono::{DateTime, Utc};

/// Existence witness that the reward for a (user, tournament) has been paid.
/// Written at most once; inserted before the coin credit so a replayed payout
/// can never credit twice.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardClaim {
    pub user_id: String,
    pub tournament_id: String,
    pub created_at: DateTime<Utc>,
}

pub fn reward_claim_pk(user_id: &str) -> String {
    format!("REWARDCLAIM#{}", user_id)
}
