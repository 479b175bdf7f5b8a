use chrono::{DateTime, Utc};

use super::{RewardingMap, Tournament};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardClaimStatus {
    Unclaimed,
    Processing,
    Claimed,
}

impl RewardClaimStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RewardClaimStatus::Unclaimed => "UNCLAIMED",
            RewardClaimStatus::Processing => "PROCESSING",
            RewardClaimStatus::Claimed => "CLAIMED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "UNCLAIMED" => Some(RewardClaimStatus::Unclaimed),
            "PROCESSING" => Some(RewardClaimStatus::Processing),
            "CLAIMED" => Some(RewardClaimStatus::Claimed),
            _ => None,
        }
    }
}

/// The row binding a user to one tournament. `ends_at` and `rewarding_map`
/// are snapshots taken at entry so the claim workflow never depends on live
/// tournament state.
#[derive(Debug, Clone, PartialEq)]
pub struct Participation {
    pub user_id: String,
    pub tournament_id: String,
    pub group_id: String,
    pub score: i64,
    pub reward_claim_status: RewardClaimStatus,
    pub ends_at: DateTime<Utc>,
    pub rewarding_map: RewardingMap,
    pub created_at: DateTime<Utc>,
}

impl Participation {
    pub fn new(user_id: &str, tournament: &Tournament, group_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            tournament_id: tournament.tournament_id.clone(),
            group_id: group_id.to_string(),
            score: 0,
            reward_claim_status: RewardClaimStatus::Unclaimed,
            ends_at: tournament.ends_at,
            rewarding_map: tournament.rewarding_map.clone(),
            created_at: Utc::now(),
        }
    }
}
