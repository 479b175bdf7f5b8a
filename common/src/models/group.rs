use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Tournament;

/// A bounded-capacity ranking bucket within one tournament. Lives under the
/// tournament partition so open groups can be found with a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub group_id: String,
    pub tournament_id: String,
    pub group_size: i64,
    pub participant_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(tournament: &Tournament) -> Self {
        Self {
            group_id: Uuid::new_v4().to_string(),
            tournament_id: tournament.tournament_id.clone(),
            group_size: tournament.group_size,
            participant_count: 0,
            created_at: Utc::now(),
        }
    }
}

pub fn group_sk(group_id: &str) -> String {
    format!("GROUP#{}", group_id)
}

pub fn group_sk_prefix() -> String {
    "GROUP#".to_string()
}
