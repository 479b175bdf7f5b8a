use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    Reserved,
    Confirmed,
    RolledBack,
}

impl ReservationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "RESERVED",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::RolledBack => "ROLLED_BACK",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RESERVED" => Some(ReservationStatus::Reserved),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "ROLLED_BACK" => Some(ReservationStatus::RolledBack),
            _ => None,
        }
    }

    /// CONFIRMED and ROLLED_BACK are absorbing.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReservationStatus::Reserved)
    }
}

/// A two-phase wallet lock guarding an entry fee. Keyed by the (user,
/// tournament) natural key so replayed reservations collapse onto one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub user_id: String,
    pub tournament_id: String,
    pub amount: i64,
    pub status: ReservationStatus,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn for_tournament_entry(user_id: &str, tournament_id: &str, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            tournament_id: tournament_id.to_string(),
            amount,
            status: ReservationStatus::Reserved,
            purpose: "TOURNAMENT_ENTRY".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn reservation_pk(user_id: &str) -> String {
    format!("RESERVATION#{}", user_id)
}
