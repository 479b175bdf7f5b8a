use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
    pub level: i64,
    pub coin: i64,
    pub created_at: DateTime<Utc>,
}

pub fn user_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

pub fn profile_sk() -> String {
    "PROFILE".to_string()
}
