//! Stream and subject names shared by every service on the bus.

pub const USER_EVENTS_STREAM: &str = "USER_EVENTS";
pub const TOURNAMENT_EVENTS_STREAM: &str = "TOURNAMENT_EVENTS";

pub const USER_CREATED: &str = "events.user.created";
pub const USER_LEVEL_UP: &str = "events.user.levelUp";

pub const TOURNAMENT_ENTERED: &str = "events.tournament.entered";
pub const TOURNAMENT_PARTICIPATION_SCORE_UPDATED: &str =
    "events.tournament.participationScoreUpdated";

pub const USER_EVENTS_WILDCARD: &str = "events.user.*";
pub const TOURNAMENT_EVENTS_WILDCARD: &str = "events.tournament.*";

/// Durable consumer name: one per consuming service per stream.
pub fn consumer_name(service: &str, stream: &str) -> String {
    format!("{}-{}-consumer", service, stream)
}
