use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use common::errors::ErrorCode;

use crate::service::TournamentService;

/// Daily tournament creation. One task per process; peers racing at midnight
/// are resolved by the conditional tournament insert, so a conflict from a
/// replica is treated as success.
pub struct Scheduler {
    service: Arc<TournamentService>,
}

impl Scheduler {
    pub fn new(service: Arc<TournamentService>) -> Self {
        Self { service }
    }

    pub async fn run(&self, token: CancellationToken) {
        if let Err(err) = self.service.create_current_tournament_if_not_exists().await {
            error!(error = %err, "Failed to ensure current tournament at startup");
        }

        loop {
            let now = Utc::now();
            let wait = duration_until_next_midnight(now);
            let next = now + ChronoDuration::from_std(wait).unwrap_or_else(|_| ChronoDuration::zero());
            info!(next = %next.to_rfc3339(), "Next tournament creation scheduled");

            tokio::select! {
                _ = token.cancelled() => {
                    info!("Tournament creation scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {
                    info!("Creating daily tournament at 00:00 UTC");
                    match self.service.create_tournament(Utc::now()).await {
                        Ok(tournament) => {
                            info!(tournament_id = %tournament.tournament_id, "Created daily tournament");
                        }
                        Err(err)
                            if err.code == ErrorCode::AlreadyExists
                                || err.code == ErrorCode::Conflict =>
                        {
                            info!("Daily tournament already created by a peer replica");
                        }
                        Err(err) => {
                            error!(error = %err, "Failed to create daily tournament");
                        }
                    }
                }
            }
        }
    }
}

/// Time until the next 00:00 UTC strictly after `now`.
pub fn duration_until_next_midnight(now: DateTime<Utc>) -> std::time::Duration {
    let next_midnight = (now + ChronoDuration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();

    (next_midnight - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}
