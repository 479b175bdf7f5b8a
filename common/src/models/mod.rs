pub mod group;
pub mod participation;
pub mod reservation;
pub mod reward_claim;
pub mod tournament;
pub mod user;

pub use group::Group;
pub use participation::{Participation, RewardClaimStatus};
pub use reservation::{Reservation, ReservationStatus};
pub use reward_claim::RewardClaim;
pub use tournament::{RewardingMap, Tournament};
pub use user::User;

/// Shared sort key for singleton metadata rows.
pub fn meta_sk() -> String {
    "META".to_string()
}
