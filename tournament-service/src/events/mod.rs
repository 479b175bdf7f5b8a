pub mod publisher;
pub mod subscriber;

pub use publisher::{JetStreamTournamentPublisher, TournamentEventPublisher};
pub use subscriber::EventSubscriber;
