pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod events;
pub mod jetstream;
pub mod models;

pub mod pb {
    tonic::include_proto!("arena.v1");
}
