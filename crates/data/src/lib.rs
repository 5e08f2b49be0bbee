//! `PostgreSQL` storage for the fight exposure engine.
//!
//! This crate provides:
//! - Database client with embedded schema migrations
//! - Row models for fights, participants, users and fills
//! - Repositories for typed table access
//! - `PgStore`, the engine's storage trait implementation

pub mod database;
pub mod models;
pub mod repositories;
pub mod store;

pub use database::DatabaseClient;
pub use models::{FightRow, FillRow, LiveParticipationRow, ParticipantRow, UserRow};
pub use repositories::{
    FightRepository, FillRepository, OrderActionRepository, ParticipantRepository, Repositories,
    UserRepository,
};
pub use store::PgStore;
