//! Database repositories for the fight exposure engine.
//!
//! Each repository provides typed access to one table. Repositories return
//! `anyhow::Result`; `PgStore` normalizes failures into engine errors.

pub mod fight_repo;
pub mod fill_repo;
pub mod order_action_repo;
pub mod participant_repo;
pub mod user_repo;

pub use fight_repo::FightRepository;
pub use fill_repo::FillRepository;
pub use order_action_repo::OrderActionRepository;
pub use participant_repo::ParticipantRepository;
pub use user_repo::UserRepository;

use sqlx::PgPool;

/// Creates all repositories from a single database pool.
#[derive(Debug, Clone)]
pub struct Repositories {
    pub fills: FillRepository,
    pub fights: FightRepository,
    pub participants: ParticipantRepository,
    pub users: UserRepository,
    pub order_actions: OrderActionRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            fills: FillRepository::new(pool.clone()),
            fights: FightRepository::new(pool.clone()),
            participants: ParticipantRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            order_actions: OrderActionRepository::new(pool),
        }
    }
}
