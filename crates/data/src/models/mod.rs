//! Row models for the fight exposure tables.
//!
//! Rows mirror the database columns; conversions into the core domain types
//! validate the enum-like text columns.

pub mod fight;
pub mod fill;

pub use fight::{FightRow, LiveParticipationRow, ParticipantRow, UserRow};
pub use fill::FillRow;
