//! Error taxonomy for the exposure engine.
//!
//! Storage and exchange failures are normalized into these variants at their
//! boundaries so callers never match on driver-specific error codes.

use thiserror::Error;

/// Errors produced by the exposure engine and its collaborators.
#[derive(Debug, Error)]
pub enum ExposureError {
    /// A fill or request field is missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// An execution id already exists for a different fight, user or symbol.
    #[error("fill conflict: history id {history_id} already recorded for another participant")]
    FillConflict {
        /// The conflicting execution id.
        history_id: String,
    },

    /// No user is registered for the exchange account.
    #[error("unknown account: {account}")]
    UnknownAccount {
        /// The exchange account.
        account: String,
    },

    /// The fight does not exist.
    #[error("fight not found: {fight_id}")]
    FightNotFound {
        /// The fight id.
        fight_id: String,
    },

    /// The user is not a participant of the fight.
    #[error("user {user_id} is not a participant of fight {fight_id}")]
    NotParticipant {
        /// The fight id.
        fight_id: String,
        /// The user id.
        user_id: String,
    },

    /// The fight is not LIVE.
    #[error("fight {fight_id} is not live (status {status})")]
    FightNotLive {
        /// The fight id.
        fight_id: String,
        /// Current status.
        status: String,
    },

    /// The exchange could not be reached or returned an error.
    #[error("exchange unavailable: {0}")]
    ExchangeUnavailable(String),

    /// Persisting a watermark raise failed.
    #[error("watermark update failed for {participant}: {message}")]
    WatermarkUpdate {
        /// `fight/user` key.
        participant: String,
        /// Underlying failure.
        message: String,
    },

    /// Any other persistence failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ExposureError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a storage error from any displayable failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// Creates a fight-not-found error.
    pub fn fight_not_found(fight_id: impl Into<String>) -> Self {
        Self::FightNotFound {
            fight_id: fight_id.into(),
        }
    }

    /// Creates a not-a-participant error.
    pub fn not_participant(fight_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::NotParticipant {
            fight_id: fight_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Creates an unknown-account error.
    pub fn unknown_account(account: impl Into<String>) -> Self {
        Self::UnknownAccount {
            account: account.into(),
        }
    }

    /// Returns true if the caller sent a bad request.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::FillConflict { .. })
    }

    /// Returns true if the caller refers to something that does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownAccount { .. } | Self::FightNotFound { .. } | Self::NotParticipant { .. }
        )
    }

    /// Returns true if retrying the same operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExchangeUnavailable(_) | Self::WatermarkUpdate { .. } | Self::Storage(_)
        )
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ExposureError>;
