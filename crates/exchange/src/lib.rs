//! Exchange integration for live position reconciliation.
//!
//! This crate provides:
//! - A rate-limited REST client for the positions endpoint
//! - Typed errors with retry classification
//! - A `PositionSource` implementation for the exposure engine

pub mod client;
pub mod error;
pub mod types;

pub use client::{ExchangeClient, ExchangeClientConfig, DEFAULT_API_URL};
pub use error::{ExchangeError, Result};
pub use types::{ApiResponse, RawPosition};
