//! Exchange REST client with rate limiting.
//!
//! Only the read-only positions endpoint is used. Every request waits on a
//! governor rate limiter before it is sent.
//!
//! # Example
//!
//! ```ignore
//! use fight_exposure_exchange::{ExchangeClient, ExchangeClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ExchangeClient::new(ExchangeClientConfig::default())?;
//!     let positions = client.get_positions("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU").await?;
//!     println!("{} open positions", positions.len());
//!     Ok(())
//! }
//! ```

use crate::error::{ExchangeError, Result};
use crate::types::{ApiResponse, RawPosition};
use async_trait::async_trait;
use fight_exposure_core::{ExchangeConfig, LivePosition, PositionSource};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Production API base URL.
pub const DEFAULT_API_URL: &str = "https://api.pacifica.fi";

const POSITIONS_PATH: &str = "/api/v1/positions";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the exchange client.
#[derive(Debug, Clone)]
pub struct ExchangeClientConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Requests per second limit.
    pub requests_per_second: NonZeroU32,

    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ExchangeClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            requests_per_second: nonzero!(20u32),
            timeout_ms: 2_500,
        }
    }
}

impl ExchangeClientConfig {
    /// Builds a client configuration from the `[exchange]` config section.
    #[must_use]
    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            requests_per_second: NonZeroU32::new(config.requests_per_second)
                .unwrap_or(nonzero!(1u32)),
            timeout_ms: config.timeout_ms,
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: NonZeroU32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

// =============================================================================
// ExchangeClient
// =============================================================================

/// REST client for the exchange positions API.
pub struct ExchangeClient {
    config: ExchangeClientConfig,
    http: Client,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_second", &self.config.requests_per_second)
            .finish_non_exhaustive()
    }
}

impl ExchangeClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: ExchangeClientConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(ExchangeError::Configuration(
                "base url cannot be empty".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ExchangeError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_second(config.requests_per_second);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Validates an account before it is sent as a query parameter.
    ///
    /// Accounts are base58 wallet addresses.
    fn validate_account(account: &str) -> Result<&str> {
        let account = account.trim();
        if account.is_empty() {
            return Err(ExchangeError::InvalidAccount(
                "account cannot be empty".to_string(),
            ));
        }
        if !account.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ExchangeError::InvalidAccount(format!(
                "account must be alphanumeric: {account}"
            )));
        }
        if account.len() > 64 {
            return Err(ExchangeError::InvalidAccount(format!(
                "account exceeds maximum length of 64: {}",
                account.len()
            )));
        }
        Ok(account)
    }

    /// Waits for the rate limiter and makes a GET request.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Maps 429 and other non-2xx statuses to errors, then decodes the body.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Err(ExchangeError::RateLimit {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::api(status.as_u16(), body));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }

    // =========================================================================
    // Account Endpoints
    // =========================================================================

    /// Gets the open positions of an account.
    ///
    /// # Errors
    /// Returns error if the account is malformed, the request fails, or the
    /// exchange reports an unsuccessful response.
    pub async fn get_positions(&self, account: &str) -> Result<Vec<LivePosition>> {
        let account = Self::validate_account(account)?;
        let response: ApiResponse<Vec<RawPosition>> =
            self.get(POSITIONS_PATH, &[("account", account)]).await?;

        if !response.success {
            return Err(ExchangeError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "unsuccessful response".to_string()),
            ));
        }

        Ok(response
            .data
            .unwrap_or_default()
            .into_iter()
            .map(LivePosition::from)
            .collect())
    }
}

#[async_trait]
impl PositionSource for ExchangeClient {
    async fn positions(&self, account: &str) -> fight_exposure_core::Result<Vec<LivePosition>> {
        Ok(self.get_positions(account).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fight_exposure_core::{ExposureError, Side};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ACCOUNT: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    fn client_for(server: &MockServer) -> ExchangeClient {
        ExchangeClient::new(
            ExchangeClientConfig::default()
                .with_base_url(server.uri())
                .with_timeout_ms(500),
        )
        .unwrap()
    }

    // ==================== Config Tests ====================

    #[test]
    fn test_client_config_default() {
        let config = ExchangeClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.requests_per_second.get(), 20);
    }

    #[test]
    fn test_client_config_from_app_config() {
        let app = ExchangeConfig {
            api_url: "http://localhost:9000/".to_string(),
            timeout_ms: 100,
            requests_per_second: 0,
        };
        let config = ExchangeClientConfig::from_config(&app);
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.requests_per_second.get(), 1);
        assert_eq!(config.timeout_ms, 100);
    }

    #[test]
    fn test_validate_account() {
        assert!(ExchangeClient::validate_account(ACCOUNT).is_ok());
        assert!(ExchangeClient::validate_account("").is_err());
        assert!(ExchangeClient::validate_account("../admin").is_err());
        assert!(ExchangeClient::validate_account(&"a".repeat(65)).is_err());
    }

    // ==================== Mock Server Tests ====================

    #[tokio::test]
    async fn test_get_positions_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .and(query_param("account", ACCOUNT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": [
                    {"symbol": "BTC", "side": "bid", "amount": "0.005", "entry_price": "60000"},
                    {"symbol": "sol", "side": "ask", "amount": 2, "entry_price": 150.5}
                ],
                "error": null
            })))
            .mount(&server)
            .await;

        let positions = client_for(&server).get_positions(ACCOUNT).await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].notional(), dec!(300));
        assert_eq!(positions[1].symbol, "SOL");
        assert_eq!(positions[1].side, Some(Side::Sell));
        assert_eq!(positions[1].notional(), dec!(301));
    }

    #[tokio::test]
    async fn test_get_positions_empty_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": null
            })))
            .mount(&server)
            .await;

        let positions = client_for(&server).get_positions(ACCOUNT).await.unwrap();
        assert!(positions.is_empty());
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "data": null,
                "error": "account not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).get_positions(ACCOUNT).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Rejected(ref m) if m == "account not found"));
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_positions(ACCOUNT).await.unwrap_err();
        assert!(matches!(err, ExchangeError::RateLimit { retry_after_secs: 3 }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_positions(ACCOUNT).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Api { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "data": []}))
                    .set_delay(Duration::from_millis(1_500)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).get_positions(ACCOUNT).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_position_source_maps_to_exchange_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/positions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let source: &dyn PositionSource = &client;
        let err = source.positions(ACCOUNT).await.unwrap_err();
        assert!(matches!(err, ExposureError::ExchangeUnavailable(_)));
    }
}
