//! First Iraqi Bank (FIB) online-shop provider implementation
//!
//! Authenticates with OAuth2 client credentials and keeps the bearer token in
//! an injected cache keyed by environment, so every process sharing that
//! cache reuses one token. A 401 from any payment endpoint drops the cached
//! token, re-authenticates and retries the request once.

use crate::cache::keys::provider::AccessTokenKey;
use crate::cache::Cache;
use crate::error::{AppError, AppErrorKind, AppResult, ExternalError, ProviderOperation};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    CreatedPayment, MonetaryValue, PaymentRequest, ProviderPaymentStatus,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const PROVIDER: &str = "FIB";
const TOKEN_PATH: &str = "/auth/realms/fib-online-shop/protocol/openid-connect/token";
const PAYMENTS_PATH: &str = "/protected/v1/payments";

/// Token lifetime assumed when the identity endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;
/// Tokens are evicted this long before the provider expires them
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 300;
/// Never cache a token for less than this
const MIN_TOKEN_TTL_SECS: u64 = 300;

/// FIB deployment the client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FibEnvironment {
    Dev,
    #[default]
    Stage,
    Prod,
}

impl FibEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            FibEnvironment::Dev => "dev",
            FibEnvironment::Stage => "stage",
            FibEnvironment::Prod => "prod",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            FibEnvironment::Dev => "https://fib.dev.fib.iq",
            FibEnvironment::Stage => "https://fib.stage.fib.iq",
            FibEnvironment::Prod => "https://fib.fib.iq",
        }
    }
}

impl fmt::Display for FibEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FibEnvironment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(FibEnvironment::Dev),
            "stage" => Ok(FibEnvironment::Stage),
            "prod" => Ok(FibEnvironment::Prod),
            other => Err(AppError::configuration(format!(
                "FIB_ENVIRONMENT must be one of dev, stage, prod; got '{}'",
                other
            ))),
        }
    }
}

/// FIB provider configuration
#[derive(Debug, Clone)]
pub struct FibConfig {
    pub environment: FibEnvironment,
    /// Overrides the environment's base URL (proxies, test servers)
    pub base_url: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    /// Where FIB posts status callbacks
    pub callback_url: String,
    pub currency: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Skip TLS certificate verification. Insecure; explicit opt-in only.
    pub accept_invalid_certs: bool,
}

impl Default for FibConfig {
    fn default() -> Self {
        Self {
            environment: FibEnvironment::default(),
            base_url: None,
            client_id: String::new(),
            client_secret: String::new(),
            callback_url: String::new(),
            currency: "IQD".to_string(),
            timeout_secs: 30,
            accept_invalid_certs: false,
        }
    }
}

impl FibConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    AppError::configuration(format!("{} environment variable is required", name))
                })
        };

        let environment = match std::env::var("FIB_ENVIRONMENT") {
            Ok(value) => value.parse()?,
            Err(_) => FibEnvironment::default(),
        };

        let base_url = std::env::var("FIB_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let currency = std::env::var("FIB_CURRENCY").unwrap_or_else(|_| "IQD".to_string());

        let timeout_secs = std::env::var("FIB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let accept_invalid_certs = std::env::var("FIB_ACCEPT_INVALID_CERTS")
            .ok()
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            environment,
            base_url,
            client_id: required("FIB_CLIENT_ID")?,
            client_secret: required("FIB_CLIENT_SECRET")?,
            callback_url: required("FIB_CALLBACK_URL")?,
            currency,
            timeout_secs,
            accept_invalid_certs,
        })
    }

    /// Effective base URL, without a trailing slash
    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

/// How long to cache a token the provider says lives `expires_in` seconds
pub fn token_ttl(expires_in: Option<u64>) -> Duration {
    let lifetime = expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Duration::from_secs(
        lifetime
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS)
            .max(MIN_TOKEN_TTL_SECS),
    )
}

/// FIB payment provider
pub struct FibProvider {
    config: FibConfig,
    client: Client,
    tokens: Arc<dyn Cache<String>>,
    token_key: String,
}

impl FibProvider {
    /// Create a provider whose bearer token lives in `tokens`
    pub fn new(config: FibConfig, tokens: Arc<dyn Cache<String>>) -> Result<Self, AppError> {
        if config.accept_invalid_certs {
            warn!(
                environment = %config.environment,
                "TLS certificate verification is DISABLED for FIB requests"
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        let token_key = AccessTokenKey::new(PROVIDER, config.environment.as_str()).to_string();

        Ok(Self {
            config,
            client,
            tokens,
            token_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    /// Exchange client credentials for a bearer token and cache it
    pub async fn authenticate(&self) -> AppResult<String> {
        let form = serde_urlencoded::to_string([
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .map_err(|e| AppError::configuration(format!("Invalid FIB credentials: {}", e)))?;

        let response = self
            .client
            .post(self.url(TOKEN_PATH))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "FIB authentication failed");
            return Err(AppError::new(AppErrorKind::External(
                ExternalError::Authentication {
                    provider: PROVIDER.to_string(),
                    status: status.as_u16(),
                    body,
                },
            )));
        }

        let token: TokenResponse = parse_body(&body)?;
        let ttl = token_ttl(token.expires_in);

        if let Err(e) = self
            .tokens
            .set(&self.token_key, &token.access_token, Some(ttl))
            .await
        {
            warn!("Failed to cache FIB access token: {}", e);
        } else {
            info!(
                expires_in = ?token.expires_in,
                cached_for = ttl.as_secs(),
                "FIB token cached"
            );
        }

        Ok(token.access_token)
    }

    /// Cached token, or a fresh one when the cache has none
    async fn access_token(&self) -> AppResult<String> {
        match self.tokens.get(&self.token_key).await {
            Ok(Some(token)) => return Ok(token),
            Ok(None) => {}
            Err(e) => warn!("Failed to read cached FIB token, re-authenticating: {}", e),
        }
        self.authenticate().await
    }

    async fn invalidate_token(&self) {
        if let Err(e) = self.tokens.delete(&self.token_key).await {
            warn!("Failed to drop cached FIB token: {}", e);
        }
    }

    /// Send a bearer-authenticated request built by `build`.
    ///
    /// On 401 the cached token is discarded and the request is rebuilt with a
    /// fresh token and sent exactly once more. Whatever the second attempt
    /// returns is handed back, 401 included.
    async fn send_authorized<F>(&self, operation: ProviderOperation, build: F) -> AppResult<Response>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let token = self.access_token().await?;
        let response = build(&token).send().await.map_err(network_error)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(operation = %operation, "FIB rejected the bearer token, re-authenticating");
        self.invalidate_token().await;
        let token = self.authenticate().await?;

        build(&token).send().await.map_err(network_error)
    }
}

#[async_trait]
impl PaymentProvider for FibProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn currency(&self) -> &str {
        &self.config.currency
    }

    async fn create_payment(&self, request: PaymentRequest) -> AppResult<CreatedPayment> {
        info!(amount = %request.amount, currency = %self.config.currency, "Creating FIB payment");

        let body = CreatePaymentBody {
            monetary_value: MonetaryValue {
                amount: request.amount,
                currency: self.config.currency.clone(),
            },
            status_callback_url: &self.config.callback_url,
            description: &request.description,
        };
        let url = self.url(PAYMENTS_PATH);

        let response = self
            .send_authorized(ProviderOperation::Create, |token| {
                self.client.post(&url).bearer_auth(token).json(&body)
            })
            .await?;

        let created: CreatedPayment = expect_success(ProviderOperation::Create, response).await?;
        info!(payment_id = %created.payment_id, "FIB payment created");
        Ok(created)
    }

    async fn payment_status(&self, payment_id: &str) -> AppResult<ProviderPaymentStatus> {
        let url = self.url(&format!("{}/{}/status", PAYMENTS_PATH, payment_id));

        let response = self
            .send_authorized(ProviderOperation::Status, |token| {
                self.client.get(&url).bearer_auth(token)
            })
            .await?;

        let status: ProviderPaymentStatus =
            expect_success(ProviderOperation::Status, response).await?;
        info!(payment_id = %payment_id, status = %status.status, "FIB payment status fetched");
        Ok(status)
    }

    async fn cancel_payment(&self, payment_id: &str) -> AppResult<()> {
        let url = self.url(&format!("{}/{}/cancel", PAYMENTS_PATH, payment_id));

        let response = self
            .send_authorized(ProviderOperation::Cancel, |token| {
                self.client.post(&url).bearer_auth(token)
            })
            .await?;

        if response.status().is_success() {
            info!(payment_id = %payment_id, "FIB payment cancelled");
            return Ok(());
        }
        Err(request_failure(ProviderOperation::Cancel, response).await)
    }

    async fn refund_payment(&self, payment_id: &str) -> AppResult<()> {
        let url = self.url(&format!("{}/{}/refund", PAYMENTS_PATH, payment_id));

        let response = self
            .send_authorized(ProviderOperation::Refund, |token| {
                self.client.post(&url).bearer_auth(token)
            })
            .await?;

        // FIB accepts refunds asynchronously; only 202 means it took the request
        if response.status() == StatusCode::ACCEPTED {
            info!(payment_id = %payment_id, "FIB refund accepted");
            return Ok(());
        }
        Err(request_failure(ProviderOperation::Refund, response).await)
    }
}

fn network_error(e: reqwest::Error) -> AppError {
    error!("FIB request failed: {}", e);
    AppError::new(AppErrorKind::External(ExternalError::Network {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    }))
}

fn parse_body<T: DeserializeOwned>(body: &str) -> AppResult<T> {
    serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse FIB response: {}", e);
        AppError::new(AppErrorKind::External(ExternalError::InvalidResponse {
            provider: PROVIDER.to_string(),
            message: e.to_string(),
        }))
    })
}

async fn request_failure(operation: ProviderOperation, response: Response) -> AppError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    error!(operation = %operation, status, body = %body, "FIB request was rejected");
    AppError::new(AppErrorKind::External(ExternalError::ProviderRequest {
        provider: PROVIDER.to_string(),
        operation,
        status,
        body,
    }))
}

async fn expect_success<T: DeserializeOwned>(
    operation: ProviderOperation,
    response: Response,
) -> AppResult<T> {
    if !response.status().is_success() {
        return Err(request_failure(operation, response).await);
    }
    let body = response.text().await.map_err(network_error)?;
    parse_body(&body)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody<'a> {
    monetary_value: MonetaryValue,
    status_callback_url: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}
