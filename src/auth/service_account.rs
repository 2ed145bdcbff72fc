use std::{
    path::Path,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use moka::future::Cache;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TokenSource;
use crate::api::ApiError;

pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before the server-side expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Fields of a service-account JSON key file used for the JWT bearer flow
#[derive(Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Credentials(format!("cannot read '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ApiError::Credentials(format!("'{}' is not a service account key: {e}", path.display()))
        })
    }

    /// Sign the RS256 assertion exchanged for an access token
    fn assertion(&self, scope: &str, now: i64) -> Result<String, ApiError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(|e| ApiError::Credentials(format!("invalid private key: {e}")))?;

        encode(&header, &claims, &key)
            .map_err(|e| ApiError::Auth(format!("failed to sign assertion: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "TokenResponse::default_expires_in")]
    expires_in: u64,
}

impl TokenResponse {
    const fn default_expires_in() -> u64 {
        3600
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    refresh_after: Instant,
}

/// Exchanges signed service-account assertions for OAuth2 access tokens
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    scope: String,
    client: Client,
    tokens: Cache<String, CachedToken>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, scope: impl Into<String>, client: Client) -> Self {
        let tokens = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(ASSERTION_LIFETIME_SECS as u64))
            .build();

        Self {
            key,
            scope: scope.into(),
            client,
            tokens,
        }
    }

    pub fn from_file(
        path: &Path,
        scope: impl Into<String>,
        client: Client,
    ) -> Result<Self, ApiError> {
        Ok(Self::new(ServiceAccountKey::from_file(path)?, scope, client))
    }

    async fn exchange(&self) -> Result<CachedToken, ApiError> {
        let assertion = self.key.assertion(&self.scope, Utc::now().timestamp())?;
        let requested_at = Instant::now();

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {description}", err.error),
                    None => err.error,
                },
                Err(_) => format!("{status}: {}", body.trim()),
            };
            return Err(ApiError::Auth(reason));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        debug!(
            "Obtained access token for {} (expires in {}s)",
            self.key.client_email, token.expires_in
        );

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            token: token.access_token,
            refresh_after: requested_at + lifetime,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, ApiError> {
        if let Some(cached) = self.tokens.get(&self.scope).await {
            if Instant::now() < cached.refresh_after {
                return Ok(cached.token);
            }
        }

        let fresh = self.exchange().await?;
        self.tokens.insert(self.scope.clone(), fresh.clone()).await;
        Ok(fresh.token)
    }
}
