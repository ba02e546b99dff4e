use crate::config::Config;
use crate::errors::AppError;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Credential provider for the CRM record store.
///
/// Holds the OAuth2 refresh token and exchanges it for short-lived access
/// tokens on demand. The current access token is cached until shortly before
/// expiry; callers never see the refresh machinery. Injected into
/// [`ZohoClient`](crate::zoho_client::ZohoClient) so there is no global
/// mutable credential state.
#[derive(Clone)]
pub struct TokenProvider {
    client: reqwest::Client,
    oauth_base: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenProvider {
    pub fn new(
        oauth_base: String,
        client_id: String,
        client_secret: String,
        refresh_token: String,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::CredentialFailure(format!("Failed to create OAuth client: {}", e))
            })?;

        Ok(Self {
            client,
            oauth_base,
            client_id,
            client_secret,
            refresh_token,
            cached: Arc::new(RwLock::new(None)),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.zoho_oauth_base.clone(),
            config.zoho_client_id.clone(),
            config.zoho_client_secret.clone(),
            config.zoho_refresh_token.clone(),
        )
    }

    /// Returns a valid access token, refreshing it when the cached one has
    /// expired. Any failure is a `CredentialFailure`: the engine must not
    /// proceed to mutate records without credentials.
    pub async fn access_token(&self) -> Result<String, AppError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Utc::now() < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, AppError> {
        let mut guard = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = guard.as_ref() {
            if Utc::now() < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let url = format!("{}/oauth/v2/token", self.oauth_base);
        tracing::debug!("Refreshing CRM access token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::CredentialFailure(format!("Token request failed: {}", e)))?;

        let result: serde_json::Value = response.json().await.map_err(|e| {
            AppError::CredentialFailure(format!("Failed to parse token response: {}", e))
        })?;

        if let Some(access_token) = result.get("access_token").and_then(|v| v.as_str()) {
            let expires_in = result
                .get("expires_in")
                .and_then(|v| v.as_i64())
                .unwrap_or(3600);
            let expires_at = Utc::now() + Duration::seconds(expires_in - EXPIRY_BUFFER_SECS);
            tracing::info!("CRM token refreshed, expires in {}s", expires_in);

            *guard = Some(CachedToken {
                access_token: access_token.to_string(),
                expires_at,
            });
            Ok(access_token.to_string())
        } else {
            let error = result
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let message = match error {
                "invalid_client" => "invalid client_id or client_secret".to_string(),
                "invalid_code" => "refresh token expired or invalid".to_string(),
                other => format!("token refresh rejected: {}", other),
            };
            tracing::error!("CRM token refresh failed: {}", message);
            Err(AppError::CredentialFailure(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = TokenProvider::new(
            "https://accounts.zoho.eu".to_string(),
            "client".to_string(),
            "secret".to_string(),
            "refresh".to_string(),
        );
        assert!(provider.is_ok());
    }
}
