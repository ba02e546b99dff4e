use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub zoho_api_base: String,
    pub zoho_oauth_base: String,
    pub zoho_client_id: String,
    pub zoho_client_secret: String,
    pub zoho_refresh_token: String,
}

/// Returns true for values that are obviously unconfigured placeholders.
/// Running a resolution with placeholder credentials would abort every run
/// at token refresh, so these are rejected at startup instead.
pub fn is_placeholder(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let placeholders = ["your-", "xxx", "placeholder", "changeme"];
    let lower = value.to_lowercase();
    placeholders.iter().any(|p| lower.contains(p))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            zoho_api_base: std::env::var("ZOHO_API_BASE")
                .unwrap_or_else(|_| "https://www.zohoapis.eu".to_string())
                .trim_end_matches('/')
                .to_string(),
            zoho_oauth_base: std::env::var("ZOHO_OAUTH_BASE")
                .unwrap_or_else(|_| "https://accounts.zoho.eu".to_string())
                .trim_end_matches('/')
                .to_string(),
            zoho_client_id: std::env::var("ZOHO_CLIENT_ID")
                .map_err(|_| anyhow::anyhow!("ZOHO_CLIENT_ID environment variable required"))
                .and_then(|id| {
                    if is_placeholder(&id) {
                        anyhow::bail!("ZOHO_CLIENT_ID is empty or a placeholder");
                    }
                    Ok(id)
                })?,
            zoho_client_secret: std::env::var("ZOHO_CLIENT_SECRET")
                .map_err(|_| anyhow::anyhow!("ZOHO_CLIENT_SECRET environment variable required"))
                .and_then(|secret| {
                    if is_placeholder(&secret) {
                        anyhow::bail!("ZOHO_CLIENT_SECRET is empty or a placeholder");
                    }
                    Ok(secret)
                })?,
            zoho_refresh_token: std::env::var("ZOHO_REFRESH_TOKEN")
                .map_err(|_| anyhow::anyhow!("ZOHO_REFRESH_TOKEN environment variable required"))
                .and_then(|token| {
                    if is_placeholder(&token) {
                        anyhow::bail!("ZOHO_REFRESH_TOKEN is empty or a placeholder");
                    }
                    Ok(token)
                })?,
        };

        for base in [&config.zoho_api_base, &config.zoho_oauth_base] {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                anyhow::bail!("Zoho base URLs must start with http:// or https://");
            }
            url::Url::parse(base)
                .map_err(|e| anyhow::anyhow!("Invalid Zoho base URL {}: {}", base, e))?;
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Zoho API base: {}", config.zoho_api_base);
        tracing::debug!("Zoho OAuth base: {}", config.zoho_oauth_base);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("your-client-id"));
        assert!(is_placeholder("xxx"));
        assert!(is_placeholder("PLACEHOLDER_TOKEN"));
        assert!(is_placeholder("changeme"));
        assert!(!is_placeholder("1000.ABCDEF1234567890"));
    }
}
