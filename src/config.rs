//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `JWT_SECRET` (required): HMAC key for signing session tokens
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 4000
/// - `NOWPAYMENTS_*` (optional): crypto payment provider settings
/// - `OLLAMA_*`, `AI_*` (optional): admin review assistant settings
/// - `ADMIN_EMAIL` / `ADMIN_PASSWORD` (optional): bootstrap admin user
/// - `FRONTEND_URL` (optional): CORS origin
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    pub jwt_secret: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: i64,

    #[serde(default = "default_nowpayments_api_url")]
    pub nowpayments_api_url: String,

    /// Without it, crypto payment creation answers 503.
    pub nowpayments_api_key: Option<String>,

    /// Without it, the IPN endpoint answers 503.
    pub nowpayments_ipn_secret: Option<String>,

    /// Public URL of `/api/payments/ipn/nowpayments`, sent to the provider.
    pub ipn_callback_url: Option<String>,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    /// Retries after the first attempt for AI provider calls.
    #[serde(default = "default_ai_max_retries")]
    pub ai_max_retries: u32,

    #[serde(default = "default_ai_timeout_secs")]
    pub ai_timeout_secs: u64,

    pub admin_email: Option<String>,

    pub admin_password: Option<String>,

    /// Browser origin allowed by CORS. Any origin when unset.
    pub frontend_url: Option<String>,
}

fn default_port() -> u16 {
    4000
}

fn default_max_connections() -> u32 {
    5
}

fn default_jwt_expiry_hours() -> i64 {
    24
}

fn default_nowpayments_api_url() -> String {
    "https://api.nowpayments.io/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_ai_max_retries() -> u32 {
    3
}

fn default_ai_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL, JWT_SECRET)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }

    /// Build configuration from explicit `(NAME, value)` pairs.
    pub fn from_iter<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// Admin bootstrap credentials, when both halves are present.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email.as_str(), password.as_str()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let config = Config::from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.server_port, 4000);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.jwt_expiry_hours, 24);
        assert_eq!(config.ai_max_retries, 3);
        assert_eq!(config.nowpayments_api_url, "https://api.nowpayments.io/v1");
        assert!(config.nowpayments_ipn_secret.is_none());
        assert!(config.admin_credentials().is_none());
    }

    #[test]
    fn missing_jwt_secret_is_an_error() {
        let result = Config::from_iter(vars(&[("DATABASE_URL", "postgres://localhost/ledger")]));
        assert!(result.is_err());
    }

    #[test]
    fn admin_credentials_need_both_parts() {
        let config = Config::from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("JWT_SECRET", "secret"),
            ("ADMIN_EMAIL", "ops@advancia.test"),
        ]))
        .unwrap();
        assert!(config.admin_credentials().is_none());

        let config = Config::from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("JWT_SECRET", "secret"),
            ("ADMIN_EMAIL", "ops@advancia.test"),
            ("ADMIN_PASSWORD", "hunter2hunter2"),
            ("SERVER_PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(
            config.admin_credentials(),
            Some(("ops@advancia.test", "hunter2hunter2"))
        );
        assert_eq!(config.server_port, 8080);
    }
}
