//! Application configuration loaded from environment variables.
//!
//! Credentials and the optional signing secret are read once at startup
//! and kept in memory; nothing here is ever written back.

use crate::models::{Credentials, LoginSecret, TokenScheme};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Production API gateway for European vehicles.
pub const DEFAULT_BASE_URL: &str = "https://eu-snc-tsp-api-gw.zeekrlife.com";

/// Vehicle API paths, relative to the base URL.
pub mod endpoints {
    pub const LOGIN: &str = "/ms-user-auth/v1.0/auth/login";
    pub const TOKEN_REFRESH: &str = "/ms-user-auth/v1.0/auth/token/refresh";
    pub const VEHICLE_STATUS: &str = "/ms-vehicle-status/api/v1.0/vehicle/status/latest";
    pub const CHARGING_STATE: &str = "/ms-vehicle-status/api/v1.0/vehicle/status/qrvs";
    pub const CHARGE_PLAN: &str = "/ms-charge-manage/api/v1.0/charge/plan";
    pub const SOC_LIMIT: &str = "/ms-charge-manage/api/v1.0/charge/soc-limit";
    pub const TRAVEL_PLAN: &str = "/ms-vehicle-status/api/v1.0/vehicle/travel/plan";
    pub const SENTRY: &str = "/ms-vehicle-status/api/v1.0/vehicle/sentry/status";
    pub const VEHICLE_LIST: &str = "/ms-app-bff/api/v4.0/veh/vehicle-list";
    pub const REMOTE_CONTROL: &str = "/ms-remote-control/v1.0/remote-control/vehicle/control";
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Vehicle account ---
    /// VIN of the vehicle this bridge serves
    pub vin: String,
    /// Account email (login identifier)
    pub email: Option<String>,
    /// Account password, used when no pre-issued tokens are configured
    pub password: Option<String>,
    /// Pre-issued access token (captured from the mobile app)
    pub access_token: Option<String>,
    /// Pre-issued refresh token
    pub refresh_token: Option<String>,
    /// Which refresh cadence the issued tokens follow
    pub token_scheme: TokenScheme,

    // --- Vehicle API ---
    /// Base URL of the telematics gateway
    pub base_url: String,
    /// Shared HMAC secret for `X-SIGNATURE`; token-only auth when absent
    pub app_secret: Option<String>,
    /// Interval between scheduled snapshots
    pub poll_interval: Duration,
    /// Wait after a successful command before re-polling
    pub settle_delay: Duration,

    // --- Token storage ---
    /// Directory holding the per-account token files
    pub token_storage_dir: PathBuf,
    /// Key material for encrypting tokens at rest
    pub token_storage_key: Option<String>,

    // --- Bridge API ---
    /// Bearer token required on `/api/*` routes
    pub api_token: String,
    /// Server port
    pub port: u16,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            vin: "LZEKR7X0000000001".to_string(),
            email: Some("driver@example.com".to_string()),
            password: Some("test_password".to_string()),
            access_token: None,
            refresh_token: None,
            token_scheme: TokenScheme::Standard,
            base_url: "http://127.0.0.1:9".to_string(),
            app_secret: None,
            poll_interval: Duration::from_secs(15 * 60),
            settle_delay: Duration::ZERO,
            token_storage_dir: env::temp_dir().join("zeekr-bridge-test"),
            token_storage_key: None,
            api_token: "test_api_token".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let token_scheme = match env::var("ZEEKR_TOKEN_SCHEME") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("ZEEKR_TOKEN_SCHEME", raw))?,
            Err(_) => TokenScheme::Standard,
        };

        Ok(Self {
            vin: env::var("ZEEKR_VIN")
                .map(|v| v.trim().to_uppercase())
                .map_err(|_| ConfigError::Missing("ZEEKR_VIN"))?,
            email: optional_var("ZEEKR_EMAIL"),
            password: optional_var("ZEEKR_PASSWORD"),
            access_token: optional_var("ZEEKR_ACCESS_TOKEN"),
            refresh_token: optional_var("ZEEKR_REFRESH_TOKEN"),
            token_scheme,
            base_url: env::var("ZEEKR_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            app_secret: optional_var("ZEEKR_APP_SECRET"),
            poll_interval: Duration::from_secs(secs_var("POLL_INTERVAL_SECS", 15 * 60)),
            settle_delay: Duration::from_secs(secs_var("SETTLE_DELAY_SECS", 5)),
            token_storage_dir: env::var("TOKEN_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".zeekr-bridge")),
            token_storage_key: optional_var("TOKEN_STORAGE_KEY"),
            api_token: env::var("BRIDGE_API_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("BRIDGE_API_TOKEN"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    /// Build the login credentials for the configured account.
    ///
    /// A password wins over pre-issued tokens when both are present.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let secret = match (&self.password, &self.access_token) {
            (Some(password), _) => LoginSecret::Password(password.clone()),
            (None, Some(access_token)) => LoginSecret::Tokens {
                access_token: access_token.clone(),
                refresh_token: self.refresh_token.clone().unwrap_or_default(),
            },
            (None, None) => return Err(ConfigError::Missing("ZEEKR_PASSWORD or ZEEKR_ACCESS_TOKEN")),
        };

        if matches!(secret, LoginSecret::Password(_)) && self.email.is_none() {
            return Err(ConfigError::Missing("ZEEKR_EMAIL"));
        }

        Ok(Credentials {
            identifier: self.email.clone().unwrap_or_default(),
            secret,
            vin: self.vin.clone(),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs_var(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("ZEEKR_VIN", "lzekr7x0000000042");
        env::set_var("ZEEKR_EMAIL", "driver@example.com");
        env::set_var("ZEEKR_PASSWORD", "hunter2");
        env::set_var("BRIDGE_API_TOKEN", "bridge_token");
        env::set_var("ZEEKR_TOKEN_SCHEME", "long_lived");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.vin, "LZEKR7X0000000042");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.token_scheme, TokenScheme::LongLived);
        assert_eq!(config.poll_interval, Duration::from_secs(900));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn credentials_prefer_password() {
        let config = Config {
            access_token: Some("seeded".to_string()),
            ..Config::default()
        };
        let creds = config.credentials().unwrap();
        assert!(matches!(creds.secret, LoginSecret::Password(_)));
    }

    #[test]
    fn credentials_from_seeded_tokens() {
        let config = Config {
            email: None,
            password: None,
            access_token: Some("seeded_access".to_string()),
            refresh_token: Some("seeded_refresh".to_string()),
            ..Config::default()
        };
        let creds = config.credentials().unwrap();
        match creds.secret {
            LoginSecret::Tokens {
                access_token,
                refresh_token,
            } => {
                assert_eq!(access_token, "seeded_access");
                assert_eq!(refresh_token, "seeded_refresh");
            }
            LoginSecret::Password(_) => panic!("expected seeded tokens"),
        }
    }

    #[test]
    fn credentials_missing_secret() {
        let config = Config {
            password: None,
            access_token: None,
            ..Config::default()
        };
        assert!(matches!(
            config.credentials(),
            Err(ConfigError::Missing(_))
        ));
    }
}
