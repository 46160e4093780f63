use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    /// Public origin of the redirect server, used to build short URLs
    pub redirect_base_url: String,
    /// Where the redirect server sends visitors it cannot serve
    pub app_root_url: String,
    pub auth: AuthConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Jwt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// User id every request acts as when `mode` is `None`
    pub dev_user_id: String,
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret shared with the session issuer
    pub secret: String,
    #[serde(default)]
    pub issuer: Option<String>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Server-side salt mixed into visitor fingerprints
    pub ip_hash_salt: String,
    #[serde(default = "AnalyticsConfig::default_dedup_window_hours")]
    pub dedup_window_hours: u64,
}

impl std::fmt::Debug for AnalyticsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsConfig")
            .field("ip_hash_salt", &"<redacted>")
            .field("dedup_window_hours", &self.dedup_window_hours)
            .finish()
    }
}

impl AnalyticsConfig {
    const DEFAULT_SALT: &'static str = "default-salt";

    const SECONDS_PER_HOUR: u64 = 60 * 60;

    /// Largest window whose length in seconds still fits a unix timestamp
    pub const MAX_DEDUP_WINDOW_HOURS: u64 = i64::MAX as u64 / Self::SECONDS_PER_HOUR;

    const fn default_dedup_window_hours() -> u64 {
        24
    }

    pub fn dedup_window(&self) -> Duration {
        let hours = self.dedup_window_hours.min(Self::MAX_DEDUP_WINDOW_HOURS);
        Duration::from_secs(hours * Self::SECONDS_PER_HOUR)
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            ip_hash_salt: Self::DEFAULT_SALT.to_string(),
            dedup_window_hours: Self::default_dedup_window_hours(),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_dedup_window_hours(raw: Option<&str>) -> anyhow::Result<u64> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(AnalyticsConfig::default_dedup_window_hours());
    };
    let hours = raw
        .parse::<u64>()
        .context("DEDUP_WINDOW_HOURS must be a whole number of hours")?;
    if hours > AnalyticsConfig::MAX_DEDUP_WINDOW_HOURS {
        anyhow::bail!(
            "DEDUP_WINDOW_HOURS must be at most {}",
            AnalyticsConfig::MAX_DEDUP_WINDOW_HOURS
        );
    }
    Ok(hours)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = env_or("DATABASE_URL", "sqlite://./clicktrail.db?mode=rwc");
        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", "5")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = env_or("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a valid port")?;

        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = env_or("REDIRECT_PORT", "3000")
            .parse::<u16>()
            .context("REDIRECT_PORT must be a valid port")?;

        let redirect_base_url = env_or("REDIRECT_BASE_URL", "http://localhost:3000")
            .trim_end_matches('/')
            .to_string();
        let app_root_url = env_or("APP_ROOT_URL", "http://localhost:8080/");

        let auth_mode = match env_or("AUTH_MODE", "none").to_lowercase().as_str() {
            "none" => AuthMode::None,
            "jwt" => AuthMode::Jwt,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, jwt"
                );
                AuthMode::None
            }
        };

        let jwt = if auth_mode == AuthMode::Jwt {
            let secret =
                std::env::var("JWT_SECRET").context("JWT_SECRET must be set when AUTH_MODE=jwt")?;
            Some(JwtConfig {
                secret,
                issuer: std::env::var("JWT_ISSUER").ok(),
            })
        } else {
            None
        };

        let ip_hash_salt = std::env::var("IP_HASH_SALT").unwrap_or_else(|_| {
            tracing::warn!("IP_HASH_SALT is not set, visitor fingerprints use the default salt");
            AnalyticsConfig::DEFAULT_SALT.to_string()
        });
        let dedup_window_hours =
            parse_dedup_window_hours(std::env::var("DEDUP_WINDOW_HOURS").ok().as_deref())?;

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            redirect_base_url,
            app_root_url,
            auth: AuthConfig {
                mode: auth_mode,
                dev_user_id: env_or("AUTH_DEV_USER", "local-user"),
                jwt,
            },
            analytics: AnalyticsConfig {
                ip_hash_salt,
                dedup_window_hours,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_window_defaults_to_a_day() {
        assert_eq!(parse_dedup_window_hours(None).unwrap(), 24);
        assert_eq!(parse_dedup_window_hours(Some(" ")).unwrap(), 24);
        assert_eq!(parse_dedup_window_hours(Some("6")).unwrap(), 6);
        assert_eq!(
            AnalyticsConfig::default().dedup_window(),
            Duration::from_secs(24 * 60 * 60)
        );
    }

    #[test]
    fn oversized_dedup_window_is_rejected() {
        assert!(parse_dedup_window_hours(Some("18446744073709551615")).is_err());
        assert!(parse_dedup_window_hours(Some("-1")).is_err());
        assert!(parse_dedup_window_hours(Some("a day")).is_err());

        let max = AnalyticsConfig::MAX_DEDUP_WINDOW_HOURS.to_string();
        assert!(parse_dedup_window_hours(Some(&max)).is_ok());
    }

    #[test]
    fn dedup_window_clamps_instead_of_overflowing() {
        let config = AnalyticsConfig {
            ip_hash_salt: "salt".into(),
            dedup_window_hours: u64::MAX,
        };
        let window = config.dedup_window();
        assert!(window.as_secs() <= i64::MAX as u64);
        assert_eq!(
            window.as_secs(),
            AnalyticsConfig::MAX_DEDUP_WINDOW_HOURS * 60 * 60
        );
    }
}
