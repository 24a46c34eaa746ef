/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `APP_BASE_URL`: Public origin used in invite links (default: http://localhost:8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 characters)
/// - `INVITE_TTL_HOURS`: Invite lifetime in hours, 1 to 8760 (default: 24)
/// - `RUST_LOG`: Log filter (default: hikkoshi_api=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use hikkoshi_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use hikkoshi_shared::membership::{policy::DEFAULT_INVITE_TTL_HOURS, InvitePolicy, PolicyError};
use serde::{Deserialize, Serialize};
use std::env;

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Invite configuration
    pub invite: InviteConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Public origin, used to build invite links
    pub base_url: String,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteConfig {
    /// Hours from issuance until an invite expires
    pub ttl_hours: i64,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_host = get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = get("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is not a valid port: {}", e))?;

        let base_url = get("APP_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", api_port))
            .trim_end_matches('/')
            .to_string();

        let cors_origins = parse_origins(&get("CORS_ORIGINS").unwrap_or_else(|| "*".to_string()));

        let production = match get("PRODUCTION") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| anyhow::anyhow!("PRODUCTION must be true or false, got {:?}", value))?,
            None => false,
        };

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = get("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let ttl_hours = get("INVITE_TTL_HOURS")
            .unwrap_or_else(|| DEFAULT_INVITE_TTL_HOURS.to_string())
            .parse::<i64>()?;

        InvitePolicy::from_hours(ttl_hours)
            .map_err(|e| anyhow::anyhow!("INVITE_TTL_HOURS: {}", e))?;

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                base_url,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            invite: InviteConfig { ttl_hours },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Expiry policy for newly issued invites
    pub fn invite_policy(&self) -> Result<InvitePolicy, PolicyError> {
        InvitePolicy::from_hours(self.invite.ttl_hours)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/hikkoshi"),
            ("JWT_SECRET", SECRET),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.invite.ttl_hours, 24);
        assert_eq!(config.invite_policy().unwrap().ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "3000"),
            ("APP_BASE_URL", "https://hikkoshi.example/"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("PRODUCTION", "true"),
            ("DATABASE_URL", "postgresql://localhost/hikkoshi"),
            ("JWT_SECRET", SECRET),
            ("INVITE_TTL_HOURS", "48"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.api.base_url, "https://hikkoshi.example");
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(config.api.production);
        assert_eq!(config.invite_policy().unwrap().ttl(), chrono::Duration::hours(48));
    }

    #[test]
    fn test_missing_required() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/hikkoshi")]).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgresql://localhost/hikkoshi"),
            ("JWT_SECRET", "too-short"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_ttl_rejected() {
        for ttl in ["0", "-5", "8761", "10000000000"] {
            let result = load(&[
                ("DATABASE_URL", "postgresql://localhost/hikkoshi"),
                ("JWT_SECRET", SECRET),
                ("INVITE_TTL_HOURS", ttl),
            ]);
            assert!(result.is_err(), "ttl {ttl} accepted");
        }
    }

    #[test]
    fn test_longest_ttl_still_produces_an_expiry() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/hikkoshi"),
            ("JWT_SECRET", SECRET),
            ("INVITE_TTL_HOURS", "8760"),
        ])
        .unwrap();

        let now = chrono::Utc::now();
        let expires_at = config.invite_policy().unwrap().expires_at(now).unwrap();
        assert_eq!(expires_at - now, chrono::Duration::days(365));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
