/// Configuration management for the API server
///
/// Configuration is read from environment variables, with a `.env` file
/// loaded first when present (for development).
///
/// # Environment Variables
///
/// | Variable                    | Default   | Notes                                 |
/// |-----------------------------|-----------|---------------------------------------|
/// | `API_HOST`                  | `0.0.0.0` |                                       |
/// | `API_PORT`                  | `8080`    |                                       |
/// | `CORS_ORIGINS`              | `*`       | comma separated                       |
/// | `DATABASE_URL`              | required  |                                       |
/// | `DATABASE_MAX_CONNECTIONS`  | `10`      |                                       |
/// | `JWT_ACCESS_SECRET`         | required  | at least 32 characters                |
/// | `JWT_REFRESH_SECRET`        | required  | at least 32 characters, not the same as the access secret |
/// | `ACCESS_TOKEN_TTL_MINUTES`  | `15`      |                                       |
/// | `REFRESH_TOKEN_TTL_DAYS`    | `7`       |                                       |
/// | `COOKIE_SECURE`             | `false`   | set `true` behind HTTPS               |
/// | `COMMENT_EDIT_WINDOW_HOURS` | `24`      |                                       |
///
/// # Example
///
/// ```no_run
/// use taskweave_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Listening on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use taskweave_shared::auth::jwt::TokenConfig;

/// Minimum length of each signing secret
const MIN_SECRET_LEN: usize = 32;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,

    /// How long a comment author may still edit it
    pub comment_edit_window: Duration,
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` means any
    pub cors_origins: Vec<String>,
}

/// Database settings
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token and cookie settings
#[derive(Clone)]
pub struct SessionConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,

    /// Mark session cookies `Secure`
    pub cookie_secure: bool,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl SessionConfig {
    /// Signing configuration for the token issuer
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            access_secret: self.access_secret.clone(),
            refresh_secret: self.refresh_secret.clone(),
            access_ttl: self.access_ttl,
            refresh_ttl: self.refresh_ttl,
        }
    }
}

impl Config {
    /// Loads configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or a secret is too weak.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&var, "API_PORT", 8080u16)?;
        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let access_secret = required_secret(&var, "JWT_ACCESS_SECRET")?;
        let refresh_secret = required_secret(&var, "JWT_REFRESH_SECRET")?;
        if access_secret == refresh_secret {
            anyhow::bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
        }

        let access_ttl_minutes = parse_or(&var, "ACCESS_TOKEN_TTL_MINUTES", 15i64)?;
        let refresh_ttl_days = parse_or(&var, "REFRESH_TOKEN_TTL_DAYS", 7i64)?;
        if access_ttl_minutes <= 0 || refresh_ttl_days <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }
        let access_ttl = duration(
            "ACCESS_TOKEN_TTL_MINUTES",
            Duration::try_minutes(access_ttl_minutes),
        )?;
        let refresh_ttl = duration("REFRESH_TOKEN_TTL_DAYS", Duration::try_days(refresh_ttl_days))?;
        if access_ttl >= refresh_ttl {
            anyhow::bail!("Access tokens must expire before refresh tokens");
        }

        let comment_edit_window_hours = parse_or(&var, "COMMENT_EDIT_WINDOW_HOURS", 24i64)?;
        if comment_edit_window_hours < 0 {
            anyhow::bail!("COMMENT_EDIT_WINDOW_HOURS must not be negative");
        }
        let comment_edit_window = duration(
            "COMMENT_EDIT_WINDOW_HOURS",
            Duration::try_hours(comment_edit_window_hours),
        )?;

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            session: SessionConfig {
                access_secret,
                refresh_secret,
                access_ttl,
                refresh_ttl,
                cookie_secure: parse_or(&var, "COOKIE_SECURE", false)?,
            },
            comment_edit_window,
        })
    }

    /// Gets the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", key, e)),
        None => Ok(default),
    }
}

fn duration(key: &str, value: Option<Duration>) -> anyhow::Result<Duration> {
    value.ok_or_else(|| anyhow::anyhow!("{} is out of range", key))
}

fn required_secret<F>(var: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = var(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))?;

    if secret.len() < MIN_SECRET_LEN {
        anyhow::bail!("{} must be at least {} characters long", key, MIN_SECRET_LEN);
    }

    Ok(secret)
}
