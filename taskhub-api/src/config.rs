/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 3000)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `STORAGE_BACKEND`: `postgres` or `memory` (default: postgres)
/// - `DATABASE_URL`: PostgreSQL connection string (required for postgres)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `RUN_MIGRATIONS`: Apply migrations at startup (default: true)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 chars)
/// - `JWT_EXPIRES_IN_HOURS`: Token lifetime (default: 168)
/// - `IDEMPOTENCY_TTL_HOURS`: Lifetime of stored responses (default: 24)
/// - `IDEMPOTENCY_CLAIM_TTL_SECS`: Lifetime of pending claims (default: 60)
/// - `IDEMPOTENCY_WAIT_TIMEOUT_MS`: Wait on a concurrent claim (default: 10000)
/// - `IDEMPOTENCY_POLL_INTERVAL_MS`: Poll interval while waiting (default: 25)
/// - `ARGON2_MEMORY_KIB`, `ARGON2_ITERATIONS`, `ARGON2_PARALLELISM`: Password
///   hashing cost (default: 65536 / 3 / 4)
/// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use taskhub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use taskhub_shared::{auth::password::HashCost, idempotency::IdempotencyConfig};

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    pub idempotency: IdempotencySettings,

    pub password: PasswordConfig,

    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Which persistence backend serves the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local storage, lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("Unknown STORAGE_BACKEND '{}' (expected postgres or memory)", other),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,

    /// PostgreSQL connection URL; empty for the memory backend
    pub url: String,

    pub max_connections: u32,

    pub run_migrations: bool,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be kept secret and at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub expires_in_hours: i64,
}

/// Idempotency coordinator timings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencySettings {
    pub ttl_hours: u64,

    pub claim_ttl_secs: u64,

    pub wait_timeout_ms: u64,

    pub poll_interval_ms: u64,
}

impl IdempotencySettings {
    pub fn coordinator_config(&self) -> IdempotencyConfig {
        IdempotencyConfig {
            ttl: Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60)),
            claim_ttl: Duration::from_secs(self.claim_ttl_secs),
            wait_timeout: Duration::from_millis(self.wait_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            claim_ttl_secs: 60,
            wait_timeout_ms: 10_000,
            poll_interval_ms: 25,
        }
    }
}

/// Argon2id cost used when hashing new passwords
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,

    pub iterations: u32,

    pub parallelism: u32,
}

impl PasswordConfig {
    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        let cost = HashCost::default();
        Self {
            memory_kib: cost.memory_kib,
            iterations: cost.iterations,
            parallelism: cost.parallelism,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`; anything but `json` means pretty
    ///
    /// Available before the rest of the configuration so tracing can start
    /// first.
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT").as_deref().map(str::trim) {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Reads an optional variable, falling back to `default` when unset
fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
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

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env_or("API_PORT", 3000u16)?;
        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        let backend = env_or("STORAGE_BACKEND", StorageBackend::Postgres)?;
        let database_url = match backend {
            StorageBackend::Postgres => env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };
        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", 10u32)?;
        let run_migrations = env_or("RUN_MIGRATIONS", true)?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_JWT_SECRET_LENGTH);
        }

        let expires_in_hours = env_or("JWT_EXPIRES_IN_HOURS", taskhub_shared::auth::jwt::DEFAULT_EXPIRATION_HOURS)?;
        if expires_in_hours <= 0 {
            anyhow::bail!("JWT_EXPIRES_IN_HOURS must be positive");
        }

        let defaults = IdempotencySettings::default();
        let idempotency = IdempotencySettings {
            ttl_hours: env_or("IDEMPOTENCY_TTL_HOURS", defaults.ttl_hours)?,
            claim_ttl_secs: env_or("IDEMPOTENCY_CLAIM_TTL_SECS", defaults.claim_ttl_secs)?,
            wait_timeout_ms: env_or("IDEMPOTENCY_WAIT_TIMEOUT_MS", defaults.wait_timeout_ms)?,
            poll_interval_ms: env_or("IDEMPOTENCY_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
        };

        let cost = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("ARGON2_MEMORY_KIB", cost.memory_kib)?,
            iterations: env_or("ARGON2_ITERATIONS", cost.iterations)?,
            parallelism: env_or("ARGON2_PARALLELISM", cost.parallelism)?,
        };

        let format = LogFormat::from_env();

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
                run_migrations,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expires_in_hours,
            },
            idempotency,
            password,
            logging: LoggingConfig { format },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: String::new(),
                max_connections: 10,
                run_migrations: false,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
                expires_in_hours: 168,
            },
            idempotency: IdempotencySettings::default(),
            password: PasswordConfig::default(),
            logging: LoggingConfig {
                format: LogFormat::Pretty,
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(test_config().bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert_eq!(" Memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(parse_origins("*"), vec!["*".to_string()]);
    }

    #[test]
    fn test_idempotency_settings_conversion() {
        let config = IdempotencySettings::default().coordinator_config();
        assert_eq!(config.ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.claim_ttl, Duration::from_secs(60));
        assert_eq!(config.wait_timeout, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_millis(25));
    }

    #[test]
    fn test_password_config_defaults_match_hash_cost() {
        assert_eq!(PasswordConfig::default().hash_cost(), HashCost::default());
    }

    #[test]
    fn test_jwt_secret_not_serialized() {
        let json = serde_json::to_value(test_config()).unwrap();
        assert!(json["jwt"].get("secret").is_none());
    }
}
