use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub shortener: ShortenerConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
    /// JSON file used when `backend` is `File`
    pub mock_data_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    File,
}

impl DatabaseBackend {
    /// Parse a backend name, falling back to SQLite for anything unknown.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "file" | "mock" | "json" => DatabaseBackend::File,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres, file"
                );
                DatabaseBackend::Sqlite
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    /// Prefix used to build `shortUrl` in API responses
    pub base_url: String,
    pub code_length: usize,
    pub max_attempts: u32,
}

impl ShortenerConfig {
    pub const DEFAULT_CODE_LENGTH: usize = 6;
    pub const MAX_CODE_LENGTH: usize = 32;
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), short_code)
    }
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            code_length: Self::DEFAULT_CODE_LENGTH,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Jwt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
}

impl AuthConfig {
    pub fn disabled() -> Self {
        Self {
            mode: AuthMode::None,
            jwt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HS256 shared secret
    pub secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Empty means any origin is allowed
    pub allowed_origins: Vec<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut backend = DatabaseBackend::parse(&env_or("DATABASE_BACKEND", "sqlite"));
        if env_flag("USE_MOCK") {
            backend = DatabaseBackend::File;
        }

        let database_url = env_or("DATABASE_URL", "sqlite://./linkcrush.db?mode=rwc");
        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", "5")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
        let mock_data_file = env_or("MOCK_DATA_FILE", "./mock_urls.json");

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = env_or("API_PORT", "8080")
            .parse::<u16>()
            .context("API_PORT must be a valid port")?;

        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = env_or("REDIRECT_PORT", "3000")
            .parse::<u16>()
            .context("REDIRECT_PORT must be a valid port")?;

        let base_url = env_or("BASE_URL", "http://localhost:3000");
        let code_length = env_or("SHORT_CODE_LENGTH", "6")
            .parse::<usize>()
            .context("SHORT_CODE_LENGTH must be a positive integer")?;
        if code_length == 0 || code_length > ShortenerConfig::MAX_CODE_LENGTH {
            anyhow::bail!(
                "SHORT_CODE_LENGTH must be between 1 and {}",
                ShortenerConfig::MAX_CODE_LENGTH
            );
        }
        let max_attempts = env_or("SHORT_CODE_MAX_ATTEMPTS", "10")
            .parse::<u32>()
            .context("SHORT_CODE_MAX_ATTEMPTS must be a positive integer")?
            .max(1);

        let mut auth_mode = env_or("AUTH_MODE", "none").to_lowercase();
        if env_flag("DISABLE_AUTH") {
            auth_mode = "none".to_string();
        }

        let auth_mode = match auth_mode.as_str() {
            "none" => AuthMode::None,
            "jwt" => AuthMode::Jwt,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, jwt"
                );
                AuthMode::None
            }
        };

        let jwt = if matches!(auth_mode, AuthMode::Jwt) {
            let secret =
                std::env::var("JWT_SECRET").context("JWT_SECRET must be set when AUTH_MODE=jwt")?;
            Some(JwtConfig { secret })
        } else {
            None
        };

        let allowed_origins = env_or("CORS_ALLOWED_ORIGINS", "")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
                mock_data_file,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            shortener: ShortenerConfig {
                base_url,
                code_length,
                max_attempts,
            },
            auth: AuthConfig {
                mode: auth_mode,
                jwt,
            },
            cors: CorsConfig { allowed_origins },
        })
    }
}
