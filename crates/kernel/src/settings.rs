use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSHELF_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSHELF_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSHELF";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cors: CorsSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub security: SecuritySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// `BOOKSHELF_*` variables and finally the bare `HOST`/`PORT` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("cors.allowed_methods")
                    .with_list_parse_key("cors.allowed_headers")
                    .with_list_parse_key("security.allowed_api_keys"),
            )
            .set_override_option("server.host", std::env::var("HOST").ok())
            .with_context(|| "invalid HOST override")?
            .set_override_option("server.port", std::env::var("PORT").ok())
            .with_context(|| "invalid PORT override")?;

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The selected overlay wins over whatever the files declare.
        settings.environment = parsed_environment;

        Ok(settings)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// PostgreSQL connection parameters and pool bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_host")]
    pub host: String,
    #[serde(default = "DatabaseSettings::default_port")]
    pub port: u16,
    #[serde(default = "DatabaseSettings::default_user")]
    pub user: String,
    #[serde(default = "DatabaseSettings::default_password", skip_serializing)]
    pub password: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "DatabaseSettings::default_max_idle_connections")]
    pub max_idle_connections: u32,
    #[serde(default = "DatabaseSettings::default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "DatabaseSettings::default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl DatabaseSettings {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        5432
    }

    fn default_user() -> String {
        "postgres".to_string()
    }

    fn default_password() -> String {
        "postgres".to_string()
    }

    fn default_name() -> String {
        "bookshelf".to_string()
    }

    fn default_ssl_mode() -> String {
        "disable".to_string()
    }

    fn default_max_connections() -> u32 {
        25
    }

    fn default_max_idle_connections() -> u32 {
        5
    }

    fn default_acquire_timeout_secs() -> u64 {
        5
    }

    fn default_idle_timeout_secs() -> u64 {
        300
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            user: Self::default_user(),
            password: Self::default_password(),
            name: Self::default_name(),
            ssl_mode: Self::default_ssl_mode(),
            max_connections: Self::default_max_connections(),
            max_idle_connections: Self::default_max_idle_connections(),
            acquire_timeout_secs: Self::default_acquire_timeout_secs(),
            idle_timeout_secs: Self::default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsSettings {
    #[serde(default = "CorsSettings::default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "CorsSettings::default_allowed_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "CorsSettings::default_allowed_headers")]
    pub allowed_headers: Vec<String>,
}

impl CorsSettings {
    fn default_allowed_origins() -> Vec<String> {
        vec!["http://localhost:3000".to_string()]
    }

    fn default_allowed_methods() -> Vec<String> {
        ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_allowed_headers() -> Vec<String> {
        ["Origin", "Content-Type", "Accept", "X-API-Key", "X-Request-ID"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: Self::default_allowed_origins(),
            allowed_methods: Self::default_allowed_methods(),
            allowed_headers: Self::default_allowed_headers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
    /// Output format; when unset, production logs JSON and everything else
    /// logs human-readable lines.
    #[serde(default)]
    pub format: Option<LogFormat>,
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "ApiSettings::default_base_path")]
    pub base_path: String,
    #[serde(default = "ApiSettings::default_enable_docs")]
    pub enable_docs: bool,
    #[serde(default = "ApiSettings::default_docs_path")]
    pub docs_path: String,
}

impl ApiSettings {
    fn default_base_path() -> String {
        "/api/v1".to_string()
    }

    fn default_enable_docs() -> bool {
        true
    }

    fn default_docs_path() -> String {
        "/swagger-ui".to_string()
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_path: Self::default_base_path(),
            enable_docs: Self::default_enable_docs(),
            docs_path: Self::default_docs_path(),
        }
    }
}

/// Static API-key check and process-wide rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    #[serde(default)]
    pub enable_api_key: bool,
    #[serde(default = "SecuritySettings::default_api_key_header")]
    pub api_key_header: String,
    #[serde(default, skip_serializing)]
    pub allowed_api_keys: Vec<String>,
    #[serde(default = "SecuritySettings::default_enable_rate_limit")]
    pub enable_rate_limit: bool,
    #[serde(default = "SecuritySettings::default_rate_limit_rps")]
    pub rate_limit_rps: u32,
    #[serde(default = "SecuritySettings::default_rate_limit_burst")]
    pub rate_limit_burst: u32,
}

impl SecuritySettings {
    fn default_api_key_header() -> String {
        "X-API-Key".to_string()
    }

    fn default_enable_rate_limit() -> bool {
        true
    }

    fn default_rate_limit_rps() -> u32 {
        100
    }

    fn default_rate_limit_burst() -> u32 {
        200
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            enable_api_key: false,
            api_key_header: Self::default_api_key_header(),
            allowed_api_keys: Vec::new(),
            enable_rate_limit: Self::default_enable_rate_limit(),
            rate_limit_rps: Self::default_rate_limit_rps(),
            rate_limit_burst: Self::default_rate_limit_burst(),
        }
    }
}
