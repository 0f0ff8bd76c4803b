//! Application configuration: TOML file, `WARDEN_*` environment overrides,
//! validation.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use warden_auth::roles::RolePolicy;
use warden_auth::secrets::ConfigLookup;
use warden_auth::token::TokenTtl;

/// Environment variable naming the TOML file to load.
pub const CONFIG_PATH_ENV: &str = "WARDEN_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub policy: PolicyConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Access-token signing secret; `JWT_SECRET` is consulted when blank.
    pub jwt_secret: String,
    /// Refresh-token signing secret; `JWT_REFRESH_SECRET` is consulted when blank.
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub identity_cache_ttl_secs: u64,
    pub super_role: String,
    /// Role given to users whose stored role list is empty. Blank disables it.
    pub default_role: String,
    pub public_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Path to a model definition; the embedded model is used when unset.
    pub model_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/warden".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let ttl = TokenTtl::default();
        let roles = RolePolicy::default();
        Self {
            jwt_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl_secs: ttl.access.num_seconds(),
            refresh_ttl_secs: ttl.refresh.num_seconds(),
            identity_cache_ttl_secs: 120,
            super_role: roles.super_role.as_str().to_string(),
            default_role: roles
                .default_role
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            public_paths: warden_auth::authorize::DEFAULT_PUBLIC_PATHS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("refresh_secret", &redact(&self.refresh_secret))
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("identity_cache_ttl_secs", &self.identity_cache_ttl_secs)
            .field("super_role", &self.super_role)
            .field("default_role", &self.default_role)
            .field("public_paths", &self.public_paths)
            .finish()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> TokenTtl {
        TokenTtl::from_secs(self.access_ttl_secs, self.refresh_ttl_secs)
    }

    pub fn identity_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.identity_cache_ttl_secs)
    }

    pub fn role_policy(&self) -> RolePolicy {
        RolePolicy::new(self.super_role.clone(), self.default_role.clone())
    }
}

impl AppConfig {
    /// Load from `path` (or defaults), then apply process environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, |name| std::env::var(name).ok())
    }

    /// Load from the file named by `WARDEN_CONFIG`, if any.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.trim().is_empty());
        Self::load(path.as_deref().map(Path::new))
    }

    pub fn load_with_env<F>(config_path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides(env);
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("WARDEN_SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env("WARDEN_SERVER_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Some(v) = env("WARDEN_DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = env("WARDEN_DATABASE_MAX_CONNECTIONS")
            && let Ok(n) = v.parse()
        {
            self.database.max_connections = n;
        }
        if let Some(v) = env("WARDEN_AUTH_ACCESS_TTL_SECS")
            && let Ok(n) = v.parse()
        {
            self.auth.access_ttl_secs = n;
        }
        if let Some(v) = env("WARDEN_AUTH_REFRESH_TTL_SECS")
            && let Ok(n) = v.parse()
        {
            self.auth.refresh_ttl_secs = n;
        }
        if let Some(v) = env("WARDEN_AUTH_IDENTITY_CACHE_TTL_SECS")
            && let Ok(n) = v.parse()
        {
            self.auth.identity_cache_ttl_secs = n;
        }
        if let Some(v) = env("WARDEN_AUTH_DEFAULT_ROLE") {
            self.auth.default_role = v;
        }
        if let Some(v) = env("WARDEN_POLICY_MODEL_PATH") {
            self.policy.model_path = Some(v).filter(|p| !p.trim().is_empty());
        }
        if let Some(v) = env("WARDEN_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = env("WARDEN_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be non-zero".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be non-zero".to_string(),
            ));
        }
        if self.auth.access_ttl_secs <= 0 || self.auth.refresh_ttl_secs <= 0 {
            return Err(ConfigError::Validation(
                "auth.access_ttl_secs and auth.refresh_ttl_secs must be positive".to_string(),
            ));
        }
        if self.auth.super_role.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.super_role must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ConfigLookup for AppConfig {
    fn lookup(&self, key: &str) -> Option<String> {
        let value = match key {
            "auth.jwt_secret" => &self.auth.jwt_secret,
            "auth.refresh_secret" => &self.auth.refresh_secret,
            "auth.super_role" => &self.auth.super_role,
            "auth.default_role" => &self.auth.default_role,
            "database.url" => &self.database.url,
            "server.host" => &self.server.host,
            "log.level" => &self.log.level,
            "policy.model_path" => return self.policy.model_path.clone(),
            _ => return None,
        };
        Some(value.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
