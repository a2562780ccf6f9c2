use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_DEV_SERVER_PORT: u16 = 8081;

/// Main configuration structure for the recommendation flow.
///
/// Resolved once at process start and handed to the components that need it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub completion: CompletionConfig,
    pub storage: StorageConfig,
    pub redis: RedisConfig,
    pub backend: BackendConfig,
    pub dev_server: DevServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
}

/// Settings for the hosted text-completion API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Bearer credential. Empty means every request will be rejected upstream.
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: i32,
    /// Unset by default: a hung call waits on the transport's own limits.
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Prefix applied to every key so several installs can share one Redis.
    pub namespace: String,
    pub default_ttl_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: u8,
    /// Taken from `REDIS_PASSWORD` (or `REDIS_PASS`); never written back out.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
    pub create_timeout_seconds: u64,
    pub recycle_timeout_seconds: u64,
}

/// Hosted backend-as-a-service holding user profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: String,
    pub profile_table: String,
}

/// Bundler port carried over from the app's environment. Not used by the flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevServerConfig {
    pub port: u16,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = [".env", "../.env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("MOSES_CONFIG_PATH").unwrap_or_else(|_| "moses.yaml".to_string());

        let mut config = Self::from_file_or_default(&config_path);
        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn from_file_or_default(config_path: &str) -> Self {
        if !Path::new(config_path).exists() {
            tracing::debug!("Config file not found at {} - using defaults", config_path);
            return Self::default();
        }

        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path);
                    config
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to read config file {}: {} - using defaults",
                    config_path,
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Unparseable numbers are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Completion API
        if let Some(api_key) = lookup("MOSES_API_KEY") {
            self.completion.api_key = api_key;
        }
        if let Some(model) = lookup("MOSES_MODEL") {
            self.completion.model = model;
        }
        if let Some(base_url) = lookup("MOSES_BASE_URL") {
            self.completion.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = lookup("MOSES_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.completion.timeout_seconds = Some(secs);
            }
        }

        // Storage
        if let Some(backend) = lookup("MOSES_STORAGE_BACKEND") {
            match backend.to_lowercase().as_str() {
                "redis" => self.storage.backend = StorageBackend::Redis,
                "memory" => self.storage.backend = StorageBackend::Memory,
                other => tracing::warn!("Unknown storage backend '{}', keeping default", other),
            }
        }
        if let Some(namespace) = lookup("MOSES_STORAGE_NAMESPACE") {
            self.storage.namespace = namespace;
        }

        // Redis
        if let Some(host) = lookup("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.redis.port = port_num;
            }
        }
        if let Some(db) = lookup("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.redis.database = db_num;
            }
        }
        if let Some(password) = lookup("REDIS_PASSWORD").or_else(|| lookup("REDIS_PASS")) {
            self.redis.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Some(pool_size) = lookup("MOSES_REDIS_POOL_SIZE") {
            if let Ok(size) = pool_size.parse() {
                self.redis.pool.max_size = size;
            }
        }

        // Hosted backend
        if let Some(url) = lookup("MOSES_BACKEND_URL") {
            self.backend.url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = lookup("MOSES_BACKEND_KEY") {
            self.backend.api_key = key;
        }
        if let Some(table) = lookup("MOSES_PROFILE_TABLE") {
            self.backend.profile_table = table;
        }

        if let Some(port) = lookup("MOSES_DEV_SERVER_PORT") {
            if let Ok(port_num) = port.parse() {
                self.dev_server.port = port_num;
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.completion.api_key.is_empty() {
            return Err("MOSES_API_KEY is empty; completion requests will be rejected".into());
        }

        let base = &self.completion.base_url;
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err("MOSES_BASE_URL must start with http:// or https://".into());
        }

        if self.storage.backend == StorageBackend::Redis && self.redis.port == 0 {
            return Err("Redis port cannot be 0".into());
        }

        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err("completion.temperature must be between 0.0 and 2.0".into());
        }

        Ok(())
    }

    /// Whether a hosted profile backend has been configured at all.
    pub fn has_backend(&self) -> bool {
        !self.backend.url.is_empty()
    }

    /// Get Redis URL, percent-encoding the password into the userinfo
    pub fn get_redis_url(&self) -> String {
        let base = format!(
            "redis://{}:{}/{}",
            self.redis.host, self.redis.port, self.redis.database
        );

        let Some(password) = self.redis.password.as_deref() else {
            return base;
        };

        match Url::parse(&base) {
            Ok(mut url) => {
                if url.set_password(Some(password)).is_err() {
                    tracing::warn!("Could not attach Redis password to {}", base);
                }
                url.to_string()
            }
            Err(e) => {
                tracing::warn!("Invalid Redis address {}: {}", base, e);
                base
            }
        }
    }

    /// Get pool timeout as Duration
    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.timeout_seconds)
    }

    /// Get pool create timeout as Duration
    pub fn get_pool_create_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.create_timeout_seconds)
    }

    /// Get pool recycle timeout as Duration
    pub fn get_pool_recycle_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.recycle_timeout_seconds)
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "moses".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.8,
            max_tokens: 600,
            timeout_seconds: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Redis,
            namespace: "moses".to_string(),
            default_ttl_seconds: None,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
            password: None,
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            timeout_seconds: 5,
            create_timeout_seconds: 5,
            recycle_timeout_seconds: 5,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            profile_table: "user_profiles".to_string(),
        }
    }
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DEV_SERVER_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_documented_fallbacks() {
        let cfg = Config::default();
        assert!(cfg.completion.api_key.is_empty());
        assert_eq!(cfg.completion.model, DEFAULT_MODEL);
        assert_eq!(cfg.completion.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.dev_server.port, DEFAULT_DEV_SERVER_PORT);
        assert!(cfg.completion.timeout().is_none());
        // An empty key is a warning, not a hard failure
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[
            ("MOSES_API_KEY", "sk-test"),
            ("MOSES_MODEL", "llama3-8b-8192"),
            ("MOSES_BASE_URL", "https://api.groq.com/openai/v1/"),
            ("MOSES_STORAGE_BACKEND", "Memory"),
            ("REDIS_PORT", "6380"),
            ("MOSES_DEV_SERVER_PORT", "19000"),
        ]));

        assert_eq!(cfg.completion.api_key, "sk-test");
        assert_eq!(cfg.completion.model, "llama3-8b-8192");
        assert_eq!(cfg.completion.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.redis.port, 6380);
        assert_eq!(cfg.dev_server.port, 19000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bad_numbers_keep_defaults() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[
            ("REDIS_PORT", "not-a-port"),
            ("MOSES_DEV_SERVER_PORT", "-1"),
            ("MOSES_STORAGE_BACKEND", "sqlite"),
        ]));
        assert_eq!(cfg.redis.port, 6379);
        assert_eq!(cfg.dev_server.port, DEFAULT_DEV_SERVER_PORT);
        assert_eq!(cfg.storage.backend, StorageBackend::Redis);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "completion:\n  model: custom-model\nstorage:\n  backend: memory\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.completion.model, "custom-model");
        assert_eq!(cfg.completion.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.redis.port, 6379);
    }

    #[test]
    fn test_redis_url_without_password() {
        let cfg = Config::default();
        assert_eq!(cfg.get_redis_url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_redis_password_comes_from_lookup_and_is_encoded() {
        let mut cfg = Config::default();
        cfg.apply_overrides(lookup_from(&[("REDIS_PASS", "p@ss/w:rd")]));
        assert_eq!(cfg.redis.password.as_deref(), Some("p@ss/w:rd"));

        let redis_url = cfg.get_redis_url();
        assert_eq!(redis_url, "redis://:p%40ss%2Fw%3Ard@localhost:6379/0");

        let parsed = Url::parse(&redis_url).unwrap();
        assert_eq!(parsed.host_str(), Some("localhost"));
        assert_eq!(parsed.port(), Some(6379));
        assert_eq!(parsed.path(), "/0");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut cfg = Config::default();
        cfg.completion.api_key = "sk-test".to_string();
        cfg.completion.base_url = "ftp://example.com".to_string();
        assert!(cfg.validate().is_err());
    }
}
