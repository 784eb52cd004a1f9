use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "PORTAL";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub user_pool_id: String,
    pub user_pool_client_id: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub graphql_endpoint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 0,
        }
    }
}

impl AppConfig {
    /// Loads `config.toml` (if present) and the `PORTAL__*` environment.
    ///
    /// Fails when any required identity or API value is absent, so callers
    /// should run this once at startup and refuse to continue on error.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR),
            );

        Self::from_builder(builder)
    }

    /// Same layering as [`AppConfig::load`], reading variables from `vars`
    /// instead of the process environment.
    pub fn from_env_map(vars: config::Map<String, String>) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .source(Some(vars)),
        );

        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("identity.user_pool_id", &self.identity.user_pool_id),
            ("identity.user_pool_client_id", &self.identity.user_pool_client_id),
            ("identity.region", &self.identity.region),
            ("api.graphql_endpoint", &self.api.graphql_endpoint),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::Message(format!(
                "Missing required configuration values: {}",
                missing.join(", ")
            )));
        }

        let endpoint = self.api.graphql_endpoint.trim();
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(ConfigError::Message(format!(
                "GraphQL endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        if endpoint.starts_with("http://") {
            tracing::warn!("GraphQL endpoint is not using TLS: {}", endpoint);
        }

        if self.upload.max_file_size_bytes == 0 {
            return Err(ConfigError::Message(
                "Max file size must be greater than 0".to_string(),
            ));
        }

        if self.storage.bucket_name.is_none() {
            tracing::debug!("No asset storage bucket configured");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required_vars() -> config::Map<String, String> {
        let mut vars = config::Map::new();
        vars.insert(
            "PORTAL__IDENTITY__USER_POOL_ID".to_string(),
            "us-east-1_AbCdEf123".to_string(),
        );
        vars.insert(
            "PORTAL__IDENTITY__USER_POOL_CLIENT_ID".to_string(),
            "4h2kq8example".to_string(),
        );
        vars.insert("PORTAL__IDENTITY__REGION".to_string(), "us-east-1".to_string());
        vars.insert(
            "PORTAL__API__GRAPHQL_ENDPOINT".to_string(),
            "https://api.example.com/graphql".to_string(),
        );
        vars
    }

    #[test]
    fn test_loads_required_values() {
        let config = AppConfig::from_env_map(required_vars()).expect("config should load");

        assert_eq!(config.identity.user_pool_id, "us-east-1_AbCdEf123");
        assert_eq!(config.identity.region, "us-east-1");
        assert_eq!(config.api.graphql_endpoint, "https://api.example.com/graphql");
        assert!(config.storage.bucket_name.is_none());
        assert_eq!(config.upload.max_file_size_bytes, 5 * 1024 * 1024);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.retry_delay_ms, 0);
    }

    #[test]
    fn test_optional_and_tunable_values() {
        let mut vars = required_vars();
        vars.insert(
            "PORTAL__STORAGE__BUCKET_NAME".to_string(),
            "portal-assets".to_string(),
        );
        vars.insert(
            "PORTAL__UPLOAD__MAX_FILE_SIZE_BYTES".to_string(),
            "1048576".to_string(),
        );
        vars.insert("PORTAL__RETRY__MAX_RETRIES".to_string(), "4".to_string());

        let config = AppConfig::from_env_map(vars).expect("config should load");

        assert_eq!(config.storage.bucket_name.as_deref(), Some("portal-assets"));
        assert_eq!(config.upload.max_file_size_bytes, 1_048_576);
        assert_eq!(config.retry.max_retries, 4);
    }

    #[test]
    fn test_missing_required_value_fails() {
        let mut vars = required_vars();
        vars.remove("PORTAL__API__GRAPHQL_ENDPOINT");

        assert!(AppConfig::from_env_map(vars).is_err());
    }

    #[test]
    fn test_blank_required_value_fails() {
        let mut vars = required_vars();
        vars.insert("PORTAL__IDENTITY__REGION".to_string(), "  ".to_string());

        let err = AppConfig::from_env_map(vars).unwrap_err();
        assert!(err.to_string().contains("identity.region"));
    }

    #[test]
    fn test_endpoint_must_be_url() {
        let mut vars = required_vars();
        vars.insert(
            "PORTAL__API__GRAPHQL_ENDPOINT".to_string(),
            "api.example.com/graphql".to_string(),
        );

        assert!(AppConfig::from_env_map(vars).is_err());
    }

    #[test]
    fn test_zero_max_file_size_fails() {
        let mut vars = required_vars();
        vars.insert(
            "PORTAL__UPLOAD__MAX_FILE_SIZE_BYTES".to_string(),
            "0".to_string(),
        );

        assert!(AppConfig::from_env_map(vars).is_err());
    }
}
