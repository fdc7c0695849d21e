use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_ssm::Client as SsmClient;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{Collection, StorageBackend};

const ENV_PREFIX: &str = "KITCHEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    #[error("AWS SDK error: {source}")]
    AwsSdk {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Environment variable missing: {name}")]
    MissingEnvironmentVariable { name: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub observability: ObservabilityConfig,
    /// Present when the DynamoDB backend or Parameter Store is in use
    pub aws: Option<AwsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub storage_backend: StorageBackend,
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the DynamoDB endpoint, e.g. DynamoDB Local
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_services_table")]
    pub services_table: String,
    #[serde(default = "default_reviews_table")]
    pub reviews_table: String,
    #[serde(default = "default_food_table")]
    pub food_table: String,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_access_token_secret")]
    pub access_token_secret: Option<String>,
    /// Parameter Store name holding the signing secret; wins over the plain value
    #[serde(default)]
    pub access_token_secret_parameter: Option<String>,
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
    pub parameter_store: Arc<ParameterStoreConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_enable_json_logging")]
    pub enable_json_logging: bool,
}

pub struct ParameterStoreConfig {
    ssm_client: SsmClient,
    cache: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStoreConfig")
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_size", &"<runtime>")
            .finish()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "access_token_secret",
                &self.access_token_secret.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "access_token_secret_parameter",
                &self.access_token_secret_parameter,
            )
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let database = DatabaseConfig::from_env()?;
        let mut auth = AuthConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;

        let needs_aws = database.storage_backend == StorageBackend::DynamoDb
            || auth.access_token_secret_parameter.is_some();

        let aws = if needs_aws {
            Some(AwsConfig::load(&database).await)
        } else {
            None
        };

        if let (Some(parameter), Some(aws)) = (auth.access_token_secret_parameter.clone(), &aws)
        {
            info!(parameter = %parameter, "Fetching access token secret from Parameter Store");
            auth.access_token_secret = Some(aws.parameter_store.get_parameter(&parameter).await?);
        }

        let config = Config {
            server,
            database,
            auth,
            observability,
            aws,
        };

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!("Configuration: {:?}", config);

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        info!("Validating configuration");

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Server port cannot be 0".to_string(),
            });
        }

        if self.server.max_request_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "Max request size cannot be 0".to_string(),
            });
        }

        let tables = [
            &self.database.services_table,
            &self.database.reviews_table,
            &self.database.food_table,
        ];
        if tables.iter().any(|table| table.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: "Table names cannot be empty".to_string(),
            });
        }
        if tables[0] == tables[1] || tables[0] == tables[2] || tables[1] == tables[2] {
            return Err(ConfigError::ValidationError {
                message: "Each collection needs its own table".to_string(),
            });
        }

        match self.auth.access_token_secret.as_deref() {
            None => {
                return Err(ConfigError::MissingEnvironmentVariable {
                    name: format!("{}_ACCESS_TOKEN_SECRET", ENV_PREFIX),
                })
            }
            Some(secret) if secret.is_empty() => {
                return Err(ConfigError::ValidationError {
                    message: "Access token secret cannot be empty".to_string(),
                })
            }
            Some(_) => {}
        }

        if self.auth.token_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "Token TTL cannot be 0".to_string(),
            });
        }

        info!("Configuration validation completed");
        Ok(())
    }

    /// The signing secret; present once the configuration has been validated
    pub fn access_token_secret(&self) -> &str {
        self.auth.access_token_secret.as_deref().unwrap_or_default()
    }
}

impl AwsConfig {
    async fn load(database: &DatabaseConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(database.region.clone()));

        if let Some(endpoint_url) = &database.endpoint_url {
            info!(endpoint = %endpoint_url, "Using custom DynamoDB endpoint");
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = loader.load().await;

        let dynamodb_client = DynamoDbClient::new(&sdk_config);
        let ssm_client = SsmClient::new(&sdk_config);
        let parameter_store = Arc::new(ParameterStoreConfig::new(
            ssm_client,
            Duration::from_secs(5 * 60),
        ));

        Self {
            region: database.region.clone(),
            dynamodb_client,
            parameter_store,
        }
    }
}

fn load_section<T: DeserializeOwned>(section: &str) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("server")
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("database")
    }

    /// Table backing each collection
    pub fn table_for(&self, collection: Collection) -> &str {
        match collection {
            Collection::Services => &self.services_table,
            Collection::Reviews => &self.reviews_table,
            Collection::FoodList => &self.food_table,
        }
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("auth")
    }
}

impl ObservabilityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        load_section("observability")
    }
}

impl ParameterStoreConfig {
    pub fn new(ssm_client: SsmClient, cache_ttl: Duration) -> Self {
        Self {
            ssm_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    pub async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        debug!("Getting parameter: {}", name);

        {
            let cache = self.cache.read().await;
            if let Some((value, timestamp)) = cache.get(name) {
                if timestamp.elapsed() < self.cache_ttl {
                    debug!("Parameter found in cache: {}", name);
                    return Ok(value.clone());
                }
                debug!("Parameter cache expired: {}", name);
            }
        }

        // SecureString values are decrypted server-side
        let result = self
            .ssm_client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| ConfigError::AwsSdk {
                source: Box::new(e),
            })?;

        let value = result
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| ConfigError::ParameterNotFound {
                name: name.to_string(),
            })?
            .to_string();

        {
            let mut cache = self.cache.write().await;
            cache.insert(name.to_string(), (value.clone(), Instant::now()));
        }

        debug!("Parameter retrieved and cached: {}", name);
        Ok(value)
    }

    pub async fn cache_size(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Honors a bare `PORT`, as most hosting platforms set it
pub(crate) fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(5000)
}

pub(crate) fn default_max_request_size() -> usize {
    1024 * 1024 // 1MB
}

pub(crate) fn default_region() -> String {
    "us-west-2".to_string()
}

pub(crate) fn default_services_table() -> String {
    Collection::Services.default_table_name().to_string()
}

pub(crate) fn default_reviews_table() -> String {
    Collection::Reviews.default_table_name().to_string()
}

pub(crate) fn default_food_table() -> String {
    Collection::FoodList.default_table_name().to_string()
}

pub(crate) fn default_access_token_secret() -> Option<String> {
    std::env::var("ACCESS_TOKEN_SECRET").ok()
}

pub(crate) fn default_token_ttl_seconds() -> u64 {
    3600
}

pub(crate) fn default_service_name() -> String {
    "kitchen-cloud".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_enable_json_logging() -> bool {
    false
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
