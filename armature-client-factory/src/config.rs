//! Endpoint and global client configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::descriptor::InterfaceId;
use crate::error::{FactoryError, FactoryResult};

/// Name under which a pluggable component is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRef(String);

impl TypeRef {
    /// Target sentinel meaning "use `base_url` as is".
    pub const LITERAL_URL: &'static str = "url";
    /// Default codec name.
    pub const JSON: &'static str = "json";
    /// Default logger name.
    pub const TRACING: &'static str = "tracing";
    /// Default contract and error decoder name.
    pub const DEFAULT: &'static str = "default";

    /// Create a type reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the registered name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this is the literal URL target sentinel.
    pub fn is_literal_url(&self) -> bool {
        self.0 == Self::LITERAL_URL
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// How much of each exchange the client logger records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// No logging.
    #[default]
    None,
    /// Method, URL, status and elapsed time.
    Basic,
    /// Basic plus request and response headers.
    Headers,
    /// Headers plus bodies.
    Full,
}

impl LogLevel {
    /// Check if anything is logged at this level.
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }

    /// Check if headers are logged at this level.
    pub fn logs_headers(self) -> bool {
        self >= Self::Headers
    }

    /// Check if bodies are logged at this level.
    pub fn logs_bodies(self) -> bool {
        self == Self::Full
    }
}

/// Unit the endpoint timeouts are expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert an amount of this unit to a duration.
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            Self::Nanoseconds => Duration::from_nanos(amount),
            Self::Microseconds => Duration::from_micros(amount),
            Self::Milliseconds => Duration::from_millis(amount),
            Self::Seconds => Duration::from_secs(amount),
            Self::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            Self::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

/// Whether the client is wrapped with circuit breaking and fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResilienceMode {
    /// Wrap when the resilience runtime is present.
    #[default]
    Auto,
    /// Always wrap; fail when the runtime is absent.
    Enabled,
    /// Never wrap.
    Disabled,
}

/// Structured retry parameters. Periods are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryParams {
    /// When false, calls are never retried.
    pub active: bool,
    /// Wait before the first retry.
    pub period: u64,
    /// Ceiling for the wait between two attempts.
    pub max_period: u64,
    /// Total attempts, the original call included.
    pub max_attempts: u32,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            active: true,
            period: 100,
            max_period: 1000,
            max_attempts: 5,
        }
    }
}

impl RetryParams {
    /// Create active retry parameters.
    pub fn new(period: u64, max_period: u64, max_attempts: u32) -> Self {
        Self {
            active: true,
            period,
            max_period,
            max_attempts,
        }
    }

    /// Create parameters that disable retrying.
    pub fn inactive() -> Self {
        Self {
            active: false,
            ..Default::default()
        }
    }

    /// Initial wait as a duration.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period)
    }

    /// Maximum wait as a duration.
    pub fn max_period(&self) -> Duration {
        Duration::from_millis(self.max_period)
    }
}

/// Configuration of one client interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointConfig {
    /// Base URL used by the literal target.
    pub base_url: Option<String>,
    /// Custom contract; the default contract is used when unset.
    pub contract: Option<TypeRef>,
    /// Target type; `"url"` builds the target from `base_url`.
    pub target: TypeRef,
    /// Request body encoder.
    pub encoder: TypeRef,
    /// Response body decoder.
    pub decoder: TypeRef,
    /// Client logger.
    pub logger: TypeRef,
    /// Client log level.
    pub log_level: LogLevel,
    /// Connection timeout, in `time_unit`.
    pub connect_timeout: u64,
    /// Read timeout, in `time_unit`.
    pub read_timeout: u64,
    /// Unit of both timeouts.
    pub time_unit: TimeUnit,
    /// Follow HTTP redirects.
    pub follow_redirects: bool,
    /// Request interceptors, applied in this order.
    pub interceptors: Vec<TypeRef>,
    /// Resilience wrapper mode.
    pub resilience_mode: ResilienceMode,
    /// Fallback implementation or fallback factory.
    pub fallback: Option<TypeRef>,
    /// Custom error decoder; the default decoder is used when unset.
    pub error_decoder: Option<TypeRef>,
    /// Custom retry strategy. Exclusive with `retry`.
    pub retryer: Option<TypeRef>,
    /// Structured retry parameters. Exclusive with `retryer`.
    pub retry: Option<RetryParams>,
    /// Circuit breaker settings for wrapped clients.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            contract: None,
            target: TypeRef::new(TypeRef::LITERAL_URL),
            encoder: TypeRef::new(TypeRef::JSON),
            decoder: TypeRef::new(TypeRef::JSON),
            logger: TypeRef::new(TypeRef::TRACING),
            log_level: LogLevel::None,
            connect_timeout: 10_000,
            read_timeout: 60_000,
            time_unit: TimeUnit::Milliseconds,
            follow_redirects: true,
            interceptors: Vec::new(),
            resilience_mode: ResilienceMode::Auto,
            fallback: None,
            error_decoder: None,
            retryer: None,
            retry: None,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// Create a configuration builder.
    pub fn builder() -> EndpointConfigBuilder {
        EndpointConfigBuilder::default()
    }

    /// Create a configuration pointing at `base_url` with defaults elsewhere.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::builder().base_url(base_url).build()
    }

    /// Connection timeout converted through `time_unit`.
    pub fn connect_timeout(&self) -> Duration {
        self.time_unit.to_duration(self.connect_timeout)
    }

    /// Read timeout converted through `time_unit`.
    pub fn read_timeout(&self) -> Duration {
        self.time_unit.to_duration(self.read_timeout)
    }
}

/// Builder for endpoint configuration.
#[derive(Debug, Default)]
pub struct EndpointConfigBuilder {
    config: EndpointConfig,
}

impl EndpointConfigBuilder {
    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set a custom contract.
    pub fn contract(mut self, contract: impl Into<TypeRef>) -> Self {
        self.config.contract = Some(contract.into());
        self
    }

    /// Set a custom target type.
    pub fn target(mut self, target: impl Into<TypeRef>) -> Self {
        self.config.target = target.into();
        self
    }

    /// Set the encoder.
    pub fn encoder(mut self, encoder: impl Into<TypeRef>) -> Self {
        self.config.encoder = encoder.into();
        self
    }

    /// Set the decoder.
    pub fn decoder(mut self, decoder: impl Into<TypeRef>) -> Self {
        self.config.decoder = decoder.into();
        self
    }

    /// Set the logger and its level.
    pub fn logger(mut self, logger: impl Into<TypeRef>, level: LogLevel) -> Self {
        self.config.logger = logger.into();
        self.config.log_level = level;
        self
    }

    /// Set the log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Set both timeouts and their unit.
    pub fn timeouts(mut self, connect: u64, read: u64, unit: TimeUnit) -> Self {
        self.config.connect_timeout = connect;
        self.config.read_timeout = read;
        self.config.time_unit = unit;
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Append a request interceptor.
    pub fn interceptor(mut self, interceptor: impl Into<TypeRef>) -> Self {
        self.config.interceptors.push(interceptor.into());
        self
    }

    /// Set the resilience mode.
    pub fn resilience_mode(mut self, mode: ResilienceMode) -> Self {
        self.config.resilience_mode = mode;
        self
    }

    /// Set the fallback.
    pub fn fallback(mut self, fallback: impl Into<TypeRef>) -> Self {
        self.config.fallback = Some(fallback.into());
        self
    }

    /// Set a custom error decoder.
    pub fn error_decoder(mut self, decoder: impl Into<TypeRef>) -> Self {
        self.config.error_decoder = Some(decoder.into());
        self
    }

    /// Set a custom retry strategy.
    pub fn retryer(mut self, retryer: impl Into<TypeRef>) -> Self {
        self.config.retryer = Some(retryer.into());
        self
    }

    /// Set structured retry parameters.
    pub fn retry(mut self, retry: RetryParams) -> Self {
        self.config.retry = Some(retry);
        self
    }

    /// Set circuit breaker settings.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EndpointConfig {
        self.config
    }
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Endpoint configurations plus the global retry settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    /// Configuration per client interface.
    pub endpoints: HashMap<InterfaceId, EndpointConfig>,
    /// Global custom retry strategy. Exclusive with `retry`.
    pub retryer: Option<TypeRef>,
    /// Global retry parameters. Exclusive with `retryer`.
    pub retry: Option<RetryParams>,
}

impl GlobalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the configuration of an endpoint.
    pub fn add_endpoint(&mut self, interface: impl Into<InterfaceId>, config: EndpointConfig) {
        self.endpoints.insert(interface.into(), config);
    }

    /// Builder-style variant of [`GlobalConfig::add_endpoint`].
    pub fn with_endpoint(mut self, interface: impl Into<InterfaceId>, config: EndpointConfig) -> Self {
        self.add_endpoint(interface, config);
        self
    }

    /// Set the global retry strategy.
    pub fn with_retryer(mut self, retryer: impl Into<TypeRef>) -> Self {
        self.retryer = Some(retryer.into());
        self
    }

    /// Set the global retry parameters.
    pub fn with_retry(mut self, retry: RetryParams) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> FactoryResult<Self> {
        toml::from_str(content).map_err(|e| FactoryError::Load(format!("TOML parse error: {}", e)))
    }

    /// Parse a JSON document.
    pub fn from_json_str(content: &str) -> FactoryResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| FactoryError::Load(format!("JSON parse error: {}", e)))
    }

    /// Load from a file, detecting the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> FactoryResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FactoryError::Load("No file extension found".to_string()))?;
        let format = ConfigFormat::from_extension(ext)
            .ok_or_else(|| FactoryError::Load(format!("Unsupported format: {}", ext)))?;

        let content = std::fs::read_to_string(path)
            .map_err(|e| FactoryError::Load(format!("Failed to read file: {}", e)))?;

        match format {
            ConfigFormat::Json => Self::from_json_str(&content),
            ConfigFormat::Toml => Self::from_toml_str(&content),
        }
    }
}

/// Serde helpers for durations written as milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults() {
        let config = EndpointConfig::default();
        assert!(config.target.is_literal_url());
        assert_eq!(config.encoder.as_str(), "json");
        assert_eq!(config.decoder.as_str(), "json");
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.read_timeout(), Duration::from_secs(60));
        assert!(config.follow_redirects);
        assert_eq!(config.resilience_mode, ResilienceMode::Auto);
        assert!(config.retry.is_none() && config.retryer.is_none());
    }

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeUnit::Seconds.to_duration(3), Duration::from_secs(3));
        assert_eq!(TimeUnit::Minutes.to_duration(2), Duration::from_secs(120));
        assert_eq!(TimeUnit::Microseconds.to_duration(1500), Duration::from_micros(1500));
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(!LogLevel::None.is_enabled());
        assert!(!LogLevel::Basic.logs_headers());
        assert!(LogLevel::Headers.logs_headers());
        assert!(LogLevel::Full.logs_headers() && LogLevel::Full.logs_bodies());
    }

    #[test]
    fn test_parse_toml() {
        let config = GlobalConfig::from_toml_str(
            r#"
            [retry]
            active = false

            [endpoints.billing]
            baseUrl = "http://svc/api"
            resilienceMode = "DISABLED"
            interceptors = ["auth", "request-id"]
            timeUnit = "SECONDS"
            readTimeout = 5

            [endpoints.billing.retry]
            period = 50
            maxAttempts = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.retry, Some(RetryParams::inactive()));
        let billing = &config.endpoints[&InterfaceId::from("billing")];
        assert_eq!(billing.base_url.as_deref(), Some("http://svc/api"));
        assert_eq!(billing.resilience_mode, ResilienceMode::Disabled);
        assert_eq!(billing.interceptors.len(), 2);
        assert_eq!(billing.read_timeout(), Duration::from_secs(5));
        let retry = billing.retry.as_ref().unwrap();
        assert_eq!((retry.period, retry.max_period, retry.max_attempts), (50, 1000, 4));
        assert!(retry.active);
    }

    #[test]
    fn test_json_and_toml_agree() {
        let from_json = GlobalConfig::from_json_str(
            r#"{"retryer": "custom", "endpoints": {"users": {"baseUrl": "http://users", "logLevel": "FULL"}}}"#,
        )
        .unwrap();
        let from_toml = GlobalConfig::from_toml_str(
            r#"
            retryer = "custom"
            [endpoints.users]
            baseUrl = "http://users"
            logLevel = "FULL"
            "#,
        )
        .unwrap();
        assert_eq!(from_json, from_toml);
    }

    #[test]
    fn test_parse_error_is_load_error() {
        let err = GlobalConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, FactoryError::Load(_)));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_extension("JSON"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
