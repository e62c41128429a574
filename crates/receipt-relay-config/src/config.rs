// crates/receipt-relay-config/src/config.rs
// ============================================================================
// Module: Receipt Relay Configuration
// Description: Configuration loading, environment overlay and validation.
// Purpose: Provide strict, fail-closed config parsing for the relay.
// Dependencies: receipt-relay-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is read from a TOML file (optional when the default path is
//! absent), overlaid with the deployed service's environment variables and
//! validated before anything is built from it:
//!
//! | Variable                   | Field              |
//! |----------------------------|--------------------|
//! | `SDX_RECEIPT_RRM_SECRET`   | `decrypt.secret`   |
//! | `RECEIPT_HOST`             | `legacy.host`      |
//! | `RECEIPT_PATH`             | `legacy.path`      |
//! | `RECEIPT_USER`             | `legacy.user`      |
//! | `RECEIPT_PASS`             | `legacy.password`  |
//! | `RM_SDX_GATEWAY_URL`       | `gateway.url`      |
//! | `RM_SDX_GATEWAY_CA_BUNDLE` | `gateway.ca_bundle`|
//! | `LOGGING_LEVEL`            | `logging.level`    |
//!
//! The environment is read through a lookup function so callers and tests
//! control it explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use receipt_relay_core::BasicAuth;
use receipt_relay_core::HttpSink;
use receipt_relay_core::HttpSinkConfig;
use receipt_relay_core::LegacyEndpoint;
use receipt_relay_core::ReceiptCipher;
use receipt_relay_core::ReceiptPipeline;
use receipt_relay_core::RetryPolicy;
use receipt_relay_core::Secret;
use receipt_relay_core::SkipSink;
use receipt_relay_core::TargetResolver;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "receipt-relay.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "RECEIPT_RELAY_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum CA bundle size in bytes.
const MAX_CA_BUNDLE_SIZE: usize = 1024 * 1024;
/// Legacy host value that switches delivery off.
pub const SKIP_HOST: &str = "skip";
/// Default legacy receipting host.
const DEFAULT_LEGACY_HOST: &str = "http://sdx-mock-receipt:5000";
/// Default legacy receipting path.
const DEFAULT_LEGACY_PATH: &str = "reportingunits";
/// Default gateway receipt endpoint.
const DEFAULT_GATEWAY_URL: &str = "http://localhost:8191/receipts";
/// Minimum transport attempts.
const MIN_ATTEMPTS: u32 = 1;
/// Maximum transport attempts.
const MAX_ATTEMPTS: u32 = 10;
/// Minimum per-request timeout in milliseconds.
const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum per-request timeout in milliseconds.
const MAX_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Upper bound on the worst-case time spent delivering one receipt.
const MAX_DELIVERY_BUDGET: Duration = Duration::from_secs(60);

/// Secret environment variable.
const ENV_SECRET: &str = "SDX_RECEIPT_RRM_SECRET";
/// Legacy host environment variable.
const ENV_RECEIPT_HOST: &str = "RECEIPT_HOST";
/// Legacy path environment variable.
const ENV_RECEIPT_PATH: &str = "RECEIPT_PATH";
/// Legacy user environment variable.
const ENV_RECEIPT_USER: &str = "RECEIPT_USER";
/// Legacy password environment variable.
const ENV_RECEIPT_PASS: &str = "RECEIPT_PASS";
/// Gateway URL environment variable.
const ENV_GATEWAY_URL: &str = "RM_SDX_GATEWAY_URL";
/// Gateway CA bundle environment variable.
const ENV_GATEWAY_CA_BUNDLE: &str = "RM_SDX_GATEWAY_CA_BUNDLE";
/// Log level environment variable.
const ENV_LOGGING_LEVEL: &str = "LOGGING_LEVEL";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Receipt relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Decryption gate configuration.
    #[serde(default)]
    pub decrypt: DecryptConfig,
    /// Legacy receipting service configuration.
    #[serde(default)]
    pub legacy: LegacyConfig,
    /// Gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Transport retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Decryption gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecryptConfig {
    /// Pre-shared Fernet key (url-safe base64, 32 bytes).
    #[serde(default)]
    pub secret: Secret,
    /// Maximum token age in seconds; unset accepts any age.
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,
}

/// Legacy receipting service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyConfig {
    /// Base URL, or `skip` to disable delivery.
    #[serde(default = "default_legacy_host")]
    pub host: String,
    /// Path prefix before the reporting-unit segments.
    #[serde(default = "default_legacy_path")]
    pub path: String,
    /// Basic-auth username.
    #[serde(default)]
    pub user: String,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Secret,
    /// Whether the service certificate is verified.
    #[serde(default)]
    pub verify_tls: bool,
    /// Disables delivery to every target.
    #[serde(default)]
    pub skip: bool,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            host: default_legacy_host(),
            path: default_legacy_path(),
            user: String::new(),
            password: Secret::default(),
            verify_tls: false,
            skip: false,
        }
    }
}

/// Gateway configuration.
///
/// Credentials left empty fall back to the legacy credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Receipt endpoint URL.
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Basic-auth username.
    #[serde(default)]
    pub user: String,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Secret,
    /// PEM CA bundle trusted for the gateway.
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            user: String::new(),
            password: Secret::default(),
            ca_bundle: None,
        }
    }
}

/// Transport retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Per-attempt request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level name (`trace`, `debug`, `info`, `warn`/`warning`, `error`/`critical`).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON records instead of plain text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Returns the `tracing` level directive for the configured level.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unknown level names.
    pub fn directive(&self) -> Result<&'static str, ConfigError> {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok("trace"),
            "debug" => Ok("debug"),
            "info" => Ok("info"),
            "warn" | "warning" => Ok("warn"),
            "error" | "critical" => Ok("error"),
            _ => Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not a known level",
                self.level
            ))),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl RelayConfig {
    /// Loads configuration using the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| env::var(key).ok())
    }

    /// Loads configuration with an explicit environment lookup.
    ///
    /// An explicit path or `RECEIPT_RELAY_CONFIG` must exist; the default
    /// `receipt-relay.toml` is optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match resolve_path(path, &lookup) {
            Some(resolved) => Self::from_file(&resolved)?,
            None => Self::default(),
        };
        config.apply_env(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a config file without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses TOML without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown fields.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Overlays environment variables; unset or blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(value) = get(ENV_SECRET) {
            self.decrypt.secret = Secret::new(value);
        }
        if let Some(value) = get(ENV_RECEIPT_HOST) {
            self.legacy.host = value;
        }
        if let Some(value) = get(ENV_RECEIPT_PATH) {
            self.legacy.path = value;
        }
        if let Some(value) = get(ENV_RECEIPT_USER) {
            self.legacy.user = value;
        }
        if let Some(value) = get(ENV_RECEIPT_PASS) {
            self.legacy.password = Secret::new(value);
        }
        if let Some(value) = get(ENV_GATEWAY_URL) {
            self.gateway.url = value;
        }
        if let Some(value) = get(ENV_GATEWAY_CA_BUNDLE) {
            self.gateway.ca_bundle = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_LOGGING_LEVEL) {
            self.logging.level = value;
        }
    }

    // ========================================================================
    // SECTION: Validation
    // ========================================================================

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decrypt.validate()?;
        if !self.skip_delivery() {
            parse_http_url("legacy.host", &self.legacy.host)?;
        }
        parse_http_url("gateway.url", &self.gateway.url)?;
        if let Some(path) = &self.gateway.ca_bundle
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid("gateway.ca_bundle must be non-empty".to_string()));
        }
        self.retry.validate()?;
        self.logging.directive()?;
        Ok(())
    }

    // ========================================================================
    // SECTION: Builders
    // ========================================================================

    /// Returns true when delivery is switched off.
    #[must_use]
    pub fn skip_delivery(&self) -> bool {
        self.legacy.skip || self.legacy.host.trim().eq_ignore_ascii_case(SKIP_HOST)
    }

    /// Builds the decryption gate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the key is unusable.
    pub fn cipher(&self) -> Result<ReceiptCipher, ConfigError> {
        ReceiptCipher::new(&self.decrypt.secret)
            .map(|cipher| cipher.with_ttl(self.decrypt.token_ttl_secs))
            .map_err(|err| ConfigError::Invalid(format!("decrypt.secret: {err}")))
    }

    /// Builds the target resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an endpoint is not a valid URL.
    pub fn resolver(&self) -> Result<TargetResolver, ConfigError> {
        let host = match parse_http_url("legacy.host", &self.legacy.host) {
            Ok(host) => host,
            Err(_) if self.skip_delivery() => parse_http_url("legacy.host", DEFAULT_LEGACY_HOST)?,
            Err(err) => return Err(err),
        };
        let gateway = parse_http_url("gateway.url", &self.gateway.url)?;
        Ok(TargetResolver::new(
            LegacyEndpoint {
                host,
                path: self.legacy.path.trim().to_string(),
            },
            gateway,
        ))
    }

    /// Returns the transport retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    /// Builds the HTTP sink configuration, reading the CA bundle if set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the CA bundle cannot be read.
    pub fn sink_config(&self) -> Result<HttpSinkConfig, ConfigError> {
        let legacy_auth = BasicAuth {
            username: self.legacy.user.clone(),
            password: self.legacy.password.clone(),
        };
        let gateway_auth = if self.gateway.user.is_empty() && self.gateway.password.is_empty() {
            legacy_auth.clone()
        } else {
            BasicAuth {
                username: self.gateway.user.clone(),
                password: self.gateway.password.clone(),
            }
        };
        let gateway_ca_bundle = match &self.gateway.ca_bundle {
            Some(path) => Some(read_ca_bundle(path)?),
            None => None,
        };
        Ok(HttpSinkConfig {
            legacy_auth,
            legacy_verify_tls: self.legacy.verify_tls,
            gateway_auth,
            gateway_ca_bundle,
            request_timeout: self.retry.request_timeout(),
            retry: self.retry_policy(),
            ..HttpSinkConfig::default()
        })
    }

    /// Builds the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any component cannot be built.
    pub fn build_pipeline(&self) -> Result<ReceiptPipeline, ConfigError> {
        let cipher = self.cipher()?;
        let resolver = self.resolver()?;
        if self.skip_delivery() {
            return Ok(ReceiptPipeline::new(cipher, resolver, SkipSink));
        }
        let sink = HttpSink::new(self.sink_config()?)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(ReceiptPipeline::new(cipher, resolver, sink))
    }
}

impl DecryptConfig {
    /// Validates the key and TTL.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.expose().trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "decrypt.secret must be set (or {ENV_SECRET})"
            )));
        }
        ReceiptCipher::new(&self.secret)
            .map_err(|err| ConfigError::Invalid(format!("decrypt.secret: {err}")))?;
        if self.token_ttl_secs == Some(0) {
            return Err(ConfigError::Invalid("decrypt.token_ttl_secs must be positive".to_string()));
        }
        Ok(())
    }
}

impl RetryConfig {
    /// Converts to the core retry policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    /// Returns the per-attempt request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates bounds and the total delivery budget.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ATTEMPTS..=MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(ConfigError::Invalid(format!(
                "retry.max_attempts must be between {MIN_ATTEMPTS} and {MAX_ATTEMPTS}"
            )));
        }
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "retry.request_timeout_ms must be between {MIN_REQUEST_TIMEOUT_MS} and \
                 {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        if self.initial_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.initial_backoff_ms must be positive".to_string(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.max_backoff_ms must be >= retry.initial_backoff_ms".to_string(),
            ));
        }
        let budget = self.policy().budget(self.request_timeout());
        if budget >= MAX_DELIVERY_BUDGET {
            return Err(ConfigError::Invalid(format!(
                "retry budget {}ms must stay under {}ms",
                budget.as_millis(),
                MAX_DELIVERY_BUDGET.as_millis()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI, environment or the optional default.
fn resolve_path(
    path: Option<&Path>,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path.to_path_buf());
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR).filter(|value| !value.trim().is_empty()) {
        return Some(PathBuf::from(env_path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_NAME);
    default.is_file().then_some(default)
}

/// Parses an absolute http(s) URL.
fn parse_http_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|err| ConfigError::Invalid(format!("{field} is not a valid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("{field} must be an http(s) url with a host")));
    }
    Ok(url)
}

/// Reads a PEM CA bundle with a size cap.
fn read_ca_bundle(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let bytes = fs::read(path)
        .map_err(|err| ConfigError::Io(format!("gateway.ca_bundle {}: {err}", path.display())))?;
    if bytes.len() > MAX_CA_BUNDLE_SIZE {
        return Err(ConfigError::Invalid("gateway.ca_bundle exceeds size limit".to_string()));
    }
    Ok(bytes)
}

/// Default legacy host.
fn default_legacy_host() -> String {
    DEFAULT_LEGACY_HOST.to_string()
}

/// Default legacy path.
fn default_legacy_path() -> String {
    DEFAULT_LEGACY_PATH.to_string()
}

/// Default gateway URL.
fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

/// Default transport attempts.
const fn default_max_attempts() -> u32 {
    5
}

/// Default initial backoff.
const fn default_initial_backoff_ms() -> u64 {
    100
}

/// Default maximum backoff.
const fn default_max_backoff_ms() -> u64 {
    2_000
}

/// Default per-attempt request timeout.
const fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Default log level.
fn default_log_level() -> String {
    "info".to_string()
}
