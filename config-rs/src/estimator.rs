//! Settings for the duration estimator service.
//!
//! Resolution order is built-in defaults, then the optional JSON file named by
//! `DURATION_ESTIMATOR_CONFIG`, then individual environment variables. The
//! model path has no default: a deployment that does not name its artifact
//! fails at startup.

use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{bind_address_from_lookup, ConfigError};

/// Env var prefix and default port of the estimator service
pub const SERVICE_NAME: &str = "DURATION_ESTIMATOR";
pub const DEFAULT_PORT: u16 = 8000;

const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;
const DEFAULT_MAX_BATCH_SIZE: usize = 100;
const DEFAULT_CORS_MAX_AGE: u64 = 3600;

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age: u64,
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["content-type".to_string()],
            max_age: DEFAULT_CORS_MAX_AGE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'text' or 'json', got '{}'", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Fully resolved estimator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    pub bind_address: SocketAddr,
    pub model_path: PathBuf,
    pub cors: CorsConfig,
    pub max_payload_bytes: usize,
    pub max_batch_size: usize,
    pub logging: LoggingConfig,
    /// Values that were set but ignored in favour of a default
    pub warnings: Vec<String>,
}

/// On-disk shape of the optional configuration file. Every field is optional
/// so a file only needs to carry what it overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    port: Option<u16>,
    bind_address: Option<String>,
    model_path: Option<PathBuf>,
    cors: Option<FileCorsConfig>,
    max_payload_bytes: Option<usize>,
    max_batch_size: Option<usize>,
    logging: Option<FileLoggingConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileCorsConfig {
    allowed_origins: Option<Vec<String>>,
    allowed_methods: Option<Vec<String>>,
    allowed_headers: Option<Vec<String>>,
    max_age: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLoggingConfig {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl EstimatorConfig {
    /// Load from the process environment (and `.env`, if present).
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(&|key| env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup. `load` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}_{}", SERVICE_NAME, suffix);

        let file = match non_empty(lookup(&key("CONFIG"))) {
            Some(path) => load_file(Path::new(&path))?,
            None => FileConfig::default(),
        };

        let mut warnings = Vec::new();

        // env ADDR beats file bind_address beats 0.0.0.0:<port>
        let default_port = file.port.unwrap_or(DEFAULT_PORT);
        let bind_address = match (&file.bind_address, lookup(&key("SERVICE_ADDR"))) {
            (Some(raw), None) => raw.trim().parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                key: "bind_address".to_string(),
                reason: e.to_string(),
            })?,
            _ => bind_address_from_lookup(SERVICE_NAME, default_port, lookup, &mut warnings),
        };

        let model_path = non_empty(lookup(&key("MODEL_PATH")))
            .map(PathBuf::from)
            .or(file.model_path.filter(|p| !p.as_os_str().is_empty()))
            .ok_or_else(|| ConfigError::Missing(key("MODEL_PATH")))?;

        let mut cors = CorsConfig::default();
        if let Some(file_cors) = file.cors {
            if let Some(origins) = file_cors.allowed_origins {
                cors.allowed_origins = origins;
            }
            if let Some(methods) = file_cors.allowed_methods {
                cors.allowed_methods = methods;
            }
            if let Some(headers) = file_cors.allowed_headers {
                cors.allowed_headers = headers;
            }
            if let Some(max_age) = file_cors.max_age {
                cors.max_age = max_age;
            }
        }
        if let Some(raw) = lookup(&key("CORS_ORIGINS")) {
            cors.allowed_origins = split_list(&raw);
        }
        if let Some(raw) = lookup(&key("CORS_METHODS")) {
            cors.allowed_methods = split_list(&raw);
        }
        if let Some(raw) = lookup(&key("CORS_HEADERS")) {
            cors.allowed_headers = split_list(&raw);
        }
        if let Some(raw) = lookup(&key("CORS_MAX_AGE")) {
            cors.max_age = parse_number(&key("CORS_MAX_AGE"), &raw)?;
        }

        let max_payload_bytes = match lookup(&key("MAX_PAYLOAD_BYTES")) {
            Some(raw) => parse_number(&key("MAX_PAYLOAD_BYTES"), &raw)?,
            None => file.max_payload_bytes.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES),
        };
        require_positive("max_payload_bytes", max_payload_bytes)?;

        let max_batch_size = match lookup(&key("MAX_BATCH_SIZE")) {
            Some(raw) => parse_number(&key("MAX_BATCH_SIZE"), &raw)?,
            None => file.max_batch_size.unwrap_or(DEFAULT_MAX_BATCH_SIZE),
        };
        require_positive("max_batch_size", max_batch_size)?;

        let mut logging = LoggingConfig::default();
        if let Some(file_logging) = file.logging {
            if let Some(level) = file_logging.level {
                logging.level = level;
            }
            if let Some(format) = file_logging.format {
                logging.format = format;
            }
        }
        if let Some(level) = non_empty(lookup(&key("LOG_LEVEL"))) {
            logging.level = level;
        }
        if let Some(raw) = lookup(&key("LOG_FORMAT")) {
            logging.format = raw.parse().map_err(|reason| ConfigError::Invalid {
                key: key("LOG_FORMAT"),
                reason,
            })?;
        }

        Ok(Self {
            bind_address,
            model_path,
            cors,
            max_payload_bytes,
            max_batch_size,
            logging,
            warnings,
        })
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

    serde_json::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn require_positive(key: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_model_path_is_fatal() {
        let err = EstimatorConfig::from_lookup(&lookup_from(&[])).unwrap_err();
        match err {
            ConfigError::Missing(key) => assert_eq!(key, "DURATION_ESTIMATOR_MODEL_PATH"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_model_path_is_treated_as_missing() {
        let lookup = lookup_from(&[("DURATION_ESTIMATOR_MODEL_PATH", "   ")]);
        assert!(matches!(
            EstimatorConfig::from_lookup(&lookup),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn defaults_apply_when_only_model_path_is_set() {
        let lookup = lookup_from(&[("DURATION_ESTIMATOR_MODEL_PATH", "/srv/models/model.json")]);
        let config = EstimatorConfig::from_lookup(&lookup).unwrap();

        assert_eq!(config.model_path, PathBuf::from("/srv/models/model.json"));
        assert_eq!(config.bind_address, "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.cors, CorsConfig::default());
        assert!(!config.cors.allows_any_origin());
        assert_eq!(config.max_payload_bytes, 64 * 1024);
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.logging, LoggingConfig::default());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn environment_overrides() {
        let lookup = lookup_from(&[
            ("DURATION_ESTIMATOR_MODEL_PATH", "model.json"),
            ("DURATION_ESTIMATOR_SERVICE_PORT", "9001"),
            ("DURATION_ESTIMATOR_CORS_ORIGINS", "*"),
            ("DURATION_ESTIMATOR_CORS_METHODS", "POST, OPTIONS"),
            ("DURATION_ESTIMATOR_MAX_BATCH_SIZE", "10"),
            ("DURATION_ESTIMATOR_LOG_FORMAT", "JSON"),
        ]);
        let config = EstimatorConfig::from_lookup(&lookup).unwrap();

        assert_eq!(config.bind_address.port(), 9001);
        assert!(config.cors.allows_any_origin());
        assert_eq!(config.cors.allowed_methods, vec!["POST", "OPTIONS"]);
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn ignored_port_is_reported_once() {
        let lookup = lookup_from(&[
            ("DURATION_ESTIMATOR_MODEL_PATH", "model.json"),
            ("DURATION_ESTIMATOR_SERVICE_PORT", "eighty"),
        ]);
        let config = EstimatorConfig::from_lookup(&lookup).unwrap();

        assert_eq!(config.bind_address.port(), DEFAULT_PORT);
        assert_eq!(config.warnings.len(), 1, "{:?}", config.warnings);
        assert!(config.warnings[0].contains("DURATION_ESTIMATOR_SERVICE_PORT"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let lookup = lookup_from(&[
            ("DURATION_ESTIMATOR_MODEL_PATH", "model.json"),
            ("DURATION_ESTIMATOR_MAX_PAYLOAD_BYTES", "lots"),
        ]);
        assert!(matches!(
            EstimatorConfig::from_lookup(&lookup),
            Err(ConfigError::Invalid { .. })
        ));

        let lookup = lookup_from(&[
            ("DURATION_ESTIMATOR_MODEL_PATH", "model.json"),
            ("DURATION_ESTIMATOR_MAX_BATCH_SIZE", "0"),
        ]);
        assert!(matches!(
            EstimatorConfig::from_lookup(&lookup),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn file_values_sit_between_defaults_and_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "bind_address": "127.0.0.1:7000",
                "model_path": "/from/file.json",
                "cors": {{ "allowed_origins": ["https://estimator.example"] }},
                "max_payload_bytes": 2048,
                "logging": {{ "level": "debug" }}
            }}"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let lookup = lookup_from(&[
            ("DURATION_ESTIMATOR_CONFIG", path.as_str()),
            ("DURATION_ESTIMATOR_MODEL_PATH", "/from/env.json"),
        ]);
        let config = EstimatorConfig::from_lookup(&lookup).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.model_path, PathBuf::from("/from/env.json"));
        assert_eq!(config.cors.allowed_origins, vec!["https://estimator.example"]);
        assert_eq!(config.cors.allowed_methods, CorsConfig::default().allowed_methods);
        assert_eq!(config.max_payload_bytes, 2048);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn unknown_file_keys_are_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "model_path": "m.json", "modle_path": "typo" }}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let lookup = lookup_from(&[("DURATION_ESTIMATOR_CONFIG", path.as_str())]);
        assert!(matches!(
            EstimatorConfig::from_lookup(&lookup),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let lookup = lookup_from(&[
            ("DURATION_ESTIMATOR_CONFIG", "/definitely/not/here.json"),
            ("DURATION_ESTIMATOR_MODEL_PATH", "model.json"),
        ]);
        assert!(matches!(
            EstimatorConfig::from_lookup(&lookup),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
