//! config-rs/lib.rs
//! Shared configuration utilities for the duration estimator service
//! Provides standardized functions for port/address management and the
//! estimator's own settings (model path, CORS allow-list, limits, logging)

use std::net::SocketAddr;

pub mod estimator;

pub use estimator::{CorsConfig, EstimatorConfig, LogFormat, LoggingConfig};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Required setting {0} is not set")]
    Missing(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

/// Resolve the service port from `<SERVICE>_SERVICE_PORT`
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "DURATION_ESTIMATOR")
/// * `default_port` - The port to use if the variable is absent or invalid
/// * `lookup` - Variable source; `std::env::var` in production
/// * `warnings` - Receives a message when a set value is ignored. Resolution
///   runs before logging is up, so callers log these once it is.
///
/// # Returns
/// The port number to use for the service
pub fn port_from_lookup(
    service_name: &str,
    default_port: u16,
    lookup: &dyn Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    match lookup(&var_name) {
        Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
            warnings.push(format!(
                "Invalid port '{}' in {}, using default {}",
                raw, var_name, default_port
            ));
            default_port
        }),
        None => default_port,
    }
}

/// Create a SocketAddr for binding a service
///
/// `<SERVICE>_SERVICE_ADDR` may hold either `host:port` or `http://host:port`;
/// otherwise the service binds `0.0.0.0` on the resolved port.
pub fn bind_address_from_lookup(
    service_name: &str,
    default_port: u16,
    lookup: &dyn Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    // Check if there's a full address override
    if let Some(addr_str) = lookup(&var_name) {
        let stripped = addr_str
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        if let Ok(addr) = stripped.parse::<SocketAddr>() {
            return addr;
        }
        warnings.push(format!(
            "Invalid address '{}' in {}, using default",
            addr_str, var_name
        ));
    }

    let port = port_from_lookup(service_name, default_port, lookup, warnings);
    SocketAddr::from(([0, 0, 0, 0], port))
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_get_service_port() {
        let mut warnings = Vec::new();
        let lookup = lookup_from(&[("TEST_SERVICE_PORT", "9000")]);
        assert_eq!(port_from_lookup("TEST", 8000, &lookup, &mut warnings), 9000);
        assert_eq!(port_from_lookup("UNKNOWN", 8000, &lookup, &mut warnings), 8000);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let mut warnings = Vec::new();
        let lookup = lookup_from(&[("TEST_SERVICE_PORT", "not-a-port")]);
        assert_eq!(port_from_lookup("TEST", 8000, &lookup, &mut warnings), 8000);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("TEST_SERVICE_PORT"), "{:?}", warnings);
    }

    #[test]
    fn test_get_bind_address() {
        let mut warnings = Vec::new();
        let lookup = lookup_from(&[("TEST_SERVICE_ADDR", "http://127.0.0.1:9100")]);
        assert_eq!(
            bind_address_from_lookup("TEST", 8000, &lookup, &mut warnings),
            "127.0.0.1:9100".parse::<SocketAddr>().unwrap()
        );

        let lookup = lookup_from(&[("TEST_SERVICE_PORT", "9200")]);
        assert_eq!(
            bind_address_from_lookup("TEST", 8000, &lookup, &mut warnings),
            "0.0.0.0:9200".parse::<SocketAddr>().unwrap()
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_invalid_bind_address_falls_back() {
        let mut warnings = Vec::new();
        let lookup = lookup_from(&[("TEST_SERVICE_ADDR", "somewhere")]);
        assert_eq!(
            bind_address_from_lookup("TEST", 8000, &lookup, &mut warnings),
            "0.0.0.0:8000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("TEST_SERVICE_ADDR"), "{:?}", warnings);
    }
}
