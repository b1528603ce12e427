//! CORS layer built from the configured allow-list.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use config_rs::CorsConfig;
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, thiserror::Error)]
pub enum CorsError {
    #[error("invalid CORS origin '{0}'")]
    Origin(String),

    #[error("invalid CORS method '{0}'")]
    Method(String),

    #[error("invalid CORS header '{0}'")]
    Header(String),
}

fn is_wildcard(items: &[String]) -> bool {
    items.iter().any(|item| item == "*")
}

/// Translate the allow-list into a `CorsLayer`; `*` in any list means "any"
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, CorsError> {
    let mut layer = CorsLayer::new().max_age(Duration::from_secs(config.max_age));

    layer = if is_wildcard(&config.allowed_origins) {
        layer.allow_origin(Any)
    } else {
        let origins = config
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| CorsError::Origin(origin.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        layer.allow_origin(origins)
    };

    layer = if is_wildcard(&config.allowed_methods) {
        layer.allow_methods(Any)
    } else {
        let methods = config
            .allowed_methods
            .iter()
            .map(|method| {
                Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .map_err(|_| CorsError::Method(method.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        layer.allow_methods(methods)
    };

    layer = if is_wildcard(&config.allowed_headers) {
        layer.allow_headers(Any)
    } else {
        let headers = config
            .allowed_headers
            .iter()
            .map(|header| {
                HeaderName::from_bytes(header.to_ascii_lowercase().as_bytes())
                    .map_err(|_| CorsError::Header(header.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        layer.allow_headers(headers)
    };

    Ok(layer)
}
