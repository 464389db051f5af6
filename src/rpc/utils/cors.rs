use http::{HeaderValue, Method};
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

#[derive(Debug, Error)]
pub enum CorsOriginError {
    #[error("{origin} is not a valid origin")]
    InvalidOrigin { origin: String },

    #[error("wildcard origin (`*`) cannot appear in an origin list: {input}")]
    WildcardInList { input: String },
}

/// Builds a CORS layer from an origin setting: either `*` for any origin,
/// or a comma-separated list of exact origins.
pub fn create_cors_layer(origins: &str) -> Result<CorsLayer, CorsOriginError> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }

    Ok(layer.allow_origin(AllowOrigin::list(parse_origin_list(origins)?)))
}

fn parse_origin_list(input: &str) -> Result<Vec<HeaderValue>, CorsOriginError> {
    input
        .split(',')
        .map(|origin| {
            let origin = origin.trim();
            if origin == "*" {
                return Err(CorsOriginError::WildcardInList {
                    input: input.to_string(),
                });
            }
            origin
                .parse::<HeaderValue>()
                .map_err(|_| CorsOriginError::InvalidOrigin {
                    origin: origin.to_string(),
                })
        })
        .collect()
}
