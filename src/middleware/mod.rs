use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header, uri::PathAndQuery, Method, Uri},
};
use serde_json::{Map, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::debug;

use crate::{config::CorsConfig, error::ApiError};

// External path prefix -> internal collection path. `<prefix>/:id` keeps the id.
const REWRITE_RULES: &[(&str, &str)] = &[
    ("/api/products", "/products"),
    ("/api/orders", "/orders"),
];

/// Maps an external path onto its internal resource path, or `None` when no rule applies.
pub fn rewrite_path(path: &str) -> Option<String> {
    // A single trailing slash is tolerated, like the collection routes themselves
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };

    REWRITE_RULES.iter().find_map(|(external, internal)| {
        let rest = path.strip_prefix(external)?;
        if rest.is_empty() {
            return Some((*internal).to_string());
        }
        let id = rest.strip_prefix('/')?;
        (!id.is_empty() && !id.contains('/')).then(|| format!("{internal}/{id}"))
    })
}

/// Rewrites the request URI before routing. The query string is preserved;
/// unmatched requests pass through unmodified.
pub fn rewrite_request<B>(mut req: Request<B>) -> Request<B> {
    let Some(path) = rewrite_path(req.uri().path()) else {
        return req;
    };

    let path_and_query = match req.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = PathAndQuery::try_from(path_and_query).ok();

    match Uri::from_parts(parts) {
        Ok(uri) => {
            debug!("Rewrote {} -> {}", req.uri(), uri);
            *req.uri_mut() = uri;
        }
        Err(e) => debug!("Leaving {} unrewritten: {}", req.uri(), e),
    }
    req
}

/// JSON request body. An empty body reads as `{}`; content type is not enforced.
#[derive(Debug)]
pub struct JsonBody(pub Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Body {
                status: rejection.status(),
                message: rejection.body_text(),
            })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(Value::Object(Map::new())));
        }

        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|_| ApiError::BadRequest("Malformed JSON body".to_string()))
    }
}

/// Only the configured origin may call with credentials. Other origins get no
/// `Access-Control-Allow-Origin` header at all.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list([config.allowed_origin.clone()]))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
