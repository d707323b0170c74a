use axum::{
    extract::{Request, State},
    response::Response,
    routing::any,
    Router,
};
use std::sync::Arc;

use crate::{error::ApiError, AppState};

/// Proxied routes: the prefix itself (with or without a trailing slash) and
/// everything below it, any method. The wildcard never matches an empty tail.
pub fn routes(prefix: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(prefix, any(proxy_checkout))
        .route(&format!("{prefix}/"), any(proxy_checkout))
        .route(&format!("{prefix}/{{*path}}"), any(proxy_checkout))
}

/// ANY /paystack/*
async fn proxy_checkout(State(state): State<Arc<AppState>>, req: Request) -> Result<Response, ApiError> {
    state.checkout.forward(req).await
}
