use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{error::ApiError, middleware::JsonBody, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin-login", post(admin_login))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    #[serde(rename = "loggedIn")]
    pub logged_in: bool,
}

/// POST /api/admin-login
///
/// Stateless PIN check: no session or token is issued.
async fn admin_login(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let pin = match body.get("pin") {
        None | Some(Value::Null) => return Err(ApiError::BadRequest("PIN is required".to_string())),
        Some(pin) => pin,
    };

    // Only a string can equal the configured PIN
    if pin.as_str().is_some_and(|pin| state.config.admin.verify_pin(pin)) {
        info!("Admin login succeeded");
        Ok((
            StatusCode::OK,
            Json(LoginResponse {
                message: "Login successful",
                logged_in: true,
            }),
        ))
    } else {
        warn!("Admin login rejected: invalid PIN");
        Err(ApiError::Unauthorized("Invalid PIN".to_string()))
    }
}
