use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::any::Any;
use std::backtrace::Backtrace;
use thiserror::Error;
use tracing::error;

use crate::database::StoreError;

const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Errors surfaced to HTTP clients. Every variant renders as a JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    BadRequest(String),

    /// Secret mismatch.
    #[error("{0}")]
    Unauthorized(String),

    /// The body could not be read; keeps the extractor's status (e.g. 413).
    #[error("{message}")]
    Body { status: StatusCode, message: String },

    #[error("Not Found")]
    NotFound,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    /// Order persistence failed; the cause is logged where it happens.
    #[error("Failed to create order")]
    OrderNotCreated,

    /// The checkout origin could not be reached.
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "message": message })),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, json!({ "message": message })),
            Self::Body { status, message } => (*status, json!({ "message": message })),
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": "Method Not Allowed" }),
            ),
            Self::NotFound | Self::Store(StoreError::UnknownCollection(_)) => {
                (StatusCode::NOT_FOUND, json!({ "error": "Not Found" }))
            }
            Self::OrderNotCreated => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to create order" }),
            ),
            Self::Upstream(e) => {
                error!(error = %e, "Checkout upstream request failed");
                (StatusCode::BAD_GATEWAY, json!({ "error": "Bad Gateway" }))
            }
            Self::Store(_) | Self::Internal(_) => {
                error!(error = %self, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, internal_error_body())
            }
        };

        (status, Json(body)).into_response()
    }
}

fn internal_error_body() -> Value {
    json!({ "error": INTERNAL_SERVER_ERROR })
}

/// Last-resort response for a handler that panicked.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "non-string panic payload"
    };
    error!(panic_message = %message, "Error occurred while handling request");

    (StatusCode::INTERNAL_SERVER_ERROR, Json(internal_error_body())).into_response()
}

/// Routes panic reports (message, location and stack trace) through tracing.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        error!("Panic: {}\nStack trace:\n{}", info, backtrace);
    }));
}

/// Startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to build checkout client: {0}")]
    CheckoutClient(#[from] reqwest::Error),
}
