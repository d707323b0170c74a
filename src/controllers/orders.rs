//! Order ingestion.
//!
//! Every order is created here: the payload is stored as-is (the store
//! assigns the id), and a paid order queues a confirmation email without
//! waiting for it.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::resources;
use crate::{
    error::ApiError,
    middleware::JsonBody,
    models::{document::id_string, Document, Order, ORDERS},
    services::notifications::OrderConfirmation,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/orders", get(list_orders).post(create_order))
}

/// GET /api/orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Document>>, ApiError> {
    resources::list_filtered(&state, ORDERS, &filters).await.map(Json)
}

/// POST /api/orders
async fn create_order(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let Value::Object(order) = payload else {
        return Err(ApiError::BadRequest("Order payload must be a JSON object".to_string()));
    };

    let stored = state.db.insert(ORDERS, order).await.map_err(|e| {
        error!("Error creating order: {}", e);
        ApiError::OrderNotCreated
    })?;

    let view = Order(&stored);
    let order_id = view.id().and_then(id_string).unwrap_or_default();
    info!("Order {} created with status {:?}", order_id, view.status());

    if view.is_successful() {
        match view.email() {
            Some(email) => {
                state.notifications.enqueue(OrderConfirmation {
                    recipient: email.to_string(),
                    order: stored.clone(),
                });
            }
            None => warn!("Order {} succeeded without an email address, no confirmation sent", order_id),
        }
    }

    Ok((StatusCode::CREATED, Json(stored)))
}
