pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{extract::Request, Router};
use std::sync::Arc;
use tower::{
    util::{MapRequest, MapRequestLayer},
    Layer,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::Config,
    database::Database,
    error::{ApiError, StartupError},
    models::{ORDERS, PRODUCTS},
    services::{
        checkout::CheckoutProxy,
        notifications::{NotificationQueue, Notifier},
    },
};

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub notifications: NotificationQueue,
    pub checkout: CheckoutProxy,
}

impl AppState {
    /// Opens the store, builds the checkout client and starts the
    /// notification worker. Must run inside a Tokio runtime.
    pub async fn new(config: Config, notifier: Arc<dyn Notifier>) -> Result<Arc<Self>, StartupError> {
        let db = Database::open(config.store.path.clone(), &[PRODUCTS, ORDERS]).await?;
        let checkout = CheckoutProxy::from_config(&config.checkout)?;

        // The worker is detached; it exits once the last queue handle is dropped
        let (notifications, _worker) =
            NotificationQueue::start(notifier, config.notifications.queue_capacity);
        info!("Notification worker started");

        Ok(Arc::new(Self {
            db,
            config,
            notifications,
            checkout,
        }))
    }
}

/// The full service: path rewriting happens before routing, so it wraps the router.
pub type App = MapRequest<Router, fn(Request) -> Request>;

pub fn app(state: Arc<AppState>) -> App {
    let router = Router::new()
        .merge(controllers::routes(state.checkout.prefix()))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state.clone())
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(middleware::cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http());

    MapRequestLayer::new(middleware::rewrite_request as fn(Request) -> Request).layer(router)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
