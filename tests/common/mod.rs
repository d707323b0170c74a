#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use serde_json::Value;
use shop_backend::{
    config::Config,
    services::notifications::{Notifier, NotifyError, OrderConfirmation},
    App, AppState,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const ADMIN_PIN: &str = "4821";
pub const ALLOWED_ORIGIN: &str = "https://shop.example";

/// Records confirmations instead of sending them.
struct ChannelNotifier(mpsc::UnboundedSender<OrderConfirmation>);

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), NotifyError> {
        let _ = self.0.send(confirmation.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub app: App,
    pub state: Arc<AppState>,
    pub confirmations: mpsc::UnboundedReceiver<OrderConfirmation>,
    pub store_dir: Option<TempDir>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_env(&[]).await
    }

    pub async fn with_env(overrides: &[(&str, &str)]) -> Self {
        let store_dir = TempDir::new().unwrap();
        let mut vars: HashMap<String, String> = HashMap::from([
            ("ADMIN_PIN".to_string(), ADMIN_PIN.to_string()),
            ("CORS_ORIGIN".to_string(), ALLOWED_ORIGIN.to_string()),
            (
                "DB_PATH".to_string(),
                store_dir.path().join("db.json").display().to_string(),
            ),
        ]);
        for (key, value) in overrides {
            vars.insert(key.to_string(), value.to_string());
        }

        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let (tx, confirmations) = mpsc::unbounded_channel();
        let state = AppState::new(config, Arc::new(ChannelNotifier(tx))).await.unwrap();

        Self {
            app: shop_backend::app(state.clone()),
            state,
            confirmations,
            store_dir: Some(store_dir),
        }
    }

    /// Removes the store directory so every following write fails.
    pub fn break_store(&mut self) {
        if let Some(dir) = self.store_dir.take() {
            dir.close().unwrap();
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        read_json(self.send(request).await).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// Waits briefly for the next recorded confirmation.
    pub async fn next_confirmation(&mut self, wait: Duration) -> Option<OrderConfirmation> {
        tokio::time::timeout(wait, self.confirmations.recv())
            .await
            .ok()
            .flatten()
    }
}

pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
