//! Order confirmation notifications.
//!
//! Confirmations are handed to a bounded queue drained by one background
//! task. Enqueueing never waits: the HTTP response does not depend on
//! delivery, and a delivery failure is only logged.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::{document::id_string, Document, Order};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A confirmation to send for a stored order.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub recipient: String,
    pub order: Document,
}

impl OrderConfirmation {
    pub fn order_id(&self) -> String {
        Order(&self.order)
            .id()
            .and_then(id_string)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), NotifyError>;
}

/// Used when no mail transport is configured: the confirmation is only logged.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), NotifyError> {
        info!(
            recipient = %confirmation.recipient,
            order_id = %confirmation.order_id(),
            "Order confirmation not delivered: no mail transport configured"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<OrderConfirmation>,
}

impl NotificationQueue {
    /// Spawns the delivery worker. It runs until every queue handle is dropped.
    pub fn start(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<OrderConfirmation>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(confirmation) = receiver.recv().await {
                match notifier.send_order_confirmation(&confirmation).await {
                    Ok(()) => info!(
                        "Order confirmation for order {} sent to {}",
                        confirmation.order_id(),
                        confirmation.recipient
                    ),
                    Err(e) => error!(
                        "Failed to send order confirmation for order {} to {}: {}",
                        confirmation.order_id(),
                        confirmation.recipient,
                        e
                    ),
                }
            }
            info!("Notification worker stopped");
        });

        (Self { sender }, worker)
    }

    /// Hands a confirmation to the worker without waiting. Returns false when it was dropped.
    pub fn enqueue(&self, confirmation: OrderConfirmation) -> bool {
        match self.sender.try_send(confirmation) {
            Ok(()) => true,
            Err(TrySendError::Full(confirmation)) => {
                warn!(
                    "Notification queue full, dropping confirmation for order {}",
                    confirmation.order_id()
                );
                false
            }
            Err(TrySendError::Closed(confirmation)) => {
                warn!(
                    "Notification worker is gone, dropping confirmation for order {}",
                    confirmation.order_id()
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    struct ChannelNotifier(mpsc::UnboundedSender<OrderConfirmation>);

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), NotifyError> {
            let _ = self.0.send(confirmation.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send_order_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), NotifyError> {
            Err(NotifyError::InvalidAddress(confirmation.recipient.clone()))
        }
    }

    fn confirmation(id: u64) -> OrderConfirmation {
        OrderConfirmation {
            recipient: "a@b.com".to_string(),
            order: json!({ "id": id, "status": "success" }).as_object().cloned().unwrap(),
        }
    }

    #[tokio::test]
    async fn worker_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (queue, _worker) = NotificationQueue::start(Arc::new(ChannelNotifier(tx)), 8);

        assert!(queue.enqueue(confirmation(1)));
        assert!(queue.enqueue(confirmation(2)));

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.order_id(), "1");
        assert_eq!(second.order_id(), "2");
    }

    #[tokio::test]
    async fn delivery_failures_do_not_stop_the_worker() {
        let (queue, worker) = NotificationQueue::start(Arc::new(FailingNotifier), 8);
        assert!(queue.enqueue(confirmation(1)));
        assert!(queue.enqueue(confirmation(2)));

        drop(queue);
        tokio::time::timeout(Duration::from_secs(1), worker).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn enqueue_after_worker_exit_is_dropped() {
        let (queue, worker) = NotificationQueue::start(Arc::new(LogNotifier), 8);
        worker.abort();
        let _ = worker.await;

        assert!(!queue.enqueue(confirmation(1)));
    }

    #[test]
    fn order_id_falls_back_when_missing() {
        let confirmation = OrderConfirmation {
            recipient: "a@b.com".to_string(),
            order: Document::new(),
        };
        assert_eq!(confirmation.order_id(), "unknown");
    }
}
