use serde_json::Value;

use super::document::{Document, ID_FIELD};

pub const ORDERS: &str = "orders";
pub const PRODUCTS: &str = "products";

/// Status value that marks a paid order and triggers a confirmation.
pub const STATUS_SUCCESS: &str = "success";

/// Read-only view over a stored order document.
#[derive(Debug, Clone, Copy)]
pub struct Order<'a>(pub &'a Document);

impl<'a> Order<'a> {
    pub fn id(&self) -> Option<&'a Value> {
        self.0.get(ID_FIELD)
    }

    pub fn email(&self) -> Option<&'a str> {
        self.0.get("email").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&'a str> {
        self.0.get("status").and_then(Value::as_str)
    }

    pub fn is_successful(&self) -> bool {
        self.status() == Some(STATUS_SUCCESS)
    }
}
