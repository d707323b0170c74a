pub mod document;
pub mod order;

pub use document::{Document, ID_FIELD};
pub use order::{Order, ORDERS, PRODUCTS};
