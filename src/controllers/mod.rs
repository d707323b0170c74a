pub mod admin;
pub mod checkout;
pub mod orders;
pub mod resources;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

pub fn routes(checkout_prefix: &str) -> Router<Arc<AppState>> {
    Router::new()
        .merge(admin::routes())
        .merge(orders::routes())
        .merge(checkout::routes(checkout_prefix))
        .merge(resources::routes())
}
