//! Order API Module

mod handler;

use axum::routing::get;
use axum::Router;

use crate::core::AppState;

/// Order router
pub fn router() -> Router<AppState> {
    Router::new().route("/orders", get(handler::query).post(handler::create))
}
