//! HTTP API 层 - 路由与处理器
//!
//! 处理器是核心服务之上的薄适配层；未匹配的路径统一返回
//! `404 {"error":"Not Found"}`。

pub mod orders;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::json;

use crate::core::AppState;

/// 组装完整路由表
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(orders::router())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
}
