//! 错误定义 - 统一的错误分类与 HTTP 映射
//!
//! 所有边界都以带标签的值传递错误；处理器用 `?` 冒泡
//! [`OrderError`]，其 [`IntoResponse`] 实现是内部错误到 HTTP
//! 状态码的唯一翻译点。错误响应体固定为 `{"error": "<message>"}`。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::OrderStatus;
use crate::kv::KvError;

#[derive(Debug, Error)]
pub enum OrderError {
    /// 请求参数非法，映射 400，不重试
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 记录不存在，映射 404
    #[error("record not found")]
    NotFound,

    /// 状态机违例：内部错误，不直接暴露给 HTTP 客户端
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// 库存不足，映射 503，不重试
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: String },

    /// 库存键缺失（与库存为零不同）
    #[error("no stock entry for product {product_id}")]
    StockMissing { product_id: String },

    /// 持久化存储拒绝写入（约束冲突或断连），触发预留回滚
    #[error("persist failed: {0}")]
    PersistFailed(String),

    /// 数据库驱动错误
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// KV / MQ 暂时不可达
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// 缓存错误：调用方记录日志后吞掉，永不暴露给客户端
    #[error("cache error: {0}")]
    Cache(String),

    /// 事件发布失败：同缓存错误，吞掉
    #[error("event publish failed: {0}")]
    EventPublish(String),

    /// 配置错误（启动期致命）
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::StorageUnavailable(err.to_string())
    }
}

impl From<KvError> for OrderError {
    fn from(err: KvError) -> Self {
        OrderError::DependencyUnavailable(err.to_string())
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            OrderError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            OrderError::NotFound => (StatusCode::NOT_FOUND, "Record not found".to_string()),
            OrderError::InsufficientStock { .. }
            | OrderError::StockMissing { .. }
            | OrderError::DependencyUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Inventory not enough or temporarily unavailable".to_string(),
            ),
            OrderError::PersistFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to persist order".to_string(),
            ),
            other => {
                // 内部错误只记日志，不外泄细节
                tracing::error!(error = %other, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unexpected server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// 处理器的 Result 类型别名
pub type Result<T> = std::result::Result<T, OrderError>;
