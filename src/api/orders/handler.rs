//! Order API Handlers
//!
//! 下单与查询两个入口，处理器是核心服务之上的薄适配层：
//! 解析 → 校验 → 调服务 → 整形响应。失败一律以 [`OrderError`]
//! 冒泡，由其 `IntoResponse` 实现统一翻译成 HTTP 状态码与
//! `{"error": message}` 响应体。

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::{AppState, OrderError, Result};
use crate::domain::{CreateContext, OrderEntity, OrderRecord};

// =========================================================================
// Create
// =========================================================================

fn default_quantity() -> u32 {
    1
}

fn default_currency() -> String {
    "CNY".into()
}

/// 下单请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// POST /orders
///
/// 解析请求 → 校验参数 → 预留库存 → 持久化订单 → 缓存 → MQ → 响应
pub async fn create(State(state): State<AppState>, body: String) -> Result<Response> {
    tracing::info!(content_length = body.len(), "incoming order.create request");

    let request: CreateOrderRequest = serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(error = %e, "json parse error");
        OrderError::InvalidInput("Invalid JSON payload".into())
    })?;

    if request.user_id.is_empty() || request.product_id.is_empty() {
        return Err(OrderError::InvalidInput(
            "Missing userId or productId".into(),
        ));
    }
    if request.quantity == 0 || request.amount <= 0.0 {
        return Err(OrderError::InvalidInput("Invalid quantity or amount".into()));
    }

    let entity = OrderEntity::from_record(OrderRecord {
        order_id: state.id_generator.next_id(),
        user_id: request.user_id.clone(),
        product_id: request.product_id.clone(),
        quantity: request.quantity,
        total_amount: request.amount,
        currency: request.currency.clone(),
        ..OrderRecord::default()
    });

    let created = state
        .orders
        .create_order(CreateContext {
            entity,
            raw_payload: body,
            skip_reservation: false,
        })
        .await
        .inspect_err(|err| {
            tracing::warn!(
                user_id = %request.user_id,
                product_id = %request.product_id,
                error = %err,
                "order create failed"
            );
        })?;

    let record = created.entity.record();
    tracing::info!(
        order_id = %record.order_id,
        user_id = %record.user_id,
        product_id = %record.product_id,
        quantity = record.quantity,
        "order created successfully"
    );
    Ok((
        StatusCode::OK,
        Json(json!({
            "orderId": record.order_id,
            "status": record.status.as_str(),
            "message": "order created successfully",
        })),
    )
        .into_response())
}

// =========================================================================
// Query
// =========================================================================

/// 单条订单响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailResponse {
    pub order_id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub total_amount: f64,
    pub currency: String,
    pub status: String,
    pub status_reason: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// 列表项（精简字段）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub total_amount: f64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub total: usize,
    pub orders: Vec<OrderSummary>,
}

/// GET /orders
///
/// `?id=` 单条查询优先于 `?userId=` 列表查询；两者都缺失返回 400。
/// limit/offset 非法时回落默认值并告警，不报 400。
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    tracing::info!(?params, "incoming order.query request");

    if let Some(order_id) = params.get("id").filter(|v| !v.is_empty()) {
        return query_by_id(&state, order_id).await;
    }
    if let Some(user_id) = params.get("userId").filter(|v| !v.is_empty()) {
        return query_by_user(&state, user_id, &params).await;
    }
    Err(OrderError::InvalidInput(
        "Missing query parameter: id or userId".into(),
    ))
}

async fn query_by_id(state: &AppState, order_id: &str) -> Result<Response> {
    let entity = state
        .orders
        .get_order_by_id(order_id, true)
        .await
        .inspect_err(|e| tracing::error!(order_id, error = %e, "order query failed"))?
        .ok_or(OrderError::NotFound)?;

    let record = entity.record();
    Ok(Json(OrderDetailResponse {
        order_id: record.order_id.clone(),
        user_id: record.user_id.clone(),
        product_id: record.product_id.clone(),
        quantity: record.quantity,
        total_amount: record.total_amount,
        currency: record.currency.clone(),
        status: record.status.as_str().to_string(),
        status_reason: record.status_reason.clone(),
        created_at: record.created_at.timestamp(),
        updated_at: record.updated_at.timestamp(),
    })
    .into_response())
}

async fn query_by_user(
    state: &AppState,
    user_id: &str,
    params: &HashMap<String, String>,
) -> Result<Response> {
    let limit = parse_param(params, "limit", state.orders.options().default_page_size);
    let offset = parse_param(params, "offset", 0);

    let entities = state
        .orders
        .list_orders_by_user(user_id, limit, offset, true)
        .await
        .inspect_err(|e| tracing::error!(user_id, error = %e, "order list query failed"))?;
    if entities.is_empty() {
        return Err(OrderError::NotFound);
    }

    let orders: Vec<OrderSummary> = entities
        .iter()
        .map(|e| {
            let record = e.record();
            OrderSummary {
                order_id: record.order_id.clone(),
                product_id: record.product_id.clone(),
                quantity: record.quantity,
                total_amount: record.total_amount,
                status: record.status.as_str().to_string(),
            }
        })
        .collect();
    Ok(Json(OrderListResponse {
        total: orders.len(),
        orders,
    })
    .into_response())
}

fn parse_param(params: &HashMap<String, String>, key: &str, default: usize) -> usize {
    match params.get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw = %raw, "invalid query parameter, falling back to default");
            default
        }),
        None => default,
    }
}
