//! MQ 事件路由 - 入站事件分发
//!
//! 订阅服务队列，解析事件信封并按名分发到领域服务。信封只要求
//! 一个 `event` 字段，其余内容平铺保留，由各处理函数决定是否
//! 深入解析。已注册事件：
//!
//! | 事件 | 动作 |
//! |------|------|
//! | `order.created` | 刷新 detail 缓存 |
//! | `order.paid` | `OrderService::mark_paid` |
//! | `order.cancelled` | `OrderService::cancel_order`（释放预留） |
//! | `inventory.released` | `InventoryService::release_reservation` |
//!
//! 未知事件记日志后丢弃。处理函数的错误被捕获记日志，不会传播
//! 进消费循环。总线按至少一次投递，处理函数对 `(event, orderId)`
//! 幂等。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::BoxFuture;
use serde::Deserialize;

use super::consumer::{OrderEventConsumer, RawHandler};
use crate::core::OrderError;
use crate::domain::inventory::{InventoryService, Reservation};
use crate::domain::OrderService;

/// 事件信封：必填的 `event` + 平铺的消息体
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(flatten)]
    pub body: serde_json::Value,
}

impl EventEnvelope {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(|v| v.as_str())
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.body.get(key).and_then(|v| v.as_u64())
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.body.get(key).and_then(|v| v.as_f64())
    }
}

type EventHandler =
    Arc<dyn Fn(EventEnvelope) -> BoxFuture<'static, Result<(), OrderError>> + Send + Sync>;

/// 路由依赖
pub struct RouterDeps {
    pub consumer: Arc<OrderEventConsumer>,
    pub orders: Arc<OrderService>,
    pub inventory: Option<Arc<InventoryService>>,
}

pub struct EventRouter {
    consumer: Arc<OrderEventConsumer>,
    /// 注册后只读，消费回调共享同一份表
    handlers: Arc<HashMap<&'static str, EventHandler>>,
}

impl EventRouter {
    /// 构造并注册全部处理函数；handler 表此后只读
    pub fn new(deps: RouterDeps) -> Self {
        let mut handlers: HashMap<&'static str, EventHandler> = HashMap::new();

        let orders = deps.orders.clone();
        handlers.insert(
            "order.created",
            Arc::new(move |envelope| {
                let orders = orders.clone();
                Box::pin(async move {
                    let order_id = required(&envelope, "orderId")?;
                    orders.refresh_cache(&order_id).await;
                    Ok(())
                })
            }),
        );

        let orders = deps.orders.clone();
        handlers.insert(
            "order.paid",
            Arc::new(move |envelope| {
                let orders = orders.clone();
                Box::pin(async move {
                    let order_id = required(&envelope, "orderId")?;
                    let amount = envelope
                        .f64_field("paidAmount")
                        .or_else(|| envelope.f64_field("amount"))
                        .ok_or_else(|| {
                            OrderError::InvalidInput("order.paid missing paidAmount".into())
                        })?;
                    orders.mark_paid(&order_id, amount, Utc::now()).await?;
                    Ok(())
                })
            }),
        );

        let orders = deps.orders.clone();
        handlers.insert(
            "order.cancelled",
            Arc::new(move |envelope| {
                let orders = orders.clone();
                Box::pin(async move {
                    let order_id = required(&envelope, "orderId")?;
                    let reason = envelope
                        .str_field("reason")
                        .unwrap_or("cancelled via event")
                        .to_string();
                    orders.cancel_order(&order_id, &reason, true).await?;
                    Ok(())
                })
            }),
        );

        if let Some(inventory) = deps.inventory.clone() {
            handlers.insert(
                "inventory.released",
                Arc::new(move |envelope| {
                    let inventory = inventory.clone();
                    Box::pin(async move {
                        let order_id = required(&envelope, "orderId")?;
                        let product_id = required(&envelope, "productId")?;
                        let quantity = envelope.u64_field("quantity").ok_or_else(|| {
                            OrderError::InvalidInput("inventory.released missing quantity".into())
                        })? as u32;
                        let reservation = Reservation {
                            reservation_id: format!("{order_id}:{product_id}"),
                            order_id,
                            product_id,
                            quantity,
                            expires_at: Utc::now(),
                        };
                        inventory
                            .release_reservation(&reservation, "released via event")
                            .await?;
                        Ok(())
                    })
                }),
            );
        }

        tracing::info!(handlers = handlers.len(), "event router initialized");
        Self {
            consumer: deps.consumer,
            handlers: Arc::new(handlers),
        }
    }

    /// 解析并分发单条消息；所有失败在此收敛为日志
    pub async fn dispatch(&self, payload: &str) {
        dispatch_with(&self.handlers, payload).await;
    }

    /// 在消费器上安装回调并启动；幂等
    pub async fn start(&self) -> Result<(), OrderError> {
        let handlers = Arc::clone(&self.handlers);
        let handler: RawHandler = Arc::new(move |payload: String| {
            let handlers = Arc::clone(&handlers);
            Box::pin(async move {
                dispatch_with(&handlers, &payload).await;
                Ok(())
            })
        });
        self.consumer.start(handler).await
    }

    /// 停止消费；幂等
    pub async fn stop(&self) {
        self.consumer.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.consumer.is_running()
    }
}

async fn dispatch_with(handlers: &HashMap<&'static str, EventHandler>, payload: &str) {
    let envelope: EventEnvelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "invalid event envelope, dropping");
            return;
        }
    };

    let Some(handler) = handlers.get(envelope.event.as_str()) else {
        tracing::warn!(event = %envelope.event, "no handler registered, dropping");
        return;
    };

    tracing::debug!(event = %envelope.event, "dispatching event");
    if let Err(e) = handler(envelope).await {
        tracing::warn!(error = %e, "event handler failed");
    }
}

fn required(envelope: &EventEnvelope, key: &str) -> Result<String, OrderError> {
    envelope
        .str_field(key)
        .map(str::to_string)
        .ok_or_else(|| OrderError::InvalidInput(format!("{} missing {key}", envelope.event)))
}
