//! 库存服务 - KV 存储上的预留协议
//!
//! | 键形态 | 值 |
//! |--------|-----|
//! | `inventory:stock:<productId>` | 非负整数（十进制文本） |
//! | `inventory:reservation:<reservationId>` | `orderId,productId,quantity,expiresAtEpoch` |
//!
//! `reservationId = orderId + ":" + productId`，确定性构造使重复
//! 预留天然碰撞。预留成功后发布 `inventory.reservation` 事件；
//! commit 即删除预留键，release 把数量加回库存。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::core::OrderError;
use crate::domain::OrderRecord;
use crate::kv::Kv;
use crate::mq::EventPublisher;

/// 库存预留
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub reservation_id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub expires_at: DateTime<Utc>,
}

/// 库存服务配置
#[derive(Debug, Clone)]
pub struct InventoryOptions {
    pub stock_key_prefix: String,
    pub reservation_key_prefix: String,
    pub reservation_ttl: Duration,
    pub publish_events: bool,
    pub event_exchange: String,
    pub reservation_routing_key: String,
    pub restock_routing_key: String,
}

impl Default for InventoryOptions {
    fn default() -> Self {
        Self {
            stock_key_prefix: "inventory:stock:".into(),
            reservation_key_prefix: "inventory:reservation:".into(),
            reservation_ttl: Duration::from_secs(300),
            publish_events: true,
            event_exchange: String::new(),
            reservation_routing_key: "inventory.reservation".into(),
            restock_routing_key: "inventory.restock".into(),
        }
    }
}

pub struct InventoryService {
    kv: Arc<dyn Kv>,
    producer: Option<Arc<dyn EventPublisher>>,
    options: InventoryOptions,
}

impl InventoryService {
    pub fn new(
        kv: Arc<dyn Kv>,
        producer: Option<Arc<dyn EventPublisher>>,
        options: InventoryOptions,
    ) -> Self {
        Self {
            kv,
            producer,
            options,
        }
    }

    pub fn options(&self) -> &InventoryOptions {
        &self.options
    }

    // ========== 关键逻辑入口 ==========

    /// 为订单预留库存
    ///
    /// 幂等：同一 `(orderId, productId)` 的预留键若仍存在，直接返回
    /// 既有预留。读-改-写不是原子的：并发下可能超卖，竞争在订单
    /// 主键插入处浮出，由回滚路径补偿。
    pub async fn reserve_for_order(&self, order: &OrderRecord) -> Result<Reservation, OrderError> {
        let reservation_id = make_reservation_id(order);
        let reservation_key = self.reservation_key(&reservation_id);

        if let Some(raw) = self.kv.get(&reservation_key).await? {
            if let Some(existing) = parse_reservation(&reservation_id, &raw) {
                tracing::debug!(reservation_id = %reservation_id, "reservation already held");
                return Ok(existing);
            }
        }

        let stock_key = self.stock_key(&order.product_id);
        let stock = match self.kv.get(&stock_key).await? {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                OrderError::DependencyUnavailable(format!(
                    "invalid stock value for {}: {raw}",
                    order.product_id
                ))
            })?,
            None => {
                return Err(OrderError::StockMissing {
                    product_id: order.product_id.clone(),
                })
            }
        };

        if stock < u64::from(order.quantity) {
            return Err(OrderError::InsufficientStock {
                product_id: order.product_id.clone(),
            });
        }

        // 扣减库存
        let remaining = stock - u64::from(order.quantity);
        self.kv
            .set(&stock_key, &remaining.to_string(), None)
            .await?;

        // 缓存预留记录；键上带 TTL，遗弃的预留由服务端过期
        let reservation = Reservation {
            reservation_id: reservation_id.clone(),
            order_id: order.order_id.clone(),
            product_id: order.product_id.clone(),
            quantity: order.quantity,
            expires_at: Utc::now() + self.options.reservation_ttl,
        };
        self.kv
            .set(
                &reservation_key,
                &encode_reservation(&reservation),
                Some(self.options.reservation_ttl),
            )
            .await?;

        if self.options.publish_events {
            self.publish_reservation_event(&reservation, "created").await;
        }

        Ok(reservation)
    }

    /// 查询在途预留；键不存在返回 None
    pub async fn find_reservation(
        &self,
        reservation_id: &str,
    ) -> Result<Option<Reservation>, OrderError> {
        match self.kv.get(&self.reservation_key(reservation_id)).await? {
            Some(raw) => Ok(parse_reservation(reservation_id, &raw)),
            None => Ok(None),
        }
    }

    /// 提交预留：删除预留键（已消失视为已提交）
    pub async fn commit_reservation(&self, reservation: &Reservation) -> Result<(), OrderError> {
        self.kv
            .del(&self.reservation_key(&reservation.reservation_id))
            .await?;
        if self.options.publish_events {
            self.publish_reservation_event(reservation, "committed").await;
        }
        Ok(())
    }

    /// 释放预留：数量加回库存，删除预留键
    pub async fn release_reservation(
        &self,
        reservation: &Reservation,
        reason: &str,
    ) -> Result<(), OrderError> {
        self.increment_stock(&reservation.product_id, reservation.quantity)
            .await?;
        self.kv
            .del(&self.reservation_key(&reservation.reservation_id))
            .await?;
        if self.options.publish_events {
            self.publish_reservation_event(reservation, &format!("released:{reason}"))
                .await;
        }
        Ok(())
    }

    // ========== 库存操作 ==========

    /// 调整库存；下溢钳制到零
    pub async fn adjust_stock(&self, product_id: &str, delta: i64) -> Result<u64, OrderError> {
        let key = self.stock_key(product_id);
        let current = match self.kv.get(&key).await? {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                OrderError::DependencyUnavailable(format!(
                    "invalid stock value for {product_id}: {raw}"
                ))
            })?,
            None => {
                return Err(OrderError::StockMissing {
                    product_id: product_id.to_string(),
                })
            }
        };
        let next = (current + delta).max(0) as u64;
        self.kv.set(&key, &next.to_string(), None).await?;
        Ok(next)
    }

    pub async fn set_stock(&self, product_id: &str, amount: u64) -> Result<(), OrderError> {
        self.kv
            .set(&self.stock_key(product_id), &amount.to_string(), None)
            .await?;
        Ok(())
    }

    pub async fn query_stock(&self, product_id: &str) -> Result<Option<u64>, OrderError> {
        match self.kv.get(&self.stock_key(product_id)).await? {
            Some(raw) => Ok(raw.parse::<u64>().ok()),
            None => Ok(None),
        }
    }

    /// 从数据库重建库存（声明保留，未实现；见 DESIGN.md）
    pub async fn sync_stock_from_database(&self, _product_id: &str) -> Result<(), OrderError> {
        Ok(())
    }

    // ========== 事件发布 ==========

    /// 发布预留事件；失败记日志后吞掉
    pub async fn publish_reservation_event(&self, reservation: &Reservation, event_type: &str) {
        let Some(producer) = &self.producer else {
            return;
        };
        let payload = json!({
            "reservationId": reservation.reservation_id,
            "orderId": reservation.order_id,
            "productId": reservation.product_id,
            "quantity": reservation.quantity,
            "eventType": event_type,
        })
        .to_string();
        if let Err(e) = producer
            .publish(
                &self.options.event_exchange,
                &self.options.reservation_routing_key,
                &payload,
            )
            .await
        {
            tracing::warn!(error = %e, event_type, "reservation event publish failed");
        }
    }

    pub async fn publish_restock_event(&self, product_id: &str, quantity: i64) {
        let Some(producer) = &self.producer else {
            return;
        };
        let payload = json!({
            "productId": product_id,
            "quantity": quantity,
            "eventType": "restock",
        })
        .to_string();
        if let Err(e) = producer
            .publish(
                &self.options.event_exchange,
                &self.options.restock_routing_key,
                &payload,
            )
            .await
        {
            tracing::warn!(error = %e, "restock event publish failed");
        }
    }

    // ========== 内部工具 ==========

    async fn increment_stock(&self, product_id: &str, quantity: u32) -> Result<(), OrderError> {
        let key = self.stock_key(product_id);
        let current = match self.kv.get(&key).await? {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                OrderError::DependencyUnavailable(format!(
                    "invalid stock value for {product_id}: {raw}"
                ))
            })?,
            None => {
                return Err(OrderError::StockMissing {
                    product_id: product_id.to_string(),
                })
            }
        };
        self.kv
            .set(&key, &(current + u64::from(quantity)).to_string(), None)
            .await?;
        Ok(())
    }

    fn stock_key(&self, product_id: &str) -> String {
        format!("{}{}", self.options.stock_key_prefix, product_id)
    }

    fn reservation_key(&self, reservation_id: &str) -> String {
        format!("{}{}", self.options.reservation_key_prefix, reservation_id)
    }
}

pub fn make_reservation_id(order: &OrderRecord) -> String {
    format!("{}:{}", order.order_id, order.product_id)
}

fn encode_reservation(r: &Reservation) -> String {
    format!(
        "{},{},{},{}",
        r.order_id,
        r.product_id,
        r.quantity,
        r.expires_at.timestamp()
    )
}

fn parse_reservation(reservation_id: &str, raw: &str) -> Option<Reservation> {
    let mut parts = raw.splitn(4, ',');
    let order_id = parts.next()?;
    let product_id = parts.next()?;
    let quantity: u32 = parts.next()?.parse().ok()?;
    let expires_at: i64 = parts.next()?.parse().ok()?;
    Some(Reservation {
        reservation_id: reservation_id.to_string(),
        order_id: order_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        expires_at: DateTime::<Utc>::from_timestamp(expires_at, 0)?,
    })
}
