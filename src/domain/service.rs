//! 订单服务 - 编排核心
//!
//! 聚合仓储、缓存、库存、消息四类依赖，对外提供创建 / 查询 /
//! 状态流转的统一入口，并持有跨存储写的补偿规则：
//!
//! ```text
//! create:
//!   1. 打点 Pending("order created")
//!   2. 预留库存         失败 → 实体 Failed + 尽力审计落库/缓存 → 返回错误
//!   3. 仓储 insert      失败 → 释放预留("rollback") → PersistFailed
//!   4. 缓存 put         尽力而为
//!   5. 发布 order.created  尽力而为
//! ```
//!
//! 失败分级：MQ / 缓存错误记日志后吞掉；预留成功后的仓储错误触发
//! 补偿。每次成功写库后刷新 detail 键并失效对应 user 列表键。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::cache::OrderCache;
use crate::core::OrderError;
use crate::db::OrderRepository;
use crate::domain::inventory::{make_reservation_id, InventoryService, Reservation};
use crate::domain::{OrderEntity, OrderRecord, OrderStatus};
use crate::mq::EventPublisher;

/// 服务依赖；可选项缺省时对应能力自动降级
pub struct OrderServiceDeps {
    pub repository: Arc<dyn OrderRepository>,
    pub cache: Option<Arc<OrderCache>>,
    pub inventory: Option<Arc<InventoryService>>,
    pub producer: Option<Arc<dyn EventPublisher>>,
}

#[derive(Debug, Clone)]
pub struct OrderServiceOptions {
    pub use_cache: bool,
    pub use_message_queue: bool,
    pub require_inventory_reservation: bool,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// 出站事件的 exchange 与路由键
    pub event_exchange: String,
    pub order_routing_key: String,
}

impl Default for OrderServiceOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            use_message_queue: true,
            require_inventory_reservation: true,
            default_page_size: 20,
            max_page_size: 100,
            event_exchange: String::new(),
            order_routing_key: "order.events".into(),
        }
    }
}

/// 创建上下文：已组装的实体 + 原始请求体
pub struct CreateContext {
    pub entity: OrderEntity,
    pub raw_payload: String,
    pub skip_reservation: bool,
}

#[derive(Debug)]
pub struct CreateResult {
    pub entity: OrderEntity,
    pub reservation: Option<Reservation>,
}

pub struct OrderService {
    deps: OrderServiceDeps,
    options: OrderServiceOptions,
}

impl OrderService {
    pub fn new(deps: OrderServiceDeps) -> Self {
        Self::with_options(deps, OrderServiceOptions::default())
    }

    pub fn with_options(deps: OrderServiceDeps, options: OrderServiceOptions) -> Self {
        Self { deps, options }
    }

    pub fn options(&self) -> &OrderServiceOptions {
        &self.options
    }

    // ========== 创建接口 ==========

    pub async fn create_order(&self, ctx: CreateContext) -> Result<CreateResult, OrderError> {
        let CreateContext {
            mut entity,
            raw_payload,
            skip_reservation,
        } = ctx;

        entity.set_payload(raw_payload.clone());
        entity.set_created_at(Utc::now());
        entity.mark_pending("order created")?;

        let mut reservation = None;
        if self.options.require_inventory_reservation && !skip_reservation {
            if let Some(inventory) = &self.deps.inventory {
                match inventory.reserve_for_order(entity.record()).await {
                    Ok(r) => reservation = Some(r),
                    Err(err) => {
                        // 失败实体尽力落库留审计痕迹，不影响错误返回
                        let _ = entity.mark_failed("inventory reservation failed");
                        if let Err(e) = self.deps.repository.insert(entity.record()).await {
                            tracing::warn!(
                                order_id = %entity.id(),
                                error = %e,
                                "audit insert of failed order did not land"
                            );
                        }
                        self.cache_put(entity.record()).await;
                        return Err(err);
                    }
                }
            }
        }

        let inserted = match self.deps.repository.insert(entity.record()).await {
            Ok(done) => done,
            Err(e) => {
                self.rollback_reservation(&reservation).await;
                return Err(OrderError::PersistFailed(e.to_string()));
            }
        };
        if !inserted {
            self.rollback_reservation(&reservation).await;
            return Err(OrderError::PersistFailed(format!(
                "order {} already exists",
                entity.id()
            )));
        }

        self.refresh_after_write(entity.record()).await;
        self.publish_event("order.created", entity.record(), Some(&raw_payload))
            .await;

        Ok(CreateResult {
            entity,
            reservation,
        })
    }

    // ========== 状态更新接口 ==========

    pub async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        reason: &str,
    ) -> Result<bool, OrderError> {
        if !self
            .deps
            .repository
            .update_status(order_id, status, reason)
            .await?
        {
            return Ok(false);
        }

        let record = self.refresh_cache(order_id).await;
        if let Some(record) = record {
            self.invalidate_user_index(&record.user_id).await;
            self.publish_event("order.status_updated", &record, Some(reason))
                .await;
        }
        Ok(true)
    }

    pub async fn mark_paid(
        &self,
        order_id: &str,
        paid_amount: f64,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, OrderError> {
        if !self
            .deps
            .repository
            .update_payment(order_id, paid_amount, paid_at)
            .await?
        {
            return Ok(false);
        }

        let record = self.refresh_cache(order_id).await;
        if let Some(record) = record {
            // 支付达成即提交预留（预留生命周期终点之一）
            if let Some(inventory) = &self.deps.inventory {
                let r = Reservation {
                    reservation_id: make_reservation_id(&record),
                    order_id: record.order_id.clone(),
                    product_id: record.product_id.clone(),
                    quantity: record.quantity,
                    expires_at: paid_at,
                };
                if let Err(e) = inventory.commit_reservation(&r).await {
                    tracing::warn!(order_id, error = %e, "reservation commit on payment failed");
                }
            }
            self.invalidate_user_index(&record.user_id).await;
            self.publish_event("order.paid", &record, None).await;
        }
        Ok(true)
    }

    /// 取消订单；终态行直接视为已取消（至少一次投递下的幂等）
    pub async fn cancel_order(
        &self,
        order_id: &str,
        reason: &str,
        release_reservation: bool,
    ) -> Result<bool, OrderError> {
        let Some(record) = self.deps.repository.get_by_id(order_id).await? else {
            return Ok(false);
        };
        if record.status.is_terminal() {
            tracing::debug!(order_id, status = record.status.as_str(), "cancel on terminal order, no-op");
            return Ok(true);
        }

        if !self
            .deps
            .repository
            .update_status(order_id, OrderStatus::Cancelled, reason)
            .await?
        {
            return Ok(false);
        }

        if release_reservation {
            if let Some(inventory) = &self.deps.inventory {
                // 仅释放确实在途的预留；已提交或已过期的键不存在，库存不回补
                match inventory.find_reservation(&make_reservation_id(&record)).await {
                    Ok(Some(r)) => {
                        if let Err(e) = inventory.release_reservation(&r, "order cancelled").await
                        {
                            tracing::warn!(order_id, error = %e, "reservation release on cancel failed");
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(order_id, "no reservation held, nothing to release");
                    }
                    Err(e) => {
                        tracing::warn!(order_id, error = %e, "reservation lookup on cancel failed");
                    }
                }
            }
        }

        self.refresh_cache(order_id).await;
        self.invalidate_user_index(&record.user_id).await;
        self.publish_event("order.cancelled", &record, Some(reason))
            .await;
        Ok(true)
    }

    // ========== 查询接口 ==========

    pub async fn get_order_by_id(
        &self,
        order_id: &str,
        prefer_cache: bool,
    ) -> Result<Option<OrderEntity>, OrderError> {
        if prefer_cache && self.options.use_cache {
            if let Some(cache) = &self.deps.cache {
                match cache.get_order(order_id).await {
                    Ok(Some(record)) => return Ok(Some(OrderEntity::from_record(record))),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(order_id, error = %e, "cache read failed"),
                }
            }
        }

        let Some(record) = self.deps.repository.get_by_id(order_id).await? else {
            return Ok(None);
        };
        self.cache_put(&record).await;
        Ok(Some(OrderEntity::from_record(record)))
    }

    pub async fn list_orders_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
        prefer_cache: bool,
    ) -> Result<Vec<OrderEntity>, OrderError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = limit.min(self.options.max_page_size);

        if prefer_cache && self.options.use_cache {
            if let Some(cache) = &self.deps.cache {
                match cache.get_user_orders(user_id).await {
                    Ok(Some(records)) => {
                        return Ok(records.into_iter().map(OrderEntity::from_record).collect())
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(user_id, error = %e, "user index read failed"),
                }
            }
        }

        let records = self
            .deps
            .repository
            .list_by_user(user_id, limit, offset)
            .await?;

        if self.options.use_cache {
            if let Some(cache) = &self.deps.cache {
                if let Err(e) = cache.put_user_orders(user_id, &records).await {
                    tracing::warn!(user_id, error = %e, "user index write failed");
                }
            }
        }

        Ok(records.into_iter().map(OrderEntity::from_record).collect())
    }

    // ========== 缓存维护接口 ==========

    pub async fn warmup_cache(&self, records: &[OrderRecord]) {
        if !self.options.use_cache {
            return;
        }
        if let Some(cache) = &self.deps.cache {
            cache.warmup(records).await;
        }
    }

    /// 以数据库行刷新 detail 键；刷新失败时删除键，绝不留脏数据
    pub async fn refresh_cache(&self, order_id: &str) -> Option<OrderRecord> {
        let record = match self.deps.repository.get_by_id(order_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(order_id, error = %e, "cache refresh read failed");
                return None;
            }
        };
        if self.options.use_cache {
            if let Some(cache) = &self.deps.cache {
                if let Err(e) = cache.put_order(&record).await {
                    tracing::warn!(order_id, error = %e, "cache refresh failed, dropping entry");
                    if let Err(e) = cache.remove_order(order_id).await {
                        tracing::warn!(order_id, error = %e, "cache drop failed");
                    }
                }
            }
        }
        Some(record)
    }

    async fn refresh_after_write(&self, record: &OrderRecord) {
        self.cache_put(record).await;
        self.invalidate_user_index(&record.user_id).await;
    }

    async fn cache_put(&self, record: &OrderRecord) {
        if !self.options.use_cache {
            return;
        }
        if let Some(cache) = &self.deps.cache {
            if let Err(e) = cache.put_order(record).await {
                tracing::warn!(order_id = %record.order_id, error = %e, "cache put failed");
                if let Err(e) = cache.remove_order(&record.order_id).await {
                    tracing::warn!(order_id = %record.order_id, error = %e, "cache drop failed");
                }
            }
        }
    }

    async fn invalidate_user_index(&self, user_id: &str) {
        if !self.options.use_cache {
            return;
        }
        if let Some(cache) = &self.deps.cache {
            if let Err(e) = cache.remove_user_orders(user_id).await {
                tracing::warn!(user_id, error = %e, "user index invalidation failed");
            }
        }
    }

    async fn rollback_reservation(&self, reservation: &Option<Reservation>) {
        let (Some(r), Some(inventory)) = (reservation, &self.deps.inventory) else {
            return;
        };
        if let Err(e) = inventory.release_reservation(r, "rollback").await {
            tracing::error!(
                reservation_id = %r.reservation_id,
                error = %e,
                "reservation rollback failed, stock may be inconsistent"
            );
        }
    }

    /// 发布订单事件；status 为状态序号。失败记日志后吞掉。
    async fn publish_event(&self, event: &str, record: &OrderRecord, payload: Option<&str>) {
        if !self.options.use_message_queue {
            return;
        }
        let Some(producer) = &self.deps.producer else {
            return;
        };
        let mut body = json!({
            "event": event,
            "orderId": record.order_id,
            "userId": record.user_id,
            "productId": record.product_id,
            "status": record.status.ordinal(),
        });
        if let Some(payload) = payload {
            if !payload.is_empty() {
                body["payload"] = json!(payload);
            }
        }
        if let Err(e) = producer
            .publish(
                &self.options.event_exchange,
                &self.options.order_routing_key,
                &body.to_string(),
            )
            .await
        {
            tracing::warn!(event, order_id = %record.order_id, error = %e, "event publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOptions, OrderCache};
    use crate::db::MemoryOrderRepository;
    use crate::domain::inventory::InventoryOptions;
    use crate::kv::{Kv, MemoryKv};
    use crate::mq::MemoryPublisher;

    struct Rig {
        repository: Arc<MemoryOrderRepository>,
        kv: Arc<MemoryKv>,
        publisher: Arc<MemoryPublisher>,
        inventory: Arc<InventoryService>,
        service: OrderService,
    }

    fn rig() -> Rig {
        let repository = Arc::new(MemoryOrderRepository::new());
        let kv = Arc::new(MemoryKv::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let cache = Arc::new(OrderCache::new(kv.clone(), CacheOptions::default()));
        let inventory = Arc::new(InventoryService::new(
            kv.clone(),
            Some(publisher.clone()),
            InventoryOptions::default(),
        ));
        let service = OrderService::new(OrderServiceDeps {
            repository: repository.clone(),
            cache: Some(cache),
            inventory: Some(inventory.clone()),
            producer: Some(publisher.clone()),
        });
        Rig {
            repository,
            kv,
            publisher,
            inventory,
            service,
        }
    }

    fn staged_entity(order_id: &str, quantity: u32) -> OrderEntity {
        OrderEntity::from_record(OrderRecord {
            order_id: order_id.into(),
            user_id: "u1".into(),
            product_id: "p1".into(),
            quantity,
            total_amount: 10.0 * quantity as f64,
            ..OrderRecord::default()
        })
    }

    fn ctx(order_id: &str, quantity: u32) -> CreateContext {
        CreateContext {
            entity: staged_entity(order_id, quantity),
            raw_payload: format!(r#"{{"userId":"u1","productId":"p1","quantity":{quantity}}}"#),
            skip_reservation: false,
        }
    }

    #[tokio::test]
    async fn create_reserves_persists_caches_publishes() {
        let rig = rig();
        rig.inventory.set_stock("p1", 10).await.unwrap();

        let result = rig.service.create_order(ctx("ORD-1", 3)).await.unwrap();

        assert_eq!(result.entity.status(), OrderStatus::Pending);
        let reservation = result.reservation.expect("reservation expected");
        assert_eq!(reservation.quantity, 3);

        // 仓储有行，库存已扣，预留键存在
        let row = rig.repository.get_by_id("ORD-1").await.unwrap().unwrap();
        assert_eq!(row.status, OrderStatus::Pending);
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(7));
        assert!(rig.kv.raw_get("inventory:reservation:ORD-1:p1").is_some());

        // detail 键已写入
        assert!(rig.kv.raw_get("order:ORD-1").is_some());

        // order.created 事件在线
        let events = rig.publisher.messages_for("order.events");
        assert_eq!(events.len(), 1);
        let v: serde_json::Value = serde_json::from_str(&events[0].payload).unwrap();
        assert_eq!(v["event"], "order.created");
        assert_eq!(v["orderId"], "ORD-1");
        assert_eq!(v["status"], 0);
        assert!(v["payload"].as_str().unwrap().contains("\"quantity\":3"));
    }

    #[tokio::test]
    async fn create_with_insufficient_stock_records_failed_audit_row() {
        let rig = rig();
        rig.inventory.set_stock("p1", 2).await.unwrap();

        let err = rig.service.create_order(ctx("ORD-2", 3)).await.unwrap_err();
        assert!(matches!(err, OrderError::InsufficientStock { .. }));

        // 库存未动，预留键不存在
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(2));
        assert!(rig.kv.raw_get("inventory:reservation:ORD-2:p1").is_none());

        // 审计行以 Failed 落库
        let row = rig.repository.get_by_id("ORD-2").await.unwrap().unwrap();
        assert_eq!(row.status, OrderStatus::Failed);
        assert_eq!(row.status_reason, "inventory reservation failed");

        // 没有 order.created 事件
        assert!(rig.publisher.messages_for("order.events").is_empty());
    }

    #[tokio::test]
    async fn create_rolls_back_reservation_when_insert_fails() {
        let rig = rig();
        rig.inventory.set_stock("p1", 5).await.unwrap();
        rig.repository.set_fail_inserts(true);

        let err = rig.service.create_order(ctx("ORD-3", 2)).await.unwrap_err();
        assert!(matches!(err, OrderError::PersistFailed(_)));

        // 库存恢复，预留键被清除
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(5));
        assert!(rig.kv.raw_get("inventory:reservation:ORD-3:p1").is_none());
        assert!(rig.publisher.messages_for("order.events").is_empty());
    }

    #[tokio::test]
    async fn duplicate_order_id_rolls_back_and_reports_persist_failed() {
        let rig = rig();
        rig.inventory.set_stock("p1", 10).await.unwrap();
        rig.service.create_order(ctx("ORD-4", 2)).await.unwrap();
        // 第一单 commit 掉预留，避免重复预留直接复用
        let stock_after_first = rig.inventory.query_stock("p1").await.unwrap().unwrap();
        assert_eq!(stock_after_first, 8);
        rig.kv.del("inventory:reservation:ORD-4:p1").await.unwrap();

        let err = rig.service.create_order(ctx("ORD-4", 2)).await.unwrap_err();
        assert!(matches!(err, OrderError::PersistFailed(_)));
        // 第二次预留被回滚
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn update_status_refreshes_cache_and_publishes() {
        let rig = rig();
        rig.inventory.set_stock("p1", 10).await.unwrap();
        rig.service.create_order(ctx("ORD-5", 1)).await.unwrap();

        let done = rig
            .service
            .update_status("ORD-5", OrderStatus::Processing, "picking")
            .await
            .unwrap();
        assert!(done);

        // 缓存里的状态已是新值
        let cached = rig.kv.raw_get("order:ORD-5").unwrap();
        assert!(cached.contains("|1|picking|"), "cached: {cached}");

        let events = rig.publisher.messages_for("order.events");
        let last: serde_json::Value = serde_json::from_str(&events.last().unwrap().payload).unwrap();
        assert_eq!(last["event"], "order.status_updated");
        assert_eq!(last["status"], 1);
    }

    #[tokio::test]
    async fn mark_paid_updates_row_and_publishes() {
        let rig = rig();
        rig.inventory.set_stock("p1", 10).await.unwrap();
        rig.service.create_order(ctx("ORD-6", 1)).await.unwrap();

        let done = rig
            .service
            .mark_paid("ORD-6", 99.5, Utc::now())
            .await
            .unwrap();
        assert!(done);

        let row = rig.repository.get_by_id("ORD-6").await.unwrap().unwrap();
        assert_eq!(row.status, OrderStatus::Paid);
        assert_eq!(row.total_amount, 99.5);

        // 支付提交预留：键删除，库存不回补
        assert!(rig.kv.raw_get("inventory:reservation:ORD-6:p1").is_none());
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(9));

        let events = rig.publisher.messages_for("order.events");
        let last: serde_json::Value = serde_json::from_str(&events.last().unwrap().payload).unwrap();
        assert_eq!(last["event"], "order.paid");
    }

    #[tokio::test]
    async fn cancel_releases_reservation_and_restores_stock() {
        let rig = rig();
        rig.inventory.set_stock("p1", 10).await.unwrap();
        rig.service.create_order(ctx("ORD-7", 4)).await.unwrap();
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(6));

        let done = rig
            .service
            .cancel_order("ORD-7", "user asked", true)
            .await
            .unwrap();
        assert!(done);

        let row = rig.repository.get_by_id("ORD-7").await.unwrap().unwrap();
        assert_eq!(row.status, OrderStatus::Cancelled);
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(10));
        assert!(rig.kv.raw_get("inventory:reservation:ORD-7:p1").is_none());

        let events = rig.publisher.messages_for("order.events");
        let last: serde_json::Value = serde_json::from_str(&events.last().unwrap().payload).unwrap();
        assert_eq!(last["event"], "order.cancelled");
    }

    #[tokio::test]
    async fn cancel_is_idempotent_on_terminal_rows() {
        let rig = rig();
        rig.inventory.set_stock("p1", 10).await.unwrap();
        rig.service.create_order(ctx("ORD-8", 2)).await.unwrap();

        assert!(rig.service.cancel_order("ORD-8", "first", true).await.unwrap());
        let stock_after = rig.inventory.query_stock("p1").await.unwrap();

        // 重复取消：不再动库存
        assert!(rig.service.cancel_order("ORD-8", "replay", true).await.unwrap());
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), stock_after);
    }

    #[tokio::test]
    async fn cancel_missing_order_returns_false() {
        let rig = rig();
        assert!(!rig.service.cancel_order("ghost", "r", true).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_without_held_reservation_leaves_stock_alone() {
        let rig = rig();
        rig.inventory.set_stock("p1", 10).await.unwrap();
        rig.service.create_order(ctx("ORD-11", 2)).await.unwrap();
        // 预留已提交（支付路径），键消失
        rig.service
            .mark_paid("ORD-11", 20.0, Utc::now())
            .await
            .unwrap();
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(8));

        rig.service
            .cancel_order("ORD-11", "refund", true)
            .await
            .unwrap();
        // Paid 行可取消，但无在途预留，库存不回补
        assert_eq!(rig.inventory.query_stock("p1").await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn get_by_id_backfills_cache_on_db_hit() {
        let rig = rig();
        let mut record = staged_entity("ORD-9", 1).into_record();
        record.created_at = Utc::now();
        record.updated_at = record.created_at;
        rig.repository.insert(&record).await.unwrap();
        assert!(rig.kv.raw_get("order:ORD-9").is_none());

        let found = rig.service.get_order_by_id("ORD-9", true).await.unwrap();
        assert!(found.is_some());
        assert!(rig.kv.raw_get("order:ORD-9").is_some());
    }

    #[tokio::test]
    async fn list_with_zero_limit_skips_storage() {
        let rig = rig();
        rig.repository.set_fail_inserts(true); // 列表路径不应触发任何仓储写
        let result = rig
            .service
            .list_orders_by_user("u1", 0, 0, true)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn list_clamps_limit_to_max_page_size() {
        let rig = rig();
        for i in 0..5 {
            let mut record = staged_entity(&format!("ORD-L{i}"), 1).into_record();
            record.created_at = DateTime::from_timestamp(1_000 + i, 0).unwrap();
            record.updated_at = record.created_at;
            rig.repository.insert(&record).await.unwrap();
        }
        // limit 500 → 钳到 100，结果仍是全部 5 条
        let result = rig
            .service
            .list_orders_by_user("u1", 500, 0, false)
            .await
            .unwrap();
        assert_eq!(result.len(), 5);
        // 列表键已预热
        assert!(rig.kv.raw_get("user_orders:u1").is_some());
    }

    #[tokio::test]
    async fn mutation_invalidates_user_index() {
        let rig = rig();
        rig.inventory.set_stock("p1", 10).await.unwrap();
        rig.service.create_order(ctx("ORD-10", 1)).await.unwrap();

        // 预热用户列表键
        rig.service
            .list_orders_by_user("u1", 10, 0, false)
            .await
            .unwrap();
        assert!(rig.kv.raw_get("user_orders:u1").is_some());

        rig.service
            .update_status("ORD-10", OrderStatus::Processing, "")
            .await
            .unwrap();
        assert!(rig.kv.raw_get("user_orders:u1").is_none());
    }
}
