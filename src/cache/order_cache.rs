//! 订单缓存 - KV 之上的两类键
//!
//! | 键形态 | 内容 |
//! |--------|------|
//! | `<detailPrefix><orderId>` | 单条订单记录 |
//! | `<userIndexPrefix><userId>` | 该用户订单列表 |
//!
//! # 序列化形式
//!
//! 单行文本，11 个字段按固定顺序以 `|` 分隔：
//!
//! ```text
//! orderId|userId|productId|quantity|totalAmount|currency|status|
//! statusReason|payloadJson|createdAt|updatedAt
//! ```
//!
//! 金额保留两位小数，时间戳是秒级 epoch，status 是序号。列表形式
//! 按行拼接。反序列化从左取前 8 个字段、从右取后 2 个字段，中间
//! 剩余部分即 payload，因此 payload 内含 `|` 也能逐字节还原。
//!
//! 缓存是尽力而为的加速器：任何错误由调用方记日志后降级为直读
//! 数据库，绝不阻塞请求。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::OrderError;
use crate::domain::{OrderRecord, OrderStatus};
use crate::kv::Kv;

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub detail_prefix: String,
    pub user_index_prefix: String,
    pub ttl: Duration,
    pub enable_user_index: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            detail_prefix: "order:".into(),
            user_index_prefix: "user_orders:".into(),
            ttl: Duration::from_secs(600),
            enable_user_index: true,
        }
    }
}

pub struct OrderCache {
    kv: Arc<dyn Kv>,
    options: CacheOptions,
}

impl OrderCache {
    pub fn new(kv: Arc<dyn Kv>, options: CacheOptions) -> Self {
        Self { kv, options }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    // ========== 单条订单 ==========

    pub async fn put_order(&self, record: &OrderRecord) -> Result<(), OrderError> {
        self.put_order_with_ttl(record, self.options.ttl).await
    }

    pub async fn put_order_with_ttl(
        &self,
        record: &OrderRecord,
        ttl: Duration,
    ) -> Result<(), OrderError> {
        let key = self.order_key(&record.order_id);
        let value = serialize_order(record);
        self.kv.set(&key, &value, Some(ttl)).await?;
        Ok(())
    }

    pub async fn put_orders(&self, records: &[OrderRecord]) -> Result<(), OrderError> {
        for record in records {
            self.put_order(record).await?;
        }
        Ok(())
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>, OrderError> {
        let payload = self.kv.get(&self.order_key(order_id)).await?;
        match payload {
            Some(raw) => Ok(Some(deserialize_order(&raw)?)),
            None => Ok(None),
        }
    }

    /// 批量读取；缺失的键被跳过
    pub async fn get_orders(&self, order_ids: &[String]) -> Result<Vec<OrderRecord>, OrderError> {
        let mut result = Vec::with_capacity(order_ids.len());
        for id in order_ids {
            if let Some(record) = self.get_order(id).await? {
                result.push(record);
            }
        }
        Ok(result)
    }

    pub async fn remove_order(&self, order_id: &str) -> Result<bool, OrderError> {
        Ok(self.kv.del(&self.order_key(order_id)).await?)
    }

    pub async fn refresh_ttl(&self, order_id: &str, ttl: Duration) -> Result<bool, OrderError> {
        Ok(self.kv.expire(&self.order_key(order_id), ttl).await?)
    }

    // ========== 用户订单索引 ==========

    pub async fn put_user_orders(
        &self,
        user_id: &str,
        records: &[OrderRecord],
    ) -> Result<(), OrderError> {
        if !self.options.enable_user_index {
            return Ok(());
        }
        let value = serialize_order_list(records);
        self.kv
            .set(&self.user_key(user_id), &value, Some(self.options.ttl))
            .await?;
        Ok(())
    }

    pub async fn get_user_orders(
        &self,
        user_id: &str,
    ) -> Result<Option<Vec<OrderRecord>>, OrderError> {
        if !self.options.enable_user_index {
            return Ok(None);
        }
        let payload = self.kv.get(&self.user_key(user_id)).await?;
        match payload {
            Some(raw) => Ok(Some(deserialize_order_list(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn remove_user_orders(&self, user_id: &str) -> Result<bool, OrderError> {
        if !self.options.enable_user_index {
            return Ok(false);
        }
        Ok(self.kv.del(&self.user_key(user_id)).await?)
    }

    // ========== 维护接口 ==========

    /// 批量预热；单条失败只记日志，不中断
    pub async fn warmup(&self, records: &[OrderRecord]) {
        for record in records {
            if let Err(e) = self.put_order(record).await {
                tracing::warn!(order_id = %record.order_id, error = %e, "cache warmup entry failed");
            }
        }
    }

    fn order_key(&self, order_id: &str) -> String {
        format!("{}{}", self.options.detail_prefix, order_id)
    }

    fn user_key(&self, user_id: &str) -> String {
        format!("{}{}", self.options.user_index_prefix, user_id)
    }
}

// ========== 序列化 / 反序列化 ==========

pub(crate) fn serialize_order(record: &OrderRecord) -> String {
    format!(
        "{}|{}|{}|{}|{:.2}|{}|{}|{}|{}|{}|{}",
        record.order_id,
        record.user_id,
        record.product_id,
        record.quantity,
        record.total_amount,
        record.currency,
        record.status.ordinal(),
        record.status_reason,
        record.payload_json,
        record.created_at.timestamp(),
        record.updated_at.timestamp(),
    )
}

pub(crate) fn deserialize_order(payload: &str) -> Result<OrderRecord, OrderError> {
    let corrupt = |what: &str| OrderError::Cache(format!("corrupt cache entry: {what}"));

    // 前 8 个字段从左解析，最后 2 个从右解析，中间剩余即 payload
    let mut left = payload.splitn(9, '|');
    let order_id = left.next().ok_or_else(|| corrupt("orderId"))?;
    let user_id = left.next().ok_or_else(|| corrupt("userId"))?;
    let product_id = left.next().ok_or_else(|| corrupt("productId"))?;
    let quantity: u32 = left
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt("quantity"))?;
    let total_amount: f64 = left
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt("totalAmount"))?;
    let currency = left.next().ok_or_else(|| corrupt("currency"))?;
    let status_ordinal: u8 = left
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt("status"))?;
    let status_reason = left.next().ok_or_else(|| corrupt("statusReason"))?;
    let rest = left.next().ok_or_else(|| corrupt("payload"))?;

    let mut right = rest.rsplitn(3, '|');
    let updated_at: i64 = right
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt("updatedAt"))?;
    let created_at: i64 = right
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| corrupt("createdAt"))?;
    let payload_json = right.next().ok_or_else(|| corrupt("payloadJson"))?;

    Ok(OrderRecord {
        order_id: order_id.to_string(),
        user_id: user_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        total_amount,
        currency: currency.to_string(),
        status: OrderStatus::from_ordinal(status_ordinal),
        status_reason: status_reason.to_string(),
        payload_json: payload_json.to_string(),
        paid_amount: None,
        paid_at: None,
        created_at: epoch(created_at)?,
        updated_at: epoch(updated_at)?,
    })
}

pub(crate) fn serialize_order_list(records: &[OrderRecord]) -> String {
    records
        .iter()
        .map(serialize_order)
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn deserialize_order_list(payload: &str) -> Result<Vec<OrderRecord>, OrderError> {
    payload
        .lines()
        .filter(|line| !line.is_empty())
        .map(deserialize_order)
        .collect()
}

fn epoch(secs: i64) -> Result<DateTime<Utc>, OrderError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| OrderError::Cache(format!("timestamp out of range: {secs}")))
}
