//! 内存订单仓储 - 测试与单进程模式
//!
//! 与 MySQL 实现同契约；提供写失败注入开关，用于演练持久化
//! 失败后的补偿路径。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{OrderRepository, RepoResult};
use crate::core::OrderError;
use crate::domain::{OrderRecord, OrderStatus};

#[derive(Default)]
pub struct MemoryOrderRepository {
    rows: Mutex<HashMap<String, OrderRecord>>,
    fail_inserts: AtomicBool,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注入写失败（模拟数据库拒绝写入）
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn ensure_schema(&self) -> RepoResult<()> {
        Ok(())
    }

    async fn insert(&self, record: &OrderRecord) -> RepoResult<bool> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(OrderError::StorageUnavailable("insert rejected".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&record.order_id) {
            return Ok(false);
        }
        rows.insert(record.order_id.clone(), record.clone());
        Ok(true)
    }

    async fn upsert(&self, record: &OrderRecord) -> RepoResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&record.order_id) {
            Some(existing) => {
                existing.status = record.status;
                existing.status_reason = record.status_reason.clone();
                existing.payload_json = record.payload_json.clone();
                existing.updated_at = record.updated_at;
            }
            None => {
                rows.insert(record.order_id.clone(), record.clone());
            }
        }
        Ok(true)
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        reason: &str,
    ) -> RepoResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(order_id) {
            Some(row) => {
                row.status = status;
                row.status_reason = reason.to_string();
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_payment(
        &self,
        order_id: &str,
        paid_amount: f64,
        paid_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(order_id) {
            Some(row) => {
                row.status = OrderStatus::Paid;
                row.total_amount = paid_amount;
                row.paid_amount = Some(paid_amount);
                row.paid_at = Some(paid_at);
                row.updated_at = paid_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_payload(&self, order_id: &str, payload_json: &str) -> RepoResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(order_id) {
            Some(row) => {
                row.payload_json = payload_json.to_string();
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch(&self, order_id: &str, ts: DateTime<Utc>) -> RepoResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(order_id) {
            Some(row) => {
                row.updated_at = ts;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, order_id: &str) -> RepoResult<bool> {
        Ok(self.rows.lock().unwrap().remove(order_id).is_some())
    }

    async fn get_by_id(&self, order_id: &str) -> RepoResult<Option<OrderRecord>> {
        Ok(self.rows.lock().unwrap().get(order_id).cloned())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> RepoResult<Vec<OrderRecord>> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<OrderRecord> = rows
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_recent(&self, limit: usize) -> RepoResult<Vec<OrderRecord>> {
        let rows = self.rows.lock().unwrap();
        let mut all: Vec<OrderRecord> = rows.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }
}
