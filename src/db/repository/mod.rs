//! 订单仓储契约
//!
//! 持久化层以 trait 暴露，生产实现是 MySQL（sqlx 连接池），
//! 内存实现用于测试与单进程模式。所有操作通过池的有界并发执行；
//! 提交顺序在单连接内保持，跨连接不保证。
//!
//! 失败约定：驱动错误以 [`OrderError::StorageUnavailable`] 浮出；
//! 主键冲突的 `insert` 返回 `Ok(false)`（补偿触发点）；记录缺失以
//! `None` 表达。

pub mod memory;
pub mod mysql;

pub use memory::MemoryOrderRepository;
pub use mysql::MySqlOrderRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::OrderError;
use crate::domain::{OrderRecord, OrderStatus};

pub type RepoResult<T> = Result<T, OrderError>;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 幂等建表；可重复调用
    async fn ensure_schema(&self) -> RepoResult<()>;

    /// 主键已存在时返回 `Ok(false)`
    async fn insert(&self, record: &OrderRecord) -> RepoResult<bool>;

    /// 新增或在主键冲突时更新 status / status_reason / payload_json / updated_at
    async fn upsert(&self, record: &OrderRecord) -> RepoResult<bool>;

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        reason: &str,
    ) -> RepoResult<bool>;

    /// 强制 status = Paid；total_amount 被支付金额覆盖（遗留语义）
    async fn update_payment(
        &self,
        order_id: &str,
        paid_amount: f64,
        paid_at: DateTime<Utc>,
    ) -> RepoResult<bool>;

    async fn update_payload(&self, order_id: &str, payload_json: &str) -> RepoResult<bool>;

    async fn touch(&self, order_id: &str, ts: DateTime<Utc>) -> RepoResult<bool>;

    async fn remove(&self, order_id: &str) -> RepoResult<bool>;

    async fn get_by_id(&self, order_id: &str) -> RepoResult<Option<OrderRecord>>;

    /// 按 created_at 降序；limit/offset 由调用方钳制
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> RepoResult<Vec<OrderRecord>>;

    /// 缓存预热数据源
    async fn list_recent(&self, limit: usize) -> RepoResult<Vec<OrderRecord>>;
}
