//! 订单实体与状态机
//!
//! `OrderRecord` 是扁平的传输/存储形态，`OrderEntity` 封装业务规则：
//! 所有变更都经过实体，每次变更刷新 `updated_at`。
//!
//! # 状态机
//!
//! ```text
//! Pending → Processing → Reserved → Paid → Completed
//!    │          │           │        │
//!    └──────────┴───────────┴────────┴──► Cancelled / Failed (终态)
//! ```
//!
//! Paid 之后不再允许 Failed，只能 Completed 或 Cancelled。
//! 非法迁移返回 [`OrderError::InvalidTransition`]。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::OrderError;

/// 订单状态；序号即对外事件里的数字状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Reserved,
    Paid,
    Completed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    /// 规范字符串名（与 `orders.status` 列一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Reserved => "Reserved",
            OrderStatus::Paid => "Paid",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Failed => "Failed",
        }
    }

    /// 未知字符串防御性地解析为 Pending
    pub fn parse(s: &str) -> Self {
        match s {
            "Processing" => OrderStatus::Processing,
            "Reserved" => OrderStatus::Reserved,
            "Paid" => OrderStatus::Paid,
            "Completed" => OrderStatus::Completed,
            "Cancelled" => OrderStatus::Cancelled,
            "Failed" => OrderStatus::Failed,
            _ => OrderStatus::Pending,
        }
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Reserved => 2,
            OrderStatus::Paid => 3,
            OrderStatus::Completed => 4,
            OrderStatus::Cancelled => 5,
            OrderStatus::Failed => 6,
        }
    }

    /// 未知序号防御性地解析为 Pending
    pub fn from_ordinal(ordinal: u8) -> Self {
        match ordinal {
            1 => OrderStatus::Processing,
            2 => OrderStatus::Reserved,
            3 => OrderStatus::Paid,
            4 => OrderStatus::Completed,
            5 => OrderStatus::Cancelled,
            6 => OrderStatus::Failed,
            _ => OrderStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }
}

/// 订单记录 - 扁平的传输/存储形态
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub total_amount: f64,
    pub currency: String,
    pub status: OrderStatus,
    pub status_reason: String,
    /// 原始请求体，留作审计
    pub payload_json: String,
    /// 仅当状态经过 Paid 时设置
    pub paid_amount: Option<f64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for OrderRecord {
    fn default() -> Self {
        Self {
            order_id: String::new(),
            user_id: String::new(),
            product_id: String::new(),
            quantity: 1,
            total_amount: 0.0,
            currency: "CNY".into(),
            status: OrderStatus::Pending,
            status_reason: String::new(),
            payload_json: String::new(),
            paid_amount: None,
            paid_at: None,
            created_at: DateTime::UNIX_EPOCH,
            updated_at: DateTime::UNIX_EPOCH,
        }
    }
}

/// 订单聚合根 - 封装状态流转与持久化映射
///
/// `OrderRecord` 只关注数据结构，`OrderEntity` 负责业务规则。
#[derive(Debug, Clone)]
pub struct OrderEntity {
    record: OrderRecord,
}

impl OrderEntity {
    pub fn from_record(record: OrderRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &OrderRecord {
        &self.record
    }

    pub fn into_record(self) -> OrderRecord {
        self.record
    }

    pub fn to_record(&self) -> OrderRecord {
        self.record.clone()
    }

    // ========== 标识信息 ==========

    pub fn id(&self) -> &str {
        &self.record.order_id
    }

    pub fn user_id(&self) -> &str {
        &self.record.user_id
    }

    pub fn product_id(&self) -> &str {
        &self.record.product_id
    }

    pub fn set_identifiers(
        &mut self,
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        product_id: impl Into<String>,
    ) {
        self.record.order_id = order_id.into();
        self.record.user_id = user_id.into();
        self.record.product_id = product_id.into();
        self.touch(Utc::now());
    }

    // ========== 业务参数 ==========

    pub fn status(&self) -> OrderStatus {
        self.record.status
    }

    pub fn status_reason(&self) -> &str {
        &self.record.status_reason
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.record.quantity = quantity;
        self.touch(Utc::now());
    }

    pub fn set_total_amount(&mut self, amount: f64) {
        self.record.total_amount = amount;
        self.touch(Utc::now());
    }

    pub fn set_currency(&mut self, currency: impl Into<String>) {
        self.record.currency = currency.into();
        self.touch(Utc::now());
    }

    pub fn set_payload(&mut self, payload: impl Into<String>) {
        self.record.payload_json = payload.into();
        self.touch(Utc::now());
    }

    // ========== 时间信息 ==========

    pub fn touch(&mut self, ts: DateTime<Utc>) {
        self.record.updated_at = ts;
    }

    pub fn set_created_at(&mut self, ts: DateTime<Utc>) {
        self.record.created_at = ts;
        self.record.updated_at = ts;
    }

    // ========== 状态机 ==========

    pub fn mark_pending(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Pending, reason.into())
    }

    pub fn mark_processing(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Processing, reason.into())
    }

    pub fn mark_reserved(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Reserved, reason.into())
    }

    /// 支付金额与时间随迁移一并记录
    pub fn mark_paid(
        &mut self,
        amount: f64,
        paid_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Result<(), OrderError> {
        self.transition(OrderStatus::Paid, reason.into())?;
        self.record.paid_amount = Some(amount);
        self.record.paid_at = Some(paid_at);
        Ok(())
    }

    pub fn mark_completed(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Completed, reason.into())
    }

    pub fn mark_cancelled(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Cancelled, reason.into())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Failed, reason.into())
    }

    // ========== 状态判定 ==========

    pub fn is_pending(&self) -> bool {
        self.record.status == OrderStatus::Pending
    }

    pub fn is_reservable(&self) -> bool {
        matches!(
            self.record.status,
            OrderStatus::Pending | OrderStatus::Processing
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.record.status.is_terminal()
    }

    fn transition(&mut self, to: OrderStatus, reason: String) -> Result<(), OrderError> {
        let from = self.record.status;
        if !allows(from, to) {
            return Err(OrderError::InvalidTransition { from, to });
        }
        self.record.status = to;
        self.record.status_reason = reason;
        self.record.updated_at = Utc::now();
        Ok(())
    }
}

/// 状态迁移表；`Pending → Pending` 作为新建实体的初始打点放行
fn allows(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Pending) => true,
        (Pending, Processing | Reserved | Cancelled | Failed) => true,
        (Processing, Reserved | Cancelled | Failed) => true,
        (Reserved, Paid | Cancelled | Failed) => true,
        (Paid, Completed | Cancelled) => true,
        _ => false,
    }
}
