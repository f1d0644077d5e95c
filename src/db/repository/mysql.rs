//! MySQL 订单仓储 - sqlx 实现
//!
//! 时间戳以秒粒度写入 DATETIME 列；status 存规范字符串，读取时
//! 防御性解析（未知值回落 Pending）。

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::MySqlPool;
use sqlx::FromRow;

use super::{OrderRepository, RepoResult};
use crate::core::OrderError;
use crate::domain::{OrderRecord, OrderStatus};

pub struct MySqlOrderRepository {
    pool: MySqlPool,
    table_name: String,
    schema_ensured: AtomicBool,
}

/// 行映射中间结构；域类型转换在边界完成
#[derive(FromRow)]
struct OrderRow {
    order_id: String,
    user_id: String,
    product_id: String,
    quantity: i32,
    total_amount: f64,
    currency: String,
    status: String,
    status_reason: Option<String>,
    payload_json: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<OrderRow> for OrderRecord {
    fn from(row: OrderRow) -> Self {
        OrderRecord {
            order_id: row.order_id,
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: row.quantity.max(0) as u32,
            total_amount: row.total_amount,
            currency: row.currency,
            status: OrderStatus::parse(&row.status),
            status_reason: row.status_reason.unwrap_or_default(),
            payload_json: row.payload_json.unwrap_or_default(),
            paid_amount: None,
            paid_at: None,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        }
    }
}

impl MySqlOrderRepository {
    pub fn new(pool: MySqlPool, table_name: impl Into<String>) -> Self {
        Self {
            pool,
            table_name: table_name.into(),
            schema_ensured: AtomicBool::new(false),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn select_columns(&self) -> String {
        format!(
            "SELECT order_id, user_id, product_id, quantity, total_amount, currency, \
             status, status_reason, payload_json, created_at, updated_at FROM {}",
            self.table_name
        )
    }
}

fn to_sql_ts(ts: DateTime<Utc>) -> NaiveDateTime {
    // DATETIME 是秒粒度
    DateTime::from_timestamp(ts.timestamp(), 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .naive_utc()
}

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn ensure_schema(&self) -> RepoResult<()> {
        if self.schema_ensured.load(Ordering::Acquire) {
            return Ok(());
        }
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             order_id VARCHAR(64) PRIMARY KEY,\
             user_id VARCHAR(64) NOT NULL,\
             product_id VARCHAR(64) NOT NULL,\
             quantity INT NOT NULL,\
             total_amount DOUBLE NOT NULL,\
             currency VARCHAR(16) NOT NULL,\
             status VARCHAR(32) NOT NULL,\
             status_reason VARCHAR(255),\
             payload_json TEXT,\
             created_at DATETIME NOT NULL,\
             updated_at DATETIME NOT NULL)",
            self.table_name
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        self.schema_ensured.store(true, Ordering::Release);
        Ok(())
    }

    async fn insert(&self, record: &OrderRecord) -> RepoResult<bool> {
        let sql = format!(
            "INSERT INTO {} (order_id, user_id, product_id, quantity, total_amount, \
             currency, status, status_reason, payload_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.table_name
        );
        let result = sqlx::query(&sql)
            .bind(&record.order_id)
            .bind(&record.user_id)
            .bind(&record.product_id)
            .bind(record.quantity as i32)
            .bind(record.total_amount)
            .bind(&record.currency)
            .bind(record.status.as_str())
            .bind(&record.status_reason)
            .bind(&record.payload_json)
            .bind(to_sql_ts(record.created_at))
            .bind(to_sql_ts(record.updated_at))
            .execute(&self.pool)
            .await;
        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(OrderError::from(e)),
        }
    }

    async fn upsert(&self, record: &OrderRecord) -> RepoResult<bool> {
        let sql = format!(
            "INSERT INTO {} (order_id, user_id, product_id, quantity, total_amount, \
             currency, status, status_reason, payload_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE status = VALUES(status), \
             status_reason = VALUES(status_reason), payload_json = VALUES(payload_json), \
             updated_at = VALUES(updated_at)",
            self.table_name
        );
        let done = sqlx::query(&sql)
            .bind(&record.order_id)
            .bind(&record.user_id)
            .bind(&record.product_id)
            .bind(record.quantity as i32)
            .bind(record.total_amount)
            .bind(&record.currency)
            .bind(record.status.as_str())
            .bind(&record.status_reason)
            .bind(&record.payload_json)
            .bind(to_sql_ts(record.created_at))
            .bind(to_sql_ts(record.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        reason: &str,
    ) -> RepoResult<bool> {
        let sql = format!(
            "UPDATE {} SET status = ?, status_reason = ?, updated_at = NOW() WHERE order_id = ?",
            self.table_name
        );
        let done = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(reason)
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn update_payment(
        &self,
        order_id: &str,
        paid_amount: f64,
        paid_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        // 遗留语义：支付金额覆盖 total_amount
        let sql = format!(
            "UPDATE {} SET status = 'Paid', total_amount = ?, updated_at = ? WHERE order_id = ?",
            self.table_name
        );
        let done = sqlx::query(&sql)
            .bind(paid_amount)
            .bind(to_sql_ts(paid_at))
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn update_payload(&self, order_id: &str, payload_json: &str) -> RepoResult<bool> {
        let sql = format!(
            "UPDATE {} SET payload_json = ?, updated_at = NOW() WHERE order_id = ?",
            self.table_name
        );
        let done = sqlx::query(&sql)
            .bind(payload_json)
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn touch(&self, order_id: &str, ts: DateTime<Utc>) -> RepoResult<bool> {
        let sql = format!(
            "UPDATE {} SET updated_at = ? WHERE order_id = ?",
            self.table_name
        );
        let done = sqlx::query(&sql)
            .bind(to_sql_ts(ts))
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn remove(&self, order_id: &str) -> RepoResult<bool> {
        let sql = format!("DELETE FROM {} WHERE order_id = ?", self.table_name);
        let done = sqlx::query(&sql).bind(order_id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn get_by_id(&self, order_id: &str) -> RepoResult<Option<OrderRecord>> {
        let sql = format!("{} WHERE order_id = ?", self.select_columns());
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(OrderRecord::from))
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> RepoResult<Vec<OrderRecord>> {
        let sql = format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
            self.select_columns()
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(OrderRecord::from).collect())
    }

    async fn list_recent(&self, limit: usize) -> RepoResult<Vec<OrderRecord>> {
        let sql = format!(
            "{} ORDER BY created_at DESC LIMIT ?",
            self.select_columns()
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(OrderRecord::from).collect())
    }
}
