//! 数据库层 - MySQL 连接池与订单仓储
//!
//! 池参数（min/max 连接数、获取超时、空闲回收）来自配置；所有
//! 仓储调用经由池的有界并发执行。

pub mod repository;

pub use repository::{MemoryOrderRepository, MySqlOrderRepository, OrderRepository};

use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::core::{Config, OrderError};

/// 依据配置建立 MySQL 连接池
///
/// 连接失败属于启动期致命错误（进程退出码 1）。
pub async fn connect_pool(config: &Config) -> Result<MySqlPool, OrderError> {
    let db = &config.database;
    MySqlPoolOptions::new()
        .max_connections(db.max_connections)
        .min_connections(db.min_connections)
        .acquire_timeout(Duration::from_secs(db.timeout_sec))
        .idle_timeout(Duration::from_secs(db.max_idle_time))
        .connect(&config.database_dsn())
        .await
        .map_err(|e| OrderError::StorageUnavailable(format!("mysql connect failed: {e}")))
}
