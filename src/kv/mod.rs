//! KV 驱动契约
//!
//! 缓存与库存服务都通过 [`Kv`] 访问键值存储，生产实现是 Redis
//! 连接池（[`RedisKv`]），测试与单进程模式使用内存实现
//! （[`MemoryKv`]）。每次调用都有有界超时（默认 1 秒）。

pub mod memory;
pub mod redis;

pub use memory::MemoryKv;
pub use redis::RedisKv;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// KV 驱动错误
#[derive(Debug, Error)]
pub enum KvError {
    #[error("kv pool error: {0}")]
    Pool(String),

    #[error("kv command error: {0}")]
    Command(String),

    #[error("kv call timed out after {0:?}")]
    Timeout(Duration),
}

pub type KvResult<T> = Result<T, KvError>;

/// 键值存储契约
///
/// 值一律是文本；TTL 为 None 表示不过期。
#[async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()>;

    /// 返回键是否存在并被删除
    async fn del(&self, key: &str) -> KvResult<bool>;

    /// 为既有键续期；键不存在返回 false
    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool>;
}
