//! Redis KV 实现 - deadpool-redis 连接池
//!
//! 所有命令都包在 `tokio::time::timeout` 里，超时与池容量来自配置。

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};

use super::{Kv, KvError, KvResult};

pub struct RedisKv {
    pool: Pool,
    timeout: Duration,
}

impl RedisKv {
    /// 依据连接串与池容量建池；不会立刻建立连接
    pub fn connect(url: &str, pool_size: usize, timeout: Duration) -> KvResult<Self> {
        let mut cfg = PoolConfig::from_url(url);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| KvError::Pool(e.to_string()))?;
        Ok(Self { pool, timeout })
    }

    async fn conn(&self) -> KvResult<deadpool_redis::Connection> {
        tokio::time::timeout(self.timeout, self.pool.get())
            .await
            .map_err(|_| KvError::Timeout(self.timeout))?
            .map_err(|e| KvError::Pool(e.to_string()))
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, deadpool_redis::redis::RedisError>>,
    ) -> KvResult<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| KvError::Timeout(self.timeout))?
            .map_err(|e| KvError::Command(e.to_string()))
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn().await?;
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => {
                self.bounded(conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()))
                    .await
            }
            None => self.bounded(conn.set::<_, _, ()>(key, value)).await,
        }
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.conn().await?;
        let removed = self.bounded(conn.del::<_, i64>(key)).await?;
        Ok(removed > 0)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.conn().await?;
        self.bounded(conn.expire::<_, bool>(key, ttl.as_secs() as i64))
            .await
    }
}
