//! 内存 KV 实现 - 测试与单进程模式
//!
//! TTL 以惰性方式生效：读取时检查过期并剔除。

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{Kv, KvResult};

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// 测试辅助：直接读取当前值（忽略过期检查）
    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(key) {
            if let Some(deadline) = entry.expires_at {
                if Instant::now() >= deadline {
                    entries.remove(key);
                    return Ok(None);
                }
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.entries.lock().unwrap().insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
