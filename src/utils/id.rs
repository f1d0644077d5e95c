//! 订单号生成
//!
//! 默认实现用当前微秒拼接进程内单调序列：纯时间戳在高并发下会在
//! 同一微秒内碰撞，序列后缀消除这一风险。生成器可插拔，测试可
//! 注入固定值。

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// `ORD-<micros>-<seq>` 形式的默认生成器
#[derive(Default)]
pub struct MonotonicIdGenerator {
    sequence: AtomicU64,
}

impl MonotonicIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for MonotonicIdGenerator {
    fn next_id(&self) -> String {
        let micros = Utc::now().timestamp_micros();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("ORD-{micros}-{seq}")
    }
}

/// 固定序列生成器（测试用）
pub struct FixedIdGenerator {
    prefix: String,
    sequence: AtomicU64,
}

impl FixedIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for FixedIdGenerator {
    fn next_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", self.prefix)
    }
}
