//! 订单事件消费器
//!
//! [`EventSource`] 把底层消费流抽象成 mpsc 通道：lapin 实现泵出
//! `basic_consume` 流，内存实现由测试直接注入。
//! [`OrderEventConsumer`] 负责 Start/Stop 生命周期（均幂等），
//! 回调异常被捕获记日志，绝不传播进消费循环。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::client::MqClient;
use crate::core::OrderError;

/// 消息回调；返回的错误由消费循环记日志后丢弃
pub type RawHandler = Arc<dyn Fn(String) -> BoxFuture<'static, Result<(), OrderError>> + Send + Sync>;

/// 消费流契约
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe(&self, queue: &str) -> Result<mpsc::Receiver<String>, OrderError>;
}

/// RabbitMQ 消费源 - 把 basic_consume 流泵进 mpsc 通道
pub struct LapinEventSource {
    client: Arc<MqClient>,
}

impl LapinEventSource {
    pub fn new(client: Arc<MqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSource for LapinEventSource {
    async fn subscribe(&self, queue: &str) -> Result<mpsc::Receiver<String>, OrderError> {
        let channel = self.client.channel().await?;
        let mut consumer = channel
            .basic_consume(
                queue,
                "order-server",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| OrderError::DependencyUnavailable(format!("consume failed: {e}")))?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                match delivery {
                    Ok(delivery) => {
                        let payload = String::from_utf8_lossy(&delivery.data).into_owned();
                        if tx.send(payload).await.is_err() {
                            // 接收端已停止消费
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "mq delivery error");
                    }
                }
            }
            tracing::info!("mq consume stream closed");
        });
        Ok(rx)
    }
}

/// 内存消费源 - 测试注入消息用
pub struct MemoryEventSource {
    tx: mpsc::Sender<String>,
    rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl MemoryEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// 注入端；测试通过它向消费器投递消息
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.tx.clone()
    }
}

impl Default for MemoryEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn subscribe(&self, _queue: &str) -> Result<mpsc::Receiver<String>, OrderError> {
        self.rx
            .lock()
            .await
            .take()
            .ok_or_else(|| OrderError::DependencyUnavailable("memory source already taken".into()))
    }
}

/// 消费器配置
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub queue_name: String,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            queue_name: "order.events".into(),
        }
    }
}

/// 订单 MQ 消费器 - Start/Stop 生命周期管理
pub struct OrderEventConsumer {
    source: Arc<dyn EventSource>,
    options: ConsumerOptions,
    running: AtomicBool,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl OrderEventConsumer {
    pub fn new(source: Arc<dyn EventSource>, options: ConsumerOptions) -> Self {
        Self {
            source,
            options,
            running: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> &ConsumerOptions {
        &self.options
    }

    /// 启动消费；重复调用是空操作
    pub async fn start(&self, handler: RawHandler) -> Result<(), OrderError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut rx = match self.source.subscribe(&self.options.queue_name).await {
            Ok(rx) => rx,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let queue = self.options.queue_name.clone();
        let handle = tokio::spawn(async move {
            tracing::info!(queue = %queue, "order event consumer started");
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(payload) => {
                            if let Err(e) = handler(payload).await {
                                tracing::warn!(error = %e, "event handler failed");
                            }
                        }
                        None => {
                            tracing::info!(queue = %queue, "event source closed");
                            break;
                        }
                    },
                }
            }
        });

        *self.task.lock().await = Some((token, handle));
        Ok(())
    }

    /// 停止消费；重复调用是空操作
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some((token, handle)) = self.task.lock().await.take() {
            token.cancel();
            let _ = handle.await;
        }
        tracing::info!(queue = %self.options.queue_name, "order event consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: Arc<AtomicUsize>) -> RawHandler {
        Arc::new(move |_payload| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn consumes_injected_messages() {
        let source = Arc::new(MemoryEventSource::new());
        let sender = source.sender();
        let consumer = OrderEventConsumer::new(source, ConsumerOptions::default());

        let counter = Arc::new(AtomicUsize::new(0));
        consumer.start(counting_handler(counter.clone())).await.unwrap();

        sender.send("{\"event\":\"order.created\"}".into()).await.unwrap();
        sender.send("{\"event\":\"order.paid\"}".into()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        consumer.stop().await;
        assert!(!consumer.is_running());
    }

    #[tokio::test]
    async fn start_twice_is_idempotent() {
        let source = Arc::new(MemoryEventSource::new());
        let consumer = OrderEventConsumer::new(source, ConsumerOptions::default());
        let counter = Arc::new(AtomicUsize::new(0));
        consumer.start(counting_handler(counter.clone())).await.unwrap();
        // 第二次 start 不应重新订阅（内存源只能订阅一次）
        consumer.start(counting_handler(counter)).await.unwrap();
        assert!(consumer.is_running());
        consumer.stop().await;
    }

    #[tokio::test]
    async fn stop_twice_is_a_noop() {
        let source = Arc::new(MemoryEventSource::new());
        let consumer = OrderEventConsumer::new(source, ConsumerOptions::default());
        let counter = Arc::new(AtomicUsize::new(0));
        consumer.start(counting_handler(counter)).await.unwrap();
        consumer.stop().await;
        consumer.stop().await;
        assert!(!consumer.is_running());
    }

    #[tokio::test]
    async fn handler_errors_do_not_kill_the_loop() {
        let source = Arc::new(MemoryEventSource::new());
        let sender = source.sender();
        let consumer = OrderEventConsumer::new(source, ConsumerOptions::default());

        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let handler: RawHandler = Arc::new(move |payload| {
            let seen = seen.clone();
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
                if payload.contains("bad") {
                    return Err(OrderError::InvalidInput("bad envelope".into()));
                }
                Ok(())
            })
        });
        consumer.start(handler).await.unwrap();

        sender.send("bad".into()).await.unwrap();
        sender.send("good".into()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        consumer.stop().await;
    }
}
