//! 事件发布 - EventPublisher 契约与实现
//!
//! 生产实现走 lapin（持久化投递）；内存实现记录消息，供测试
//! 与无 MQ 模式使用。发布失败由调用方记日志后吞掉，绝不影响
//! 请求主路径。

use std::sync::Mutex;

use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::BasicProperties;

use super::client::MqClient;
use crate::core::OrderError;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &str,
    ) -> Result<(), OrderError>;
}

/// RabbitMQ 生产者
pub struct MqProducer {
    client: std::sync::Arc<MqClient>,
}

impl MqProducer {
    pub fn new(client: std::sync::Arc<MqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventPublisher for MqProducer {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &str,
    ) -> Result<(), OrderError> {
        let channel = self.client.channel().await?;
        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload.as_bytes(),
                // delivery_mode 2: 持久化消息
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| OrderError::EventPublish(e.to_string()))?
            .await
            .map_err(|e| OrderError::EventPublish(e.to_string()))?;
        Ok(())
    }
}

/// 已发布消息（内存实现的记录单元）
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: String,
}

/// 内存发布器 - 记录所有 publish 调用
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// 按路由键过滤
    pub fn messages_for(&self, routing_key: &str) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &str,
    ) -> Result<(), OrderError> {
        self.messages.lock().unwrap().push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
