//! MQ 客户端 - lapin 连接与通道管理
//!
//! 生产者与消费者共享一个连接；通道失效时重建并重新声明队列。

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::RwLock;

use crate::core::OrderError;

pub struct MqClient {
    connection: Connection,
    channel: RwLock<Channel>,
}

impl MqClient {
    pub async fn connect(url: &str) -> Result<Self, OrderError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| OrderError::DependencyUnavailable(format!("amqp connect failed: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| OrderError::DependencyUnavailable(format!("amqp channel failed: {e}")))?;
        Ok(Self {
            connection,
            channel: RwLock::new(channel),
        })
    }

    /// 声明持久化队列；exchange 非空时一并声明，并按给定路由键绑定
    pub async fn declare_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_keys: &[&str],
    ) -> Result<(), OrderError> {
        let channel = self.channel().await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| OrderError::DependencyUnavailable(format!("queue declare failed: {e}")))?;

        if exchange.is_empty() {
            return Ok(());
        }
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                OrderError::DependencyUnavailable(format!("exchange declare failed: {e}"))
            })?;
        for routing_key in routing_keys {
            channel
                .queue_bind(
                    queue,
                    exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    OrderError::DependencyUnavailable(format!("queue bind failed: {e}"))
                })?;
        }
        Ok(())
    }

    /// 取通道；断开时重建
    pub async fn channel(&self) -> Result<Channel, OrderError> {
        if !self.connection.status().connected() {
            return Err(OrderError::DependencyUnavailable(
                "amqp connection lost".into(),
            ));
        }

        {
            let channel = self.channel.read().await;
            if channel.status().connected() {
                return Ok(channel.clone());
            }
        }

        let new_channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| OrderError::DependencyUnavailable(format!("amqp channel failed: {e}")))?;
        let mut guard = self.channel.write().await;
        *guard = new_channel.clone();
        Ok(new_channel)
    }
}
