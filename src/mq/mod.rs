//! 消息层 - RabbitMQ 客户端、生产者、消费者与事件路由
//!
//! ```text
//! OrderService ──publish──► EventPublisher (lapin / memory)
//!
//! queue ──► EventSource ──mpsc──► OrderEventConsumer ──► EventRouter
//!                                                            │
//!                                     OrderService / InventoryService
//! ```

pub mod client;
pub mod consumer;
pub mod producer;
pub mod router;

pub use client::MqClient;
pub use consumer::{
    ConsumerOptions, EventSource, LapinEventSource, MemoryEventSource, OrderEventConsumer,
};
pub use producer::{EventPublisher, MemoryPublisher, MqProducer, PublishedMessage};
pub use router::{EventEnvelope, EventRouter, RouterDeps};
