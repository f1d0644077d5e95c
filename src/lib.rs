//! Order Server - 订单处理服务
//!
//! # 架构概述
//!
//! 本 crate 实现一个订单处理服务，协调四类外部协作者：
//!
//! - **HTTP API** (`api`): 下单与查询接口 (axum)
//! - **持久化** (`db`): MySQL 订单仓储 (sqlx)
//! - **缓存/库存** (`kv`, `cache`, `domain::inventory`): Redis 两级读路径与库存预留
//! - **消息总线** (`mq`): RabbitMQ 事件发布与消费 (lapin)
//!
//! # 模块结构
//!
//! ```text
//! src/
//! ├── core/     # 配置、错误、状态、服务器
//! ├── domain/   # 订单实体 + 状态机、库存服务、订单服务 (编排核心)
//! ├── db/       # MySQL 连接池与订单仓储
//! ├── kv/       # KV 驱动契约 (Redis / 内存)
//! ├── cache/    # 订单缓存 (detail / user 两类键)
//! ├── mq/       # MQ 客户端、生产者、消费者、事件路由
//! ├── api/      # HTTP 路由与处理器
//! └── utils/    # 订单号生成
//! ```
//!
//! # 核心数据流
//!
//! ```text
//! POST /orders → validate → Inventory.reserve → Repository.insert
//!                               │ (失败补偿)          │
//!                               └── release ◄─────────┘
//!                → Cache.put → MQ.publish(order.created) → 200
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod db;
pub mod domain;
pub mod kv;
pub mod mq;
pub mod utils;

// Re-export 公共类型
pub use crate::cache::{CacheOptions, OrderCache};
pub use crate::core::{AppState, Config, OrderError, Server};
pub use crate::domain::{
    InventoryService, OrderEntity, OrderRecord, OrderService, OrderStatus, Reservation,
};
