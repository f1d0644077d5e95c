//! 领域层 - 订单实体、库存协议与编排服务
//!
//! - [`OrderEntity`] / [`OrderStatus`]: 聚合根与状态机
//! - [`InventoryService`]: KV 上的预留 / 提交 / 释放协议
//! - [`OrderService`]: 跨存储编排与补偿规则

pub mod inventory;
pub mod order;
pub mod service;

pub use inventory::{InventoryOptions, InventoryService, Reservation};
pub use order::{OrderEntity, OrderRecord, OrderStatus};
pub use service::{
    CreateContext, CreateResult, OrderService, OrderServiceDeps, OrderServiceOptions,
};
