//! 应用状态 - 持有所有组件的共享引用
//!
//! AppState 是服务的核心数据结构，按依赖顺序装配各组件并以 Arc
//! 浅拷贝共享。初始化顺序：
//!
//! 1. MySQL 连接池 + 建表（失败即启动期致命）
//! 2. Redis 连接池
//! 3. MQ 客户端 / 生产者 / 消费者（url 为空或连接失败则降级禁用）
//! 4. 缓存 → 库存 → 订单服务 → 事件路由
//!
//! | 字段 | 说明 |
//! |------|------|
//! | config | 配置项（不可变） |
//! | repository | 订单仓储 |
//! | cache | 订单缓存（可选） |
//! | inventory | 库存服务（可选） |
//! | orders | 订单服务（编排核心） |
//! | event_router | MQ 事件路由（可选） |
//! | id_generator | 订单号生成器（可插拔） |

use std::sync::Arc;
use std::time::Duration;

use crate::api;
use crate::cache::{CacheOptions, OrderCache};
use crate::core::{Config, OrderError};
use crate::db::{self, MySqlOrderRepository, OrderRepository};
use crate::domain::inventory::InventoryOptions;
use crate::domain::{InventoryService, OrderService, OrderServiceDeps, OrderServiceOptions};
use crate::kv::{Kv, RedisKv};
use crate::mq::{
    ConsumerOptions, EventPublisher, EventRouter, LapinEventSource, MqClient, MqProducer,
    OrderEventConsumer, RouterDeps,
};
use crate::utils::{IdGenerator, MonotonicIdGenerator};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repository: Arc<dyn OrderRepository>,
    pub cache: Option<Arc<OrderCache>>,
    pub inventory: Option<Arc<InventoryService>>,
    pub orders: Arc<OrderService>,
    pub event_router: Option<Arc<EventRouter>>,
    pub id_generator: Arc<dyn IdGenerator>,
}

impl AppState {
    /// 按依赖顺序初始化全部组件
    pub async fn initialize(config: &Config) -> Result<Self, OrderError> {
        // 1. MySQL
        let pool = db::connect_pool(config).await?;
        let repository: Arc<dyn OrderRepository> =
            Arc::new(MySqlOrderRepository::new(pool, "orders"));
        repository.ensure_schema().await?;
        tracing::info!(database = %config.database.database, "mysql ready, schema ensured");

        // 2. Redis
        let kv: Arc<dyn Kv> = Arc::new(
            RedisKv::connect(
                &config.redis_dsn(),
                config.redis.pool_size,
                Duration::from_millis(config.redis.timeout_ms),
            )
            .map_err(|e| OrderError::Config(format!("redis pool: {e}")))?,
        );

        // 3. MQ（可选；失败降级为无消息模式）
        let mq_client = Self::connect_mq(config).await;
        let producer: Option<Arc<dyn EventPublisher>> = mq_client
            .as_ref()
            .map(|client| Arc::new(MqProducer::new(client.clone())) as Arc<dyn EventPublisher>);

        // 4. 缓存 / 库存 / 订单服务
        let cache = Arc::new(OrderCache::new(
            kv.clone(),
            CacheOptions {
                detail_prefix: config.cache.detail_prefix.clone(),
                user_index_prefix: config.cache.user_index_prefix.clone(),
                ttl: Duration::from_secs(config.cache.ttl_minutes * 60),
                enable_user_index: true,
            },
        ));

        let inventory = Arc::new(InventoryService::new(
            kv.clone(),
            producer.clone(),
            InventoryOptions {
                reservation_ttl: Duration::from_secs(config.reservation.ttl_seconds),
                event_exchange: config.mq.exchange.clone(),
                reservation_routing_key: config.reservation.reservation_routing_key.clone(),
                restock_routing_key: config.reservation.restock_routing_key.clone(),
                ..InventoryOptions::default()
            },
        ));

        let orders = Arc::new(OrderService::with_options(
            OrderServiceDeps {
                repository: repository.clone(),
                cache: Some(cache.clone()),
                inventory: Some(inventory.clone()),
                producer: producer.clone(),
            },
            OrderServiceOptions {
                use_message_queue: producer.is_some(),
                event_exchange: config.mq.exchange.clone(),
                order_routing_key: config.mq.order_queue.clone(),
                ..OrderServiceOptions::default()
            },
        ));

        // 5. 事件路由（消费侧）
        let event_router = match (&mq_client, config.mq.enable_consumer) {
            (Some(client), true) => {
                let source = Arc::new(LapinEventSource::new(client.clone()));
                let consumer = Arc::new(OrderEventConsumer::new(
                    source,
                    ConsumerOptions {
                        queue_name: config.mq.order_queue.clone(),
                    },
                ));
                Some(Arc::new(EventRouter::new(RouterDeps {
                    consumer,
                    orders: orders.clone(),
                    inventory: Some(inventory.clone()),
                })))
            }
            _ => None,
        };

        Ok(Self {
            config: config.clone(),
            repository,
            cache: Some(cache),
            inventory: Some(inventory),
            orders,
            event_router,
            id_generator: Arc::new(MonotonicIdGenerator::new()),
        })
    }

    async fn connect_mq(config: &Config) -> Option<Arc<MqClient>> {
        if config.mq.url.is_empty() {
            tracing::warn!("mq url not configured, skipping MQ initialization");
            return None;
        }
        let client = match MqClient::connect(&config.mq.url).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!(error = %e, "mq connect failed, running without message bus");
                return None;
            }
        };

        // 声明队列并绑定到配置的 exchange
        let order_queue = config.mq.order_queue.as_str();
        if let Err(e) = client
            .declare_queue(order_queue, &config.mq.exchange, &[order_queue])
            .await
        {
            tracing::warn!(error = %e, "order queue declare failed");
        }
        if let Err(e) = client
            .declare_queue(
                &config.mq.inventory_queue,
                &config.mq.exchange,
                &[
                    config.reservation.reservation_routing_key.as_str(),
                    config.reservation.restock_routing_key.as_str(),
                ],
            )
            .await
        {
            tracing::warn!(error = %e, "inventory queue declare failed");
        }
        Some(client)
    }

    /// 启动后台任务：事件路由 + 缓存预热
    ///
    /// 必须在 `Server::run()` 的监听开始前调用。
    pub async fn start_background_tasks(&self) {
        if let Some(router) = &self.event_router {
            if let Err(e) = router.start().await {
                tracing::error!(error = %e, "event router failed to start");
            }
        }
        self.warmup_cache().await;
    }

    /// 预热：取最近 20 条订单写入缓存；失败只记日志，不重试
    async fn warmup_cache(&self) {
        let records = match self.repository.list_recent(20).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "cache warmup skipped, list_recent failed");
                return;
            }
        };
        tracing::info!(count = records.len(), "warming order cache");
        self.orders.warmup_cache(&records).await;
    }

    /// 关闭序列的前半段：停止事件路由（消费器随之停止）
    pub async fn shutdown(&self) {
        if let Some(router) = &self.event_router {
            router.stop().await;
        }
    }

    /// 处理单个请求（测试与单进程模式）
    pub fn into_router(self) -> axum::Router {
        api::router(self)
    }
}
