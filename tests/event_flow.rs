//! 事件驱动流程端到端场景
//!
//! 覆盖查询路径上的缓存一致性（写库后刷新）与 MQ 事件驱动的
//! 取消流程：消息经内存事件源注入消费器，路由分发到领域服务。

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use order_server::cache::{CacheOptions, OrderCache};
use order_server::core::{AppState, Config};
use order_server::db::{MemoryOrderRepository, OrderRepository};
use order_server::domain::{
    InventoryOptions, InventoryService, OrderService, OrderServiceDeps, OrderServiceOptions,
    OrderStatus,
};
use order_server::kv::MemoryKv;
use order_server::mq::{
    ConsumerOptions, EventRouter, MemoryEventSource, MemoryPublisher, OrderEventConsumer,
    RouterDeps,
};
use order_server::utils::FixedIdGenerator;

struct TestApp {
    router: Router,
    repository: Arc<MemoryOrderRepository>,
    kv: Arc<MemoryKv>,
    inventory: Arc<InventoryService>,
    orders: Arc<OrderService>,
    event_router: Arc<EventRouter>,
    sender: mpsc::Sender<String>,
}

fn test_app() -> TestApp {
    let repository = Arc::new(MemoryOrderRepository::new());
    let kv = Arc::new(MemoryKv::new());
    let publisher = Arc::new(MemoryPublisher::new());
    let cache = Arc::new(OrderCache::new(kv.clone(), CacheOptions::default()));
    let inventory = Arc::new(InventoryService::new(
        kv.clone(),
        Some(publisher.clone()),
        InventoryOptions::default(),
    ));
    let orders = Arc::new(OrderService::with_options(
        OrderServiceDeps {
            repository: repository.clone(),
            cache: Some(cache.clone()),
            inventory: Some(inventory.clone()),
            producer: Some(publisher.clone()),
        },
        OrderServiceOptions::default(),
    ));

    let source = Arc::new(MemoryEventSource::new());
    let sender = source.sender();
    let consumer = Arc::new(OrderEventConsumer::new(source, ConsumerOptions::default()));
    let event_router = Arc::new(EventRouter::new(RouterDeps {
        consumer,
        orders: orders.clone(),
        inventory: Some(inventory.clone()),
    }));

    let state = AppState {
        config: Config::default(),
        repository: repository.clone(),
        cache: Some(cache),
        inventory: Some(inventory.clone()),
        orders: orders.clone(),
        event_router: Some(event_router.clone()),
        id_generator: Arc::new(FixedIdGenerator::new("ORD-E")),
    };

    TestApp {
        router: state.into_router(),
        repository,
        kv,
        inventory,
        orders,
        event_router,
        sender,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post_order(router: &Router, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(router, request).await
}

/// 查询预热缓存；服务端写库后缓存同步刷新，后续查询读到新状态
#[tokio::test]
async fn query_warms_cache_and_mutations_refresh_it() {
    let app = test_app();

    let record = order_server::domain::OrderRecord {
        order_id: "ORD-S4".into(),
        user_id: "u1".into(),
        product_id: "p1".into(),
        quantity: 1,
        total_amount: 10.0,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        ..Default::default()
    };
    app.repository.insert(&record).await.unwrap();

    // 第一次查询：DB 命中并回填缓存
    let (status, body) = get(&app.router, "/orders?id=ORD-S4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Pending");
    assert!(app.kv.raw_get("order:ORD-S4").is_some());

    // 经服务变更状态：缓存随写刷新
    app.orders
        .update_status("ORD-S4", OrderStatus::Processing, "picking")
        .await
        .unwrap();

    // 第二次查询：缓存命中，读到新状态
    let (status, body) = get(&app.router, "/orders?id=ORD-S4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Processing");
    assert_eq!(body["statusReason"], "picking");
}

/// 事件驱动取消：order.cancelled 消息走消费器 → 路由 → 取消 + 释放预留
#[tokio::test]
async fn cancelled_event_cancels_order_and_restores_stock() {
    let app = test_app();
    app.event_router.start().await.unwrap();
    app.inventory.set_stock("p1", 10).await.unwrap();

    let (status, body) = post_order(
        &app.router,
        r#"{"userId":"u1","productId":"p1","quantity":3,"amount":30.00}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["orderId"].as_str().unwrap().to_string();
    assert_eq!(app.inventory.query_stock("p1").await.unwrap(), Some(7));

    app.sender
        .send(format!(r#"{{"event":"order.cancelled","orderId":"{order_id}"}}"#))
        .await
        .unwrap();

    // 等待消费循环处理
    let mut cancelled = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let row = app.repository.get_by_id(&order_id).await.unwrap().unwrap();
        if row.status == OrderStatus::Cancelled {
            cancelled = true;
            break;
        }
    }
    assert!(cancelled, "order did not reach Cancelled state");

    assert_eq!(app.inventory.query_stock("p1").await.unwrap(), Some(10));
    assert!(app
        .kv
        .raw_get(&format!("inventory:reservation:{order_id}:p1"))
        .is_none());

    // 后续查询读到取消状态
    let (status, body) = get(&app.router, &format!("/orders?id={order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Cancelled");

    app.event_router.stop().await;
}

/// paid 事件驱动支付标记；重复投递保持幂等
#[tokio::test]
async fn paid_event_marks_order_paid() {
    let app = test_app();
    app.event_router.start().await.unwrap();
    app.inventory.set_stock("p1", 5).await.unwrap();

    let (_, body) = post_order(
        &app.router,
        r#"{"userId":"u1","productId":"p1","quantity":1,"amount":15.00}"#,
    )
    .await;
    let order_id = body["orderId"].as_str().unwrap().to_string();

    let payload = format!(r#"{{"event":"order.paid","orderId":"{order_id}","paidAmount":15.0}}"#);
    app.sender.send(payload.clone()).await.unwrap();
    app.sender.send(payload).await.unwrap();

    let mut paid = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let row = app.repository.get_by_id(&order_id).await.unwrap().unwrap();
        if row.status == OrderStatus::Paid {
            paid = true;
            break;
        }
    }
    assert!(paid, "order did not reach Paid state");

    let row = app.repository.get_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(row.total_amount, 15.0);

    app.event_router.stop().await;
}
