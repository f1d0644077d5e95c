//! Server Implementation
//!
//! HTTP 服务器启动与优雅关闭。关闭序列：收到 SIGINT/SIGTERM →
//! 停止事件路由 → 停止接受新连接并排空在途请求 → 连接池随
//! 状态释放关闭。

use std::net::SocketAddr;

use crate::api;
use crate::core::{AppState, OrderError};

/// HTTP Server
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    pub async fn run(&self) -> Result<(), OrderError> {
        let state = self.state.clone();
        state.start_background_tasks().await;

        if state.config.enable_tls {
            // TLS 终结交由前置代理
            tracing::warn!("enableTLS is set but TLS termination is delegated to the fronting proxy");
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| OrderError::Config(format!("bind {addr} failed: {e}")))?;
        tracing::info!(service = %state.config.service_name, %addr, "http server listening");

        let app = api::router(state.clone());
        let shutdown_state = state.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                tracing::info!("shutdown signal received");
                shutdown_state.shutdown().await;
            })
            .await
            .map_err(|e| OrderError::Config(format!("http server error: {e}")))?;

        tracing::info!("graceful shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
