use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use order_server::core::{resolve_config_path, AppState, Config, Server};

/// 日志初始化：过滤规则取自 `LOG_LEVEL`（EnvFilter 语法），
/// `LOG_DIR` 指向既有目录时额外按天滚动落盘
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match std::env::var("LOG_DIR") {
        Ok(dir) if std::path::Path::new(&dir).is_dir() => {
            builder
                .with_writer(tracing_appender::rolling::daily(dir, "order-server.log"))
                .init();
        }
        _ => builder.init(),
    }
}

fn main() -> ExitCode {
    // Initialize logging first so bootstrap failures are visible
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = match resolve_config_path(&args) {
        Ok(path) => path,
        Err(e) => {
            tracing::error!(error = %e, "no usable configuration");
            return ExitCode::from(1);
        }
    };

    let config = match Config::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(config = %config_path.display(), error = %e, "invalid configuration");
            return ExitCode::from(1);
        }
    };

    tracing::info!(
        config = %config_path.display(),
        service = %config.service_name,
        threads = config.worker_threads(),
        "booting order server"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to build runtime");
            return ExitCode::from(1);
        }
    };

    let result = runtime.block_on(async {
        let state = AppState::initialize(&config).await?;
        Server::with_state(state).run().await
    });

    match result {
        Ok(()) => {
            tracing::info!("clean shutdown");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "fatal bootstrap error");
            ExitCode::from(1)
        }
    }
}
