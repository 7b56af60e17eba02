//! GraphQueue process entrypoint: loads workflow definitions, opens the
//! queue store, spawns the worker loop, and serves the HTTP adapter.
//!
//! Usage:
//!     graphqueue --listen 0.0.0.0:8787 --upstream-url http://127.0.0.1:8188

mod config;

use std::time::Duration;

use clap::Parser;
use graphqueue_http::AppState;
use graphqueue_store::{create_pool, DbConfig, QueueStore};
use graphqueue_upstream::UpstreamClient;
use graphqueue_worker::{Worker, WorkerConfig};

use config::{Args, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_args(args);

    graphqueue_logging::init_logging(graphqueue_logging::LogConfig {
        app_name: "graphqueue",
        verbose: config.verbose,
        data_dir: config.root.clone(),
    })?;

    tracing::info!(root = %config.root.display(), upstream = %config.upstream_url, "starting graphqueue");

    let data_dir = config.root.join("data");
    std::fs::create_dir_all(&data_dir)?;

    let pool = create_pool(DbConfig::file(config.db_path())).await?;
    let store = QueueStore::new(pool);

    let workflows = graphqueue_workflows::load_all(&config.workflow_defs_dir)?;
    tracing::info!(count = workflows.len(), dir = %config.workflow_defs_dir.display(), "loaded workflow definitions");

    let upstream = UpstreamClient::new(&config.upstream_url)?;

    let worker = Worker::new(
        store.clone(),
        upstream.clone(),
        WorkerConfig {
            data_dir: config.root.clone(),
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(7200),
        },
    );
    let stop_token = worker.stop_token();
    let worker_handle = tokio::spawn(async move { worker.run().await });

    let state = AppState {
        store,
        upstream,
        workflows: std::sync::Arc::new(workflows),
        data_dir: config.root.clone(),
        upstream_input_root: config.upstream_input_root.clone(),
    };

    let app = graphqueue_http::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    tracing::info!(addr = %config.listen, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    stop_token.stop();
    tracing::info!("shutting down, waiting for worker to drain its current prompt");
    let _ = worker_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
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
