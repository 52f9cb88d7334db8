//! terrawin - terrain window server and tile splitter
//!
//! `terrawin serve` indexes a tile directory and serves terrain windows over
//! HTTP; `terrawin split` cuts a directory of tiles into resampled sub-tiles.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use terrawin::config::{Command, SplitArgs};
use terrawin::handlers::router;
use terrawin::{init_tracing, split_directory, AppState, Config, Result, TerrawinError};

fn main() -> Result<()> {
    // Load configuration
    let (config, command) = Config::load()?;

    init_tracing(&config.log_level);
    info!("Starting terrawin v{}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    match command {
        Command::Serve(_) => serve(config),
        Command::Split(args) => split(config, &args),
    }
}

fn split(config: Config, args: &SplitArgs) -> Result<()> {
    let engine = config.split.engine()?;
    let report = split_directory(
        &args.input_dir,
        &args.output_dir,
        &config.split.plan(),
        &engine,
        &config.split.batch_options(),
    )
    .map_err(|e| {
        error!("Split failed: {}", e);
        e
    })?;

    for (file, reason) in &report.failed {
        warn!(file = %file.display(), error = %reason, "Tile was not split");
    }
    info!(
        processed = report.processed,
        written = report.written,
        skipped = report.skipped,
        failed = report.failed.len(),
        "Split finished"
    );
    Ok(())
}

fn serve(config: Config) -> Result<()> {
    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(workers) = config.server.workers {
        runtime.worker_threads(workers);
    }
    let runtime = runtime.build().map_err(|e| TerrawinError::Server {
        message: format!("Failed to start runtime: {}", e),
    })?;
    runtime.block_on(run_server(config))
}

async fn run_server(config: Config) -> Result<()> {
    // Index the tile directory and create application state
    let app_state = AppState::from_config(config.clone()).map_err(|e| {
        error!("Failed to build tile index: {}", e);
        e
    })?;

    if let Err(e) = app_state.validate() {
        warn!("{}", e);
    }
    info!("Indexed {} tiles", app_state.index.len());

    let state = Arc::new(app_state);
    let app = router(state);

    // Create the server address
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| TerrawinError::Config {
                message: format!("Invalid host address: {}", e),
            })?,
        config.server.port,
    ));

    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TerrawinError::Server {
            message: format!("Failed to bind to address: {}", e),
        })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TerrawinError::Server {
            message: format!("Server error: {}", e),
        })?;

    info!("Server has been gracefully shut down");
    Ok(())
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
