//! Mosaic Server
//!
//! Serves the user, product and auth modules over HTTP.
//!
//! ## Configuration
//!
//! Read from the first of `$MOSAIC_CONFIG`, `config.toml`, `mosaic.toml` or
//! `./config/config.toml`, then overridden by `MOSAIC_*` variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MOSAIC_HTTP_HOST` | `0.0.0.0` | Bind address |
//! | `MOSAIC_HTTP_PORT` | `8080` | HTTP port |
//! | `MOSAIC_SQL_URL` | `sqlite://./data/mosaic.db?mode=rwc` | SQLite database |
//! | `MOSAIC_MONGODB_URI` | - | MongoDB connection string (enables the document backend) |
//! | `MOSAIC_STORAGE_USER` / `_PRODUCT` / `_AUTH` | `sql` | `sql`, `document` or `memory` |
//! | `MOSAIC_AUTH_PASSWORD_POLICY` | `strict` | `strict` or `lenient` |
//! | `MOSAIC_AUTH_SESSION_TTL_SECS` | `28800` | Session lifetime |
//! | `RUST_LOG` | `info` | Log filter |
//! | `LOG_FORMAT` | `text` | `json` for structured output |

mod api;
mod app;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use mos_config::ConfigLoader;

#[tokio::main]
async fn main() -> Result<()> {
    mos_common::logging::init_logging("mos-server");

    info!("Starting Mosaic Server");

    let config = ConfigLoader::new().load()?;
    info!(
        user = %config.storage.user,
        product = %config.storage.product,
        auth = %config.storage.auth,
        "Storage backends selected"
    );

    let state = app::build_state(&config).await?;
    let router = api::router(state);

    let addr = config.http.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Mosaic Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
