use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use mediastore::api;
use mediastore::config::{Config, StorageBackend};
use mediastore::utils::cli::Args;
use mediastore::utils::db::connect_pool;
use mediastore::utils::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mediastore=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let config = validate_config(&args).await?;

    let db_url = &config.db_url;
    let pool = connect_pool(db_url)
        .await
        .with_context(|| format!("failed to open catalog database `{db_url}`"))?;
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, Arc::new(pool)));

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
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

    tracing::info!("shutting down");
}

async fn validate_config(args: &Args) -> anyhow::Result<Config> {
    let mut validation_errors = Vec::new();

    let storage = match args.storage.parse::<StorageBackend>() {
        Ok(storage) => storage,
        Err(err) => {
            validation_errors.push(format!("MEDIASTORE_STORAGE: {err}"));
            StorageBackend::Filesystem
        }
    };

    if storage == StorageBackend::Filesystem {
        match tokio::fs::metadata(&args.root).await {
            Ok(meta) if !meta.is_dir() => validation_errors.push(format!(
                "MEDIASTORE_ROOTDIR `{}` exists but is not a directory",
                args.root,
            )),
            Ok(_) => {}
            Err(_) => validation_errors.push(format!(
                "MEDIASTORE_ROOTDIR `{}` does not exist",
                args.root,
            )),
        }
    }

    if let Some(path) = args
        .database_url
        .strip_prefix("sqlite://")
        .filter(|path| !path.contains(":memory:"))
    {
        if let Some(parent) = Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            if !parent.exists() {
                validation_errors.push(format!(
                    "The directory for the database `{}` does not exist",
                    parent.display(),
                ));
            }
        }
    }

    if args.chunk_size == 0 {
        validation_errors.push("MEDIASTORE_CHUNK_SIZE must be positive".to_string());
    }
    if args.upload_concurrency == 0 {
        validation_errors.push("MEDIASTORE_UPLOAD_CONCURRENCY must be positive".to_string());
    }
    if args.max_audio_size == 0 || args.max_image_size == 0 {
        validation_errors.push("maximum upload sizes must be positive".to_string());
    }

    if !validation_errors.is_empty() {
        bail!("invalid configuration:\n{}", validation_errors.join("\n"));
    }

    Ok(Config {
        host: args.host.clone(),
        port: args.port,
        storage,
        root_dir: args.root.clone(),
        db_url: args.database_url.clone(),
        chunk_size: args.chunk_size,
        upload_concurrency: args.upload_concurrency,
        max_audio_size: args.max_audio_size,
        max_image_size: args.max_image_size,
    })
}
