use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use axum::Router;
use bucket_dashboard::{
    config::{AppConfig, Args, Command},
    dashboard::client::watch,
    routes::routes::routes,
    services::{
        directory::DirectorySettings,
        object_store::S3ObjectStore,
        queue::{QueueGateway, SqsQueue},
        user_store::PgUserStore,
    },
    state::AppState,
};
use clap::Parser;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- .env is optional ---
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let args = Args::parse();

    // --- Watch mode talks to a running relay only ---
    if let Some(Command::Watch(watch_args)) = &args.command {
        return watch(watch_args.clone()).await;
    }

    let cfg = AppConfig::from_env_and_args(&args)?;
    tracing::info!("Starting bucket-dashboard with config: {:?}", cfg);

    // --- Database ---
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy_with(cfg.database.connect_options());
    let users = Arc::new(PgUserStore::new(pool.clone()));

    // --- Handle migration mode ---
    if args.migrate {
        users.migrate().await.context("running migrations")?;
        tracing::info!("Database migration complete.");
        pool.close().await;
        return Ok(()); // exit after migration
    }

    // --- AWS clients ---
    let credentials = Credentials::new(
        cfg.aws.access_key_id.clone(),
        cfg.aws.secret_access_key.expose_secret().to_string(),
        None,
        None,
        "bucket-dashboard",
    );
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(cfg.aws.region.clone()))
        .credentials_provider(credentials)
        .load()
        .await;
    let objects = Arc::new(S3ObjectStore::new(&sdk_config));
    let queue = QueueGateway::new(Arc::new(SqsQueue::new(&sdk_config)), &cfg.aws.queue_name);

    // --- Shared state ---
    let state = AppState::new(
        objects,
        queue,
        users,
        DirectorySettings {
            bucket: cfg.aws.bucket.clone(),
            region: cfg.aws.region.clone(),
            policy: cfg.upload.clone(),
        },
    );

    // --- Build router ---
    let app: Router = routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
