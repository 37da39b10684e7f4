//! Solvr identity API server binary.
//!
//! Serves the auth, claim and family-access routes of `solvr_api` backed by
//! PostgreSQL, or by in-memory stores with `--in-memory`.

use std::sync::Arc;

use clap::Parser;
use solvr_api::config::ApiConfig;
use solvr_core::store::{AuthStores, MemoryStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "solvr_api_server", about = "Solvr identity API server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/solvr"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep all identity state in process memory. Nothing survives a restart.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,solvr_api=debug,solvr_core=debug")
                }),
        )
        .init();

    let args = Args::parse();
    info!(version = solvr_core::version(), "starting solvr_api_server");

    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    config.pg_connection_url = args.database_url;
    if config.admin_api_key.is_none() {
        warn!("ADMIN_API_KEY is not set; admin routes will answer 503");
    }

    let stores = if args.in_memory {
        info!("using in-memory identity stores");
        AuthStores::from_shared(Arc::new(MemoryStore::new()))
    } else {
        info!(
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        solvr_api::migrate(&pool).await?;
        AuthStores::postgres(pool)
    };

    let state = solvr_api::AppState {
        stores,
        config: config.clone(),
    };
    let app = solvr_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
