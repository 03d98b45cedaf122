//! Artmarket API server binary.
//!
//! Loads configuration from the environment (and `.env`), connects to
//! PostgreSQL, runs migrations and serves the API until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use artmarket_api::AppState;
use artmarket_api::config::ApiConfig;
use artmarket_core::denylist::{Denylist, MemoryDenylist, RedisDenylist};
use artmarket_core::directory::PgUserDirectory;
use artmarket_core::ownership::PgResourceOwners;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle rate buckets and expired local revocations are dropped.
const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "artmarket_api_server", about = "Artmarket API server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,artmarket_api=debug,artmarket_core=debug")),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }
    info!(config = ?config, "starting artmarket_api_server");

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    artmarket_api::migrate(&pool).await?;

    let mut local_denylist = None;
    let denylist: Arc<dyn Denylist> = match &config.denylist_url {
        Some(url) => {
            info!("using shared denylist");
            Arc::new(RedisDenylist::open(url)?)
        }
        None => {
            warn!("DENYLIST_URL unset, revocations are local to this process");
            let memory = Arc::new(MemoryDenylist::new());
            local_denylist = Some(Arc::clone(&memory));
            memory
        }
    };

    let state = AppState::new(
        config,
        Arc::new(PgUserDirectory::new(pool.clone())),
        denylist,
        Arc::new(PgResourceOwners::new(pool)),
    )?;

    let shutdown = CancellationToken::new();
    let janitor_handle = tokio::spawn(janitor(
        state.clone(),
        local_denylist,
        shutdown.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let app = artmarket_api::router(state);
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(ctrl_c())
    .await;

    shutdown.cancel();
    let _ = janitor_handle.await;
    served?;

    info!("shut down");
    Ok(())
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

/// Periodically evicts idle rate buckets and purges expired local
/// revocations until `shutdown` fires.
async fn janitor(
    state: AppState,
    local_denylist: Option<Arc<MemoryDenylist>>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(JANITOR_INTERVAL);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = state.limits.evict_idle(state.config.rate_limit_idle);
                let purged = local_denylist.as_ref().map_or(0, |d| d.purge_expired());
                debug!(evicted, purged, "janitor pass");
            }
        }
    }
}
