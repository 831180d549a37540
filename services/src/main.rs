use foodgram_services::{
    BUILD_BRANCH, BUILD_COMMIT, BUILD_DATE,
    config::Config,
    database::{self, PgStorage},
    media::MediaStore,
    routes, telemetry,
    users::PgUserStorage,
};
use std::net::{IpAddr, SocketAddr};
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config: Config = Config::init()?;
    telemetry::init_tracing(&config)?;

    print_build_info();
    info!(
        environment = %config.environment(),
        server_addr = %config.server_addr(),
        port = %config.port(),
        "Configuration loaded"
    );

    let pool = database::create_pool(config.database_url()).await?;
    database::run_migrations(&pool).await?;

    let media = MediaStore::fs(config.media_root(), config.media_url())?;

    let route = routes(
        PgStorage::new(pool.clone()),
        PgUserStorage::new(pool),
        media,
        config.clone(),
    );

    let addr = SocketAddr::from((config.server_addr().parse::<IpAddr>()?, config.port()));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, route)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

fn print_build_info() {
    info!("===========================================");
    info!("  Foodgram Services");
    info!("===========================================");
    info!("Build Date:   {}", BUILD_DATE);
    info!("Build Commit: {}", BUILD_COMMIT);
    info!("Build Branch: {}", BUILD_BRANCH);
    info!("===========================================");
}
