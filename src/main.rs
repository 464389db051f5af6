use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use englishauction::{
    config::Config,
    core::auction::AuctionManager,
    db::{
        repositories::{SqliteAuctionStore, SqliteBidStore},
        DbPool,
    },
    domain::{AuctionStore, BidStore},
    rpc::external::server::{auction::auction_module, RpcServerConfig},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let db_pool = DbPool::new(&config.database_url).await?;
    let auction_store: Arc<dyn AuctionStore> = Arc::new(SqliteAuctionStore::new(db_pool.clone()));
    let bid_store: Arc<dyn BidStore> = Arc::new(SqliteBidStore::new(db_pool));

    let manager = AuctionManager::new(auction_store, bid_store);
    let _worker_handle = manager.start_worker(config.worker_tick);

    let module = auction_module(manager)?;

    let mut server_config = RpcServerConfig::new()
        .with_http_addr(config.http_addr)
        .with_ws_addr(config.ws_addr);
    if let Some(origins) = &config.cors_origins {
        server_config = server_config.with_cors_origins(origins.clone());
    }

    let server = server_config.build().await?;
    info!(http = %server.http_addr()?, ws = %server.ws_addr()?, "auction service listening");

    let handle = server.start(module).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.stop()?;

    Ok(())
}
