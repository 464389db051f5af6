use jsonrpsee::RpcModule;
use jsonrpsee_types::{ErrorObject, ErrorObjectOwned};

use crate::core::auction::AuctionManager;
use crate::domain::{Auction, Bid, PageQuery, SortField, SortOrder, TimeWindow, UserId};
use crate::rpc::errors::RpcError;
use crate::utils::{errors::AuctionError, helpers::current_unix_ms};

/// JSON-RPC error codes for the `auction_*` namespace.
const AUCTION_NOT_FOUND_CODE: i32 = -32001;
const BID_REJECTED_CODE: i32 = -32002;
const INVALID_AUCTION_CODE: i32 = -32003;
const INTERNAL_ERROR_CODE: i32 = -32603;

pub struct ApiContext {
    pub manager: AuctionManager,
}

fn rpc_error(err: AuctionError) -> ErrorObjectOwned {
    let code = match &err {
        AuctionError::AuctionNotFound(_) => AUCTION_NOT_FOUND_CODE,
        AuctionError::AuctionNotStarted
        | AuctionError::AuctionEnded
        | AuctionError::AuctionStillOpen
        | AuctionError::BidTooLow { .. } => BID_REJECTED_CODE,
        AuctionError::InvalidAuctionTime | AuctionError::InvalidPriceIncrement => {
            INVALID_AUCTION_CODE
        }
        AuctionError::Database(_) => INTERNAL_ERROR_CODE,
    };

    let data = match &err {
        AuctionError::BidTooLow { minimum, .. } => {
            Some(serde_json::json!({ "minimum": minimum }))
        }
        _ => None,
    };

    ErrorObject::owned(code, err.to_string(), data)
}

/// Registers the full `auction_*` namespace over the given manager.
pub fn auction_module(manager: AuctionManager) -> Result<RpcModule<ApiContext>, RpcError> {
    let mut module = RpcModule::new(ApiContext { manager });

    module.register_async_method("auction_create", |params, ctx, _| async move {
        let (start_time, end_time, starting_price, reserve_price, price_increment): (
            u64,
            u64,
            u64,
            u64,
            u64,
        ) = params.parse()?;
        ctx.manager
            .create_auction(
                start_time,
                end_time,
                starting_price,
                reserve_price,
                price_increment,
            )
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_getStart", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager.start_time(&auction_id).await.map_err(rpc_error)
    })?;

    module.register_async_method("auction_getEnd", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager.end_time(&auction_id).await.map_err(rpc_error)
    })?;

    module.register_async_method("auction_hasStarted", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager
            .has_started(&auction_id, current_unix_ms())
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_hasEnded", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager
            .has_ended(&auction_id, current_unix_ms())
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_bid", |params, ctx, _| async move {
        let (auction_id, user_id, price): (String, String, u64) = params.parse()?;
        ctx.manager
            .place_bid(&auction_id, &user_id, price)
            .await
            .map(|_| true)
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_autoBid", |params, ctx, _| async move {
        let (auction_id, user_id, max_price): (String, String, u64) = params.parse()?;
        ctx.manager
            .place_auto_bid(&auction_id, &user_id, max_price)
            .await
            .map(|_| true)
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_getHighestBidder", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        let bidder: Option<UserId> = ctx
            .manager
            .highest_bidder(&auction_id)
            .await
            .map_err(rpc_error)?;
        Ok::<_, ErrorObjectOwned>(bidder)
    })?;

    module.register_async_method("auction_getHighestBids", |params, ctx, _| async move {
        let (auction_id, num_bids): (String, u32) = params.parse()?;
        let bids: Vec<Bid> = ctx
            .manager
            .highest_bids(&auction_id, num_bids)
            .await
            .map_err(rpc_error)?;
        Ok::<_, ErrorObjectOwned>(bids)
    })?;

    module.register_async_method("auction_getNumberOfBids", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager
            .number_of_bids(&auction_id)
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_getPriceIncrement", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager
            .price_increment(&auction_id)
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_getReservePrice", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager
            .reserve_price(&auction_id)
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_getStartingPrice", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager
            .starting_price(&auction_id)
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_calcTimeRemaining", |params, ctx, _| async move {
        let (auction_id, now): (String, u64) = params.parse()?;
        ctx.manager
            .time_remaining(&auction_id, now)
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_calcMinimumBid", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        ctx.manager
            .minimum_bid(&auction_id)
            .await
            .map_err(rpc_error)
    })?;

    module.register_async_method("auction_getAuctionsEnding", |params, ctx, _| async move {
        let (end_from, end_to, page, per_page, sort, asc): (
            u64,
            u64,
            u32,
            u32,
            SortField,
            bool,
        ) = params.parse()?;
        let auctions: Vec<Auction> = ctx
            .manager
            .auctions_ending(
                TimeWindow {
                    from: end_from,
                    to: end_to,
                },
                sort,
                SortOrder::from_ascending(asc),
                PageQuery { page, per_page },
            )
            .await
            .map_err(rpc_error)?;
        Ok::<_, ErrorObjectOwned>(auctions)
    })?;

    module.register_async_method("auction_getAuctionsStarting", |params, ctx, _| async move {
        let (start_from, start_to, page, per_page, sort, asc): (
            u64,
            u64,
            u32,
            u32,
            SortField,
            bool,
        ) = params.parse()?;
        let auctions: Vec<Auction> = ctx
            .manager
            .auctions_starting(
                TimeWindow {
                    from: start_from,
                    to: start_to,
                },
                sort,
                SortOrder::from_ascending(asc),
                PageQuery { page, per_page },
            )
            .await
            .map_err(rpc_error)?;
        Ok::<_, ErrorObjectOwned>(auctions)
    })?;

    module.register_async_method("auction_getOpenAuctions", |params, ctx, _| async move {
        let (page, per_page, sort, asc): (u32, u32, SortField, bool) = params.parse()?;
        let auctions: Vec<Auction> = ctx
            .manager
            .open_auctions(
                sort,
                SortOrder::from_ascending(asc),
                PageQuery { page, per_page },
            )
            .await
            .map_err(rpc_error)?;
        Ok::<_, ErrorObjectOwned>(auctions)
    })?;

    module.register_async_method("auction_getWinningBid", |params, ctx, _| async move {
        let (auction_id,): (String,) = params.parse()?;
        let winner: Option<Bid> = ctx
            .manager
            .winning_bid(&auction_id, current_unix_ms())
            .await
            .map_err(rpc_error)?;
        Ok::<_, ErrorObjectOwned>(winner)
    })?;

    Ok(module)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jsonrpsee::rpc_params;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::db::{
        repositories::{SqliteAuctionStore, SqliteBidStore},
        DbPool,
    };
    use crate::domain::{AuctionStore, BidStore};

    async fn setup_module() -> RpcModule<ApiContext> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let db_pool = DbPool { pool };
        let auction_store: Arc<dyn AuctionStore> =
            Arc::new(SqliteAuctionStore::new(db_pool.clone()));
        let bid_store: Arc<dyn BidStore> = Arc::new(SqliteBidStore::new(db_pool));
        let manager = AuctionManager::new(auction_store, bid_store);

        auction_module(manager).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_inspect_auction_over_rpc() {
        let module = setup_module().await;
        let now = current_unix_ms();

        let auction_id: String = module
            .call(
                "auction_create",
                rpc_params![now - 1_000, now + 60_000, 100u64, 0u64, 25u64],
            )
            .await
            .unwrap();

        let start: u64 = module
            .call("auction_getStart", rpc_params![&auction_id])
            .await
            .unwrap();
        assert_eq!(start, now - 1_000);

        let end: u64 = module
            .call("auction_getEnd", rpc_params![&auction_id])
            .await
            .unwrap();
        assert_eq!(end, now + 60_000);

        let started: bool = module
            .call("auction_hasStarted", rpc_params![&auction_id])
            .await
            .unwrap();
        assert!(started);

        let ended: bool = module
            .call("auction_hasEnded", rpc_params![&auction_id])
            .await
            .unwrap();
        assert!(!ended);

        let starting_price: u64 = module
            .call("auction_getStartingPrice", rpc_params![&auction_id])
            .await
            .unwrap();
        assert_eq!(starting_price, 100);

        let increment: u64 = module
            .call("auction_getPriceIncrement", rpc_params![&auction_id])
            .await
            .unwrap();
        assert_eq!(increment, 25);

        let reserve: u64 = module
            .call("auction_getReservePrice", rpc_params![&auction_id])
            .await
            .unwrap();
        assert_eq!(reserve, 0);

        let remaining: u64 = module
            .call("auction_calcTimeRemaining", rpc_params![&auction_id, now])
            .await
            .unwrap();
        assert_eq!(remaining, 60);
    }

    #[tokio::test]
    async fn test_bidding_flow_over_rpc() {
        let module = setup_module().await;
        let now = current_unix_ms();

        let auction_id: String = module
            .call(
                "auction_create",
                rpc_params![now - 1_000, now + 60_000, 100u64, 0u64, 50u64],
            )
            .await
            .unwrap();

        let minimum: u64 = module
            .call("auction_calcMinimumBid", rpc_params![&auction_id])
            .await
            .unwrap();
        assert_eq!(minimum, 100);

        let accepted: bool = module
            .call("auction_bid", rpc_params![&auction_id, "alice", 100u64])
            .await
            .unwrap();
        assert!(accepted);

        // Below the minimum: rejected with the bid-rejected code.
        let rejected: Result<bool, _> = module
            .call("auction_bid", rpc_params![&auction_id, "bob", 120u64])
            .await;
        assert!(rejected.is_err());

        let accepted: bool = module
            .call("auction_autoBid", rpc_params![&auction_id, "carol", 400u64])
            .await
            .unwrap();
        assert!(accepted);

        let bidder: Option<String> = module
            .call("auction_getHighestBidder", rpc_params![&auction_id])
            .await
            .unwrap();
        assert_eq!(bidder, Some("carol".to_string()));

        let bids: Vec<Bid> = module
            .call("auction_getHighestBids", rpc_params![&auction_id, 10u32])
            .await
            .unwrap();
        assert_eq!(bids[0].price, 150);

        let count: u64 = module
            .call("auction_getNumberOfBids", rpc_params![&auction_id])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let winner: Result<Option<Bid>, _> = module
            .call("auction_getWinningBid", rpc_params![&auction_id])
            .await;
        assert!(winner.is_err(), "auction is still open");
    }

    #[tokio::test]
    async fn test_listing_queries_over_rpc() {
        let module = setup_module().await;
        let now = current_unix_ms();

        let _open: String = module
            .call(
                "auction_create",
                rpc_params![now - 1_000, now + 60_000, 100u64, 0u64, 25u64],
            )
            .await
            .unwrap();
        let _future: String = module
            .call(
                "auction_create",
                rpc_params![now + 120_000, now + 180_000, 100u64, 0u64, 25u64],
            )
            .await
            .unwrap();

        let open: Vec<Auction> = module
            .call(
                "auction_getOpenAuctions",
                rpc_params![0u32, 10u32, "end_time", true],
            )
            .await
            .unwrap();
        assert_eq!(open.len(), 1);

        let starting: Vec<Auction> = module
            .call(
                "auction_getAuctionsStarting",
                rpc_params![now + 100_000, now + 200_000, 0u32, 10u32, "start_time", true],
            )
            .await
            .unwrap();
        assert_eq!(starting.len(), 1);

        let ending: Vec<Auction> = module
            .call(
                "auction_getAuctionsEnding",
                rpc_params![now, now + 300_000, 0u32, 10u32, "end_time", false],
            )
            .await
            .unwrap();
        assert_eq!(ending.len(), 2);
        assert!(ending[0].end_time >= ending[1].end_time);
    }

    #[tokio::test]
    async fn test_unknown_auction_over_rpc() {
        let module = setup_module().await;

        let result: Result<u64, _> = module
            .call("auction_getStart", rpc_params!["missing"])
            .await;
        assert!(result.is_err());
    }
}
