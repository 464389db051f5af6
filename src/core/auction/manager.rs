use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::{
    sync::{mpsc, RwLock},
    task::JoinHandle,
};
use tracing::info;

use crate::core::auction::AuctionWorker;
use crate::core::registry::AutoBidBook;
use crate::domain::{
    Auction, AuctionId, AuctionOutcome, AuctionStore, AutoBid, Bid, BidStore, PageQuery,
    SortField, SortOrder, TimeWindow, UserId,
};
use crate::utils::{
    errors::AuctionError,
    helpers::{compute_hash, current_unix_ms},
};

/// `AuctionManager` is the engine's public surface: auction creation, bid
/// placement with increment and window checks, proxy-bid resolution, ranking
/// queries, and settlement. Persistence is delegated to the injected stores;
/// end-of-auction detection runs in an [`AuctionWorker`].
#[derive(Clone)]
pub struct AuctionManager {
    auction_store: Arc<dyn AuctionStore>,
    bid_store: Arc<dyn BidStore>,

    /// Standing proxy bids, dropped once their auction settles.
    auto_bids: Arc<RwLock<AutoBidBook>>,

    /// Outcomes announced by the worker, so settled auctions resolve
    /// without touching the stores again.
    settled: Arc<DashMap<AuctionId, AuctionOutcome>>,

    /// Used by the worker to send an `AuctionOutcome` when an auction ends.
    outcome_sender: mpsc::Sender<AuctionOutcome>,
}

impl AuctionManager {
    /// Creates a new `AuctionManager` and spawns the background task that
    /// receives settlement announcements from the worker.
    pub fn new(auction_store: Arc<dyn AuctionStore>, bid_store: Arc<dyn BidStore>) -> Self {
        let (outcome_sender, mut outcome_receiver) = mpsc::channel(100);

        let manager = AuctionManager {
            auction_store,
            bid_store,
            auto_bids: Arc::new(RwLock::new(AutoBidBook::new())),
            settled: Arc::new(DashMap::new()),
            outcome_sender,
        };

        let manager_clone = manager.clone();
        tokio::spawn(async move {
            while let Some(outcome) = outcome_receiver.recv().await {
                manager_clone.handle_outcome(outcome).await;
            }
        });

        manager
    }

    /// Runs an `AuctionWorker` in the background, sweeping for ended
    /// auctions every `tick`.
    pub fn start_worker(&self, tick: Duration) -> JoinHandle<()> {
        let worker = AuctionWorker::new(
            self.auction_store.clone(),
            self.bid_store.clone(),
            self.outcome_sender.clone(),
            tick,
        );

        tokio::spawn(async move {
            worker.run().await;
        })
    }

    async fn handle_outcome(&self, outcome: AuctionOutcome) {
        self.auto_bids.write().await.clear_auction(&outcome.auction_id);

        match &outcome.winner {
            Some(bid) => info!(
                auction_id = %outcome.auction_id,
                winner = %bid.user_id,
                price = bid.price,
                "auction ended"
            ),
            None => info!(auction_id = %outcome.auction_id, "auction ended without a winner"),
        }

        self.settled.insert(outcome.auction_id.clone(), outcome);
    }

    // ------------------------------------------------------------------------
    // Auction lifecycle
    // ------------------------------------------------------------------------

    /// Creates a new auction and returns its generated ID.
    pub async fn create_auction(
        &self,
        start_time: u64,
        end_time: u64,
        starting_price: u64,
        reserve_price: u64,
        price_increment: u64,
    ) -> Result<AuctionId, AuctionError> {
        if end_time <= start_time {
            return Err(AuctionError::InvalidAuctionTime);
        }
        if price_increment == 0 {
            return Err(AuctionError::InvalidPriceIncrement);
        }

        let created_at = current_unix_ms();
        let auction = Auction {
            id: compute_hash(&[
                start_time.to_be_bytes().as_ref(),
                end_time.to_be_bytes().as_ref(),
                starting_price.to_be_bytes().as_ref(),
                reserve_price.to_be_bytes().as_ref(),
                price_increment.to_be_bytes().as_ref(),
                created_at.to_be_bytes().as_ref(),
            ]),
            start_time,
            end_time,
            starting_price,
            reserve_price,
            price_increment,
            created_at,
        };

        self.auction_store.create_auction(&auction).await?;

        Ok(auction.id)
    }

    /// Start of the auction, as a unix timestamp in milliseconds.
    pub async fn start_time(&self, auction_id: &str) -> Result<u64, AuctionError> {
        Ok(self.require_auction(auction_id).await?.start_time)
    }

    /// End of the auction, as a unix timestamp in milliseconds.
    pub async fn end_time(&self, auction_id: &str) -> Result<u64, AuctionError> {
        Ok(self.require_auction(auction_id).await?.end_time)
    }

    pub async fn starting_price(&self, auction_id: &str) -> Result<u64, AuctionError> {
        Ok(self.require_auction(auction_id).await?.starting_price)
    }

    pub async fn reserve_price(&self, auction_id: &str) -> Result<u64, AuctionError> {
        Ok(self.require_auction(auction_id).await?.reserve_price)
    }

    pub async fn price_increment(&self, auction_id: &str) -> Result<u64, AuctionError> {
        Ok(self.require_auction(auction_id).await?.price_increment)
    }

    pub async fn has_started(&self, auction_id: &str, now: u64) -> Result<bool, AuctionError> {
        Ok(now >= self.require_auction(auction_id).await?.start_time)
    }

    pub async fn has_ended(&self, auction_id: &str, now: u64) -> Result<bool, AuctionError> {
        Ok(now >= self.require_auction(auction_id).await?.end_time)
    }

    /// Whole seconds until the auction ends, zero once it has.
    pub async fn time_remaining(&self, auction_id: &str, now: u64) -> Result<u64, AuctionError> {
        let auction = self.require_auction(auction_id).await?;
        Ok(auction.end_time.saturating_sub(now) / 1_000)
    }

    // ------------------------------------------------------------------------
    // Bidding
    // ------------------------------------------------------------------------

    /// The lowest price the next bid must reach: the starting price while
    /// the auction has no bids, otherwise the highest bid plus one
    /// increment.
    pub async fn minimum_bid(&self, auction_id: &str) -> Result<u64, AuctionError> {
        let auction = self.require_auction(auction_id).await?;
        self.minimum_for(&auction).await
    }

    /// Places a bid, then lets standing proxy bids respond.
    pub async fn place_bid(
        &self,
        auction_id: &str,
        user_id: &str,
        price: u64,
    ) -> Result<(), AuctionError> {
        let auction = self.require_auction(auction_id).await?;
        let now = current_unix_ms();
        self.check_window(&auction, now)?;

        let minimum = self.minimum_for(&auction).await?;
        if price < minimum {
            return Err(AuctionError::BidTooLow {
                offered: price,
                minimum,
            });
        }

        self.record_bid(&auction, user_id, price, now).await?;
        self.resolve_auto_bids(&auction).await
    }

    /// Registers a proxy bid that keeps the user in the lead up to
    /// `max_price`, and resolves it against the current book immediately.
    pub async fn place_auto_bid(
        &self,
        auction_id: &str,
        user_id: &str,
        max_price: u64,
    ) -> Result<(), AuctionError> {
        let auction = self.require_auction(auction_id).await?;
        let now = current_unix_ms();
        self.check_window(&auction, now)?;

        let minimum = self.minimum_for(&auction).await?;
        if max_price < minimum {
            return Err(AuctionError::BidTooLow {
                offered: max_price,
                minimum,
            });
        }

        {
            let mut book = self.auto_bids.write().await;
            book.register(
                &auction.id,
                AutoBid {
                    user_id: user_id.to_string(),
                    max_price,
                    registered_at: now,
                },
            );
        }

        self.resolve_auto_bids(&auction).await
    }

    /// Escalates standing proxy bids until no proxy belonging to a
    /// non-leading user can afford the minimum. Each round places exactly
    /// one bid at the minimum, which in turn raises the minimum, so
    /// competing proxies trade the lead one increment at a time.
    async fn resolve_auto_bids(&self, auction: &Auction) -> Result<(), AuctionError> {
        loop {
            let leader = self.bid_store.highest_bid(&auction.id).await?;
            let minimum = match &leader {
                Some(top) => top.price + auction.price_increment,
                None => auction.starting_price,
            };

            let challenger = {
                let book = self.auto_bids.read().await;
                book.best_challenger(
                    &auction.id,
                    leader.as_ref().map(|bid| bid.user_id.as_str()),
                    minimum,
                )
            };

            let Some(auto_bid) = challenger else {
                break;
            };

            self.record_bid(auction, &auto_bid.user_id, minimum, current_unix_ms())
                .await?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn highest_bidder(&self, auction_id: &str) -> Result<Option<UserId>, AuctionError> {
        self.require_auction(auction_id).await?;
        Ok(self
            .bid_store
            .highest_bid(auction_id)
            .await?
            .map(|bid| bid.user_id))
    }

    pub async fn highest_bids(
        &self,
        auction_id: &str,
        limit: u32,
    ) -> Result<Vec<Bid>, AuctionError> {
        self.require_auction(auction_id).await?;
        Ok(self.bid_store.highest_bids(auction_id, limit).await?)
    }

    pub async fn number_of_bids(&self, auction_id: &str) -> Result<u64, AuctionError> {
        self.require_auction(auction_id).await?;
        Ok(self.bid_store.count_for_auction(auction_id).await?)
    }

    /// Auctions whose start time falls inside `window`.
    pub async fn auctions_starting(
        &self,
        window: TimeWindow,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, AuctionError> {
        Ok(self
            .auction_store
            .find_starting(window, sort, order, page)
            .await?)
    }

    /// Auctions whose end time falls inside `window`.
    pub async fn auctions_ending(
        &self,
        window: TimeWindow,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, AuctionError> {
        Ok(self
            .auction_store
            .find_ending(window, sort, order, page)
            .await?)
    }

    /// Auctions currently running.
    pub async fn open_auctions(
        &self,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, AuctionError> {
        let now = current_unix_ms();
        Ok(self.auction_store.find_open(now, sort, order, page).await?)
    }

    // ------------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------------

    /// The winning bid of an ended auction, or `None` when there were no
    /// bids or the reserve was not met. Errors while the auction is open.
    pub async fn winning_bid(
        &self,
        auction_id: &str,
        now: u64,
    ) -> Result<Option<Bid>, AuctionError> {
        if let Some(outcome) = self.settled.get(auction_id) {
            return Ok(outcome.winner.clone());
        }

        let auction = self.require_auction(auction_id).await?;
        if now < auction.end_time {
            return Err(AuctionError::AuctionStillOpen);
        }

        let top = self.bid_store.highest_bid(auction_id).await?;
        Ok(top.filter(|bid| auction.reserve_met(bid.price)))
    }

    // ------------------------ Helper Functions ------------------------

    async fn require_auction(&self, auction_id: &str) -> Result<Auction, AuctionError> {
        self.auction_store
            .find_by_id(auction_id)
            .await?
            .ok_or_else(|| AuctionError::AuctionNotFound(auction_id.to_string()))
    }

    fn check_window(&self, auction: &Auction, now: u64) -> Result<(), AuctionError> {
        if now < auction.start_time {
            return Err(AuctionError::AuctionNotStarted);
        }
        if now >= auction.end_time {
            return Err(AuctionError::AuctionEnded);
        }
        Ok(())
    }

    async fn minimum_for(&self, auction: &Auction) -> Result<u64, AuctionError> {
        match self.bid_store.highest_bid(&auction.id).await? {
            Some(top) => Ok(top.price + auction.price_increment),
            None => Ok(auction.starting_price),
        }
    }

    async fn record_bid(
        &self,
        auction: &Auction,
        user_id: &str,
        price: u64,
        placed_at: u64,
    ) -> Result<(), AuctionError> {
        let bid = Bid {
            auction_id: auction.id.clone(),
            user_id: user_id.to_string(),
            price,
            placed_at,
        };

        self.bid_store.insert_bid(&bid).await?;
        Ok(())
    }
}
