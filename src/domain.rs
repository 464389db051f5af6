use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::errors::DatabaseError;

/// A timed English auction. The price starts at `starting_price` and every
/// accepted bid must clear the previous highest bid by `price_increment`.
/// A `reserve_price` of zero means the auction has no reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub starting_price: Price,
    pub reserve_price: Price,
    pub price_increment: Price,
    pub created_at: Timestamp,
}

impl Auction {
    /// Whether a final price satisfies the reserve.
    pub fn reserve_met(&self, price: Price) -> bool {
        self.reserve_price == 0 || price >= self.reserve_price
    }
}

/// A bid recorded against an auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub auction_id: AuctionId,
    pub user_id: UserId,
    pub price: Price,
    pub placed_at: Timestamp,
}

/// A standing proxy bid. The engine bids on the owner's behalf, one
/// increment at a time, never exceeding `max_price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoBid {
    pub user_id: UserId,
    pub max_price: Price,
    pub registered_at: Timestamp,
}

/// Settlement result for an ended auction. `winner` is `None` when no bids
/// were placed or the reserve was not met.
#[derive(Debug, Clone, Serialize)]
pub struct AuctionOutcome {
    pub auction_id: AuctionId,
    pub winner: Option<Bid>,
}

/// Column the listing queries sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    StartTime,
    EndTime,
}

impl SortField {
    /// Whitelisted column name used when building SQL.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::StartTime => "start_time",
            SortField::EndTime => "end_time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }

    pub fn from_ascending(asc: bool) -> Self {
        if asc {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }
}

/// Zero-based pagination window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
}

impl PageQuery {
    pub fn offset(&self) -> u64 {
        self.page as u64 * self.per_page as u64
    }
}

/// Inclusive timestamp range filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: Timestamp,
    pub to: Timestamp,
}

// ------------------------------------------------------------------------
// Type aliases
// ------------------------------------------------------------------------

pub type AuctionId = String;
pub type UserId = String;
pub type Timestamp = u64;
pub type Price = u64;

// ------------------------------------------------------------------------
// Store traits
// ------------------------------------------------------------------------

#[async_trait]
pub trait AuctionStore: Send + Sync {
    async fn create_auction(&self, auction: &Auction) -> Result<(), DatabaseError>;

    async fn find_by_id(&self, auction_id: &str) -> Result<Option<Auction>, DatabaseError>;

    /// Auctions whose `start_time` falls inside `window`.
    async fn find_starting(
        &self,
        window: TimeWindow,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, DatabaseError>;

    /// Auctions whose `end_time` falls inside `window`.
    async fn find_ending(
        &self,
        window: TimeWindow,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, DatabaseError>;

    /// Auctions that have started but not yet ended at `now`.
    async fn find_open(
        &self,
        now: Timestamp,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, DatabaseError>;
}

#[async_trait]
pub trait BidStore: Send + Sync {
    async fn insert_bid(&self, bid: &Bid) -> Result<(), DatabaseError>;

    async fn count_for_auction(&self, auction_id: &str) -> Result<u64, DatabaseError>;

    /// Top bids for an auction, highest price first. Equal prices rank by
    /// earlier placement.
    async fn highest_bids(&self, auction_id: &str, limit: u32) -> Result<Vec<Bid>, DatabaseError>;

    async fn highest_bid(&self, auction_id: &str) -> Result<Option<Bid>, DatabaseError>;
}
