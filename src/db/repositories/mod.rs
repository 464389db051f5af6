pub mod auction;
pub mod bid;

pub use auction::SqliteAuctionStore;
pub use bid::SqliteBidStore;
