use thiserror::Error;

use crate::db::errors::DatabaseError;

/// A set of possible errors that can occur in the auction workflow.
#[derive(Error, Debug)]
pub enum AuctionError {
    #[error("auction not found: {0}")]
    AuctionNotFound(String),

    #[error("auction has not started yet")]
    AuctionNotStarted,

    #[error("auction has already ended")]
    AuctionEnded,

    #[error("auction has not ended yet")]
    AuctionStillOpen,

    #[error("bid of {offered} is below the minimum bid of {minimum}")]
    BidTooLow { offered: u64, minimum: u64 },

    #[error("auction end time must be after its start time")]
    InvalidAuctionTime,

    #[error("price increment must be greater than zero")]
    InvalidPriceIncrement,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
