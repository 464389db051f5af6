pub mod autobid;

pub use autobid::AutoBidBook;
