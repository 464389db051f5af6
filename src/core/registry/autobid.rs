use std::collections::HashMap;

use crate::domain::{AuctionId, AutoBid};

/// In-memory book of standing proxy bids, keyed by auction. A user holds at
/// most one entry per auction; re-registering replaces the old ceiling.
#[derive(Default)]
pub struct AutoBidBook {
    standing: HashMap<AuctionId, Vec<AutoBid>>,
}

impl AutoBidBook {
    pub fn new() -> Self {
        AutoBidBook {
            standing: HashMap::new(),
        }
    }

    pub fn register(&mut self, auction_id: &str, auto_bid: AutoBid) {
        let entries = self.standing.entry(auction_id.to_string()).or_default();
        entries.retain(|existing| existing.user_id != auto_bid.user_id);
        entries.push(auto_bid);
    }

    /// The strongest standing proxy that could outbid the current leader:
    /// highest ceiling wins, earlier registration breaks ties, and the
    /// leader's own proxy never bids against itself.
    pub fn best_challenger(
        &self,
        auction_id: &str,
        leader: Option<&str>,
        minimum: u64,
    ) -> Option<AutoBid> {
        self.standing
            .get(auction_id)?
            .iter()
            .filter(|auto_bid| auto_bid.max_price >= minimum)
            .filter(|auto_bid| leader != Some(auto_bid.user_id.as_str()))
            .max_by(|a, b| {
                a.max_price
                    .cmp(&b.max_price)
                    .then_with(|| b.registered_at.cmp(&a.registered_at))
            })
            .cloned()
    }

    pub fn clear_auction(&mut self, auction_id: &str) {
        self.standing.remove(auction_id);
    }

    pub fn standing_count(&self, auction_id: &str) -> usize {
        self.standing
            .get(auction_id)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}
