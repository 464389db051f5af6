use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, warn};

use crate::domain::{
    AuctionId, AuctionOutcome, AuctionStore, BidStore, PageQuery, SortField, SortOrder,
    Timestamp, TimeWindow,
};
use crate::utils::{errors::AuctionError, helpers::current_unix_ms};

/// How far back each sweep looks for freshly ended auctions.
const SWEEP_LOOKBACK_MS: u64 = 60_000;

const SWEEP_PAGE_SIZE: u32 = 256;

/// The `AuctionWorker` is an actor-like structure that runs in the
/// background, sweeping for auctions whose end time has passed and
/// announcing their settlement to the manager exactly once.
pub struct AuctionWorker {
    auction_store: Arc<dyn AuctionStore>,
    bid_store: Arc<dyn BidStore>,
    outcome_sender: mpsc::Sender<AuctionOutcome>,
    tick: Duration,

    /// End times of auctions already announced, pruned as they fall out of
    /// the sweep window.
    announced: HashMap<AuctionId, Timestamp>,
}

impl AuctionWorker {
    pub fn new(
        auction_store: Arc<dyn AuctionStore>,
        bid_store: Arc<dyn BidStore>,
        outcome_sender: mpsc::Sender<AuctionOutcome>,
        tick: Duration,
    ) -> Self {
        AuctionWorker {
            auction_store,
            bid_store,
            outcome_sender,
            tick,
            announced: HashMap::new(),
        }
    }

    /// An infinite loop that sweeps for ended auctions every tick.
    pub async fn run(mut self) {
        loop {
            if let Err(e) = self.process_ended_auctions().await {
                warn!(error = %e, "auction sweep failed");
            }
            sleep(self.tick).await;
        }
    }

    async fn process_ended_auctions(&mut self) -> Result<(), AuctionError> {
        let now = current_unix_ms();
        let window = TimeWindow {
            from: now.saturating_sub(SWEEP_LOOKBACK_MS),
            to: now,
        };

        let mut page = PageQuery {
            page: 0,
            per_page: SWEEP_PAGE_SIZE,
        };
        loop {
            let batch = self
                .auction_store
                .find_ending(window, SortField::EndTime, SortOrder::Ascending, page)
                .await?;
            let batch_len = batch.len();

            for auction in batch {
                if now < auction.end_time || self.announced.contains_key(&auction.id) {
                    continue;
                }

                let top = self.bid_store.highest_bid(&auction.id).await?;
                let winner = top.filter(|bid| auction.reserve_met(bid.price));
                let outcome = AuctionOutcome {
                    auction_id: auction.id.clone(),
                    winner,
                };

                debug!(auction_id = %auction.id, "announcing settled auction");
                if self.outcome_sender.send(outcome).await.is_err() {
                    warn!("outcome receiver dropped, stopping sweep");
                    return Ok(());
                }

                self.announced.insert(auction.id, auction.end_time);
            }

            if batch_len < SWEEP_PAGE_SIZE as usize {
                break;
            }
            page.page += 1;
        }

        self.announced
            .retain(|_, end_time| end_time.saturating_add(SWEEP_LOOKBACK_MS) >= now);

        Ok(())
    }
}
