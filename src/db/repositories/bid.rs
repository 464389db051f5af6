use async_trait::async_trait;

use crate::db::errors::DatabaseError;
use crate::db::pool::DbPool;
use crate::domain::{Bid, BidStore};

#[derive(sqlx::FromRow)]
struct BidRow {
    auction_id: String,
    user_id: String,
    price: i64,
    placed_at: i64,
}

impl From<BidRow> for Bid {
    fn from(row: BidRow) -> Self {
        Bid {
            auction_id: row.auction_id,
            user_id: row.user_id,
            price: row.price as u64,
            placed_at: row.placed_at as u64,
        }
    }
}

pub struct SqliteBidStore {
    db_pool: DbPool,
}

impl SqliteBidStore {
    pub fn new(db_pool: DbPool) -> Self {
        SqliteBidStore { db_pool }
    }
}

#[async_trait]
impl BidStore for SqliteBidStore {
    async fn insert_bid(&self, bid: &Bid) -> Result<(), DatabaseError> {
        let query = r#"
            INSERT INTO bids (auction_id, user_id, price, placed_at)
            VALUES (?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(&bid.auction_id)
            .bind(&bid.user_id)
            .bind(bid.price as i64)
            .bind(bid.placed_at as i64)
            .execute(&self.db_pool.pool)
            .await?;

        Ok(())
    }

    async fn count_for_auction(&self, auction_id: &str) -> Result<u64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bids WHERE auction_id = ?")
            .bind(auction_id)
            .fetch_one(&self.db_pool.pool)
            .await?;

        Ok(count as u64)
    }

    async fn highest_bids(&self, auction_id: &str, limit: u32) -> Result<Vec<Bid>, DatabaseError> {
        let query = r#"
            SELECT auction_id, user_id, price, placed_at FROM bids
            WHERE auction_id = ?
            ORDER BY price DESC, placed_at ASC, id ASC
            LIMIT ?
        "#;

        let rows = sqlx::query_as::<_, BidRow>(query)
            .bind(auction_id)
            .bind(limit as i64)
            .fetch_all(&self.db_pool.pool)
            .await?;

        Ok(rows.into_iter().map(Bid::from).collect())
    }

    async fn highest_bid(&self, auction_id: &str) -> Result<Option<Bid>, DatabaseError> {
        let query = r#"
            SELECT auction_id, user_id, price, placed_at FROM bids
            WHERE auction_id = ?
            ORDER BY price DESC, placed_at ASC, id ASC
            LIMIT 1
        "#;

        let row = sqlx::query_as::<_, BidRow>(query)
            .bind(auction_id)
            .fetch_optional(&self.db_pool.pool)
            .await?;

        Ok(row.map(Bid::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sqlx::sqlite::SqlitePoolOptions;

    use crate::db::repositories::SqliteAuctionStore;
    use crate::domain::{Auction, AuctionStore};

    async fn setup_test_db() -> Result<DbPool, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(DbPool { pool })
    }

    /// Bids reference their auction, so each test needs a parent row first.
    async fn insert_parent_auction(db_pool: &DbPool, auction_id: &str) -> Result<(), DatabaseError> {
        let store = SqliteAuctionStore::new(db_pool.clone());
        store
            .create_auction(&Auction {
                id: auction_id.to_string(),
                start_time: 1_000,
                end_time: 60_000,
                starting_price: 100,
                reserve_price: 0,
                price_increment: 10,
                created_at: 1_000,
            })
            .await
    }

    fn bid(auction_id: &str, user_id: &str, price: u64, placed_at: u64) -> Bid {
        Bid {
            auction_id: auction_id.to_string(),
            user_id: user_id.to_string(),
            price,
            placed_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_count_bids() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        insert_parent_auction(&db_pool, "auction-1").await?;
        let store = SqliteBidStore::new(db_pool);

        assert_eq!(store.count_for_auction("auction-1").await?, 0);

        store.insert_bid(&bid("auction-1", "alice", 100, 2_000)).await?;
        store.insert_bid(&bid("auction-1", "bob", 110, 3_000)).await?;

        assert_eq!(store.count_for_auction("auction-1").await?, 2);
        assert_eq!(store.count_for_auction("other-auction").await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_highest_bids_ranking() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        insert_parent_auction(&db_pool, "auction-1").await?;
        let store = SqliteBidStore::new(db_pool);

        store.insert_bid(&bid("auction-1", "alice", 100, 2_000)).await?;
        store.insert_bid(&bid("auction-1", "bob", 130, 3_000)).await?;
        store.insert_bid(&bid("auction-1", "carol", 120, 4_000)).await?;

        let top_two = store.highest_bids("auction-1", 2).await?;
        let users: Vec<&str> = top_two.iter().map(|b| b.user_id.as_str()).collect();
        assert_eq!(users, vec!["bob", "carol"]);

        // A limit larger than the bid count returns everything.
        let all = store.highest_bids("auction-1", 10).await?;
        assert_eq!(all.len(), 3);

        let top = store.highest_bid("auction-1").await?;
        assert_eq!(top.map(|b| b.user_id), Some("bob".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn test_equal_prices_rank_by_placement() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        insert_parent_auction(&db_pool, "auction-1").await?;
        let store = SqliteBidStore::new(db_pool);

        store.insert_bid(&bid("auction-1", "first", 200, 2_000)).await?;
        store.insert_bid(&bid("auction-1", "second", 200, 3_000)).await?;

        let top = store.highest_bid("auction-1").await?;
        assert_eq!(top.map(|b| b.user_id), Some("first".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn test_highest_bid_empty_auction() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        insert_parent_auction(&db_pool, "auction-1").await?;
        let store = SqliteBidStore::new(db_pool);

        assert!(store.highest_bid("auction-1").await?.is_none());
        assert!(store.highest_bids("auction-1", 5).await?.is_empty());

        Ok(())
    }
}
