use async_trait::async_trait;

use crate::db::errors::DatabaseError;
use crate::db::pool::DbPool;
use crate::domain::{Auction, AuctionStore, PageQuery, SortField, SortOrder, TimeWindow};

const AUCTION_COLUMNS: &str =
    "id, start_time, end_time, starting_price, reserve_price, price_increment, created_at";

/// SQLite rows come back as signed integers; converted at the boundary.
#[derive(sqlx::FromRow)]
struct AuctionRow {
    id: String,
    start_time: i64,
    end_time: i64,
    starting_price: i64,
    reserve_price: i64,
    price_increment: i64,
    created_at: i64,
}

impl From<AuctionRow> for Auction {
    fn from(row: AuctionRow) -> Self {
        Auction {
            id: row.id,
            start_time: row.start_time as u64,
            end_time: row.end_time as u64,
            starting_price: row.starting_price as u64,
            reserve_price: row.reserve_price as u64,
            price_increment: row.price_increment as u64,
            created_at: row.created_at as u64,
        }
    }
}

pub struct SqliteAuctionStore {
    db_pool: DbPool,
}

impl SqliteAuctionStore {
    pub fn new(db_pool: DbPool) -> Self {
        SqliteAuctionStore { db_pool }
    }

    async fn find_in_window(
        &self,
        time_column: &'static str,
        window: TimeWindow,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, DatabaseError> {
        let query = format!(
            "SELECT {AUCTION_COLUMNS} FROM auctions \
             WHERE {time_column} >= ? AND {time_column} <= ? \
             ORDER BY {} {} LIMIT ? OFFSET ?",
            sort.column(),
            order.sql_keyword(),
        );

        let rows = sqlx::query_as::<_, AuctionRow>(&query)
            .bind(window.from as i64)
            .bind(window.to as i64)
            .bind(page.per_page as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.db_pool.pool)
            .await?;

        Ok(rows.into_iter().map(Auction::from).collect())
    }
}

#[async_trait]
impl AuctionStore for SqliteAuctionStore {
    async fn create_auction(&self, auction: &Auction) -> Result<(), DatabaseError> {
        let query = format!(
            "INSERT INTO auctions ({AUCTION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
        );

        sqlx::query(&query)
            .bind(&auction.id)
            .bind(auction.start_time as i64)
            .bind(auction.end_time as i64)
            .bind(auction.starting_price as i64)
            .bind(auction.reserve_price as i64)
            .bind(auction.price_increment as i64)
            .bind(auction.created_at as i64)
            .execute(&self.db_pool.pool)
            .await?;

        Ok(())
    }

    async fn find_by_id(&self, auction_id: &str) -> Result<Option<Auction>, DatabaseError> {
        let query = format!("SELECT {AUCTION_COLUMNS} FROM auctions WHERE id = ?");

        let row = sqlx::query_as::<_, AuctionRow>(&query)
            .bind(auction_id)
            .fetch_optional(&self.db_pool.pool)
            .await?;

        Ok(row.map(Auction::from))
    }

    async fn find_starting(
        &self,
        window: TimeWindow,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, DatabaseError> {
        self.find_in_window("start_time", window, sort, order, page)
            .await
    }

    async fn find_ending(
        &self,
        window: TimeWindow,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, DatabaseError> {
        self.find_in_window("end_time", window, sort, order, page)
            .await
    }

    async fn find_open(
        &self,
        now: u64,
        sort: SortField,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<Vec<Auction>, DatabaseError> {
        let query = format!(
            "SELECT {AUCTION_COLUMNS} FROM auctions \
             WHERE start_time <= ? AND end_time > ? \
             ORDER BY {} {} LIMIT ? OFFSET ?",
            sort.column(),
            order.sql_keyword(),
        );

        let rows = sqlx::query_as::<_, AuctionRow>(&query)
            .bind(now as i64)
            .bind(now as i64)
            .bind(page.per_page as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.db_pool.pool)
            .await?;

        Ok(rows.into_iter().map(Auction::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Result<DbPool, DatabaseError> {
        // A single connection keeps the in-memory database alive for the
        // whole test.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(DbPool { pool })
    }

    fn sample_auction(id: &str, start_time: u64, end_time: u64) -> Auction {
        Auction {
            id: id.to_string(),
            start_time,
            end_time,
            starting_price: 100,
            reserve_price: 0,
            price_increment: 10,
            created_at: start_time,
        }
    }

    fn first_page(per_page: u32) -> PageQuery {
        PageQuery { page: 0, per_page }
    }

    #[tokio::test]
    async fn test_create_and_find_auction() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        let store = SqliteAuctionStore::new(db_pool);

        let auction = sample_auction("auction-1", 1_000, 2_000);
        store.create_auction(&auction).await?;

        let fetched = store.find_by_id("auction-1").await?;
        assert_eq!(fetched, Some(auction));

        let missing = store.find_by_id("no-such-auction").await?;
        assert!(missing.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_duplicate_auction() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        let store = SqliteAuctionStore::new(db_pool);

        let auction = sample_auction("duplicate", 1_000, 2_000);
        store.create_auction(&auction).await?;

        let result = store.create_auction(&auction).await;
        match result {
            Err(DatabaseError::Query(msg)) => {
                assert!(msg.contains("UNIQUE constraint failed"));
            }
            other => panic!("expected a unique-constraint failure, got {:?}", other),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_find_starting_window_and_order() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        let store = SqliteAuctionStore::new(db_pool);

        store
            .create_auction(&sample_auction("early", 1_000, 5_000))
            .await?;
        store
            .create_auction(&sample_auction("middle", 2_000, 6_000))
            .await?;
        store
            .create_auction(&sample_auction("late", 3_000, 7_000))
            .await?;

        let window = TimeWindow {
            from: 1_500,
            to: 3_500,
        };
        let found = store
            .find_starting(
                window,
                SortField::StartTime,
                SortOrder::Descending,
                first_page(10),
            )
            .await?;

        let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "middle"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_find_ending_pagination() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        let store = SqliteAuctionStore::new(db_pool);

        for i in 0..5u64 {
            let id = format!("auction-{}", i);
            store
                .create_auction(&sample_auction(&id, 1_000 + i, 10_000 + i))
                .await?;
        }

        let window = TimeWindow {
            from: 10_000,
            to: 10_004,
        };
        let page_one = store
            .find_ending(
                window,
                SortField::EndTime,
                SortOrder::Ascending,
                PageQuery {
                    page: 0,
                    per_page: 2,
                },
            )
            .await?;
        let page_two = store
            .find_ending(
                window,
                SortField::EndTime,
                SortOrder::Ascending,
                PageQuery {
                    page: 1,
                    per_page: 2,
                },
            )
            .await?;

        assert_eq!(page_one.len(), 2);
        assert_eq!(page_one[0].id, "auction-0");
        assert_eq!(page_two.len(), 2);
        assert_eq!(page_two[0].id, "auction-2");

        Ok(())
    }

    #[tokio::test]
    async fn test_find_open_excludes_ended_and_unstarted() -> Result<(), DatabaseError> {
        let db_pool = setup_test_db().await?;
        let store = SqliteAuctionStore::new(db_pool);

        store
            .create_auction(&sample_auction("ended", 1_000, 2_000))
            .await?;
        store
            .create_auction(&sample_auction("open", 1_000, 9_000))
            .await?;
        store
            .create_auction(&sample_auction("future", 8_000, 9_000))
            .await?;

        let open = store
            .find_open(
                5_000,
                SortField::EndTime,
                SortOrder::Ascending,
                first_page(10),
            )
            .await?;

        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "open");

        Ok(())
    }
}
