//! Crawl frontier dispatch: component C7.
//!
//! The frontier is the `pages` table itself. Leasing a batch is the same
//! claim-with-lease shape as a job queue's `FOR UPDATE SKIP LOCKED` claim —
//! grounded on `claim_jobs` in the job-queue example's `job.rs`, adapted from
//! a `jobs` table with an explicit lease column to `pages` ordered by
//! `crawl_count` itself, per SPEC_FULL §4.7.

use docrag_common::{DocragError, Result, StorageConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct LeasedUrl {
    pub url: String,
    pub crawl_count: i64,
}

pub struct Scheduler {
    pool: PgPool,
}

impl Scheduler {
    pub async fn connect(storage: &StorageConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(storage.min_connections)
            .max_connections(storage.max_connections)
            .connect(&storage.database_url)
            .await
            .map_err(|e| DocragError::StoreIntegrity(format!("scheduler failed to connect: {e}")))?;
        Ok(Self { pool })
    }

    /// Leases up to `limit` URLs: selects by `crawl_count ASC, last_crawled_at
    /// ASC NULLS FIRST` under `FOR UPDATE SKIP LOCKED`, advancing the lease
    /// counter in the same statement before the row lock releases. Never
    /// rolled back on later failure — the counter alone provides backoff.
    #[instrument(skip(self))]
    pub async fn lease_batch(&self, limit: i64) -> Result<Vec<LeasedUrl>> {
        let rows = sqlx::query(
            "WITH next_pages AS ( \
                SELECT url FROM pages \
                ORDER BY crawl_count ASC, last_crawled_at ASC NULLS FIRST \
                LIMIT $1 \
                FOR UPDATE SKIP LOCKED \
            ) \
            UPDATE pages SET crawl_count = crawl_count + 1, last_crawled_at = now() \
            WHERE url IN (SELECT url FROM next_pages) \
            RETURNING url, crawl_count",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DocragError::StoreIntegrity(format!("lease query failed: {e}")))?;

        let leased: Vec<LeasedUrl> = rows
            .into_iter()
            .map(|row| LeasedUrl { url: row.get("url"), crawl_count: row.get("crawl_count") })
            .collect();

        debug!(count = leased.len(), "leased URL batch");
        Ok(leased)
    }

    /// Grows the frontier with newly discovered URLs. Brand-new URLs start
    /// at `crawl_count = 0`, so they jump to the head of the next lease
    /// query's ordering.
    #[instrument(skip(self, urls), fields(url_count = urls.len()))]
    pub async fn enqueue_discovered(&self, urls: &[String]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }
        sqlx::query("INSERT INTO pages (url) SELECT * FROM UNNEST($1::text[]) ON CONFLICT (url) DO NOTHING")
            .bind(urls)
            .execute(&self.pool)
            .await
            .map_err(|e| DocragError::StoreIntegrity(format!("frontier insert failed: {e}")))?;
        Ok(())
    }

    /// Seeds the frontier with the deployment's starting URL, a no-op if
    /// already present.
    pub async fn seed(&self, target_url: &str) -> Result<()> {
        self.enqueue_discovered(std::slice::from_ref(&target_url.to_string())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leased_url_carries_the_post_lease_counter() {
        let leased = LeasedUrl { url: "https://docs.example.com".into(), crawl_count: 1 };
        assert_eq!(leased.crawl_count, 1);
    }
}
