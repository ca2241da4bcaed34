use docrag_common::{Chunk, Page, Result, RetrievedChunk, StorageConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{info, instrument};

use crate::{ChunkSummary, HybridMatch, KeywordMatch, NearestMatch, StoreError, StoreStats};

/// Vector/lexical fusion weights from SPEC_FULL §4.6.
const VECTOR_WEIGHT: f32 = 0.7;
const LEXICAL_WEIGHT: f32 = 0.3;

/// Dashboard `sort` query parameter is a raw identifier, never bindable —
/// validated against this allowlist before being interpolated into SQL.
const ALLOWED_PAGE_SORT_COLUMNS: &[&str] =
    &["url", "crawl_count", "last_crawled_at", "processed_at", "created_at", "updated_at"];

fn validate_sort_column(requested: &str) -> &'static str {
    ALLOWED_PAGE_SORT_COLUMNS
        .iter()
        .find(|&&col| col == requested)
        .copied()
        .unwrap_or("created_at")
}

fn validate_order(requested: &str) -> &'static str {
    if requested.eq_ignore_ascii_case("asc") {
        "ASC"
    } else {
        "DESC"
    }
}

/// Postgres-backed store for the `pages`/`chunks` schema.
///
/// `embedding` is declared `vector(dim)`. When `dim` exceeds the engine's
/// approximate-index dimension limit (reference 2000; the reference
/// deployment runs at 2560) no HNSW index is created over it — see
/// `migrations.sql` and DESIGN.md. `nearest` and `hybrid` issue the same
/// `ORDER BY embedding <=> $1` query regardless: without an index Postgres
/// falls back to an exact sequential scan, which is precisely the
/// brute-force behavior the "no precision loss" invariant requires.
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to connect to store: {e}")))?;

        info!(
            min = config.min_connections,
            max = config.max_connections,
            "connected to document store"
        );
        Ok(Self { pool })
    }

    /// Creates the `pages`/`chunks` schema if absent. Idempotent — safe to
    /// call on every startup. The vector column's dimension is fixed at the
    /// deployment's configured `EMBEDDING_DIM`; changing it requires a new
    /// column and a backfill, not a migration this method performs.
    pub async fn run_migrations(&self, embedding_dim: usize) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to enable pgvector: {e}")))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pages ( \
                url TEXT PRIMARY KEY, \
                content TEXT NOT NULL DEFAULT '', \
                crawl_count BIGINT NOT NULL DEFAULT 0, \
                last_crawled_at TIMESTAMPTZ, \
                processed_at TIMESTAMPTZ, \
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now() \
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StoreIntegrity(format!("failed to create pages table: {e}")))?;

        let create_chunks = format!(
            "CREATE TABLE IF NOT EXISTS chunks ( \
                id UUID PRIMARY KEY, \
                page_url TEXT NOT NULL REFERENCES pages(url) ON DELETE CASCADE, \
                ordinal INT NOT NULL, \
                content TEXT NOT NULL, \
                context TEXT, \
                break_type TEXT NOT NULL, \
                char_start BIGINT NOT NULL, \
                char_end BIGINT NOT NULL, \
                embedding vector({embedding_dim}) NOT NULL, \
                created_at TIMESTAMPTZ NOT NULL DEFAULT now() \
            )"
        );
        sqlx::query(&create_chunks)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to create chunks table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS chunks_page_url_idx ON chunks (page_url)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to create page_url index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS chunks_content_fts_idx ON chunks \
             USING GIN (to_tsvector('english', content))",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::StoreIntegrity(format!("failed to create full-text index: {e}")))?;

        // Approximate index only below the engine's dimension limit; above
        // it queries fall back to an exact sequential scan by design.
        if embedding_dim <= 2000 {
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS chunks_embedding_hnsw_idx ON chunks \
                 USING hnsw (embedding vector_cosine_ops) WITH (m = 16, ef_construction = 64)",
            )
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to create HNSW index: {e}")))?;
        } else {
            info!(dim = embedding_dim, "dimension exceeds ANN index limit, using brute-force exact scan");
        }

        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("health check failed: {e}")))?;
        Ok(())
    }

    /// Atomic "replace chunks for page": delete → insert → update page →
    /// commit. Any failure rolls the whole transaction back, leaving the
    /// page's prior chunk set untouched.
    #[instrument(skip(self, content, chunks), fields(page_url = %page_url, chunk_count = chunks.len()))]
    pub async fn replace_chunks_for_page(
        &self,
        page_url: &str,
        content: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to open transaction: {e}")))?;

        sqlx::query("DELETE FROM chunks WHERE page_url = $1")
            .bind(page_url)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to clear old chunks: {e}")))?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks \
                 (id, page_url, ordinal, content, context, break_type, char_start, char_end, embedding, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())",
            )
            .bind(chunk.id)
            .bind(&chunk.page_url)
            .bind(chunk.ordinal)
            .bind(&chunk.content)
            .bind(&chunk.context)
            .bind(chunk.break_type.to_string())
            .bind(chunk.char_start)
            .bind(chunk.char_end)
            .bind(pgvector::Vector::from(chunk.embedding.clone()))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to insert chunk: {e}")))?;
        }

        sqlx::query(
            "UPDATE pages SET content = $1, processed_at = now(), updated_at = now() WHERE url = $2",
        )
        .bind(content)
        .bind(page_url)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::StoreIntegrity(format!("failed to update page row: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::StoreIntegrity(format!("failed to commit transaction: {e}")))?;

        Ok(())
    }

    /// Up to `k` chunks ordered by ascending cosine distance.
    #[instrument(skip(self, query_vec))]
    pub async fn nearest(&self, query_vec: &[f32], k: i64) -> Result<Vec<NearestMatch>> {
        let vector = pgvector::Vector::from(query_vec.to_vec());
        let rows = sqlx::query(
            "SELECT id, page_url, content, embedding, embedding <=> $1 AS distance \
             FROM chunks ORDER BY embedding <=> $1 LIMIT $2",
        )
        .bind(vector)
        .bind(k)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("nearest-neighbor query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| NearestMatch {
                chunk_id: row.get("id"),
                url: row.get("page_url"),
                content: row.get("content"),
                embedding: row.get::<pgvector::Vector, _>("embedding").to_vec(),
                distance: row.get::<f64, _>("distance") as f32,
            })
            .collect())
    }

    /// Up to `k` chunks by lexical match score against `chunks.content`.
    #[instrument(skip(self))]
    pub async fn keyword(&self, query_terms: &str, k: i64) -> Result<Vec<KeywordMatch>> {
        let rows = sqlx::query(
            "SELECT id, page_url, content, embedding, \
             ts_rank(to_tsvector('english', content), plainto_tsquery('english', $1)) AS lex_score \
             FROM chunks \
             WHERE to_tsvector('english', content) @@ plainto_tsquery('english', $1) \
             ORDER BY lex_score DESC LIMIT $2",
        )
        .bind(query_terms)
        .bind(k)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("keyword query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| KeywordMatch {
                chunk_id: row.get("id"),
                url: row.get("page_url"),
                content: row.get("content"),
                embedding: row.get::<pgvector::Vector, _>("embedding").to_vec(),
                lex_score: row.get::<f32, _>("lex_score"),
            })
            .collect())
    }

    /// Union of `nearest` and `keyword`, de-duplicated by chunk id and
    /// re-scored by `0.7*vector_score + 0.3*lex_score`. Ties broken by
    /// vector_score, per SPEC_FULL §4.6.
    #[instrument(skip(self, query_vec))]
    pub async fn hybrid(&self, query_vec: &[f32], query_text: &str, k: i64) -> Result<Vec<HybridMatch>> {
        let nearest = self.nearest(query_vec, k).await?;
        let keyword = self.keyword(query_text, k).await?;

        let max_lex = keyword.iter().map(|m| m.lex_score).fold(0.0_f32, f32::max);

        let mut fused: std::collections::HashMap<uuid::Uuid, (String, String, Vec<f32>, f32, f32)> =
            std::collections::HashMap::new();

        for m in nearest {
            let vector_score = 1.0 - m.distance;
            fused
                .entry(m.chunk_id)
                .and_modify(|(_, _, _, v, _)| *v = vector_score)
                .or_insert((m.url, m.content, m.embedding, vector_score, 0.0));
        }

        for m in keyword {
            let lex_score = if max_lex > 0.0 { m.lex_score / max_lex } else { 0.0 };
            fused
                .entry(m.chunk_id)
                .and_modify(|(_, _, _, _, l)| *l = lex_score)
                .or_insert((m.url, m.content, m.embedding, 0.0, lex_score));
        }

        let mut scored: Vec<(HybridMatch, f32)> = fused
            .into_iter()
            .map(|(chunk_id, (url, content, embedding, vector_score, lex_score))| {
                let retrieved = RetrievedChunk {
                    chunk_id,
                    url,
                    content,
                    similarity: VECTOR_WEIGHT * vector_score + LEXICAL_WEIGHT * lex_score,
                };
                (HybridMatch { retrieved, embedding }, vector_score)
            })
            .collect();

        scored.sort_by(|(a, a_vec), (b, b_vec)| {
            b.retrieved
                .similarity
                .partial_cmp(&a.retrieved.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b_vec.partial_cmp(a_vec).unwrap_or(std::cmp::Ordering::Equal))
        });
        scored.truncate(k as usize);

        Ok(scored.into_iter().map(|(m, _)| m).collect())
    }

    /// Dashboard page listing: `sort`/`order` are validated against an
    /// allowlist rather than bound, since Postgres cannot parameterize
    /// identifiers.
    #[instrument(skip(self))]
    pub async fn list_pages(&self, sort: &str, order: &str, search: Option<&str>) -> Result<Vec<Page>> {
        let column = validate_sort_column(sort);
        let direction = validate_order(order);
        let query = format!(
            "SELECT url, content, crawl_count, last_crawled_at, processed_at, created_at, updated_at \
             FROM pages WHERE ($1::text IS NULL OR url ILIKE '%' || $1 || '%') \
             ORDER BY {column} {direction}"
        );
        let rows = sqlx::query(&query)
            .bind(search)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("page listing failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| Page {
                url: row.get("url"),
                content: row.get("content"),
                crawl_count: row.get("crawl_count"),
                last_crawled_at: row.get("last_crawled_at"),
                processed_at: row.get("processed_at"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    /// Dashboard chunk listing, paginated; returns `(rows, total_matching)`.
    #[instrument(skip(self))]
    pub async fn list_chunks(
        &self,
        page: i64,
        size: i64,
        search: Option<&str>,
    ) -> Result<(Vec<ChunkSummary>, i64)> {
        let offset = (page.max(1) - 1) * size;

        let total: i64 = sqlx::query(
            "SELECT count(*) AS total FROM chunks WHERE ($1::text IS NULL OR content ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("chunk count failed: {e}")))?
        .get("total");

        let rows = sqlx::query(
            "SELECT id, page_url, ordinal, content, created_at FROM chunks \
             WHERE ($1::text IS NULL OR content ILIKE '%' || $1 || '%') \
             ORDER BY page_url, ordinal LIMIT $2 OFFSET $3",
        )
        .bind(search)
        .bind(size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("chunk listing failed: {e}")))?;

        let summaries = rows
            .into_iter()
            .map(|row| ChunkSummary {
                id: row.get("id"),
                page_url: row.get("page_url"),
                ordinal: row.get("ordinal"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok((summaries, total))
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            "SELECT \
                (SELECT count(*) FROM pages) AS pages_count, \
                (SELECT count(*) FROM chunks) AS chunks_count, \
                (SELECT count(*) FROM pages WHERE content <> '') AS pages_with_content, \
                (SELECT count(*) FROM pages WHERE processed_at IS NOT NULL) AS pages_processed",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("stats query failed: {e}")))?;

        Ok(StoreStats {
            pages_count: row.get("pages_count"),
            chunks_count: row.get("chunks_count"),
            pages_with_content: row.get("pages_with_content"),
            pages_processed: row.get("pages_processed"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fusion_weights_sum_to_one() {
        assert!((VECTOR_WEIGHT + LEXICAL_WEIGHT - 1.0).abs() < 1e-6);
    }

    #[test]
    fn validate_sort_column_rejects_unknown_identifiers() {
        assert_eq!(validate_sort_column("crawl_count"), "crawl_count");
        assert_eq!(validate_sort_column("url; DROP TABLE pages;--"), "created_at");
    }

    #[test]
    fn validate_order_defaults_to_descending() {
        assert_eq!(validate_order("asc"), "ASC");
        assert_eq!(validate_order("ASC"), "ASC");
        assert_eq!(validate_order("nonsense"), "DESC");
    }
}
