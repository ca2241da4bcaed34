//! Ingestion processor: component C8.
//!
//! Wires fetch → extract → chunk → embed → store into one per-URL pipeline,
//! driven in bounded waves against the frontier leased by
//! [`docrag_scheduler::Scheduler`]. Concurrency is a `tokio::sync::Semaphore`
//! sized to `CrawlConfig::max_concurrent`, the same structured-concurrency
//! idiom the teacher's crawler uses to bound in-flight page fetches.

use std::sync::Arc;
use std::time::Duration;

use docrag_chunker::{chunk, enclosing_header_context};
use docrag_common::{Chunk, CrawlConfig, DocragError, Result};
use docrag_embedder::Embedder;
use docrag_extractor::{extract, ExtractorConfig};
use docrag_fetcher::Fetcher;
use docrag_scheduler::Scheduler;
use docrag_store::Store;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

/// Below this many characters, a successful fetch is treated as
/// transient-blocked rather than a real page — typically a challenge page
/// or an empty shell rendered before client-side JS runs.
const MIN_EXTRACTED_CONTENT_CHARS: usize = 100;

/// Per-URL pipeline outcome: the discovered links to grow the frontier with.
/// A failed URL yields an empty list — its lease counter already advanced,
/// so it simply falls to the back of the next selection round.
#[instrument(skip(fetcher, extractor_config, embedder, store, contextual_annotation), fields(url = %url))]
async fn process_one(
    url: &str,
    fetcher: &dyn Fetcher,
    extractor_config: &ExtractorConfig,
    chunk_size: usize,
    contextual_annotation: bool,
    embedder: &dyn Embedder,
    store: &Store,
) -> Result<Vec<String>> {
    let outcome = fetcher.fetch(url).await?;

    let markdown = extract(&outcome.html, extractor_config)?;
    let extracted_len = markdown.trim().chars().count();
    if extracted_len < MIN_EXTRACTED_CONTENT_CHARS {
        return Err(DocragError::Blocked(format!(
            "{url} extracted to {extracted_len} characters, below the transient-blocked threshold of {MIN_EXTRACTED_CONTENT_CHARS}"
        )));
    }

    let mut chunks = build_chunks(url, &markdown, chunk_size, contextual_annotation);
    if chunks.is_empty() {
        return Err(DocragError::MalformedContent(format!("{url} produced no chunks")));
    }

    let texts: Vec<String> = chunks.iter().map(Chunk::embeddable_text).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != chunks.len() {
        return Err(DocragError::Embedding(format!(
            "{url}: embedder returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }
    for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
        chunk.embedding = embedding;
    }

    store.replace_chunks_for_page(url, &markdown, &chunks).await?;

    info!(chunk_count = chunks.len(), "ingested page");
    Ok(outcome.discovered_urls)
}

/// Turns extracted markdown into unembedded [`Chunk`] rows, ordinal-numbered
/// and optionally carrying a heading-breadcrumb context.
fn build_chunks(url: &str, markdown: &str, chunk_size: usize, contextual_annotation: bool) -> Vec<Chunk> {
    let now = chrono::Utc::now();
    chunk(markdown, chunk_size)
        .into_iter()
        .enumerate()
        .map(|(ordinal, span)| {
            let context =
                if contextual_annotation { enclosing_header_context(markdown, span.start) } else { None };
            Chunk {
                id: uuid::Uuid::new_v4(),
                page_url: url.to_string(),
                ordinal: ordinal as i32,
                content: span.content,
                context,
                break_type: span.break_type,
                char_start: span.start as i64,
                char_end: span.end as i64,
                embedding: Vec::new(),
                created_at: now,
            }
        })
        .collect()
}

pub struct IngestProcessor {
    fetcher: Arc<dyn Fetcher>,
    embedder: Arc<dyn Embedder>,
    store: Arc<Store>,
    scheduler: Arc<Scheduler>,
    extractor_config: ExtractorConfig,
    crawl: CrawlConfig,
    contextual_annotation: bool,
}

impl IngestProcessor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        embedder: Arc<dyn Embedder>,
        store: Arc<Store>,
        scheduler: Arc<Scheduler>,
        extractor_config: ExtractorConfig,
        crawl: CrawlConfig,
        contextual_annotation: bool,
    ) -> Self {
        Self { fetcher, embedder, store, scheduler, extractor_config, crawl, contextual_annotation }
    }

    /// Leases one batch from the frontier and drains it in waves of
    /// `processor_batch_size`, each wave bounded to `max_concurrent`
    /// in-flight pipelines. Returns the number of URLs attempted.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<usize> {
        let leased = self.scheduler.lease_batch(self.crawl.batch_size).await?;
        if leased.is_empty() {
            return Ok(0);
        }

        let semaphore = Arc::new(Semaphore::new(self.crawl.max_concurrent));
        let mut discovered_all = Vec::new();
        let attempted = leased.len();

        for wave in leased.chunks(self.crawl.processor_batch_size) {
            let mut handles = Vec::with_capacity(wave.len());
            for leased_url in wave {
                let url = leased_url.url.clone();
                let fetcher = Arc::clone(&self.fetcher);
                let embedder = Arc::clone(&self.embedder);
                let store = Arc::clone(&self.store);
                let extractor_config = self.extractor_config.clone();
                let chunk_size = self.crawl.chunk_size;
                let contextual_annotation = self.contextual_annotation;
                let permit = Arc::clone(&semaphore);

                handles.push(tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                    let result = process_one(
                        &url,
                        fetcher.as_ref(),
                        &extractor_config,
                        chunk_size,
                        contextual_annotation,
                        embedder.as_ref(),
                        store.as_ref(),
                    )
                    .await;
                    (url, result)
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok((url, Ok(discovered))) => discovered_all.extend(discovered),
                    Ok((url, Err(e))) => {
                        warn!(url = %url, error = %e, "page ingestion failed, skipping for this cycle");
                    }
                    Err(join_err) => warn!(error = %join_err, "ingestion task panicked"),
                }
            }
        }

        let discovered_all = dedup_discovered(discovered_all);
        if !discovered_all.is_empty() {
            self.scheduler.enqueue_discovered(&discovered_all).await?;
        }

        Ok(attempted)
    }

    /// Runs cycles forever, sleeping `crawl_interval` between ticks that
    /// found nothing to do so the frontier can refill without a tight loop.
    pub async fn run_forever(&self) -> Result<()> {
        let interval = Duration::from_secs_f64(self.crawl.crawl_interval_secs);
        loop {
            let attempted = self.run_cycle().await?;
            if attempted == 0 {
                tokio::time::sleep(interval).await;
            }
        }
    }
}

fn dedup_discovered(mut urls: Vec<String>) -> Vec<String> {
    urls.sort();
    urls.dedup();
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_discovered_sorts_and_removes_duplicates() {
        let urls = vec![
            "https://docs.example.com/b".to_string(),
            "https://docs.example.com/a".to_string(),
            "https://docs.example.com/b".to_string(),
        ];
        assert_eq!(
            dedup_discovered(urls),
            vec!["https://docs.example.com/a".to_string(), "https://docs.example.com/b".to_string()]
        );
    }

    #[test]
    fn build_chunks_assigns_contiguous_ordinals() {
        let markdown = "# Guide\n\nFirst paragraph.\n\n## Intro\n\nSecond paragraph.";
        let chunks = build_chunks("https://docs.example.com/guide", markdown, 20, false);
        assert!(!chunks.is_empty());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.ordinal, i as i32);
            assert!(c.context.is_none());
        }
    }

    #[test]
    fn build_chunks_populates_context_when_contextual_annotation_is_enabled() {
        let markdown = "# Guide\n\n## Intro\n\nA paragraph long enough to force a break here.";
        let chunks = build_chunks("https://docs.example.com/guide", markdown, 10, true);
        assert!(chunks.iter().any(|c| c.context.is_some()));
    }
}
