//! Process entry point: wires every component crate together from one
//! [`docrag_common::Config`] and runs the crawl loop and the HTTP surface
//! concurrently, grounded on the teacher's `agent-network` ACP server
//! bootstrap (`acp.rs`) for the listener/`axum::serve` idiom.

use std::process::ExitCode;
use std::sync::Arc;

use docrag_api::{build_router, AppState};
use docrag_common::{Config, EmbeddingMode, Result};
use docrag_embedder::{Embedder, LocalEmbedder, RemoteEmbedder};
use docrag_extractor::ExtractorConfig;
use docrag_fetcher::{FetcherConfig, StealthFetcher};
use docrag_ingest::IngestProcessor;
use docrag_reranker::{CrossEncoderReranker, Reranker};
use docrag_retrieval::QueryEngine;
use docrag_scheduler::Scheduler;
use docrag_store::Store;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builds every component from `config` and runs the crawl loop and the
/// HTTP server until either exits. Returns `Ok(())` only on a clean
/// shutdown; any startup failure is returned for the caller to report and
/// exit non-zero on.
pub async fn run(config: Config) -> Result<()> {
    let store = Arc::new(Store::connect(&config.storage).await?);
    store.run_migrations(config.embedding.dim).await?;
    store.health_check().await?;
    info!("connected to store and applied migrations");

    let embedder: Arc<dyn Embedder> = match config.embedding.mode {
        EmbeddingMode::Api => Arc::new(RemoteEmbedder::new(&config.embedding)?),
        EmbeddingMode::Local => Arc::new(LocalEmbedder::load(&config.embedding)?),
    };

    let reranker: Option<Arc<dyn Reranker>> = if config.reranker.use_reranking {
        Some(Arc::new(CrossEncoderReranker::load(
            &config.reranker.model,
            config.reranker.apply_calibration,
        )))
    } else {
        None
    };

    let fetcher: Arc<dyn docrag_fetcher::Fetcher> =
        Arc::new(StealthFetcher::new(FetcherConfig::default()));

    let scheduler = Arc::new(Scheduler::connect(&config.storage).await?);
    scheduler.seed(&config.target_url).await?;

    let ingest = IngestProcessor::new(
        Arc::clone(&fetcher),
        Arc::clone(&embedder),
        Arc::clone(&store),
        Arc::clone(&scheduler),
        ExtractorConfig::default(),
        config.crawl.clone(),
        config.crawl.contextual_annotation,
    );

    let query_engine = Arc::new(QueryEngine::new(
        Arc::clone(&embedder),
        Arc::clone(&store),
        reranker,
        config.hybrid_search,
    ));

    let state = AppState {
        query_engine,
        store: Arc::clone(&store),
        hybrid_search: config.hybrid_search,
        use_reranking: config.reranker.use_reranking,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!(port = config.http_port, "http surface listening");

    let crawl_handle = tokio::spawn(async move {
        if let Err(e) = ingest.run_forever().await {
            error!(error = %e, "crawl loop exited with an error");
        }
    });

    let serve_result = axum::serve(listener, app).await;
    crawl_handle.abort();
    serve_result?;

    Ok(())
}

/// Installs the tracing subscriber and runs [`run`] to completion,
/// translating a fatal startup error into a process exit code instead of
/// a panic.
pub async fn main_impl() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error, shutting down");
            ExitCode::FAILURE
        }
    }
}
