use std::process::ExitCode;

use clap::Parser;

/// Runs the crawl loop and the `perform_rag_query` HTTP surface for one
/// target site, configured entirely through environment variables.
#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Retrieval-augmented documentation knowledge engine")]
struct Cli;

#[tokio::main]
async fn main() -> ExitCode {
    Cli::parse();
    docrag_cli::main_impl().await
}
