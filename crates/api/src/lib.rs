//! HTTP surface: the `perform_rag_query` tool-call endpoint and a read-only
//! dashboard API over the page/chunk store.
//!
//! Router assembly and request-id tracing follow the teacher's `server.rs`
//! and `middleware/logging.rs`; the multi-agent orchestration routes they
//! served are replaced with the single tool endpoint and three dashboard
//! reads SPEC_FULL §6 describes.

pub mod middleware;
pub mod routes;
pub mod server;
pub mod types;

pub use server::{build_router, AppState};
