// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod article;
pub mod config;
pub mod curate;
pub mod dedup;
pub mod diversity;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod oracle;
pub mod select;
pub mod similarity;
pub mod store;

pub use crate::api::{create_router, AppState};
pub use crate::article::{Article, SourceType};
pub use crate::config::CurationConfig;
pub use crate::curate::{CurationMode, CurationOrchestrator, CurationResult, StageCounts};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` filters (default
/// `digest_curator=info,warn`); `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("digest_curator=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    // Already initialised (tests, embedding): keep the existing subscriber.
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
