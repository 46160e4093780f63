//! Tracing setup shared by the server and the admin CLI

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// Build the log filter from a raw `RUST_LOG` value. Missing, blank or
/// unparsable values fall back to `info`.
pub fn filter_from(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global fmt subscriber filtered by `RUST_LOG`
pub fn init() {
    let raw = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter_from(raw.as_deref()))
        .init();
}
