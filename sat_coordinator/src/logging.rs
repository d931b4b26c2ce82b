//! logging bootstrap (§10): a `tracing_subscriber::fmt` subscriber with an
//! `EnvFilter`, installed once before any worker task is spawned.

use tracing_subscriber::EnvFilter;

/// `override_level`, if set (from `--log-level`), wins over `RUST_LOG`; absent
/// either, the default is `info`.
pub fn init(override_level: Option<&str>) {
    let filter = match override_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // note this only succeeds if there is no global subscriber set yet - in
    // tests each `#[tokio::test]` may call this more than once across the
    // binary, so failures here are intentionally swallowed.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
