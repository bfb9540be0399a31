//! Logging setup for applications embedding the cache.
//!
//! The library only emits `tracing` events; nothing is printed until a
//! subscriber is installed, either by the host application or with
//! [`init`].

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `alembic_cache=debug`.
pub const LOG_ENV: &str = "ABC_CACHE_LOG";

/// Environment variable enabling Chrome trace output when set to `1`.
pub const TRACE_ENV: &str = "ABC_CACHE_TRACE";

/// Install a stderr subscriber filtered by [`LOG_ENV`] (default `warn`).
///
/// Returns false if a global subscriber was already set.
pub fn init() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

/// Record spans to `trace.json` for `chrome://tracing` when [`TRACE_ENV`]
/// is `1`.
///
/// Keep the guard alive for as long as tracing should run; the file is
/// flushed when it drops.
#[cfg(feature = "chrome-trace")]
pub fn init_chrome() -> Option<tracing_chrome::FlushGuard> {
    if std::env::var(TRACE_ENV).ok().as_deref() != Some("1") {
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();

    let subscriber = tracing_subscriber::registry().with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init();
        assert!(!init());
    }
}
