//! Process-wide tracing subscriber init. No OTLP exporter here — this
//! control plane has no external observability surface in scope — but
//! the subscriber itself is ambient and always present.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber::fmt` layer filtered by `RUST_LOG` (or
/// `info` if unset). Safe to call once per process; a second call is a
/// no-op and its error is swallowed, matching a long-running control
/// plane that may re-enter `main` in tests.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
