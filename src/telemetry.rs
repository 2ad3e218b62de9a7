//! Tracing setup for embedders and tests.
//!
//! The engine instruments its decision points with `tracing` — auto-answer
//! choices at `debug`, degraded passport entries at `warn`. Hosts that
//! already own a subscriber need nothing from this module; the helpers here
//! exist for binaries and tests that want sensible output with one call.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber honouring `RUST_LOG`, defaulting to
/// `warn` for quiet embedding. Color output follows stderr TTY detection.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_filter("warn");
}

/// Installs a global `fmt` subscriber with explicit default directives,
/// still overridable via `RUST_LOG`.
pub fn init_with_filter(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}
