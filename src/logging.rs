//! Structured logging setup.
//!
//! Logs go to **stderr** so stdout stays reserved for answers and command
//! output. The filter is read from `FOLIO_LOG`, then `RUST_LOG`, and
//! falls back to `info` (or `debug` with `--verbose`).

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let fallback = if verbose { "folio=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_env("FOLIO_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
