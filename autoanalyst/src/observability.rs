//! Process-scoped logging initialization.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`. Call once at
/// process startup; subsequent calls return `false` instead of panicking so
/// embedding applications and tests can race harmlessly.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let _ = init_tracing();
        // A subscriber is installed by now, so a repeat call declines quietly.
        assert!(!init_tracing());
    }
}
