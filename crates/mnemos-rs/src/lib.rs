//! Public SDK surface for Mnemos.
//!
//! This crate re-exports the config, core, and memory crates and provides a
//! small initialization helper to keep consumer setup consistent.

/// Re-export for convenience.
pub use mnemos_rs_config as config;
pub use mnemos_rs_core as core;
/// Re-export for convenience.
pub use mnemos_rs_memory as memory;

pub use mnemos_rs_config::MnemosConfig;
pub use mnemos_rs_core::{Mnemos, MnemosCoreError, PreparedRun, RunRequest};

#[inline]
/// Initialize env_logger with millisecond timestamps, honouring `RUST_LOG`.
///
/// Safe to call more than once. A no-op without the `logging` feature, which
/// the `mnemos` binary enables by default.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::init_logging;

    #[test]
    fn init_logging_tolerates_repeat_calls() {
        init_logging();
        init_logging();
        log::info!("logging initialized twice");
    }
}
