//! Logging utilities
//!
//! The library only talks to the `log` facade; hosts (the editor, the demo, tests)
//! decide whether and how records are emitted.

pub use log::{debug, error, info, trace, warn};

/// Initialize logging from `RUST_LOG`, defaulting to `info` when unset.
pub fn init() {
    init_with_level("info");
}

/// Initialize logging with an explicit default filter (e.g. `"debug"` or
/// `"viewport_core=trace"`). `RUST_LOG` still wins when present.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_level(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::trace!("Logger already initialized, keeping existing configuration");
    }
}
