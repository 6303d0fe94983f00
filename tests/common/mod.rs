//! Shared helpers for the e2e suites.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test logging. Safe to call from every test; the first call
/// wins.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .with_test_writer()
            .try_init();
    });
}
