//! Test utilities for depbump
//!
//! In-memory stand-ins for every external collaborator the upgrader talks to,
//! plus archive fixtures and logging setup. Available to unit tests and, via
//! the `test-utils` feature, to the integration tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use depbump::test_utils::{FakeDownloader, FakeRepositoryHost};
//!
//! let host = FakeRepositoryHost::new().with_tags("golang", "tools", &["v0.1.0"]);
//! let downloader = FakeDownloader::new()
//!     .with_body("https://github.com/golang/tools/archive/refs/tags/v0.1.0.zip", vec![1, 2, 3]);
//! ```

mod fakes;
mod fixtures;

pub use fakes::{FakeDownloader, FakeRepositoryHost, RecordingMirror, ScriptedPatchTool};
pub use fixtures::{tar_gz_archive, zip_archive};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` set that level is used;
/// otherwise `RUST_LOG` is honored, and without it nothing is logged.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true) // Show targets like "tool"
            .with_thread_ids(false)
            .try_init();
    });
}
