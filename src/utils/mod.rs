//! Utility modules shared by the CLI and the upgrade pipeline.
//!
//! - [`fs`]: atomic writes, stage copying, the scoped work directory
//! - [`platform`]: executable lookup and path expansion
//! - [`progress`]: the terminal spinner

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{WorkDir, atomic_write, copy_dir, ensure_dir};
pub use platform::{command_exists, expand_path, require_tools};
pub use progress::ProgressBar;
