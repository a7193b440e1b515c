//! File system helpers used by the upgrade pipeline.
//!
//! Declaration files are written atomically, stage directories are copied
//! with their symlinks intact, and every run gets a scoped work directory
//! that is removed on drop unless the user asked to keep it.

pub mod atomic;
pub mod dirs;
pub mod paths;
pub mod temp;

pub use atomic::atomic_write;
pub use dirs::{copy_dir, ensure_dir, ensure_parent_dir, remove_dir_all};
pub use paths::find_project_root;
pub use temp::WorkDir;
