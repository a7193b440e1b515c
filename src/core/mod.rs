//! Core types for depbump
//!
//! Every fallible operation in the crate returns [`anyhow::Result`]; the typed
//! failure modes live in [`DepbumpError`] so the orchestrator can tell a
//! skipped dependency (directive errors) from a fatal one, and so
//! [`user_friendly_error`] can attach a suggestion when the CLI reports it.
//!
//! # Modules
//!
//! ## `error`
//!
//! - [`DepbumpError`] - enumerated failure modes
//! - [`ErrorContext`] - terminal rendering with details and suggestion
//! - [`user_friendly_error`] - convert any error chain to an [`ErrorContext`]

pub mod error;

pub use error::{DepbumpError, ErrorContext, user_friendly_error};
