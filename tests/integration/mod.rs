//! Integration test suite for depbump
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `depbump` binary, for everything that fails or finishes
//!   before the network is touched
//! - **orchestrator**: whole upgrade batches against in-memory hosts

mod common;

mod cli;
mod orchestrator;
