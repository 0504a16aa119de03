//! Prism Testing Infrastructure
//!
//! Common fixtures and probes shared across the workspace's test modules:
//! a small session domain to drive stores with, invocation counters for
//! selector call accounting, and async helpers for waiting on background
//! subscription tasks.
//!
//! # Usage
//!
//! Add this to your crate's `Cargo.toml` dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! prism-testkit = { path = "../prism-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod probes;

pub use fixtures::{session_reducer, session_store, SessionAction, SessionState};
pub use probes::{counted, eventually, CallCounter, UpdateLog};
