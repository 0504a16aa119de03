//! # Prism Core
//!
//! **Purpose**: incremental, memoized projections ("outputs") over a
//! unidirectional state container.
//!
//! A [`Store`] applies actions through a pure reducer and broadcasts one
//! [`Transition`] per applied action. A [`Watcher`] subscribes to that
//! stream and keeps a single memoized output up to date, recomputing only
//! the minimum necessary work:
//!
//! ```text
//! dispatch(action) -> reducer -> Transition(previous, action)
//!                                      |
//!                                  [filter]
//!                                      |
//!                     dependencies: select each, OR the detectors
//!                                      |  (only if any changed)
//!                           output: select + publish rule
//!                                      |
//!                          output cell + update broadcast
//! ```
//!
//! ## Core Concepts
//!
//! - **Selector**: pure projection plus change detector ([`Selector`]).
//! - **Dependency**: cheap intermediate value that gates recomputation of an
//!   expensive output ([`Dependency`]).
//! - **Projection**: the recomputation engine owning the private memos
//!   ([`Projection`]).
//! - **Watcher**: the stable subscription handle managing configuration
//!   identity, store identity, and exactly one background task
//!   ([`Watcher`]).
//!
//! ## What's NOT in this crate
//!
//! - Domain state/action catalogs (the embedding application's concern)
//! - Persistence or network adapters
//! - Rendering; the only externally visible event is "output was replaced"

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Memoized recomputation engine
pub mod projection;

/// Selector descriptors: projections paired with change detectors
pub mod selector;

/// Reference unidirectional store
pub mod store;

/// Subscription handles and their task lifecycle
pub mod watcher;

pub use projection::Projection;
pub use selector::{Dependency, Selector};
pub use store::{Store, StoreId, Transition};
pub use watcher::{WatchConfig, WatchError, WatchSettings, Watcher};
