//! # Tradesim Engine
//!
//! The session layer. Callers hand it a `SessionConfig` and get back a session id
//! they can poll, stop and read results from.
//!
//! ## Architectural Principles
//!
//! - **Explicit Registry:** Sessions live in a `SessionStore`, a cloneable handle
//!   to a lock-guarded map with create/get/update/delete. There is no global state.
//! - **One Task Per Session:** Every session runs on its own tokio task that owns
//!   the session's trader outright. Independent sessions share nothing mutable.
//! - **Finalize Once:** When a run ends the task liquidates (if stopped), builds the
//!   report, saves it through the `ResultsSink` and caches it in the store.
//!
//! ## Public API
//!
//! - `SessionManager`: start / status / results / stop / delete / list / strategies.
//! - `SessionStore`, `SessionEntry`, `SessionSummary`
//! - `SessionState`, `StrategyInfo`
//! - `SessionError`

pub mod error;
pub mod manager;
pub mod store;

pub use error::SessionError;
pub use manager::{SessionManager, SessionState, StrategyInfo};
pub use store::{SessionEntry, SessionStore, SessionSummary};
