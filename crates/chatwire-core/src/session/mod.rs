//! Session identity and per-session state.
//!
//! # Module Structure
//!
//! - `identity`: `SessionIdentity`, `SessionStore` and the in-memory store
//! - `context`: `SessionContext`, the active message/run ids
//! - `state`: `SessionState`, the trackers owned by one session

mod context;
mod identity;
mod state;

pub use context::SessionContext;
pub use identity::{InMemorySessionStore, SESSION_STORAGE_KEY, SessionIdentity, SessionStore};
pub use state::SessionState;
