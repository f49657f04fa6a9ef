pub mod config;
pub mod connection;
pub mod error;
pub mod plan;
pub mod presenter;
pub mod protocol;
pub mod react;
pub mod render;
pub mod router;
pub mod session;
pub mod stream;
pub mod tool_call;

// Re-export common types
pub use config::ClientConfig;
pub use error::ChatwireError;
pub use presenter::{Presenter, SessionStatus, ViewUpdate};
pub use router::EventRouter;
pub use session::{SessionIdentity, SessionState, SessionStore};
