pub mod config_service;
pub mod connection;
pub mod paths;
pub mod runtime;
pub mod session_store;
pub mod storage;

pub use config_service::ConfigService;
pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionManager};
pub use paths::ChatwirePaths;
pub use runtime::{SessionRuntime, UserIntent};
pub use session_store::FileSessionStore;
