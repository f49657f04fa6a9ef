use std::sync::Mutex;

use tracing::info;
use uuid::Uuid;

use crate::error::{ChatwireError, Result};

/// Key under which the session id is persisted.
pub const SESSION_STORAGE_KEY: &str = "chat_session_id";

/// Client-local persistence for the session id.
///
/// Implementations must be durable across process restarts unless they are
/// meant for tests.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, session_id: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Volatile store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    value: Mutex<Option<String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(session_id.into())),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.value
            .lock()
            .map_err(|e| ChatwireError::internal(format!("session store lock poisoned: {}", e)))
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, session_id: &str) -> Result<()> {
        *self.slot()? = Some(session_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}

/// The opaque id that addresses this client's session on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    id: String,
}

impl SessionIdentity {
    /// Reads the persisted id, generating and saving a fresh one when the
    /// store is empty.
    pub fn load_or_create(store: &dyn SessionStore) -> Result<Self> {
        if let Some(id) = store.load()?.filter(|id| !id.trim().is_empty()) {
            return Ok(Self { id });
        }
        let identity = Self::generate();
        store.save(&identity.id)?;
        info!(session_id = %identity.id, "created new session");
        Ok(identity)
    }

    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replaces the persisted id with a fresh one.
    ///
    /// The new id overwrites the old one in a single save, so a failed save
    /// leaves both the store and `self` on the previous session.
    pub fn rotate(&mut self, store: &dyn SessionStore) -> Result<()> {
        let next = Self::generate();
        store.save(&next.id)?;
        info!(previous = %self.id, session_id = %next.id, "session rotated");
        *self = next;
        Ok(())
    }
}
