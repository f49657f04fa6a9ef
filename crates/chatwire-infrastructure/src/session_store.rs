//! File-backed [`SessionStore`].

use std::path::PathBuf;

use chatwire_core::error::Result;
use chatwire_core::session::SessionStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::AtomicTomlFile;

/// On-disk shape: `chat_session_id = "<id>"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(default)]
    chat_session_id: String,
}

/// Persists the session id in a small TOML document.
pub struct FileSessionStore {
    file: AtomicTomlFile<SessionDocument>,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<String>> {
        let id = self
            .file
            .load()?
            .map(|doc| doc.chat_session_id)
            .filter(|id| !id.is_empty());
        debug!(path = %self.file.path().display(), found = id.is_some(), "loaded session id");
        Ok(id)
    }

    fn save(&self, session_id: &str) -> Result<()> {
        self.file.update(SessionDocument::default(), |doc| {
            doc.chat_session_id = session_id.to_string();
            Ok(())
        })
    }

    fn clear(&self) -> Result<()> {
        self.file.remove()
    }
}
