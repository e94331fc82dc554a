//! Durable persistence of the session record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::error;

use super::Session;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where the session survives between runs.
pub trait SessionStorage: Send + Sync {
    /// Reads the stored session, `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Session>, StorageError>;

    fn save(&self, session: &Session) -> Result<(), StorageError>;
}

/// JSON file under the data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<Session>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_err(err)),
        };

        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                // A corrupt file must not block startup; it is overwritten on the next save.
                error!(path = %self.path.display(), "failed to parse session file: {err}");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.io_err(err))?;
        }
        let payload = serde_json::to_vec_pretty(session)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|err| self.io_err(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_err(err))?;
        Ok(())
    }
}

/// Process-local storage, for tests and throwaway sessions. Clones share the slot.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<Session>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(session))),
        }
    }

    pub fn stored(&self) -> Option<Session> {
        self.slot.lock().clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Session>, StorageError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, session: &Session) -> Result<(), StorageError> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }
}
