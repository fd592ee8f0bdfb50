//! Scoped durable storage for the single active timer session.
//!
//! Stores deal in the raw serialized record; parsing and validation stay in
//! the timer so that every backend treats corrupt data the same way.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{CoreError, Result};

/// Durable slot holding at most one serialized `TimerSession`.
pub trait SessionStore {
    /// Read the stored record, if any.
    fn load(&self) -> Result<Option<String>>;

    /// Replace the stored record.
    fn save(&self, raw: &str) -> Result<()>;

    /// Remove the stored record. Removing an absent record succeeds.
    fn clear(&self) -> Result<()>;
}

impl<S: SessionStore + ?Sized> SessionStore for &S {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, raw: &str) -> Result<()> {
        (**self).save(raw)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

/// In-process store. Clones share the same slot, which lets a test simulate
/// a reload by building a second timer over a clone.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the slot, e.g. with a record written by an older process.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.slot
            .lock()
            .map_err(|_| CoreError::Custom("session store mutex poisoned".into()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, raw: &str) -> Result<()> {
        *self.lock()? = Some(raw.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// One JSON file per session owner.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    /// `<dir>/timer-session-<owner>.json`
    pub fn for_owner<P: AsRef<Path>>(dir: P, owner: &str) -> Self {
        Self::with_path(dir.as_ref().join(format!("timer-session-{owner}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, raw: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Atomic replace: tmp file, then rename.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
