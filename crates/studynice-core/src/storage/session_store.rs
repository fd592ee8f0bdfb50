use super::Database;
use crate::error::Result;
use crate::timer::SessionStore;

const KEY_PREFIX: &str = "timer_session";

/// Persists the timer session in the database kv table, one key per owner.
pub struct KvSessionStore<'a> {
    db: &'a Database,
    key: String,
}

impl<'a> KvSessionStore<'a> {
    pub fn new(db: &'a Database, owner: &str) -> Self {
        Self {
            db,
            key: format!("{KEY_PREFIX}:{owner}"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl SessionStore for KvSessionStore<'_> {
    fn load(&self) -> Result<Option<String>> {
        self.db.kv_get(&self.key)
    }

    fn save(&self, raw: &str) -> Result<()> {
        self.db.kv_set(&self.key, raw)
    }

    fn clear(&self) -> Result<()> {
        self.db.kv_delete(&self.key)
    }
}
