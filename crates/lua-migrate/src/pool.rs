//! Keyed, create-once registries of interpreter sessions and script stores.
//!
//! The pools only guard creation and registration. A [`Session`] serialises
//! its own interpreter calls behind a mutex, so a shared session is safe to
//! use but calls into it never run in parallel.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use mlua::Lua;
use tracing::info;

use crate::buffer::SqlBuffer;
use crate::error::{MigrateError, Result};
use crate::fs::ScriptFs;
use crate::logger;
use crate::schema::{self, SchemaContext};

/// One interpreter instance with the `migrate` and `logger` modules loaded.
pub struct Session {
    name: String,
    lua: Mutex<Lua>,
    buffer: SqlBuffer,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a fresh session.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ScriptEval`] if the modules cannot be loaded.
    pub fn new(name: &str, context: &Arc<SchemaContext>) -> Result<Self> {
        let lua = Lua::new();
        let buffer = SqlBuffer::new();
        let setup = || -> mlua::Result<()> {
            schema::install(&lua, context)?;
            logger::install(&lua)?;
            buffer.install(&lua)
        };
        setup().map_err(|source| MigrateError::ScriptEval {
            identifier: name.to_string(),
            source,
        })?;
        Ok(Self {
            name: name.to_string(),
            lua: Mutex::new(lua),
            buffer,
        })
    }

    /// Returns the session key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the session's own buffer.
    ///
    /// It receives statements from code run directly in the session. While
    /// a [`ScriptSource`](crate::source::ScriptSource) renders, its own
    /// buffer takes over and this one is registered again afterwards.
    #[must_use]
    pub const fn buffer(&self) -> &SqlBuffer {
        &self.buffer
    }

    /// Runs `f` with exclusive access to the interpreter.
    pub fn with_lua<R>(&self, f: impl FnOnce(&Lua) -> R) -> R {
        let lua = self.lua.lock().unwrap_or_else(PoisonError::into_inner);
        f(&lua)
    }
}

/// Registry of interpreter sessions.
#[derive(Debug)]
pub struct SessionPool {
    context: Arc<SchemaContext>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    created: AtomicUsize,
}

impl SessionPool {
    /// Creates an empty pool whose sessions share `context`.
    #[must_use]
    pub fn new(context: Arc<SchemaContext>) -> Self {
        Self {
            context,
            sessions: RwLock::new(HashMap::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Returns the schema context given to new sessions.
    #[must_use]
    pub const fn context(&self) -> &Arc<SchemaContext> {
        &self.context
    }

    /// Registers a session. Returns false, keeping the existing one, if
    /// `key` is taken.
    pub fn add(&self, key: &str, session: Arc<Session>) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(key) {
            return false;
        }
        sessions.insert(key.to_string(), session);
        true
    }

    /// Returns the session registered under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns the session under `key`, creating and registering it on a
    /// miss. Concurrent callers for the same key all get the one session.
    ///
    /// # Errors
    ///
    /// Returns an error if a new session cannot be created.
    pub fn get_must(&self, key: &str) -> Result<Arc<Session>> {
        if let Some(session) = self.get(key) {
            return Ok(session);
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get(key) {
            return Ok(Arc::clone(session));
        }
        let session = Arc::new(Session::new(key, &self.context)?);
        self.created.fetch_add(1, Ordering::SeqCst);
        info!(session = %key, "created script session");
        sessions.insert(key.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Number of sessions this pool has created itself.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry of script stores, keyed by locator.
#[derive(Debug, Default)]
pub struct FsPool {
    stores: RwLock<HashMap<String, Arc<dyn ScriptFs>>>,
}

impl FsPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a store. Returns false, keeping the existing one, if `key`
    /// is taken.
    pub fn add(&self, key: &str, fs: Arc<dyn ScriptFs>) -> bool {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        if stores.contains_key(key) {
            return false;
        }
        stores.insert(key.to_string(), fs);
        true
    }

    /// Returns the store registered under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn ScriptFs>> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns the store under `key`, creating it with `create` on a miss.
    ///
    /// # Errors
    ///
    /// Returns whatever `create` returns.
    pub fn get_or_try_insert_with<F>(&self, key: &str, create: F) -> Result<Arc<dyn ScriptFs>>
    where
        F: FnOnce() -> Result<Arc<dyn ScriptFs>>,
    {
        if let Some(fs) = self.get(key) {
            return Ok(fs);
        }
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(fs) = stores.get(key) {
            return Ok(Arc::clone(fs));
        }
        let fs = create()?;
        stores.insert(key.to_string(), Arc::clone(&fs));
        Ok(fs)
    }

    /// Closes and unregisters the store under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if closing fails.
    pub fn remove(&self, key: &str) -> Result<()> {
        let removed = self
            .stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match removed {
            Some(fs) => fs.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionRegistry;
    use crate::fs::LocalFs;

    fn pool() -> SessionPool {
        let context = SchemaContext::new(ConnectionRegistry::with_lookup(|_| None));
        SessionPool::new(Arc::new(context))
    }

    #[test]
    fn test_add_is_exactly_once() {
        let pool = pool();
        let first = Arc::new(Session::new("a", pool.context()).unwrap());
        let second = Arc::new(Session::new("a", pool.context()).unwrap());
        assert!(pool.add("a", Arc::clone(&first)));
        assert!(!pool.add("a", second));
        assert!(Arc::ptr_eq(&pool.get("a").unwrap(), &first));
        assert_eq!(pool.created(), 0);
    }

    #[test]
    fn test_get_must_creates_once() {
        let pool = pool();
        let a = pool.get_must("vm").unwrap();
        let b = pool.get_must("vm").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_session_has_modules() {
        let pool = pool();
        let session = pool.get_must("vm").unwrap();
        session.with_lua(|lua| {
            lua.load(r#"require("migrate").dropTable("t"); require("logger").debug("ok")"#)
                .exec()
                .unwrap();
        });
        assert_eq!(session.buffer().contents(), "DROP TABLE `t`;\n");
    }

    #[test]
    fn test_fs_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pool = FsPool::new();
        let root = dir.path().to_path_buf();
        let fs = pool
            .get_or_try_insert_with("lua://x", || Ok(Arc::new(LocalFs::new(&root)?)))
            .unwrap();
        let again = pool
            .get_or_try_insert_with("lua://x", || panic!("must not create twice"))
            .unwrap();
        assert!(Arc::ptr_eq(&fs, &again));
        assert!(!pool.add("lua://x", Arc::new(LocalFs::new(dir.path()).unwrap())));
        pool.remove("lua://x").unwrap();
        assert!(pool.get("lua://x").is_none());
    }
}
