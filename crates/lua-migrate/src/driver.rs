//! The migration source driver handed to a migration engine.
//!
//! A driver is opened on a `lua://<dir>[?vm=<session>]` locator. It indexes
//! the `<version>_<title>.lua` scripts of the directory and renders each
//! version through its own [`ScriptSource`]. Ordering and version tracking
//! beyond this index belong to the engine.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::fs::{LocalFs, ScriptFs};
use crate::pool::{FsPool, Session, SessionPool};
use crate::source::{Locator, Rendered, ScriptSource, SAFE_DOWN, SAFE_UP};

/// Query parameter naming the interpreter session of a source.
pub const SESSION_PARAM: &str = "vm";

/// Session used when the locator names none.
pub const DEFAULT_SESSION: &str = "default";

/// Script file extension.
pub const SCRIPT_EXTENSION: &str = ".lua";

/// Engine-facing interface of a migration source.
pub trait SourceDriver: Send + Sync + fmt::Debug {
    /// Opens a new driver instance on `url`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid locator or directory.
    fn open(&self, url: &str) -> Result<Box<dyn SourceDriver>>;

    /// Returns the lowest version.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::VersionNotFound`] for an empty source.
    fn first(&self) -> Result<u64>;

    /// Returns the version before `version`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::VersionNotFound`] if `version` is unknown or
    /// the first one.
    fn prev(&self, version: u64) -> Result<u64>;

    /// Returns the version after `version`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::VersionNotFound`] if `version` is unknown or
    /// the last one.
    fn next(&self, version: u64) -> Result<u64>;

    /// Renders the apply entry of `version`.
    ///
    /// # Errors
    ///
    /// Returns any load, evaluation or lookup error.
    fn read_up(&self, version: u64) -> Result<Rendered> {
        self.read(version, SAFE_UP)
    }

    /// Renders the revert entry of `version`.
    ///
    /// # Errors
    ///
    /// Returns any load, evaluation or lookup error.
    fn read_down(&self, version: u64) -> Result<Rendered> {
        self.read(version, SAFE_DOWN)
    }

    /// Renders the entry `method` of `version`.
    ///
    /// # Errors
    ///
    /// Returns any load, evaluation or lookup error.
    fn read(&self, version: u64, method: &str) -> Result<Rendered>;

    /// Closes every adapter and the backing store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be released.
    fn close(&self) -> Result<()>;
}

/// Splits `<version>_<title>.lua` into its version number.
#[must_use]
pub fn parse_version(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(SCRIPT_EXTENSION)?;
    let (version, title) = stem.split_once('_')?;
    if title.is_empty() {
        return None;
    }
    version.parse().ok()
}

struct Opened {
    key: String,
    fs: Arc<dyn ScriptFs>,
    session: Arc<Session>,
    migrations: BTreeMap<u64, String>,
    sources: Mutex<HashMap<u64, Arc<ScriptSource>>>,
}

/// Driver over a local directory of Lua migration scripts.
pub struct LuaScriptDriver {
    sessions: Arc<SessionPool>,
    stores: Arc<FsPool>,
    opened: Option<Opened>,
}

impl fmt::Debug for LuaScriptDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("LuaScriptDriver");
        if let Some(opened) = &self.opened {
            debug
                .field("source", &opened.key)
                .field("session", &opened.session.name())
                .field("versions", &opened.migrations.keys().collect::<Vec<_>>());
        }
        debug.finish_non_exhaustive()
    }
}

impl LuaScriptDriver {
    /// Creates an unopened driver drawing sessions and stores from the
    /// given pools.
    #[must_use]
    pub const fn new(sessions: Arc<SessionPool>, stores: Arc<FsPool>) -> Self {
        Self {
            sessions,
            stores,
            opened: None,
        }
    }

    /// Opens a driver on `url`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid locator, a missing
    /// directory or two scripts sharing a version.
    pub fn open_url(&self, url: &str) -> Result<Self> {
        let locator = Locator::parse(url)?;
        let session_key = locator
            .query
            .get(SESSION_PARAM)
            .map_or(DEFAULT_SESSION, String::as_str);
        let session = self.sessions.get_must(session_key)?;

        let key = format!("lua://{}", locator.path.display());
        let root = locator.path.clone();
        let fs = self
            .stores
            .get_or_try_insert_with(&key, || Ok(Arc::new(LocalFs::new(root)?)))?;

        let mut migrations = BTreeMap::new();
        for name in fs.list()? {
            let Some(version) = parse_version(&name) else {
                debug!(script = %name, "skipping file without a version prefix");
                continue;
            };
            if let Some(existing) = migrations.insert(version, name.clone()) {
                return Err(MigrateError::Configuration(format!(
                    "version {version} is used by both '{existing}' and '{name}'"
                )));
            }
        }
        info!(source = %key, session = %session_key, migrations = migrations.len(), "opened migration source");

        Ok(Self {
            sessions: Arc::clone(&self.sessions),
            stores: Arc::clone(&self.stores),
            opened: Some(Opened {
                key,
                fs,
                session,
                migrations,
                sources: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Returns the indexed versions and script names.
    #[must_use]
    pub fn migrations(&self) -> Vec<(u64, String)> {
        self.opened.as_ref().map_or_else(Vec::new, |opened| {
            opened
                .migrations
                .iter()
                .map(|(version, name)| (*version, name.clone()))
                .collect()
        })
    }

    /// Returns the adapter rendering `version`, binding it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::VersionNotFound`] for an unknown version.
    pub fn source(&self, version: u64) -> Result<Arc<ScriptSource>> {
        let opened = self.opened()?;
        let name = opened
            .migrations
            .get(&version)
            .ok_or(MigrateError::VersionNotFound(version))?;

        let mut sources = opened.sources.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(source) = sources.get(&version) {
            return Ok(Arc::clone(source));
        }
        let source = Arc::new(ScriptSource::new(
            Arc::clone(&opened.fs),
            Arc::clone(&opened.session),
        ))
        .bind(name)?;
        sources.insert(version, Arc::clone(&source));
        Ok(source)
    }

    fn opened(&self) -> Result<&Opened> {
        self.opened
            .as_ref()
            .ok_or_else(|| MigrateError::Configuration("migration source is not opened".to_string()))
    }
}

impl SourceDriver for LuaScriptDriver {
    fn open(&self, url: &str) -> Result<Box<dyn SourceDriver>> {
        Ok(Box::new(self.open_url(url)?))
    }

    fn first(&self) -> Result<u64> {
        self.opened()?
            .migrations
            .keys()
            .next()
            .copied()
            .ok_or(MigrateError::VersionNotFound(0))
    }

    fn prev(&self, version: u64) -> Result<u64> {
        let migrations = &self.opened()?.migrations;
        if !migrations.contains_key(&version) {
            return Err(MigrateError::VersionNotFound(version));
        }
        migrations
            .range(..version)
            .next_back()
            .map(|(v, _)| *v)
            .ok_or(MigrateError::VersionNotFound(version))
    }

    fn next(&self, version: u64) -> Result<u64> {
        let migrations = &self.opened()?.migrations;
        if !migrations.contains_key(&version) {
            return Err(MigrateError::VersionNotFound(version));
        }
        migrations
            .range(version.saturating_add(1)..)
            .next()
            .map(|(v, _)| *v)
            .ok_or(MigrateError::VersionNotFound(version))
    }

    fn read(&self, version: u64, method: &str) -> Result<Rendered> {
        self.source(version)?.read(method)
    }

    fn close(&self) -> Result<()> {
        let Some(opened) = &self.opened else {
            return Ok(());
        };
        let sources: Vec<Arc<ScriptSource>> = opened
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, source)| source)
            .collect();
        for source in &sources {
            source.close();
        }
        self.stores.remove(&opened.key)?;
        debug!(source = %opened.key, closed = sources.len(), "closed migration source");
        Ok(())
    }
}
