//! The script-backed migration source adapter.
//!
//! A [`ScriptSource`] moves through these states:
//!
//! ```text
//! Unbound --bind--> Bound --read--> Loaded+Rendered --read--> Rendered ...
//!    ^                |                   |
//!    +-----reset------+-------------------+
//!                                         +--close--> Closed
//! ```
//!
//! The script is read and evaluated once per adapter; every `read` clears
//! the output buffer and invokes the requested entry function again. The
//! module table a script returns is held by the adapter itself, so adapters
//! sharing a session never see each other's entry functions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use mlua::{Function, Lua, RegistryKey, Table, Value as LuaValue};
use tracing::{debug, info};

use crate::buffer::SqlBuffer;
use crate::error::{MigrateError, Result};
use crate::fs::{identifier_of, ScriptFs, ScriptHandle};
use crate::pool::Session;

/// Locator scheme of script sources.
pub const SCHEME: &str = "lua";

/// Canonical entry applying a migration.
pub const SAFE_UP: &str = "safeUp";
/// Canonical entry reverting a migration.
pub const SAFE_DOWN: &str = "safeDown";

/// Maps `up`/`safeup` and `down`/`safedown` (any case) to the canonical
/// entry names. Anything else is a custom entry name used verbatim.
#[must_use]
pub fn resolve_entry(method: &str) -> &str {
    match method.trim().to_ascii_lowercase().as_str() {
        "up" | "safeup" => SAFE_UP,
        "down" | "safedown" => SAFE_DOWN,
        _ => method.trim(),
    }
}

/// A parsed `lua://<path>[?query]` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// Script directory.
    pub path: PathBuf,
    /// Query parameters.
    pub query: BTreeMap<String, String>,
}

impl Locator {
    /// Parses a locator.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Configuration`] for an empty locator, a
    /// scheme other than `lua`, or an empty path.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(MigrateError::Configuration("empty source locator".to_string()));
        }
        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(MigrateError::Configuration(format!(
                "source locator has no scheme: {url}"
            )));
        };
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(MigrateError::Configuration(format!(
                "unsupported source scheme '{scheme}', expected '{SCHEME}'"
            )));
        }

        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        if path.is_empty() {
            return Err(MigrateError::Configuration(format!(
                "source locator has no path: {url}"
            )));
        }
        let query = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .map_err(|e| MigrateError::Configuration(format!("invalid locator query: {e}")))?
            .into_iter()
            .collect();

        Ok(Self {
            path: PathBuf::from(path),
            query,
        })
    }
}

/// Where an adapter is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// No script attached.
    Unbound,
    /// Script attached, not yet evaluated.
    Bound,
    /// Script evaluated, no entry function run since.
    Loaded,
    /// An entry function ran and its output was harvested.
    Rendered,
    /// Closed; the handle is released.
    Closed,
}

/// The SQL produced by one entry function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Migration identifier.
    pub identifier: String,
    /// Entry function that ran.
    pub entry: String,
    /// Buffer contents after the call.
    pub sql: String,
}

impl Rendered {
    /// The SQL as bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.sql.as_bytes()
    }
}

#[derive(Debug, Default)]
struct SourceState {
    handle: Option<Box<dyn ScriptHandle>>,
    identifier: Option<String>,
    script: Option<Vec<u8>>,
    module: Option<RegistryKey>,
    loaded: bool,
    entry: Option<String>,
    rendered: bool,
    closed: bool,
}

impl SourceState {
    fn clear(&mut self) {
        self.handle = None;
        self.identifier = None;
        self.script = None;
        self.module = None;
        self.loaded = false;
        self.entry = None;
        self.rendered = false;
    }
}

/// Loads a migration script into a session and renders its entry
/// functions to SQL.
pub struct ScriptSource {
    fs: Arc<dyn ScriptFs>,
    session: Arc<Session>,
    buffer: SqlBuffer,
    state: RwLock<SourceState>,
}

impl fmt::Debug for ScriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptSource")
            .field("session", &self.session.name())
            .field("identifier", &self.identifier())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl ScriptSource {
    /// Creates an unbound adapter.
    #[must_use]
    pub fn new(fs: Arc<dyn ScriptFs>, session: Arc<Session>) -> Self {
        Self {
            fs,
            session,
            buffer: SqlBuffer::new(),
            state: RwLock::new(SourceState::default()),
        }
    }

    /// Attaches the script `name`.
    ///
    /// An unbound adapter is bound in place and returned. An adapter that
    /// already holds a script is left untouched; a new adapter sharing the
    /// same store and session is bound instead.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ScriptLoad`] if the script cannot be opened.
    pub fn bind(self: &Arc<Self>, name: &str) -> Result<Arc<Self>> {
        {
            let mut state = self.write_state();
            if state.handle.is_none() && !state.closed {
                let handle = self.fs.open(name)?;
                state.identifier = Some(identifier_of(handle.name()));
                state.handle = Some(handle);
                debug!(script = %name, "bound migration script");
                return Ok(Arc::clone(self));
            }
        }
        let fresh = Arc::new(Self::new(Arc::clone(&self.fs), Arc::clone(&self.session)));
        fresh.bind(name)
    }

    /// Returns the migration identifier of the bound script.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        self.read_state().identifier.clone()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn status(&self) -> SourceStatus {
        let state = self.read_state();
        if state.closed {
            SourceStatus::Closed
        } else if state.rendered {
            SourceStatus::Rendered
        } else if state.loaded {
            SourceStatus::Loaded
        } else if state.handle.is_some() {
            SourceStatus::Bound
        } else {
            SourceStatus::Unbound
        }
    }

    /// Returns the entry function of the last render.
    #[must_use]
    pub fn last_entry(&self) -> Option<String> {
        self.read_state().entry.clone()
    }

    /// Returns the session scripts run in.
    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Returns the output buffer of this adapter.
    #[must_use]
    pub const fn buffer(&self) -> &SqlBuffer {
        &self.buffer
    }

    /// Renders the entry function named by `method`.
    ///
    /// The script is read and evaluated on the first call only. Every call
    /// clears the buffer, runs `<identifier>.<entry>()` and returns what it
    /// wrote. The session's own buffer is registered again afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::NotBound`] without a script, a load or
    /// evaluation error from the script, or [`MigrateError::EntryNotFound`].
    pub fn read(&self, method: &str) -> Result<Rendered> {
        let entry = resolve_entry(method).to_string();
        let mut state = self.write_state();
        let identifier = state.identifier.clone().ok_or(MigrateError::NotBound)?;

        let sql = self.session.with_lua(|lua| {
            let rendered = self.render(lua, &mut state, &identifier, &entry);
            self.session
                .buffer()
                .install(lua)
                .map_err(|source| MigrateError::ScriptEval {
                    identifier: identifier.clone(),
                    source,
                })?;
            rendered
        })?;

        state.entry = Some(entry.clone());
        state.rendered = true;
        info!(identifier = %identifier, entry = %entry, bytes = sql.len(), "rendered migration");
        Ok(Rendered {
            identifier,
            entry,
            sql,
        })
    }

    /// Evaluates the script if needed, then runs `entry` against this
    /// adapter's buffer.
    fn render(&self, lua: &Lua, state: &mut SourceState, identifier: &str, entry: &str) -> Result<String> {
        let eval_err = |source: mlua::Error| MigrateError::ScriptEval {
            identifier: identifier.to_string(),
            source,
        };

        self.buffer.install(lua).map_err(eval_err)?;
        lua.expire_registry_values();
        if !state.loaded {
            if state.script.is_none() {
                let script = state.handle.as_mut().ok_or(MigrateError::NotBound)?.read_all()?;
                state.script = Some(script);
            }
            let script = state.script.as_deref().unwrap_or_default();
            state.module = load(lua, identifier, script).map_err(eval_err)?;
            state.loaded = true;
            debug!(identifier = %identifier, "evaluated migration script");
        }

        self.buffer.reset();
        let function = entry_function(lua, state.module.as_ref(), identifier, entry)
            .map_err(eval_err)?
            .ok_or_else(|| MigrateError::EntryNotFound {
                identifier: identifier.to_string(),
                entry: entry.to_string(),
            })?;
        function.call::<()>(()).map_err(eval_err)?;
        Ok(self.buffer.contents())
    }

    /// Forgets the script, handle, entry and buffer. The store stays open.
    pub fn reset(&self) {
        self.write_state().clear();
        self.buffer.reset();
    }

    /// Releases the script handle, then resets. Later calls are no-ops.
    pub fn close(&self) {
        let mut state = self.write_state();
        if state.closed {
            return;
        }
        if let Some(handle) = state.handle.take() {
            debug!(script = %handle.name(), "released migration script");
        }
        state.clear();
        state.closed = true;
        drop(state);
        self.buffer.reset();
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SourceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SourceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Evaluates a script and keeps the table it returns, if any, in the
/// interpreter registry.
fn load(lua: &Lua, identifier: &str, script: &[u8]) -> mlua::Result<Option<RegistryKey>> {
    let module: LuaValue = lua.load(script).set_name(format!("={identifier}")).eval()?;
    match module {
        LuaValue::Table(module) => lua.create_registry_value(module).map(Some),
        _ => Ok(None),
    }
}

/// Finds `entry` in the module the script returned. Scripts that returned
/// nothing are looked up as the global table `identifier`.
fn entry_function(
    lua: &Lua,
    module: Option<&RegistryKey>,
    identifier: &str,
    entry: &str,
) -> mlua::Result<Option<Function>> {
    let module = match module {
        Some(key) => LuaValue::Table(lua.registry_value::<Table>(key)?),
        None => lua.globals().get::<LuaValue>(identifier)?,
    };
    let LuaValue::Table(module) = module else {
        return Ok(None);
    };
    match module.get::<LuaValue>(entry)? {
        LuaValue::Function(function) => Ok(Some(function)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_entry() {
        assert_eq!(resolve_entry("up"), SAFE_UP);
        assert_eq!(resolve_entry("SafeUp"), SAFE_UP);
        assert_eq!(resolve_entry("down"), SAFE_DOWN);
        assert_eq!(resolve_entry("safedown"), SAFE_DOWN);
        assert_eq!(resolve_entry("seed"), "seed");
    }

    #[test]
    fn test_locator() {
        let locator = Locator::parse("lua://db/migrations?vm=main").unwrap();
        assert_eq!(locator.path, PathBuf::from("db/migrations"));
        assert_eq!(locator.query["vm"], "main");

        let locator = Locator::parse("lua:///abs/dir").unwrap();
        assert_eq!(locator.path, PathBuf::from("/abs/dir"));
        assert!(locator.query.is_empty());
    }

    #[test]
    fn test_locator_errors() {
        for bad in ["", "file://x", "lua://", "migrations"] {
            assert!(
                matches!(Locator::parse(bad), Err(MigrateError::Configuration(_))),
                "{bad} should be rejected"
            );
        }
    }
}
