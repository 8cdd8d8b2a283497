//! The shared SQL output buffer.
//!
//! Every statement produced by the `migrate` module is appended to the
//! buffer registered under [`BUFFER_GLOBAL`]. The source adapter clears it
//! right before invoking an entry function and reads it right after.

use std::sync::{Arc, Mutex, PoisonError};

use mlua::{Lua, UserData, UserDataMethods, Value as LuaValue};

use crate::error::{MigrateError, Result};

/// Name of the global holding the session's output buffer.
pub const BUFFER_GLOBAL: &str = "__GBuffer";

/// A cloneable handle to an append-only text buffer.
#[derive(Debug, Clone, Default)]
pub struct SqlBuffer {
    inner: Arc<Mutex<String>>,
}

impl SqlBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text.
    pub fn write(&self, text: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }

    /// Appends one statement followed by `;` and a newline.
    pub fn write_statement(&self, sql: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.push_str(sql);
        inner.push_str(";\n");
    }

    /// Returns a copy of the contents.
    #[must_use]
    pub fn contents(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clears the buffer.
    pub fn reset(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns the length of the contents in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing has been written since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if both handles point at the same buffer.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers this buffer as the session's output buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the global cannot be set.
    pub fn install(&self, lua: &Lua) -> mlua::Result<()> {
        lua.globals().set(BUFFER_GLOBAL, self.clone())
    }

    /// Returns the buffer registered in `lua`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MissingBuffer`] if the global is absent or
    /// holds something else.
    pub fn registered(lua: &Lua) -> Result<Self> {
        match lua.globals().get::<LuaValue>(BUFFER_GLOBAL) {
            Ok(LuaValue::UserData(ud)) => ud
                .borrow::<Self>()
                .map(|buffer| (*buffer).clone())
                .map_err(|_| MigrateError::MissingBuffer),
            _ => Err(MigrateError::MissingBuffer),
        }
    }
}

impl UserData for SqlBuffer {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("write", |_, this, text: String| {
            this.write(&text);
            Ok(())
        });
        methods.add_method("string", |_, this, ()| Ok(this.contents()));
        methods.add_method("reset", |_, this, ()| {
            this.reset();
            Ok(())
        });
        methods.add_method("len", |_, this, ()| Ok(this.len()));
    }
}
