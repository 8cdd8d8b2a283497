//! The `logger` Lua module.
//!
//! `logger.info("created", name)` joins its arguments with spaces and emits
//! a `tracing` event under the `lua` target. Levels: `trace`, `debug`,
//! `info`, `warn`, `error`.

use lua_migrate_core::Quoter;
use mlua::{Lua, MultiValue, Table};

use crate::args::Args;

/// Module name under which the logger is registered.
pub const MODULE_NAME: &str = "logger";

fn message(args: &MultiValue) -> String {
    Args::from_lua(args, &Quoter::new())
        .values()
        .iter()
        .map(|v| if v.is_null() { String::from("nil") } else { v.as_string() })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Creates the `logger` module table.
///
/// # Errors
///
/// Returns an error if the interpreter cannot allocate the module.
pub fn create_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "trace",
        lua.create_function(|_, args: MultiValue| {
            tracing::trace!(target: "lua", "{}", message(&args));
            Ok(())
        })?,
    )?;
    module.set(
        "debug",
        lua.create_function(|_, args: MultiValue| {
            tracing::debug!(target: "lua", "{}", message(&args));
            Ok(())
        })?,
    )?;
    module.set(
        "info",
        lua.create_function(|_, args: MultiValue| {
            tracing::info!(target: "lua", "{}", message(&args));
            Ok(())
        })?,
    )?;
    module.set(
        "warn",
        lua.create_function(|_, args: MultiValue| {
            tracing::warn!(target: "lua", "{}", message(&args));
            Ok(())
        })?,
    )?;
    module.set(
        "error",
        lua.create_function(|_, args: MultiValue| {
            tracing::error!(target: "lua", "{}", message(&args));
            Ok(())
        })?,
    )?;
    Ok(module)
}

/// Registers the `logger` module in `package.loaded` and as a global.
///
/// # Errors
///
/// Returns an error if the interpreter cannot allocate the module.
pub fn install(lua: &Lua) -> mlua::Result<()> {
    let module = create_module(lua)?;
    let loaded: Table = lua.globals().get::<Table>("package")?.get("loaded")?;
    loaded.set(MODULE_NAME, module.clone())?;
    lua.globals().set(MODULE_NAME, module)
}
