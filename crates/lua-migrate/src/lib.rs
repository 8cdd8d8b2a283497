//! Lua-scripted database migrations compiled to SQL.
//!
//! `lua-migrate` runs migration scripts written against a small schema DSL
//! and collects the SQL they produce. Nothing is executed against a
//! database; applying the SQL is left to the migration engine.
//!
//! # Architecture
//!
//! - **Schema DSL** - the `migrate` Lua module: column factories and one
//!   function per DDL/DML statement, each appending to the session buffer
//! - **Buffer** - [`SqlBuffer`], the shared output of a session
//! - **Connections** - named option sets from the environment, each bound
//!   to a statement builder with its own table prefix and suffix
//! - **Pools** - create-once registries of interpreter sessions and script
//!   stores
//! - **Source** - [`ScriptSource`], loads one script and renders its entry
//!   functions
//! - **Driver** - [`LuaScriptDriver`], the versioned view of a script
//!   directory handed to an engine
//!
//! # Example
//!
//! A script named `1_create_user.lua`:
//!
//! ```lua
//! local m = require("migrate")
//!
//! return {
//!     safeUp = function()
//!         m.createTable("{{%user}}", {
//!             { "id", m.pk() },
//!             { "name", m.string(64):notNull() },
//!         })
//!     end,
//!     safeDown = function()
//!         m.dropTable("{{%user}}")
//!     end,
//! }
//! ```
//!
//! rendered from Rust:
//!
//! ```rust,ignore
//! use lua_migrate::prelude::*;
//!
//! let context = Arc::new(SchemaContext::from_env());
//! let driver = LuaScriptDriver::new(
//!     Arc::new(SessionPool::new(context)),
//!     Arc::new(FsPool::new()),
//! )
//! .open_url("lua://db/migrations")?;
//!
//! let up = driver.read_up(driver.first()?)?;
//! println!("{}", up.sql);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Render a single script
//! lua-migrate render db/migrations/1_create_user.lua --method up
//!
//! # List the versions of a source
//! lua-migrate list --source lua://db/migrations
//!
//! # Show the revert SQL of one version
//! lua-migrate show --source lua://db/migrations --version 1 --down
//! ```

pub mod args;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod fs;
pub mod logger;
pub mod pool;
pub mod schema;
pub mod source;

pub use buffer::SqlBuffer;
pub use config::ConnectionOption;
pub use connection::{Connection, ConnectionRegistry};
pub use driver::{LuaScriptDriver, SourceDriver};
pub use error::{MigrateError, Result};
pub use fs::{LocalFs, ScriptFs, ScriptHandle};
pub use pool::{FsPool, Session, SessionPool};
pub use schema::SchemaContext;
pub use source::{Locator, Rendered, ScriptSource, SourceStatus};

/// Prelude for convenient imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::buffer::SqlBuffer;
    pub use crate::config::ConnectionOption;
    pub use crate::connection::{Connection, ConnectionRegistry, DEFAULT_CONNECTION};
    pub use crate::driver::{LuaScriptDriver, SourceDriver};
    pub use crate::error::{MigrateError, Result};
    pub use crate::fs::{LocalFs, ScriptFs};
    pub use crate::pool::{FsPool, Session, SessionPool};
    pub use crate::schema::SchemaContext;
    pub use crate::source::{resolve_entry, Rendered, ScriptSource, SourceStatus, SAFE_DOWN, SAFE_UP};
}
