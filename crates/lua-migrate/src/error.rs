//! Error types for script-backed migrations.

use std::path::PathBuf;

use lua_migrate_core::QueryError;

/// Errors that can occur while loading and rendering migration scripts.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Invalid locator, unsupported scheme or missing connection settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The script resource could not be read.
    #[error("Failed to load script '{path}': {source}")]
    ScriptLoad {
        /// Path of the script resource.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The interpreter rejected the script or an entry function failed.
    #[error("Script '{identifier}' failed: {source}")]
    ScriptEval {
        /// Migration identifier.
        identifier: String,
        /// Interpreter error.
        source: mlua::Error,
    },

    /// The script does not define the requested entry function.
    #[error("Script '{identifier}' has no entry function '{entry}'")]
    EntryNotFound {
        /// Migration identifier.
        identifier: String,
        /// Entry function name.
        entry: String,
    },

    /// A statement was generated but the session has no output buffer.
    #[error("No output buffer registered in the script session")]
    MissingBuffer,

    /// The source adapter has no script attached.
    #[error("No migration script is bound to this source")]
    NotBound,

    /// The source has no migration with this version.
    #[error("Migration version {0} not found")]
    VersionNotFound(u64),

    /// Statement generation failed.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<MigrateError> for mlua::Error {
    fn from(err: MigrateError) -> Self {
        Self::external(err)
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
