//! Backing file systems for migration scripts.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{MigrateError, Result};

/// An open script resource.
///
/// Dropping the handle releases it.
pub trait ScriptHandle: Send + Sync + fmt::Debug {
    /// Resource name, e.g. `1_create_user.lua`.
    fn name(&self) -> &str;

    /// Reads the whole resource.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ScriptLoad`] on read failure.
    fn read_all(&mut self) -> Result<Vec<u8>>;
}

/// A directory-like store of migration scripts.
pub trait ScriptFs: Send + Sync + fmt::Debug {
    /// Opens a script by name.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ScriptLoad`] if the resource cannot be opened.
    fn open(&self, name: &str) -> Result<Box<dyn ScriptHandle>>;

    /// Lists the script names.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    fn list(&self) -> Result<Vec<String>>;

    /// Releases the store. Later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing fails.
    fn close(&self) -> Result<()>;
}

/// A script directory on the local file system.
#[derive(Debug)]
pub struct LocalFs {
    root: PathBuf,
    closed: AtomicBool,
}

impl LocalFs {
    /// Creates a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Configuration`] if `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(MigrateError::Configuration(format!(
                "script directory not found: {}",
                root.display()
            )));
        }
        Ok(Self {
            root,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MigrateError::Configuration(format!(
                "script directory closed: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}

impl ScriptFs for LocalFs {
    fn open(&self, name: &str) -> Result<Box<dyn ScriptHandle>> {
        self.ensure_open()?;
        let path = self.root.join(name);
        let file = File::open(&path).map_err(|source| MigrateError::ScriptLoad {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "opened script");
        Ok(Box::new(LocalHandle {
            name: name.to_string(),
            path,
            file,
        }))
    }

    fn list(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(root = %self.root.display(), "closed script directory");
        }
        Ok(())
    }
}

#[derive(Debug)]
struct LocalHandle {
    name: String,
    path: PathBuf,
    file: File,
}

impl ScriptHandle for LocalHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.file
            .read_to_end(&mut bytes)
            .map_err(|source| MigrateError::ScriptLoad {
                path: self.path.clone(),
                source,
            })?;
        Ok(bytes)
    }
}

/// Derives a migration identifier: the base name without its extension.
#[must_use]
pub fn identifier_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map_or_else(|| name.to_string(), |stem| stem.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_of() {
        assert_eq!(identifier_of("1_create_user.lua"), "1_create_user");
        assert_eq!(identifier_of("dir/2_drop.lua"), "2_drop");
        assert_eq!(identifier_of("plain"), "plain");
    }

    #[test]
    fn test_local_fs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.lua"), "return {}").unwrap();
        std::fs::write(dir.path().join("a.lua"), "return 1").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let fs = LocalFs::new(dir.path()).unwrap();
        assert_eq!(fs.list().unwrap(), ["a.lua", "b.lua"]);

        let mut handle = fs.open("a.lua").unwrap();
        assert_eq!(handle.name(), "a.lua");
        assert_eq!(handle.read_all().unwrap(), b"return 1");

        assert!(matches!(fs.open("missing.lua"), Err(MigrateError::ScriptLoad { .. })));

        fs.close().unwrap();
        fs.close().unwrap();
        assert!(matches!(fs.open("a.lua"), Err(MigrateError::Configuration(_))));
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(
            LocalFs::new("/definitely/not/here"),
            Err(MigrateError::Configuration(_))
        ));
    }
}
