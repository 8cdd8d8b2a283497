#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use lua_migrate::prelude::*;
use tempfile::TempDir;

/// Creates a script directory holding `scripts` as `(file name, body)`.
pub fn script_dir(scripts: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, body) in scripts {
        std::fs::write(dir.path().join(name), body).unwrap();
    }
    dir
}

/// A schema context resolving connection options from `vars` only.
pub fn context(vars: &[(&str, &str)]) -> Arc<SchemaContext> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let registry = ConnectionRegistry::with_lookup(move |key| vars.get(key).cloned());
    Arc::new(SchemaContext::new(registry))
}

/// A session pool over a context with no environment at all.
pub fn session_pool() -> Arc<SessionPool> {
    Arc::new(SessionPool::new(context(&[])))
}

/// An unbound adapter over `root` running in a fresh session.
pub fn adapter(root: &Path) -> Arc<ScriptSource> {
    let fs: Arc<dyn ScriptFs> = Arc::new(LocalFs::new(root).unwrap());
    let session = session_pool().get_must("test").unwrap();
    Arc::new(ScriptSource::new(fs, session))
}

/// `lua://` locator for a directory.
pub fn locator(root: &Path) -> String {
    format!("lua://{}", root.display())
}

/// Collapses runs of whitespace so multi-line statements compare easily.
pub fn squash(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A migration creating and dropping `{{%user}}`, counting its own loads in
/// the global `load_count`.
pub const CREATE_USER: &str = r#"
load_count = (load_count or 0) + 1
local m = require("migrate")

return {
    safeUp = function()
        m.createTable("{{%user}}", {
            { "id", m.pk() },
            { "name", m.string(64):notNull() },
        })
    end,
    safeDown = function()
        m.dropTable("{{%user}}")
    end,
    seed = function()
        m.batchInsert("{{%user}}", { "name" }, { { "alice" }, { "bob" } })
    end,
}
"#;

/// A migration that publishes its module as a global table instead of
/// returning it.
pub const ADD_INDEX: &str = r#"
local m = require("migrate")

_G["2_add_index"] = {
    safeUp = function()
        m.createIndex("idx_user_name", "{{%user}}", { "name" })
    end,
    safeDown = function()
        m.dropIndex("idx_user_name", "{{%user}}")
    end,
}
"#;

/// A migration whose apply entry fails at run time.
pub const BROKEN: &str = r#"
return {
    safeUp = function()
        error("boom")
    end,
}
"#;
