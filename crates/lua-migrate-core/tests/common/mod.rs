#![allow(dead_code)]

use lua_migrate_core::prelude::*;

/// A builder with the `wp_` table prefix most tests use.
pub fn wp_builder() -> CommandBuilder {
    CommandBuilder::new(Quoter::new().option(TABLE_PREFIX, "wp_"))
}

/// A builder with no options at all.
pub fn plain_builder() -> CommandBuilder {
    CommandBuilder::default()
}

/// Renders a column and wraps it as a named `CREATE TABLE` entry.
pub fn named(name: &str, column: &Column) -> TableColumn {
    TableColumn::new(name, column.to_string())
}

/// Collapses runs of whitespace so multi-line statements compare easily.
pub fn squash(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
