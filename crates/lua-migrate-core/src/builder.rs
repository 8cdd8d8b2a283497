//! Statement generation.
//!
//! [`CommandBuilder`] turns quoted identifiers, resolved column types and
//! rendered expressions into complete DDL and DML statements. Every method
//! is a pure function of its arguments and the builder's configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::condition::Condition;
use crate::error::Result;
use crate::expression::{ArrayExpression, ExpressionRegistry};
use crate::quote::Quoter;
use crate::types::TypeMap;
use crate::value::Value;

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyAction {
    /// No action.
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl FromStr for ForeignKeyAction {
    type Err = ();

    /// Accepts `CASCADE`, `set null`, `set_null` and similar spellings.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "NOACTION" => Ok(Self::NoAction),
            "RESTRICT" => Ok(Self::Restrict),
            "CASCADE" => Ok(Self::Cascade),
            "SETNULL" => Ok(Self::SetNull),
            "SETDEFAULT" => Ok(Self::SetDefault),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One line of a `CREATE TABLE` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    /// Column name, or `None` for a raw constraint line.
    pub name: Option<String>,
    /// Abstract column definition, or the raw line itself.
    pub definition: String,
}

impl TableColumn {
    /// A named column with an abstract definition.
    #[must_use]
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            definition: definition.into(),
        }
    }

    /// A raw line such as `PRIMARY KEY (id, name)`.
    #[must_use]
    pub fn raw(definition: impl Into<String>) -> Self {
        Self {
            name: None,
            definition: definition.into(),
        }
    }
}

/// Builds SQL statements for one connection.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    quoter: Quoter,
    types: TypeMap,
    expressions: Arc<ExpressionRegistry>,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new(Quoter::new())
    }
}

impl CommandBuilder {
    /// Creates a builder with the default type map and a fresh expression
    /// registry holding the shipped builders.
    #[must_use]
    pub fn new(quoter: Quoter) -> Self {
        Self {
            quoter,
            types: TypeMap::default(),
            expressions: Arc::new(ExpressionRegistry::with_defaults()),
        }
    }

    /// Replaces the type map.
    #[must_use]
    pub fn with_types(mut self, types: TypeMap) -> Self {
        self.types = types;
        self
    }

    /// Shares an existing expression registry.
    #[must_use]
    pub fn with_expressions(mut self, expressions: Arc<ExpressionRegistry>) -> Self {
        self.expressions = expressions;
        self
    }

    /// Returns the identifier quoter.
    #[must_use]
    pub const fn quoter(&self) -> &Quoter {
        &self.quoter
    }

    /// Returns the type map.
    #[must_use]
    pub const fn types(&self) -> &TypeMap {
        &self.types
    }

    /// Returns the expression registry.
    #[must_use]
    pub const fn expressions(&self) -> &Arc<ExpressionRegistry> {
        &self.expressions
    }

    /// Quotes a table name.
    #[must_use]
    pub fn quote_table_name(&self, name: &str) -> String {
        self.quoter.quote_table_name(name)
    }

    /// Quotes a column name.
    #[must_use]
    pub fn quote_column_name(&self, name: &str) -> String {
        self.quoter.quote_column_name(name)
    }

    /// Renders a string as a single-quoted SQL literal.
    #[must_use]
    pub fn quote_value(&self, value: &str) -> String {
        Value::from(value).to_sql_literal()
    }

    /// Resolves an abstract column definition to its physical type.
    ///
    /// Trailing separators left by column rendering are dropped first.
    #[must_use]
    pub fn get_column_type(&self, definition: &str) -> String {
        let definition = definition.trim().trim_end_matches(',').trim_end();
        self.types.get_column_type(definition)
    }

    /// `CREATE TABLE`.
    ///
    /// Named columns are quoted and their definitions resolved; raw lines
    /// are emitted verbatim. Columns resolving to an empty definition and
    /// blank raw lines are skipped. `options` is appended after the
    /// closing paren.
    #[must_use]
    pub fn create_table(&self, table: &str, columns: &[TableColumn], options: Option<&str>) -> String {
        let lines: Vec<String> = columns
            .iter()
            .filter_map(|column| match &column.name {
                Some(name) => {
                    let definition = self.get_column_type(&column.definition);
                    let definition = definition.trim();
                    if definition.is_empty() {
                        debug!(column = %name, "skipping column without a definition");
                        return None;
                    }
                    Some(format!("\t{} {}", self.quote_column_name(name), definition))
                }
                None => {
                    let line = column.definition.trim().trim_end_matches(',').trim_end();
                    (!line.is_empty()).then(|| format!("\t{line}"))
                }
            })
            .collect();

        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&self.quote_table_name(table));
        sql.push_str(" (\n");
        sql.push_str(&lines.join(",\n"));
        sql.push_str("\n)");
        if let Some(options) = options.map(str::trim).filter(|o| !o.is_empty()) {
            sql.push(' ');
            sql.push_str(options);
        }
        sql
    }

    /// `ALTER TABLE ... ADD`.
    #[must_use]
    pub fn add_column(&self, table: &str, column: &str, definition: &str) -> String {
        format!(
            "ALTER TABLE {} ADD {} {}",
            self.quote_table_name(table),
            self.quote_column_name(column),
            self.get_column_type(definition)
        )
    }

    /// `ALTER TABLE ... RENAME COLUMN`.
    #[must_use]
    pub fn rename_column(&self, table: &str, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_table_name(table),
            self.quote_column_name(old_name),
            self.quote_column_name(new_name)
        )
    }

    /// `ALTER TABLE ... CHANGE` keeping the column name.
    #[must_use]
    pub fn alter_column(&self, table: &str, column: &str, definition: &str) -> String {
        let quoted = self.quote_column_name(column);
        format!(
            "ALTER TABLE {} CHANGE {quoted} {quoted} {}",
            self.quote_table_name(table),
            self.get_column_type(definition)
        )
    }

    /// `ALTER TABLE ... CHANGE` with a trailing `COMMENT`.
    #[must_use]
    pub fn alter_column_comment(&self, table: &str, column: &str, definition: &str, comment: &str) -> String {
        let mut sql = self.alter_column(table, column, definition);
        sql.push_str(" COMMENT ");
        sql.push_str(&self.quote_value(comment));
        sql
    }

    /// `ALTER TABLE ... DROP COLUMN`.
    #[must_use]
    pub fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_table_name(table),
            self.quote_column_name(column)
        )
    }

    /// `CREATE [UNIQUE] INDEX`.
    #[must_use]
    pub fn create_index<S: AsRef<str>>(&self, name: &str, table: &str, columns: &[S], unique: bool) -> String {
        let mut sql = String::from("CREATE ");
        if unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_table_name(name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_table_name(table));
        sql.push_str(" (");
        sql.push_str(&self.quoter.quote_column_list(columns));
        sql.push(')');
        sql
    }

    /// `DROP INDEX ... ON`.
    #[must_use]
    pub fn drop_index(&self, name: &str, table: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_table_name(name),
            self.quote_table_name(table)
        )
    }

    /// `ALTER TABLE ... ADD CONSTRAINT ... PRIMARY KEY`.
    #[must_use]
    pub fn add_primary_key<S: AsRef<str>>(&self, name: &str, table: &str, columns: &[S]) -> String {
        self.add_constraint(name, table, "PRIMARY KEY", columns)
    }

    /// Drops a primary key constraint.
    #[must_use]
    pub fn drop_primary_key(&self, name: &str, table: &str) -> String {
        self.drop_constraint(name, table)
    }

    /// `ALTER TABLE ... ADD CONSTRAINT ... UNIQUE`.
    #[must_use]
    pub fn add_unique<S: AsRef<str>>(&self, name: &str, table: &str, columns: &[S]) -> String {
        self.add_constraint(name, table, "UNIQUE", columns)
    }

    /// Drops a unique constraint.
    #[must_use]
    pub fn drop_unique(&self, name: &str, table: &str) -> String {
        self.drop_constraint(name, table)
    }

    /// `ALTER TABLE ... ADD CONSTRAINT ... CHECK`. The expression is
    /// emitted verbatim.
    #[must_use]
    pub fn add_check(&self, name: &str, table: &str, expression: &str) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
            self.quote_table_name(table),
            self.quote_column_name(name),
            expression.trim()
        )
    }

    /// Drops a check constraint.
    #[must_use]
    pub fn drop_check(&self, name: &str, table: &str) -> String {
        self.drop_constraint(name, table)
    }

    /// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY ... REFERENCES`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn add_foreign_key<S: AsRef<str>, R: AsRef<str>>(
        &self,
        name: &str,
        table: &str,
        columns: &[S],
        ref_table: &str,
        ref_columns: &[R],
        on_delete: Option<ForeignKeyAction>,
        on_update: Option<ForeignKeyAction>,
    ) -> String {
        let mut sql = String::from("ALTER TABLE ");
        sql.push_str(&self.quote_table_name(table));
        sql.push_str(" ADD CONSTRAINT ");
        sql.push_str(&self.quote_table_name(name));
        sql.push_str(" FOREIGN KEY (");
        sql.push_str(&self.quoter.quote_column_list(columns));
        sql.push_str(") REFERENCES ");
        sql.push_str(&self.quote_table_name(ref_table));
        sql.push_str(" (");
        sql.push_str(&self.quoter.quote_column_list(ref_columns));
        sql.push(')');
        if let Some(action) = on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.as_sql());
        }
        sql
    }

    /// Drops a foreign key constraint.
    #[must_use]
    pub fn drop_foreign_key(&self, name: &str, table: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_table_name(table),
            self.quote_table_name(name)
        )
    }

    /// `COMMENT ON TABLE ... IS`.
    #[must_use]
    pub fn add_comment_on_table(&self, table: &str, comment: &str) -> String {
        format!(
            "COMMENT ON TABLE {} IS {}",
            self.quote_table_name(table),
            self.quote_value(comment)
        )
    }

    /// `COMMENT ON COLUMN ... IS`.
    #[must_use]
    pub fn add_comment_on_column(&self, table: &str, column: &str, comment: &str) -> String {
        format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            self.quote_table_name(table),
            self.quote_column_name(column),
            self.quote_value(comment)
        )
    }

    /// `COMMENT ON TABLE ... IS NULL`.
    #[must_use]
    pub fn drop_comment_from_table(&self, table: &str) -> String {
        format!("COMMENT ON TABLE {} IS NULL", self.quote_table_name(table))
    }

    /// `COMMENT ON COLUMN ... IS NULL`.
    #[must_use]
    pub fn drop_comment_from_column(&self, table: &str, column: &str) -> String {
        format!(
            "COMMENT ON COLUMN {}.{} IS NULL",
            self.quote_table_name(table),
            self.quote_column_name(column)
        )
    }

    /// `RENAME TABLE ... TO`.
    #[must_use]
    pub fn rename_table(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "RENAME TABLE {} TO {}",
            self.quote_table_name(old_name),
            self.quote_table_name(new_name)
        )
    }

    /// `DROP TABLE`.
    #[must_use]
    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_table_name(table))
    }

    /// `TRUNCATE TABLE`.
    #[must_use]
    pub fn truncate_table(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", self.quote_table_name(table))
    }

    /// `DELETE FROM ... [WHERE ...]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the condition holds an expression no registered
    /// builder can render.
    pub fn delete(&self, table: &str, condition: &Condition) -> Result<String> {
        let mut sql = String::from("DELETE FROM ");
        sql.push_str(&self.quote_table_name(table));
        let where_clause = self.build_where(condition)?;
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }
        Ok(sql)
    }

    /// `INSERT INTO ... (cols) VALUES (...), (...)`.
    ///
    /// Each row is rendered through the array expression. Returns an empty
    /// string when there are no rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry has no array expression builder.
    pub fn batch_insert<S: AsRef<str>>(&self, table: &str, columns: &[S], rows: &[Vec<Value>]) -> Result<String> {
        let rows: Vec<&Vec<Value>> = rows.iter().filter(|row| !row.is_empty()).collect();
        if rows.is_empty() {
            return Ok(String::new());
        }

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let built = self
                .expressions
                .build(&ArrayExpression::new(row.clone()), &[])?;
            values.push(format!("({})", built.interpolate()));
        }

        let mut sql = String::from("INSERT INTO ");
        sql.push_str(&self.quote_table_name(table));
        let column_list = self.quoter.quote_column_list(columns);
        if !column_list.is_empty() {
            sql.push_str(" (");
            sql.push_str(&column_list);
            sql.push(')');
        }
        sql.push_str(" VALUES ");
        sql.push_str(&values.join(", "));
        Ok(sql)
    }

    /// Renders a condition as `WHERE ...`, or an empty string when the
    /// condition is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if an expression cannot be rendered.
    pub fn build_where(&self, condition: &Condition) -> Result<String> {
        let sql = self.build_condition(condition)?;
        if sql.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("WHERE {sql}"))
        }
    }

    /// Renders a condition without the `WHERE` keyword.
    ///
    /// Parameters bound by expressions are interpolated as literals.
    ///
    /// # Errors
    ///
    /// Returns an error if an expression cannot be rendered.
    pub fn build_condition(&self, condition: &Condition) -> Result<String> {
        match condition {
            Condition::Sql(sql) => Ok(sql.trim().to_string()),
            Condition::Hash(map) => self.build_hash(map.iter()),
            Condition::Array(array) => {
                let mut parts: Vec<String> = array
                    .items()
                    .iter()
                    .map(|item| item.trim())
                    .filter(|item| !item.is_empty())
                    .map(ToString::to_string)
                    .collect();
                let pairs = self.build_hash(array.pairs().iter().map(|(k, v)| (k, v)))?;
                if !pairs.is_empty() {
                    parts.push(pairs);
                }
                Ok(join_and(&parts))
            }
            Condition::Expression(expression, params) => {
                Ok(self.expressions.build(expression.as_ref(), params)?.interpolate())
            }
        }
    }

    fn build_hash<'a, I>(&self, pairs: I) -> Result<String>
    where
        I: Iterator<Item = (&'a String, &'a Value)>,
    {
        let mut parts = Vec::new();
        for (column, value) in pairs {
            let quoted = self.quote_column_name(column);
            let part = match value {
                Value::Null => format!("{quoted} IS NULL"),
                Value::List(items) if items.is_empty() => String::from("0=1"),
                Value::List(items) => {
                    let built = self
                        .expressions
                        .build(&ArrayExpression::new(items.clone()), &[])?;
                    format!("{quoted} IN ({})", built.interpolate())
                }
                other => format!("{quoted} = {}", other.to_sql_literal()),
            };
            parts.push(part);
        }
        Ok(join_and(&parts))
    }

    fn add_constraint<S: AsRef<str>>(&self, name: &str, table: &str, kind: &str, columns: &[S]) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {kind} ({})",
            self.quote_table_name(table),
            self.quote_column_name(name),
            self.quoter.quote_column_list(columns)
        )
    }

    fn drop_constraint(&self, name: &str, table: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_table_name(table),
            self.quote_column_name(name)
        )
    }
}

fn join_and(parts: &[String]) -> String {
    if parts.len() > 1 {
        parts
            .iter()
            .map(|p| format!("({p})"))
            .collect::<Vec<_>>()
            .join(" AND ")
    } else {
        parts.join(" AND ")
    }
}
