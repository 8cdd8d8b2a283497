//! Column specifications and their DDL fragments.
//!
//! A [`Column`] renders to an abstract definition such as
//! `string(64) NOT NULL DEFAULT 'x'`. The statement builder passes that
//! through a [`TypeMap`](crate::TypeMap) to obtain the physical type.

use std::fmt;

use crate::column_type::{Category, ColumnType};
use crate::quote::Quoter;
use crate::value::Value;

/// Placeholder template for primary-key columns.
const PK_TEMPLATE: &str = "{type}{check}{comment}{append}";
/// Placeholder template for every other category.
const FULL_TEMPLATE: &str =
    "{type}{length}{notnull}{unique}{default}{check}{comment}{pos}{append}";

/// One column specification.
///
/// Setters are fluent and rendering is a pure function of the fields, so a
/// column can be rendered any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    tag: String,
    ty: Option<ColumnType>,
    length: Vec<u32>,
    comment: Option<String>,
    check: Option<String>,
    default: Option<String>,
    first: bool,
    after: Option<String>,
    append: Option<String>,
    unsigned: bool,
    nullable: bool,
    unique: bool,
}

impl Column {
    /// Creates a column of the given type tag with no arguments.
    ///
    /// Unknown tags are accepted and render as an empty fragment.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let mut column = Self {
            ty: tag.parse().ok(),
            tag,
            length: Vec::new(),
            comment: None,
            check: None,
            default: None,
            first: false,
            after: None,
            append: None,
            unsigned: false,
            nullable: false,
            unique: false,
        };
        column.check_type();
        column
    }

    /// Creates a column from positional script arguments:
    /// `(length?, default?, comment?)`.
    #[must_use]
    pub fn from_args(tag: impl Into<String>, args: &[Value]) -> Self {
        let mut column = Self::new(tag);
        if let Some(length) = args.first() {
            column.length = parse_length(length);
        }
        if let Some(default) = args.get(1).filter(|v| !v.is_null()) {
            column.default = Some(default.as_string());
        }
        if let Some(comment) = args.get(2).filter(|v| !v.is_empty()) {
            column.comment = Some(comment.as_string());
        }
        column.check_type();
        column
    }

    /// Validates the type tag and back-fills the length from the type's
    /// default size when none was given.
    ///
    /// Returns false for unknown tags.
    pub fn check_type(&mut self) -> bool {
        let Some(ty) = self.ty else {
            return false;
        };
        if self.length.is_empty() {
            self.length = ty.default_size().to_vec();
        }
        true
    }

    /// Returns the original type tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the effective type, after the unsigned remap.
    #[must_use]
    pub fn column_type(&self) -> Option<ColumnType> {
        self.ty
            .map(|ty| if self.unsigned { ty.unsigned() } else { ty })
    }

    /// Returns the type category, [`Category::Other`] for unknown tags.
    #[must_use]
    pub fn category(&self) -> Category {
        self.ty.map_or(Category::Other, ColumnType::category)
    }

    /// Returns the length components.
    #[must_use]
    pub fn length(&self) -> &[u32] {
        &self.length
    }

    /// Sets the length from a script value: `10`, `"10"`, `"10,2"` or a list.
    #[must_use]
    pub fn with_length(mut self, length: &Value) -> Self {
        self.length = parse_length(length);
        self.check_type();
        self
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column nullable.
    #[must_use]
    pub const fn null(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Adds a `UNIQUE` marker.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the column unsigned. Only primary-key types change.
    #[must_use]
    pub const fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Sets the default value. The text is emitted verbatim.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets a check expression. The text is emitted verbatim.
    #[must_use]
    pub fn check(mut self, expression: impl Into<String>) -> Self {
        self.check = Some(expression.into());
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Places the column first. Takes precedence over [`Column::after`].
    #[must_use]
    pub const fn first(mut self) -> Self {
        self.first = true;
        self
    }

    /// Places the column after another one.
    #[must_use]
    pub fn after(mut self, column: impl Into<String>) -> Self {
        self.after = Some(column.into());
        self
    }

    /// Appends raw trailing text.
    #[must_use]
    pub fn append(mut self, sql: impl Into<String>) -> Self {
        self.append = Some(sql.into());
        self
    }

    /// Renders the abstract definition, quoting the `AFTER` reference with
    /// `quoter`.
    #[must_use]
    pub fn render_with(&self, quoter: &Quoter) -> String {
        let Some(ty) = self.column_type() else {
            return String::new();
        };

        let template = if ty.is_pk() {
            PK_TEMPLATE
        } else {
            FULL_TEMPLATE
        };

        fill(template, |placeholder| match placeholder {
            "type" => ty.tag().to_string(),
            "length" => self.length_sql(),
            "notnull" => self.null_sql().to_string(),
            "unique" => String::from(if self.unique { " UNIQUE" } else { "" }),
            "default" => self.default_sql(),
            "check" => self.check_sql(),
            "comment" => self.comment_sql(),
            "pos" => self.position_sql(quoter),
            "append" => self.append_sql(),
            _ => String::new(),
        })
    }

    fn length_sql(&self) -> String {
        match self.length.as_slice() {
            [] => String::new(),
            [n] => format!("({n})"),
            [n, m, ..] => format!("({n},{m})"),
        }
    }

    const fn null_sql(&self) -> &'static str {
        if self.nullable {
            " NULL"
        } else {
            " NOT NULL"
        }
    }

    fn default_sql(&self) -> String {
        match &self.default {
            Some(value) => format!(" DEFAULT {value}"),
            None if self.nullable => String::from(" DEFAULT NULL"),
            None => String::new(),
        }
    }

    fn check_sql(&self) -> String {
        self.check
            .as_deref()
            .filter(|c| !c.is_empty())
            .map_or_else(String::new, |c| format!(" CHECK ({c})"))
    }

    fn comment_sql(&self) -> String {
        self.comment
            .as_deref()
            .filter(|c| !c.is_empty())
            .map_or_else(String::new, |c| {
                format!(" COMMENT \"{}\"", c.replace('"', "\\\""))
            })
    }

    fn position_sql(&self, quoter: &Quoter) -> String {
        if self.first {
            return String::from(" FIRST");
        }
        self.after
            .as_deref()
            .filter(|a| !a.is_empty())
            .map_or_else(String::new, |a| {
                format!(" AFTER {}", quoter.quote_column_name(a))
            })
    }

    fn append_sql(&self) -> String {
        match self.append.as_deref() {
            None | Some("") => String::new(),
            Some(sql) if sql.contains(';') => format!(" {sql}"),
            Some(sql) => format!(" {sql},"),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_with(&Quoter::new()))
    }
}

/// Substitutes `{name}` placeholders in order. Substituted text is never
/// rescanned.
fn fill(template: &str, mut lookup: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let Some(end) = tail.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        out.push_str(&lookup(&tail[..end]));
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Parses a length argument into at most two positive components.
fn parse_length(value: &Value) -> Vec<u32> {
    let parts = match value {
        Value::List(_) | Value::Map(_) => value.as_list(),
        Value::String(s) => s.split(',').map(|p| Value::from(p.trim())).collect(),
        other => vec![other.clone()],
    };
    parts
        .iter()
        .map(Value::as_positive)
        .take(2)
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_default_length() {
        assert_eq!(Column::new("integer").to_string(), "integer(12) NOT NULL");
    }

    #[test]
    fn test_explicit_length() {
        let col = Column::from_args("string", &[Value::Number(64.0)]);
        assert_eq!(col.to_string(), "string(64) NOT NULL");

        let col = Column::from_args("decimal", &[Value::from("10,2")]);
        assert_eq!(col.to_string(), "decimal(10,2) NOT NULL");

        let col = Column::from_args("decimal", &[Value::from(vec![8_i64, 3])]);
        assert_eq!(col.length(), [8, 3]);
    }

    #[test]
    fn test_malformed_length_falls_back_to_default() {
        let col = Column::from_args("integer", &[Value::from("wide")]);
        assert_eq!(col.length(), [12]);
    }

    #[test]
    fn test_pk_never_has_length() {
        let col = Column::from_args("pk", &[Value::Number(20.0)]).null().default_value("1");
        assert_eq!(col.to_string(), "pk");
    }

    #[test]
    fn test_unsigned_pk() {
        assert_eq!(Column::new("pk").unsigned().to_string(), "upk");
        assert_eq!(Column::new("bigpk").unsigned().to_string(), "ubigpk");
        assert_eq!(
            Column::new("integer").unsigned().to_string(),
            "integer(12) NOT NULL"
        );
    }

    #[test]
    fn test_nullable_default() {
        assert_eq!(Column::new("text").null().to_string(), "text NULL DEFAULT NULL");
        assert_eq!(
            Column::new("text").null().default_value("'x'").to_string(),
            "text NULL DEFAULT 'x'"
        );
        assert_eq!(
            Column::new("integer").default_value("0").to_string(),
            "integer(12) NOT NULL DEFAULT 0"
        );
    }

    #[test]
    fn test_full_template_order() {
        let col = Column::new("string")
            .unique()
            .check("char_length(name) > 2")
            .comment("user \"name\"")
            .after("id")
            .append("COLLATE utf8mb4_bin");
        assert_eq!(
            col.to_string(),
            "string(255) NOT NULL UNIQUE CHECK (char_length(name) > 2) \
             COMMENT \"user \\\"name\\\"\" AFTER `id` COLLATE utf8mb4_bin,"
        );
    }

    #[test]
    fn test_first_beats_after() {
        let col = Column::new("date").after("id").first();
        assert_eq!(col.to_string(), "date NOT NULL FIRST");
    }

    #[test]
    fn test_append_with_terminator_is_verbatim() {
        let col = Column::new("date").append("; -- end");
        assert_eq!(col.to_string(), "date NOT NULL ; -- end");
    }

    #[test]
    fn test_unknown_type_renders_empty() {
        let mut col = Column::new("geometry").comment("x");
        assert!(!col.check_type());
        assert_eq!(col.to_string(), "");
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let col = Column::new("money").null();
        assert_eq!(col.to_string(), col.to_string());
    }

    #[test]
    fn test_pk_with_comment() {
        let col = Column::new("bigpk").comment("id").append("FIRST");
        assert_eq!(col.to_string(), "bigpk COMMENT \"id\" FIRST,");
    }
}
