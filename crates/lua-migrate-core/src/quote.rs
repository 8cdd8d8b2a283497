//! Identifier templating and quoting.
//!
//! Identifiers may be written as templates: `{{%name}}` for tables and
//! `{{name}}` for columns. A leading `%` is replaced by the configured
//! prefix and a trailing `%` by the configured suffix. The result is passed
//! through a safety filter and wrapped in backticks, unless an operator
//! override (`tableMap.<name>` / `columnMap.<name>`) supplies the full text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Opening marker of a templated identifier.
pub const QUOTE_PREFIX: &str = "{{";
/// Closing marker of a templated identifier.
pub const QUOTE_SUFFIX: &str = "}}";
/// Placeholder replaced by the configured prefix or suffix.
pub const QUOTE_REPLACER: char = '%';

/// Option key for the table name prefix.
pub const TABLE_PREFIX: &str = "table_prefix";
/// Option key for the table name suffix.
pub const TABLE_SUFFIX: &str = "table_suffix";
/// Option key for the column name prefix.
pub const COLUMN_PREFIX: &str = "column_prefix";
/// Option key for the column name suffix.
pub const COLUMN_SUFFIX: &str = "column_suffix";
/// Override group for table names.
pub const TABLE_MAP: &str = "tableMap";
/// Override group for column names.
pub const COLUMN_MAP: &str = "columnMap";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[,;^.& *'"]"#).expect("valid quote pattern"));

/// Resolves templated identifiers against a set of string options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quoter {
    options: HashMap<String, String>,
}

impl Quoter {
    /// Creates a quoter with no options: templates resolve with an empty
    /// prefix and suffix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a quoter from an option map.
    #[must_use]
    pub const fn with_options(options: HashMap<String, String>) -> Self {
        Self { options }
    }

    /// Sets a single option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Returns the option map.
    #[must_use]
    pub const fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    /// Returns an option value, or the empty string.
    #[must_use]
    pub fn get_option(&self, key: &str) -> &str {
        self.options.get(key).map_or("", String::as_str)
    }

    /// Quotes a table name, resolving `{{%name%}}` templates.
    #[must_use]
    pub fn quote_table_name(&self, name: &str) -> String {
        self.quote_for(name, TABLE_PREFIX, TABLE_SUFFIX, Some(TABLE_MAP))
    }

    /// Quotes a column name, resolving `{{%name%}}` templates.
    #[must_use]
    pub fn quote_column_name(&self, name: &str) -> String {
        self.quote_for(name, COLUMN_PREFIX, COLUMN_SUFFIX, Some(COLUMN_MAP))
    }

    /// Quotes each non-empty entry as a column name and joins them with `, `.
    #[must_use]
    pub fn quote_column_list<S: AsRef<str>>(&self, columns: &[S]) -> String {
        columns
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| !c.is_empty())
            .map(|c| self.quote_column_name(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn quote_for(&self, value: &str, prefix_key: &str, suffix_key: &str, group: Option<&str>) -> String {
        if value.is_empty() {
            return String::new();
        }
        let resolved = resolve_template(value, self.get_option(prefix_key), self.get_option(suffix_key));
        let escaped = escape_identifier(&resolved);

        if let Some(group) = group {
            let key = format!("{group}.{escaped}");
            if let Some(mapped) = self.options.get(&key).filter(|v| !v.is_empty()) {
                return mapped.clone();
            }
        }
        format!("`{escaped}`")
    }
}

/// Substitutes prefix and suffix into a `{{...}}` template.
///
/// Values that are not wrapped in `{{` `}}` are returned unchanged.
#[must_use]
pub fn resolve_template(value: &str, prefix: &str, suffix: &str) -> String {
    let Some(inner) = value
        .strip_prefix(QUOTE_PREFIX)
        .and_then(|v| v.strip_suffix(QUOTE_SUFFIX))
    else {
        return value.to_string();
    };

    let mut name = inner.to_string();
    if name.starts_with(QUOTE_REPLACER) {
        name.replace_range(..QUOTE_REPLACER.len_utf8(), prefix);
    }
    if name.ends_with(QUOTE_REPLACER) {
        let at = name.len() - QUOTE_REPLACER.len_utf8();
        name.replace_range(at.., suffix);
    }
    name
}

/// HTML-escapes a value and then backslash-escapes SQL metacharacters.
///
/// Spaces are dropped rather than escaped.
#[must_use]
pub fn escape_identifier(value: &str) -> String {
    let html = html_escape(value);
    UNSAFE_CHARS
        .replace_all(&html, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            if matched == " " {
                String::new()
            } else {
                format!("\\{matched}")
            }
        })
        .into_owned()
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            '\0' => out.push('\u{FFFD}'),
            other => out.push(other),
        }
    }
    out
}
