//! Abstract-to-physical column type resolution.
//!
//! Column definitions are written with abstract tags (`string(64) NOT NULL`,
//! `pk`, `money`). A [`TypeMap`] turns them into the physical types of the
//! target database.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// `name(args)trailer`
static TYPE_FULL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(\w+)\((.+?)\)(.*)$").expect("valid type pattern"));
/// `name <rest>`
static TYPE_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s+").expect("valid type pattern"));
/// The length group inside a mapped type.
static TYPE_LENGTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid type pattern"));
/// The leading word of a type definition.
static TYPE_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+").expect("valid type pattern"));

/// The default abstract type mapping (MySQL flavoured).
pub const DEFAULT_TYPE_MAP: &[(&str, &str)] = &[
    ("pk", "int(11) NOT NULL AUTO_INCREMENT PRIMARY KEY"),
    ("upk", "int(10) UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY"),
    ("bigpk", "bigint(20) NOT NULL AUTO_INCREMENT PRIMARY KEY"),
    ("ubigpk", "bigint(20) UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY"),
    ("char", "char(1)"),
    ("string", "varchar(255)"),
    ("varchar", "varchar(255)"),
    ("text", "text"),
    ("longtext", "longtext"),
    ("tinyint", "tinyint(3)"),
    ("smallint", "smallint(6)"),
    ("integer", "int(11)"),
    ("bigint", "bigint(20)"),
    ("boolean", "tinyint(1)"),
    ("bool", "tinyint(1)"),
    ("float", "float"),
    ("double", "double"),
    ("decimal", "decimal"),
    ("datetime", "datetime"),
    ("timestamp", "timestamp"),
    ("time", "time"),
    ("timestamps", "int(11)"),
    ("date", "date"),
    ("money", "decimal(19,4)"),
    ("binary", "blob"),
];

/// Mapping from abstract type tags to physical column types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMap {
    types: HashMap<String, String>,
}

impl Default for TypeMap {
    fn default() -> Self {
        Self {
            types: DEFAULT_TYPE_MAP
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl TypeMap {
    /// Creates the default type map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty type map.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Adds or replaces a mapping.
    #[must_use]
    pub fn with(mut self, tag: impl Into<String>, physical: impl Into<String>) -> Self {
        self.types.insert(tag.into(), physical.into());
        self
    }

    /// Looks up a tag exactly.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.types.get(tag).map(String::as_str)
    }

    /// Resolves a column definition into its physical type.
    ///
    /// 1. An exact tag match returns the mapped type.
    /// 2. `name(args)trailer` with a mapped `name` substitutes `args` into the
    ///    mapped type's length and appends `trailer`.
    /// 3. `name rest` with a mapped `name` replaces the leading word.
    /// 4. Anything else is returned unchanged.
    #[must_use]
    pub fn get_column_type(&self, definition: &str) -> String {
        if definition.is_empty() {
            return String::new();
        }
        if let Some(mapped) = self.get(definition) {
            return mapped.to_string();
        }

        if let Some(caps) = TYPE_FULL_RE.captures(definition) {
            if let Some(mapped) = self.get(&caps[1]) {
                let length = format!("({})", &caps[2]);
                let physical = if TYPE_LENGTH_RE.is_match(mapped) {
                    TYPE_LENGTH_RE
                        .replacen(mapped, 1, regex::NoExpand(&length))
                        .into_owned()
                } else {
                    format!("{mapped}{length}")
                };
                return format!("{physical}{}", &caps[3]);
            }
            return definition.to_string();
        }

        if let Some(caps) = TYPE_SPACE_RE.captures(definition) {
            if let Some(mapped) = self.get(&caps[1]) {
                return TYPE_WORD_RE
                    .replacen(definition, 1, regex::NoExpand(mapped))
                    .into_owned();
            }
        }

        definition.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let map = TypeMap::new();
        assert_eq!(
            map.get_column_type("pk"),
            "int(11) NOT NULL AUTO_INCREMENT PRIMARY KEY"
        );
        assert_eq!(map.get_column_type("string"), "varchar(255)");
    }

    #[test]
    fn test_length_substitution() {
        let map = TypeMap::new();
        assert_eq!(map.get_column_type("varchar(100)"), "varchar(100)");
        assert_eq!(map.get_column_type("string(64) NOT NULL"), "varchar(64) NOT NULL");
        assert_eq!(map.get_column_type("money(10,2)"), "decimal(10,2)");
        assert_eq!(map.get_column_type("decimal(10,2) NULL"), "decimal(10,2) NULL");
    }

    #[test]
    fn test_leading_word_replacement() {
        let map = TypeMap::new();
        assert_eq!(map.get_column_type("text NOT NULL"), "text NOT NULL");
        assert_eq!(
            map.get_column_type("pk COMMENT \"id\""),
            "int(11) NOT NULL AUTO_INCREMENT PRIMARY KEY COMMENT \"id\""
        );
        assert_eq!(map.get_column_type("bool NOT NULL"), "tinyint(1) NOT NULL");
    }

    #[test]
    fn test_unknown_passes_through() {
        let map = TypeMap::new();
        assert_eq!(map.get_column_type("geometry"), "geometry");
        assert_eq!(map.get_column_type("enum('a','b')"), "enum('a','b')");
        assert_eq!(map.get_column_type("jsonb NOT NULL"), "jsonb NOT NULL");
        assert_eq!(map.get_column_type(""), "");
    }

    #[test]
    fn test_custom_map() {
        let map = TypeMap::empty().with("string", "TEXT");
        assert_eq!(map.get_column_type("string(10)"), "TEXT(10)");
        assert_eq!(map.get_column_type("pk"), "pk");
    }
}
