//! Array-like views over script values.
//!
//! Column lists and conditions arrive in many shapes: `"name,state"`,
//! `"(a, b)"`, a JSON array, a Lua sequence or a keyed table. [`ArrayValue`]
//! normalises all of them into plain items and key/value pairs.

use std::sync::LazyLock;

use regex::Regex;

use crate::value::Value;

static SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("valid split pattern"));

/// A normalised list of items and/or key/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayValue {
    items: Vec<String>,
    pairs: Vec<(String, Value)>,
    from_string: bool,
}

impl ArrayValue {
    /// Creates an array from plain items.
    #[must_use]
    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Normalises a script value.
    #[must_use]
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::String(s) => Self::parse_str(s),
            Value::List(items) => {
                let mut array = Self::default();
                for item in items {
                    match item {
                        Value::Map(map) => array
                            .pairs
                            .extend(map.iter().map(|(k, v)| (k.clone(), v.clone()))),
                        Value::Null => {}
                        other => {
                            let s = other.as_string();
                            if !s.is_empty() {
                                array.items.push(s);
                            }
                        }
                    }
                }
                array
            }
            Value::Map(map) => Self {
                pairs: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                ..Self::default()
            },
            other => Self {
                items: vec![other.as_string()],
                ..Self::default()
            },
        }
    }

    fn parse_str(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        // A JSON array of objects is read as key/value pairs.
        let looks_like_pairs = trimmed.starts_with('[')
            && trimmed.ends_with(']')
            && trimmed.contains('{')
            && trimmed.contains('}');
        if looks_like_pairs {
            if let Ok(Value::List(rows)) = serde_json::from_str::<Value>(trimmed) {
                let mut array = Self::parse(&Value::List(rows));
                array.from_string = true;
                return array;
            }
        }

        let mut body = trimmed;
        if let Some(inner) = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
            body = inner;
        }
        if body.starts_with('(') && body.ends_with(')') && body.contains(',') {
            body = &body[1..body.len() - 1];
        }

        let items: Vec<String> = SPLIT_RE
            .split(body)
            .filter(|item| !item.is_empty())
            .map(|item| item.trim_matches(|c| c == '"' || c == '\'').to_string())
            .collect();

        Self {
            items,
            pairs: Vec::new(),
            from_string: true,
        }
    }

    /// Plain items.
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Key/value pairs.
    #[must_use]
    pub fn pairs(&self) -> &[(String, Value)] {
        &self.pairs
    }

    /// Returns true if there are neither items nor pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.pairs.is_empty()
    }

    /// Returns true if this array only holds key/value pairs.
    #[must_use]
    pub fn is_pairs(&self) -> bool {
        self.items.is_empty() && !self.pairs.is_empty()
    }

    /// Returns true if this array was parsed from a single string.
    #[must_use]
    pub const fn is_from_string(&self) -> bool {
        self.from_string
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_string() {
        let arr = ArrayValue::parse(&Value::from("name , id,state"));
        assert_eq!(arr.items(), ["name", "id", "state"]);
        assert!(arr.is_from_string());
    }

    #[test]
    fn test_bracketed_and_tuple_strings() {
        assert_eq!(ArrayValue::parse(&Value::from("[a,b]")).items(), ["a", "b"]);
        assert_eq!(ArrayValue::parse(&Value::from("(a, b)")).items(), ["a", "b"]);
        assert_eq!(ArrayValue::parse(&Value::from("(a)")).items(), ["(a)"]);
    }

    #[test]
    fn test_json_pairs() {
        let arr = ArrayValue::parse(&Value::from(r#"[{"id": 1}, {"state": "on"}]"#));
        assert!(arr.is_pairs());
        assert_eq!(arr.pairs()[0], ("id".to_string(), Value::Number(1.0)));
        assert_eq!(arr.pairs()[1], ("state".to_string(), Value::from("on")));
    }

    #[test]
    fn test_list_and_map() {
        let arr = ArrayValue::parse(&Value::from(vec!["name", "state"]));
        assert_eq!(arr.items(), ["name", "state"]);

        let mut map = std::collections::BTreeMap::new();
        map.insert("id".to_string(), Value::Number(3.0));
        let arr = ArrayValue::parse(&Value::Map(map));
        assert!(arr.is_pairs());
    }

    #[test]
    fn test_empty() {
        assert!(ArrayValue::parse(&Value::Null).is_empty());
        assert!(ArrayValue::parse(&Value::from("  ")).is_empty());
    }
}
