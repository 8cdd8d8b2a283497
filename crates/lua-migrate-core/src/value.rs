//! Loosely-typed values handed over by migration scripts.
//!
//! Scripts pass numbers, strings, booleans, lists and keyed tables
//! interchangeably. [`Value`] models that closed set, and its coercions are
//! total: a value that cannot be read as the requested kind yields the
//! neutral default (zero, `false`, empty) instead of an error.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A script-supplied value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value (`nil`).
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Any number. Scripts do not distinguish integers from floats.
    Number(f64),
    /// Text.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Keyed table. Keys are kept sorted so rendering is deterministic.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true for `Null`, empty strings, empty lists and empty maps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    /// Returns true if this is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reads the value as text.
    ///
    /// Numbers with no fractional part print without a decimal point, so a
    /// script passing `12` yields `"12"` rather than `"12.0"`.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::as_string)
                .collect::<Vec<_>>()
                .join(","),
            Self::Map(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Reads the value as a number, `0.0` when it is not numeric.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Bool(true) => 1.0,
            Self::String(s) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Reads the value as a non-negative integer, `None` when it is not a
    /// positive number.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_positive(&self) -> Option<u32> {
        let n = self.as_f64();
        if n.is_finite() && n >= 1.0 && n <= f64::from(u32::MAX) {
            Some(n as u32)
        } else {
            None
        }
    }

    /// Reads the value as a boolean.
    ///
    /// Strings `"1"`, `"true"`, `"yes"` and `"on"` are true; non-zero numbers
    /// are true; everything else is false.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::String(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            _ => false,
        }
    }

    /// Reads the value as a list.
    ///
    /// Lists are returned as-is, maps yield their values, strings are split
    /// on commas and anything else becomes a single-element list (or empty
    /// for `Null`).
    #[must_use]
    pub fn as_list(&self) -> Vec<Self> {
        match self {
            Self::Null => Vec::new(),
            Self::List(items) => items.clone(),
            Self::Map(map) => map.values().cloned().collect(),
            Self::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Self::String(part.to_string()))
                .collect(),
            other => vec![other.clone()],
        }
    }

    /// Renders the value as a SQL literal.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::Number(n) => format_number(*n),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::List(items) => items
                .iter()
                .map(Self::to_sql_literal)
                .collect::<Vec<_>>()
                .join(", "),
            Self::Map(_) => Self::String(self.as_string()).to_sql_literal(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}
