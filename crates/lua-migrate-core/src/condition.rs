//! WHERE-clause conditions.

use std::collections::BTreeMap;

use crate::array::ArrayValue;
use crate::expression::Expression;
use crate::value::Value;

/// A condition accepted by [`CommandBuilder::build_where`](crate::CommandBuilder::build_where).
#[derive(Debug)]
pub enum Condition {
    /// Literal SQL, emitted as-is.
    Sql(String),
    /// `column => value` pairs joined with `AND`.
    Hash(BTreeMap<String, Value>),
    /// Literal SQL items and/or column/value pairs, all joined with `AND`.
    Array(ArrayValue),
    /// A registered expression and the values to bind into it.
    Expression(Box<dyn Expression>, Vec<Value>),
}

impl Condition {
    /// Converts a script value into a condition.
    ///
    /// Strings are literal SQL, keyed tables are hashes and sequences are
    /// arrays. `nil` is the empty condition.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Sql(String::new()),
            Value::Map(map) => Self::Hash(map.clone()),
            Value::List(_) => Self::Array(ArrayValue::parse(value)),
            other => Self::Sql(other.as_string()),
        }
    }

    /// Returns true if the condition renders nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Sql(sql) => sql.trim().is_empty(),
            Self::Hash(map) => map.is_empty(),
            Self::Array(array) => array.is_empty(),
            Self::Expression(..) => false,
        }
    }
}

impl From<&str> for Condition {
    fn from(sql: &str) -> Self {
        Self::Sql(sql.to_string())
    }
}

impl From<String> for Condition {
    fn from(sql: String) -> Self {
        Self::Sql(sql)
    }
}

impl From<BTreeMap<String, Value>> for Condition {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Hash(map)
    }
}

impl Condition {
    /// Wraps an expression with no extra parameters.
    #[must_use]
    pub fn expression(expression: impl Expression + 'static) -> Self {
        Self::Expression(Box::new(expression), Vec::new())
    }
}
