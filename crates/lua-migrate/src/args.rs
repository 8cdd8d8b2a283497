//! Conversion of Lua call arguments into script values.

use std::collections::BTreeMap;

use lua_migrate_core::{ArrayValue, Quoter, Value};
use mlua::{MultiValue, Table, Value as LuaValue};

use crate::schema::LuaColumn;

/// Nested tables deeper than this are treated as `nil`.
const MAX_DEPTH: usize = 16;

static NULL: Value = Value::Null;

/// Converts a Lua value into a [`Value`].
///
/// Column handles render to their definition using `quoter`. Functions,
/// threads and foreign userdata become `Null`.
#[must_use]
pub fn to_value(value: &LuaValue, quoter: &Quoter) -> Value {
    convert(value, quoter, 0)
}

#[allow(clippy::cast_precision_loss)]
fn convert(value: &LuaValue, quoter: &Quoter, depth: usize) -> Value {
    match value {
        LuaValue::Boolean(b) => Value::Bool(*b),
        LuaValue::Integer(i) => Value::Number(*i as f64),
        LuaValue::Number(n) => Value::Number(*n),
        LuaValue::String(s) => Value::String(s.to_string_lossy()),
        LuaValue::Table(table) if depth < MAX_DEPTH => convert_table(table, quoter, depth + 1),
        LuaValue::UserData(ud) => ud
            .borrow::<LuaColumn>()
            .map_or(Value::Null, |column| {
                Value::String(column.column().render_with(quoter))
            }),
        _ => Value::Null,
    }
}

/// Sequences `1..=n` become lists, everything else a keyed map.
fn convert_table(table: &Table, quoter: &Quoter, depth: usize) -> Value {
    let mut entries: Vec<(LuaValue, LuaValue)> = table
        .clone()
        .pairs::<LuaValue, LuaValue>()
        .filter_map(std::result::Result::ok)
        .collect();

    let len = table.raw_len();
    let is_sequence = entries.len() == len
        && entries
            .iter()
            .all(|(k, _)| matches!(k, LuaValue::Integer(i) if *i >= 1 && usize::try_from(*i).is_ok_and(|i| i <= len)));

    if is_sequence {
        entries.sort_by_key(|(k, _)| k.as_integer().unwrap_or_default());
        return Value::List(
            entries
                .iter()
                .map(|(_, v)| convert(v, quoter, depth))
                .collect(),
        );
    }

    let map: BTreeMap<String, Value> = entries
        .iter()
        .filter_map(|(k, v)| key_string(k).map(|k| (k, convert(v, quoter, depth))))
        .collect();
    Value::Map(map)
}

fn key_string(key: &LuaValue) -> Option<String> {
    match key {
        LuaValue::String(s) => Some(s.to_string_lossy()),
        LuaValue::Integer(i) => Some(i.to_string()),
        LuaValue::Number(n) => Some(Value::Number(*n).as_string()),
        LuaValue::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Positional arguments of one DSL call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    /// Converts Lua call arguments.
    #[must_use]
    pub fn from_lua(args: &MultiValue, quoter: &Quoter) -> Self {
        Self {
            values: args.iter().map(|v| to_value(v, quoter)).collect(),
        }
    }

    /// Wraps already-converted values.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of arguments, including trailing `nil`s.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All arguments.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The argument at `index`, `Null` when absent.
    #[must_use]
    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&NULL)
    }

    /// The argument at `index` as text.
    #[must_use]
    pub fn string(&self, index: usize) -> String {
        self.get(index).as_string()
    }

    /// The argument at `index` as text, `None` when absent or empty.
    #[must_use]
    pub fn opt_string(&self, index: usize) -> Option<String> {
        let value = self.get(index);
        if value.is_empty() {
            None
        } else {
            Some(value.as_string())
        }
    }

    /// The argument at `index` as a boolean.
    #[must_use]
    pub fn bool(&self, index: usize) -> bool {
        self.get(index).as_bool()
    }

    /// The argument at `index` as a list of names, e.g. `"a, b"` or `{"a", "b"}`.
    #[must_use]
    pub fn names(&self, index: usize) -> Vec<String> {
        ArrayValue::parse(self.get(index)).items().to_vec()
    }

    /// The arguments from `index` on.
    #[must_use]
    pub fn rest(&self, index: usize) -> &[Value] {
        self.values.get(index..).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use mlua::Lua;

    use super::*;

    fn eval(lua: &Lua, code: &str) -> Value {
        let value: LuaValue = lua.load(code).eval().unwrap();
        to_value(&value, &Quoter::new())
    }

    #[test]
    fn test_scalars() {
        let lua = Lua::new();
        assert_eq!(eval(&lua, "return 12"), Value::Number(12.0));
        assert_eq!(eval(&lua, "return 1.5"), Value::Number(1.5));
        assert_eq!(eval(&lua, "return 'x'"), Value::from("x"));
        assert_eq!(eval(&lua, "return true"), Value::Bool(true));
        assert_eq!(eval(&lua, "return nil"), Value::Null);
        assert_eq!(eval(&lua, "return print"), Value::Null);
    }

    #[test]
    fn test_tables() {
        let lua = Lua::new();
        assert_eq!(eval(&lua, "return {'a', 'b'}"), Value::from(vec!["a", "b"]));

        let Value::Map(map) = eval(&lua, "return {id = 1, [3] = 'x'}") else {
            panic!("expected map");
        };
        assert_eq!(map["id"], Value::Number(1.0));
        assert_eq!(map["3"], Value::from("x"));
    }

    #[test]
    fn test_cyclic_table_is_bounded() {
        let lua = Lua::new();
        let value = eval(&lua, "local t = {}; t.self = t; return t");
        assert!(matches!(value, Value::Map(_)));
    }

    #[test]
    fn test_args_accessors() {
        let args = Args::new(vec![Value::from("t"), Value::from("a, b"), Value::Null]);
        assert_eq!(args.len(), 3);
        assert_eq!(args.string(0), "t");
        assert_eq!(args.names(1), ["a", "b"]);
        assert_eq!(args.opt_string(2), None);
        assert_eq!(args.get(9), &Value::Null);
        assert_eq!(args.rest(1).len(), 2);
        assert!(args.rest(7).is_empty());
    }
}
