//! The `migrate` Lua module.
//!
//! Scripts build columns with one factory per type tag and describe schema
//! changes with one function per statement:
//!
//! ```lua
//! local m = require("migrate")
//!
//! m.createTable("{{%user}}", {
//!     id = m.pk(),
//!     name = m.string(64):notNull():comment("login"),
//!     "KEY `idx_name` (`name`)",
//! })
//! m.connection("audit"):dropTable("{{%log}}")  -- same functions, other prefix
//! ```
//!
//! Every statement is appended to the session's output buffer, followed by
//! `;` and a newline.

use std::sync::Arc;

use lua_migrate_core::column_type::{self, Category};
use lua_migrate_core::{
    Column, CommandBuilder, Condition, ForeignKeyAction, Quoter, TableColumn, Value,
};
use mlua::{AnyUserData, Lua, MetaMethod, MultiValue, Table, UserData, UserDataMethods};
use tracing::{debug, warn};

use crate::args::Args;
use crate::buffer::SqlBuffer;
use crate::connection::{Connection, ConnectionRegistry, DEFAULT_CONNECTION};
use crate::error::Result;

/// Module name under which the DSL is registered.
pub const MODULE_NAME: &str = "migrate";

/// Column factories exposed by the module, and the tag each one builds.
const FACTORIES: &[(&str, &str)] = &[
    ("pk", "pk"),
    ("upk", "upk"),
    ("bigpk", "bigpk"),
    ("ubigpk", "ubigpk"),
    ("char", "char"),
    ("string", "string"),
    ("text", "text"),
    ("tinyint", "tinyint"),
    ("smallint", "smallint"),
    ("integer", "integer"),
    ("bigint", "bigint"),
    ("float", "float"),
    ("double", "double"),
    ("decimal", "decimal"),
    ("money", "money"),
    ("datetime", "datetime"),
    ("timestamp", "timestamp"),
    ("time", "time"),
    ("date", "date"),
    ("binary", "binary"),
    ("bool", "bool"),
    ("boolean", "bool"),
];

/// Shared state behind every `migrate` module instance.
#[derive(Debug)]
pub struct SchemaContext {
    connections: ConnectionRegistry,
    default_builder: Arc<CommandBuilder>,
}

impl SchemaContext {
    /// Creates a context whose module-level functions use the `default`
    /// connection options. No connection URL is required for them.
    #[must_use]
    pub fn new(connections: ConnectionRegistry) -> Self {
        let option = connections.option(DEFAULT_CONNECTION);
        let default_builder = CommandBuilder::new(option.quoter())
            .with_expressions(Arc::clone(connections.expressions()));
        Self {
            connections,
            default_builder: Arc::new(default_builder),
        }
    }

    /// Creates a context reading connection options from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ConnectionRegistry::from_env())
    }

    /// Replaces the builder used by module-level functions.
    #[must_use]
    pub fn with_default_builder(mut self, builder: CommandBuilder) -> Self {
        self.default_builder = Arc::new(builder);
        self
    }

    /// Returns the connection registry.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Returns the builder used by module-level functions.
    #[must_use]
    pub fn default_builder(&self) -> &CommandBuilder {
        &self.default_builder
    }
}

/// A column handle held by a script.
#[derive(Debug, Clone)]
pub struct LuaColumn(Column);

impl LuaColumn {
    /// Wraps a column.
    #[must_use]
    pub const fn new(column: Column) -> Self {
        Self(column)
    }

    /// Returns the wrapped column.
    #[must_use]
    pub const fn column(&self) -> &Column {
        &self.0
    }
}

/// Registers a fluent setter: the handle is updated in place and returned.
fn add_setter<M>(methods: &mut M, name: &'static str, apply: fn(Column, &Args) -> Column)
where
    M: UserDataMethods<LuaColumn>,
{
    methods.add_function(name, move |_, (ud, args): (AnyUserData, MultiValue)| {
        {
            let mut handle = ud.borrow_mut::<LuaColumn>()?;
            let args = Args::from_lua(&args, &Quoter::new());
            handle.0 = apply(handle.0.clone(), &args);
        }
        Ok(ud)
    });
}

impl UserData for LuaColumn {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        add_setter(methods, "notNull", |c, _| c.not_null());
        add_setter(methods, "null", |c, _| c.null());
        add_setter(methods, "unique", |c, _| c.unique());
        add_setter(methods, "unsigned", |c, _| c.unsigned());
        add_setter(methods, "first", |c, _| c.first());
        add_setter(methods, "default", |c, args| {
            let value = args.get(0);
            match value {
                Value::Null => c.default_value("NULL"),
                Value::Bool(_) => c.default_value(value.to_sql_literal()),
                other => c.default_value(other.as_string()),
            }
        });
        add_setter(methods, "check", |c, args| c.check(args.string(0)));
        add_setter(methods, "comment", |c, args| c.comment(args.string(0)));
        add_setter(methods, "after", |c, args| c.after(args.string(0)));
        add_setter(methods, "append", |c, args| c.append(args.string(0)));
        add_setter(methods, "length", |c, args| c.with_length(args.get(0)));

        methods.add_method("category", |_, this, ()| Ok(this.0.category().as_str()));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.0.to_string()));
    }
}

/// One DSL statement function.
struct Operation {
    name: &'static str,
    build: fn(&CommandBuilder, &Args) -> Result<String>,
}

/// Every statement function, shared by the module and connection handles.
static OPERATIONS: &[Operation] = &[
    Operation {
        name: "createTable",
        build: |b, a| {
            let columns = table_columns(a.get(1));
            let options = a.opt_string(2);
            Ok(b.create_table(&a.string(0), &columns, options.as_deref()))
        },
    },
    Operation {
        name: "addColumn",
        build: |b, a| Ok(b.add_column(&a.string(0), &a.string(1), &a.string(2))),
    },
    Operation {
        name: "renameColumn",
        build: |b, a| Ok(b.rename_column(&a.string(0), &a.string(1), &a.string(2))),
    },
    Operation {
        name: "alterColumn",
        build: |b, a| Ok(b.alter_column(&a.string(0), &a.string(1), &a.string(2))),
    },
    Operation {
        name: "alterColumnComment",
        build: |b, a| {
            Ok(b.alter_column_comment(&a.string(0), &a.string(1), &a.string(2), &a.string(3)))
        },
    },
    Operation {
        name: "addColumnComment",
        build: |b, a| Ok(b.add_comment_on_column(&a.string(0), &a.string(1), &a.string(2))),
    },
    Operation {
        name: "dropColumn",
        build: |b, a| Ok(b.drop_column(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "createIndex",
        build: |b, a| Ok(b.create_index(&a.string(0), &a.string(1), &a.names(2), a.bool(3))),
    },
    Operation {
        name: "dropIndex",
        build: |b, a| Ok(b.drop_index(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "addPrimaryKey",
        build: |b, a| Ok(b.add_primary_key(&a.string(0), &a.string(1), &a.names(2))),
    },
    Operation {
        name: "dropPrimaryKey",
        build: |b, a| Ok(b.drop_primary_key(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "addUnique",
        build: |b, a| Ok(b.add_unique(&a.string(0), &a.string(1), &a.names(2))),
    },
    Operation {
        name: "dropUnique",
        build: |b, a| Ok(b.drop_unique(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "addCheck",
        build: |b, a| Ok(b.add_check(&a.string(0), &a.string(1), &a.string(2))),
    },
    Operation {
        name: "dropCheck",
        build: |b, a| Ok(b.drop_check(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "addForeignKey",
        build: |b, a| {
            Ok(b.add_foreign_key(
                &a.string(0),
                &a.string(1),
                &a.names(2),
                &a.string(3),
                &a.names(4),
                foreign_key_action(a.opt_string(5)),
                foreign_key_action(a.opt_string(6)),
            ))
        },
    },
    Operation {
        name: "dropForeignKey",
        build: |b, a| Ok(b.drop_foreign_key(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "addCommentOnTable",
        build: |b, a| Ok(b.add_comment_on_table(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "addCommentOnColumn",
        build: |b, a| Ok(b.add_comment_on_column(&a.string(0), &a.string(1), &a.string(2))),
    },
    Operation {
        name: "dropCommentFromTable",
        build: |b, a| Ok(b.drop_comment_from_table(&a.string(0))),
    },
    Operation {
        name: "dropCommentFromColumn",
        build: |b, a| Ok(b.drop_comment_from_column(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "renameTable",
        build: |b, a| Ok(b.rename_table(&a.string(0), &a.string(1))),
    },
    Operation {
        name: "dropTable",
        build: |b, a| Ok(b.drop_table(&a.string(0))),
    },
    Operation {
        name: "truncateTable",
        build: |b, a| Ok(b.truncate_table(&a.string(0))),
    },
    Operation {
        name: "delete",
        build: |b, a| Ok(b.delete(&a.string(0), &Condition::from_value(a.get(1)))?),
    },
    Operation {
        name: "batchInsert",
        build: |b, a| {
            let rows: Vec<Vec<Value>> = a.get(2).as_list().iter().map(Value::as_list).collect();
            Ok(b.batch_insert(&a.string(0), &a.names(1), &rows)?)
        },
    },
    Operation {
        name: "execute",
        build: |_, a| Ok(a.string(0).trim().trim_end_matches(';').trim_end().to_string()),
    },
];

fn foreign_key_action(action: Option<String>) -> Option<ForeignKeyAction> {
    let action = action?;
    let parsed = action.parse().ok();
    if parsed.is_none() {
        warn!(action = %action, "ignoring unknown foreign key action");
    }
    parsed
}

/// Orders the entries of a `createTable` column table.
///
/// Sequence entries keep their order: `{name, column}` pairs are columns
/// and bare strings are raw lines. Keyed entries come first, primary keys
/// before the rest, then by name.
fn table_columns(value: &Value) -> Vec<TableColumn> {
    match value {
        Value::List(items) => items.iter().filter_map(sequence_entry).collect(),
        Value::Map(map) => {
            let mut sequence: Vec<(usize, &Value)> = Vec::new();
            let mut keyed: Vec<(&String, String)> = Vec::new();
            for (key, entry) in map {
                match key.parse::<usize>() {
                    Ok(index) => sequence.push((index, entry)),
                    Err(_) => keyed.push((key, entry.as_string())),
                }
            }
            sequence.sort_by_key(|(index, _)| *index);
            keyed.sort_by(|a, b| is_pk(&b.1).cmp(&is_pk(&a.1)).then_with(|| a.0.cmp(b.0)));

            keyed
                .into_iter()
                .map(|(name, definition)| TableColumn::new(name.as_str(), definition))
                .chain(sequence.into_iter().filter_map(|(_, entry)| sequence_entry(entry)))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn sequence_entry(entry: &Value) -> Option<TableColumn> {
    match entry {
        Value::List(pair) if pair.len() >= 2 => {
            Some(TableColumn::new(pair[0].as_string(), pair[1].as_string()))
        }
        Value::String(line) if !line.trim().is_empty() => Some(TableColumn::raw(line.as_str())),
        _ => None,
    }
}

fn is_pk(definition: &str) -> bool {
    let tag = definition
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    column_type::category(tag) == Category::Pk
}

/// Builds one statement and appends it to the session's output buffer.
fn run(lua: &Lua, builder: &CommandBuilder, op: &Operation, args: &MultiValue) -> mlua::Result<String> {
    let buffer = SqlBuffer::registered(lua)?;
    let args = Args::from_lua(args, builder.quoter());
    let sql = (op.build)(builder, &args)?;
    if sql.is_empty() {
        debug!(operation = op.name, "statement rendered empty, nothing written");
        return Ok(sql);
    }
    debug!(operation = op.name, sql = %sql, "generated statement");
    buffer.write_statement(&sql);
    Ok(sql)
}

/// A named connection handle held by a script.
#[derive(Debug, Clone)]
pub struct LuaConnection {
    connection: Arc<Connection>,
}

impl UserData for LuaConnection {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        for op in OPERATIONS {
            methods.add_method(op.name, move |lua, this, args: MultiValue| {
                run(lua, this.connection.builder(), op, &args)
            });
        }
        methods.add_method("name", |_, this, ()| Ok(this.connection.name().to_string()));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("connection({})", this.connection.name()))
        });
    }
}

/// Creates the `migrate` module table.
///
/// # Errors
///
/// Returns an error if the interpreter cannot allocate the module.
pub fn create_module(lua: &Lua, context: &Arc<SchemaContext>) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    for (name, tag) in FACTORIES {
        let factory = lua.create_function(move |_, args: MultiValue| {
            let args = Args::from_lua(&args, &Quoter::new());
            Ok(LuaColumn(Column::from_args(*tag, args.values())))
        })?;
        module.set(*name, factory)?;
    }

    module.set(
        "column",
        lua.create_function(|_, args: MultiValue| {
            let args = Args::from_lua(&args, &Quoter::new());
            Ok(LuaColumn(Column::from_args(args.string(0), args.rest(1))))
        })?,
    )?;

    for op in OPERATIONS {
        let context = Arc::clone(context);
        let function = lua.create_function(move |lua, args: MultiValue| {
            run(lua, context.default_builder(), op, &args)
        })?;
        module.set(op.name, function)?;
    }

    module.set(
        "comment",
        lua.create_function(|_, text: String| {
            Ok(format!("COMMENT(\"{}\")", text.replace('"', "\\\"")))
        })?,
    )?;

    let registry = Arc::clone(context);
    module.set(
        "connection",
        lua.create_function(move |_, name: Option<String>| {
            let name = name.unwrap_or_else(|| DEFAULT_CONNECTION.to_string());
            let connection = registry.connections().get(&name)?;
            Ok(LuaConnection { connection })
        })?,
    )?;

    Ok(module)
}

/// Registers the `migrate` module in `package.loaded` and as a global.
///
/// # Errors
///
/// Returns an error if the interpreter cannot allocate the module.
pub fn install(lua: &Lua, context: &Arc<SchemaContext>) -> mlua::Result<()> {
    let module = create_module(lua, context)?;
    let loaded: Table = lua.globals().get::<Table>("package")?.get("loaded")?;
    loaded.set(MODULE_NAME, module.clone())?;
    lua.globals().set(MODULE_NAME, module)
}
