//! SQL generation for script-described schema migrations.
//!
//! `lua-migrate-core` holds everything that turns a migration description
//! into SQL text without touching a script interpreter:
//!
//! - **Values** - the loosely-typed [`Value`] scripts hand over, and
//!   [`ArrayValue`] for column lists and conditions
//! - **Column types** - the catalogue of abstract tags, their category and
//!   default size
//! - **Columns** - [`Column`] specifications rendering to abstract
//!   definitions like `string(64) NOT NULL`
//! - **Quoting** - `{{%table}}` templating with prefix/suffix substitution
//! - **Type map** - abstract-to-physical type resolution
//! - **Expressions** - class-tag dispatched value renderers
//! - **Builder** - [`CommandBuilder`], one method per DDL/DML statement
//!
//! # Example
//!
//! ```rust
//! use lua_migrate_core::prelude::*;
//!
//! let builder = CommandBuilder::new(Quoter::new().option(TABLE_PREFIX, "wp_"));
//! let name = Column::new("string").with_length(&Value::from(64_i64));
//!
//! let sql = builder.create_table(
//!     "{{%user}}",
//!     &[
//!         TableColumn::new("id", Column::new("pk").to_string()),
//!         TableColumn::new("name", name.to_string()),
//!     ],
//!     None,
//! );
//! assert!(sql.starts_with("CREATE TABLE `wp_user`"));
//! assert!(sql.contains("`name` varchar(64) NOT NULL"));
//! ```

pub mod array;
pub mod builder;
pub mod column;
pub mod column_type;
pub mod condition;
pub mod error;
pub mod expression;
pub mod quote;
pub mod types;
pub mod value;

pub use array::ArrayValue;
pub use builder::{CommandBuilder, ForeignKeyAction, TableColumn};
pub use column::Column;
pub use column_type::{Category, ColumnType};
pub use condition::Condition;
pub use error::{QueryError, Result};
pub use expression::{
    ArrayExpression, ArrayExpressionBuilder, BuiltExpression, Expression, ExpressionBuilder,
    ExpressionRegistry, ARRAY_EXPRESSION_CLASS,
};
pub use quote::Quoter;
pub use types::TypeMap;
pub use value::Value;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::array::ArrayValue;
    pub use crate::builder::{CommandBuilder, ForeignKeyAction, TableColumn};
    pub use crate::column::Column;
    pub use crate::column_type::{Category, ColumnType};
    pub use crate::condition::Condition;
    pub use crate::error::{QueryError, Result};
    pub use crate::expression::{
        ArrayExpression, BuiltExpression, Expression, ExpressionBuilder, ExpressionRegistry,
    };
    pub use crate::quote::{Quoter, COLUMN_PREFIX, COLUMN_SUFFIX, TABLE_PREFIX, TABLE_SUFFIX};
    pub use crate::types::TypeMap;
    pub use crate::value::Value;
}
