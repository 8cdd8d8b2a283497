//! Pluggable value expressions.
//!
//! An [`Expression`] carries a class tag; the [`ExpressionRegistry`] maps
//! each tag to the [`ExpressionBuilder`] that renders it. The registry is an
//! explicit object: build one, wrap it in an `Arc` and hand it to every
//! [`CommandBuilder`](crate::CommandBuilder) that needs it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{QueryError, Result};
use crate::value::Value;

/// Class tag of [`ArrayExpression`].
pub const ARRAY_EXPRESSION_CLASS: &str = "Mysql::ArrayExpress";

/// A value expression rendered by a registered builder.
pub trait Expression: fmt::Debug + Send + Sync {
    /// The class tag used to find the builder.
    fn class(&self) -> &str;

    /// Upcast for builders that need the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Renders one class of [`Expression`].
pub trait ExpressionBuilder: Send + Sync {
    /// The class tag this builder handles.
    fn class(&self) -> &str;

    /// Renders `expression`, binding the extra `params`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ExpressionMismatch`] if `expression` is not of
    /// the builder's class.
    fn build(&self, expression: &dyn Expression, params: &[Value]) -> Result<BuiltExpression>;
}

/// Output of an expression builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltExpression {
    /// SQL text, possibly with `?` placeholders.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub params: Vec<Value>,
}

impl BuiltExpression {
    /// Returns the SQL with every `?` placeholder replaced by the literal of
    /// the matching parameter.
    ///
    /// Placeholders inside single-quoted strings are left alone. Surplus
    /// placeholders are kept as-is.
    #[must_use]
    pub fn interpolate(&self) -> String {
        if self.params.is_empty() {
            return self.sql.clone();
        }
        let mut params = self.params.iter();
        let mut out = String::with_capacity(self.sql.len());
        let mut quoted = false;
        for c in self.sql.chars() {
            match c {
                '\'' => {
                    quoted = !quoted;
                    out.push(c);
                }
                '?' if !quoted => match params.next() {
                    Some(value) => out.push_str(&value.to_sql_literal()),
                    None => out.push(c),
                },
                _ => out.push(c),
            }
        }
        out
    }
}

/// A list of values rendered as a comma-joined array.
///
/// Used for `IN (...)` lists and `VALUES (...)` rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayExpression {
    values: Vec<Value>,
    bind: bool,
}

impl ArrayExpression {
    /// Creates an expression that renders its values as literals.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            bind: false,
        }
    }

    /// Creates an expression that renders `?` placeholders and returns its
    /// values as parameters.
    #[must_use]
    pub const fn bound(values: Vec<Value>) -> Self {
        Self { values, bind: true }
    }

    /// Returns the values held by the expression.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns true if the expression binds its values.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.bind
    }
}

impl Expression for ArrayExpression {
    fn class(&self) -> &str {
        ARRAY_EXPRESSION_CLASS
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builder for [`ArrayExpression`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayExpressionBuilder;

impl ExpressionBuilder for ArrayExpressionBuilder {
    fn class(&self) -> &str {
        ARRAY_EXPRESSION_CLASS
    }

    fn build(&self, expression: &dyn Expression, params: &[Value]) -> Result<BuiltExpression> {
        let array = expression
            .as_any()
            .downcast_ref::<ArrayExpression>()
            .ok_or_else(|| QueryError::ExpressionMismatch {
                expected: ARRAY_EXPRESSION_CLASS.to_string(),
                actual: expression.class().to_string(),
            })?;

        let values: Vec<Value> = array
            .values
            .iter()
            .chain(params)
            .flat_map(|v| match v {
                Value::List(items) => items.clone(),
                other => vec![other.clone()],
            })
            .collect();

        if array.bind {
            let sql = vec!["?"; values.len()].join(", ");
            Ok(BuiltExpression {
                sql,
                params: values,
            })
        } else {
            let sql = values
                .iter()
                .map(Value::to_sql_literal)
                .collect::<Vec<_>>()
                .join(", ");
            Ok(BuiltExpression {
                sql,
                params: Vec::new(),
            })
        }
    }
}

/// Class-tag keyed registry of expression builders.
#[derive(Default)]
pub struct ExpressionRegistry {
    builders: Mutex<HashMap<String, Arc<dyn ExpressionBuilder>>>,
}

impl fmt::Debug for ExpressionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let builders = self.builders.lock().unwrap_or_else(PoisonError::into_inner);
        let mut classes: Vec<&String> = builders.keys().collect();
        classes.sort();
        f.debug_struct("ExpressionRegistry")
            .field("classes", &classes)
            .finish()
    }
}

impl ExpressionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the shipped builders registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let mut builders = registry
            .builders
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        builders.insert(
            ARRAY_EXPRESSION_CLASS.to_string(),
            Arc::new(ArrayExpressionBuilder),
        );
        drop(builders);
        registry
    }

    /// Registers a builder under its class tag.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::DuplicateExpressionBuilder`] if the class is
    /// already registered. The existing builder is kept.
    pub fn register(&self, builder: Arc<dyn ExpressionBuilder>) -> Result<()> {
        let class = builder.class().to_string();
        let mut builders = self.builders.lock().unwrap_or_else(PoisonError::into_inner);
        if builders.contains_key(&class) {
            return Err(QueryError::DuplicateExpressionBuilder(class));
        }
        tracing::debug!(class = %class, "registered expression builder");
        builders.insert(class, builder);
        Ok(())
    }

    /// Returns true if a builder is registered for `class`.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.builders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(class)
    }

    /// Renders an expression with the builder registered for its class.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownExpression`] if no builder handles the
    /// expression's class, or whatever the builder itself reports.
    pub fn build(&self, expression: &dyn Expression, params: &[Value]) -> Result<BuiltExpression> {
        let builder = self
            .builders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(expression.class())
            .cloned()
            .ok_or_else(|| QueryError::UnknownExpression(expression.class().to_string()))?;
        builder.build(expression, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Raw(&'static str);

    impl Expression for Raw {
        fn class(&self) -> &str {
            "Raw"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct RawBuilder;

    impl ExpressionBuilder for RawBuilder {
        fn class(&self) -> &str {
            "Raw"
        }

        fn build(&self, expression: &dyn Expression, _params: &[Value]) -> Result<BuiltExpression> {
            let raw = expression.as_any().downcast_ref::<Raw>().ok_or_else(|| {
                QueryError::ExpressionMismatch {
                    expected: "Raw".to_string(),
                    actual: expression.class().to_string(),
                }
            })?;
            Ok(BuiltExpression {
                sql: raw.0.to_string(),
                params: Vec::new(),
            })
        }
    }

    #[test]
    fn test_array_literals() {
        let registry = ExpressionRegistry::with_defaults();
        let expr = ArrayExpression::new(vec![Value::from(1_i64), Value::from("a'b")]);
        let built = registry.build(&expr, &[]).unwrap();
        assert_eq!(built.sql, "1, 'a''b'");
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_array_binding_appends_params() {
        let registry = ExpressionRegistry::with_defaults();
        let expr = ArrayExpression::bound(vec![Value::from(1_i64)]);
        let built = registry.build(&expr, &[Value::from(2_i64), Value::from(3_i64)]).unwrap();
        assert_eq!(built.sql, "?, ?, ?");
        assert_eq!(built.params.len(), 3);
        assert_eq!(built.interpolate(), "1, 2, 3");
    }

    #[test]
    fn test_register_is_exactly_once() {
        let registry = ExpressionRegistry::new();
        registry.register(Arc::new(RawBuilder)).unwrap();
        let err = registry.register(Arc::new(RawBuilder)).unwrap_err();
        assert!(matches!(err, QueryError::DuplicateExpressionBuilder(c) if c == "Raw"));
        assert_eq!(registry.build(&Raw("x > 1"), &[]).unwrap().sql, "x > 1");
    }

    #[test]
    fn test_unknown_class() {
        let registry = ExpressionRegistry::new();
        let err = registry.build(&Raw("x"), &[]).unwrap_err();
        assert!(matches!(err, QueryError::UnknownExpression(_)));
        assert!(!registry.contains(ARRAY_EXPRESSION_CLASS));
    }

    #[test]
    fn test_mismatched_builder() {
        let err = ArrayExpressionBuilder.build(&Raw("x"), &[]).unwrap_err();
        assert!(matches!(err, QueryError::ExpressionMismatch { .. }));
    }

    #[test]
    fn test_interpolate_skips_quoted_marks() {
        let built = BuiltExpression {
            sql: "a = ? AND b = '?'".to_string(),
            params: vec![Value::from("x")],
        };
        assert_eq!(built.interpolate(), "a = 'x' AND b = '?'");
    }
}
