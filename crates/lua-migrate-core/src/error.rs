//! Error types for statement generation.

use thiserror::Error;

/// Errors raised while building statements.
///
/// Quoting and type resolution never fail; only expression dispatch does.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A builder for this expression class is already registered.
    #[error("expression builder already registered for class '{0}'")]
    DuplicateExpressionBuilder(String),

    /// No builder is registered for this expression class.
    #[error("no expression builder registered for class '{0}'")]
    UnknownExpression(String),

    /// A builder was handed an expression of another class.
    #[error("expression class mismatch: expected '{expected}', got '{actual}'")]
    ExpressionMismatch {
        /// Class the builder handles.
        expected: String,
        /// Class of the expression it received.
        actual: String,
    },
}

/// Result type alias for statement generation.
pub type Result<T> = std::result::Result<T, QueryError>;
