//! Named connections.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use lua_migrate_core::{CommandBuilder, ExpressionRegistry};
use tracing::info;

use crate::config::ConnectionOption;
use crate::error::Result;

/// Name of the connection used when a script does not pick one.
pub const DEFAULT_CONNECTION: &str = "default";

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// A resolved connection: its options and the statement builder bound to
/// its prefix and suffix.
#[derive(Debug)]
pub struct Connection {
    name: String,
    option: ConnectionOption,
    builder: CommandBuilder,
}

impl Connection {
    /// Returns the connection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved options.
    #[must_use]
    pub const fn option(&self) -> &ConnectionOption {
        &self.option
    }

    /// Returns the statement builder.
    #[must_use]
    pub const fn builder(&self) -> &CommandBuilder {
        &self.builder
    }
}

/// Creates each named connection at most once and caches it.
pub struct ConnectionRegistry {
    lookup: Box<Lookup>,
    expressions: Arc<ExpressionRegistry>,
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connections = self.connections.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = connections.keys().collect();
        names.sort();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &names)
            .field("expressions", &self.expressions)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Creates a registry resolving options through `lookup`.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
            expressions: Arc::new(ExpressionRegistry::with_defaults()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry resolving options from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Shares an expression registry with every connection's builder.
    #[must_use]
    pub fn with_expressions(mut self, expressions: Arc<ExpressionRegistry>) -> Self {
        self.expressions = expressions;
        self
    }

    /// Returns the expression registry shared by all builders.
    #[must_use]
    pub const fn expressions(&self) -> &Arc<ExpressionRegistry> {
        &self.expressions
    }

    /// Resolves the options of `name` without validating or caching them.
    #[must_use]
    pub fn option(&self, name: &str) -> ConnectionOption {
        ConnectionOption::from_lookup(name, |key| (self.lookup)(key))
    }

    /// Returns the connection named `name`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the connection has no URL. Failed
    /// resolutions are not cached.
    pub fn get(&self, name: &str) -> Result<Arc<Connection>> {
        if let Some(connection) = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(connection));
        }

        let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(connection) = connections.get(name) {
            return Ok(Arc::clone(connection));
        }

        let option = self.option(name);
        option.validate()?;
        let builder = CommandBuilder::new(option.quoter()).with_expressions(Arc::clone(&self.expressions));
        let connection = Arc::new(Connection {
            name: name.to_string(),
            option,
            builder,
        });
        info!(connection = %name, "connection resolved");
        connections.insert(name.to_string(), Arc::clone(&connection));
        Ok(connection)
    }

    /// Returns the names of the connections created so far.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
