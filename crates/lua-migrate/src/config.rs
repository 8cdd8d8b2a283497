//! Per-connection configuration.
//!
//! Options are read through a lookup function so that tests can supply a
//! map; [`ConnectionOption::from_env`] reads the process environment. For a
//! connection named `audit` the keys are:
//!
//! | Key                                    | Field          |
//! |----------------------------------------|----------------|
//! | `AUDIT_SOURCE`                         | `source`       |
//! | `AUDIT_DB_CONN` or `AUDIT_CONN_URL`    | `conn_url`     |
//! | `AUDIT_TABLE_PREFIX`                   | `table_prefix` |
//! | `AUDIT_TABLE_SUFFIX`                   | `table_suffix` |
//! | `AUDIT_EXTRAS`                         | `properties`   |

use std::collections::BTreeMap;

use lua_migrate_core::quote::{Quoter, TABLE_PREFIX, TABLE_SUFFIX};
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Configuration of one named connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOption {
    /// Connection name as given by the script.
    pub name: String,
    /// Migration source locator, e.g. `lua://migrations`.
    pub source: String,
    /// Database connection URL.
    pub conn_url: String,
    /// Table name prefix substituted for a leading `%`.
    pub table_prefix: String,
    /// Table name suffix substituted for a trailing `%`.
    pub table_suffix: String,
    /// Extra string properties, including quoting overrides.
    pub properties: BTreeMap<String, String>,
}

impl ConnectionOption {
    /// Resolves the options of `name` through `lookup`.
    pub fn from_lookup<F>(name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = name.trim().to_ascii_uppercase();
        let get = |suffix: &str| {
            lookup(&format!("{prefix}_{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            name: name.to_string(),
            source: get("SOURCE").unwrap_or_default(),
            conn_url: get("DB_CONN").or_else(|| get("CONN_URL")).unwrap_or_default(),
            table_prefix: get("TABLE_PREFIX").unwrap_or_default(),
            table_suffix: get("TABLE_SUFFIX").unwrap_or_default(),
            properties: get("EXTRAS").map(|raw| parse_extras(&raw)).unwrap_or_default(),
        }
    }

    /// Resolves the options of `name` from the process environment.
    #[must_use]
    pub fn from_env(name: &str) -> Self {
        Self::from_lookup(name, |key| std::env::var(key).ok())
    }

    /// Checks that a connection can be built from these options.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Configuration`] if no connection URL is set.
    pub fn validate(&self) -> Result<()> {
        if self.conn_url.is_empty() {
            return Err(MigrateError::Configuration(format!(
                "connection '{}' has no URL (set {}_DB_CONN or {}_CONN_URL)",
                self.name,
                self.name.to_ascii_uppercase(),
                self.name.to_ascii_uppercase()
            )));
        }
        Ok(())
    }

    /// Builds the identifier quoter for this connection.
    ///
    /// Properties are passed through, so `tableMap.<name>` and
    /// `columnMap.<name>` overrides can be given in `EXTRAS`. The prefix and
    /// suffix fields win over properties of the same key.
    #[must_use]
    pub fn quoter(&self) -> Quoter {
        let mut quoter = Quoter::with_options(
            self.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        if !self.table_prefix.is_empty() {
            quoter = quoter.option(TABLE_PREFIX, self.table_prefix.as_str());
        }
        if !self.table_suffix.is_empty() {
            quoter = quoter.option(TABLE_SUFFIX, self.table_suffix.as_str());
        }
        quoter
    }
}

/// Parses an `EXTRAS` value.
///
/// A JSON object is tried first; non-string JSON values keep their JSON
/// text. Otherwise the value is read as a `key=value&key2=value2` query
/// string, joining repeated keys with commas. Anything else is empty.
#[must_use]
pub fn parse_extras(raw: &str) -> BTreeMap<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return BTreeMap::new();
    }

    if let Ok(object) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
        return object
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();
    }

    if !raw.contains('=') {
        return BTreeMap::new();
    }
    let Ok(pairs) = serde_urlencoded::from_str::<Vec<(String, String)>>(raw) else {
        return BTreeMap::new();
    };

    let mut properties: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in pairs.into_iter().filter(|(k, _)| !k.is_empty()) {
        properties
            .entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    properties
}
