//! Runtime secret resolution.
//!
//! Config YAML stores env var NAMES only (e.g. `database.url_env:
//! "SEW_DATABASE_URL"`). Callers resolve once at startup and pass the result
//! into constructors. Errors name the variable, never its value, and `Debug`
//! output is redacted.

use anyhow::{bail, Result};

/// Postgres connection string read from the environment.
#[derive(Clone)]
pub struct DatabaseUrl {
    /// Env var the value came from.
    pub var_name: String,
    value: String,
}

impl DatabaseUrl {
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseUrl")
            .field("var_name", &self.var_name)
            .field("value", &"<REDACTED>")
            .finish()
    }
}

/// Returns `None` when unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve the database URL named by `var_name`.
pub fn resolve_database_url(var_name: &str) -> Result<DatabaseUrl> {
    let var_name = var_name.trim();
    if var_name.is_empty() {
        bail!("SECRETS_MISSING: database.url_env is empty");
    }
    match resolve_env(var_name) {
        Some(value) => Ok(DatabaseUrl {
            var_name: var_name.to_string(),
            value,
        }),
        None => bail!(
            "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
            var_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_the_value() {
        let url = DatabaseUrl {
            var_name: "SEW_DATABASE_URL".to_string(),
            value: "postgres://sew:hunter2@db/sew".to_string(),
        };
        let dbg = format!("{url:?}");
        assert!(dbg.contains("SEW_DATABASE_URL"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn missing_var_error_names_the_variable() {
        let err = resolve_database_url("SEW_TEST_SURELY_UNSET_DB_URL_4711").unwrap_err();
        assert!(err.to_string().contains("SEW_TEST_SURELY_UNSET_DB_URL_4711"));
    }
}
