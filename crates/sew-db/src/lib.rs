use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sew_workflow::{EntityKind, WorkflowError};

mod ledger;
mod rows;

pub use ledger::PgLedger;
pub use sqlx::PgPool;

pub const ENV_DB_URL: &str = "SEW_DATABASE_URL";

/// Connect to Postgres using SEW_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 10).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_orders_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

// ---------------------------------------------------------------------------
// sqlx::Error -> WorkflowError
// ---------------------------------------------------------------------------

/// Postgres unique_violation.
const SQLSTATE_UNIQUE: &str = "23505";
/// Postgres check_violation.
const SQLSTATE_CHECK: &str = "23514";

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

/// Classify a driver error for the row (`entity`, `id`) the statement touched.
///
/// Unique violations are caller mistakes (`Validation`); check violations
/// mean the write would break a row invariant (`InvalidState`); everything
/// else is a `Storage` failure carrying `what` as context.
pub(crate) fn db_error(err: sqlx::Error, what: &str, entity: EntityKind, id: i64) -> WorkflowError {
    match sqlstate(&err).as_deref() {
        Some(SQLSTATE_UNIQUE) => WorkflowError::validation(format!(
            "{what}: duplicate value ({})",
            constraint(&err).unwrap_or("unique")
        )),
        Some(SQLSTATE_CHECK) => WorkflowError::invalid_state(
            entity,
            id,
            format!("{what}: violates {}", constraint(&err).unwrap_or("check")),
        ),
        _ => WorkflowError::Storage(format!("{what} failed: {err}")),
    }
}
