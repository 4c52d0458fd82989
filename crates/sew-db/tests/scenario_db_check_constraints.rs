//! Scenario: DB constraints back the row invariants.
//!
//! # Invariant under test
//!
//! Even with application checks bypassed, Postgres refuses:
//!   - an order carrying a workshop while not validated/completed (23514)
//!   - a fabric sub-order with a store but not accepted (23514)
//!   - a second accepted bid on one sub-order (23505)
//!   - an unknown status text (23514)
//!
//! Everything runs inside a rolled-back transaction.
//!
//! DB-backed test. Skips if `SEW_DATABASE_URL` is not set.

use chrono::{Duration, Utc};

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

#[tokio::test]
async fn constraints_reject_broken_rows() -> anyhow::Result<()> {
    let url = match std::env::var(sew_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: SEW_DATABASE_URL not set");
            return Ok(());
        }
    };
    let pool = sew_db::connect(&url, 2).await?;
    sew_db::migrate(&pool).await?;

    let mut tx = pool.begin().await?;

    // -----------------------------------------------------------------------
    // 1. orders: workshop set while pending
    // -----------------------------------------------------------------------
    let err = sqlx::query(
        r#"
        insert into orders (client_id, workshop_id, description, quantity, status, deadline_utc, address)
        values (1, 2, 'shirts', 3, 'pending', $1, 'somewhere')
        "#,
    )
    .bind(Utc::now() + Duration::days(3))
    .execute(&mut *tx)
    .await
    .expect_err("workshop on a pending order must be rejected");
    assert_eq!(sqlstate(&err).as_deref(), Some("23514"), "{err:?}");

    // statement failure aborts the transaction; start a fresh one per attempt
    tx.rollback().await?;
    let mut tx = pool.begin().await?;

    // -----------------------------------------------------------------------
    // 2. fabric_sub_orders: store without acceptance
    // -----------------------------------------------------------------------
    let err = sqlx::query(
        "insert into fabric_sub_orders (workshop_id, fabric_store_id, quantity, status) \
         values (1, 9, 10, 'pending')",
    )
    .execute(&mut *tx)
    .await
    .expect_err("store on a pending sub-order must be rejected");
    assert_eq!(sqlstate(&err).as_deref(), Some("23514"), "{err:?}");

    tx.rollback().await?;
    let mut tx = pool.begin().await?;

    // -----------------------------------------------------------------------
    // 3. fabric_bids: at most one accepted per sub-order
    // -----------------------------------------------------------------------
    let (sub_id,): (i64,) = sqlx::query_as(
        "insert into fabric_sub_orders (workshop_id, quantity) values (1, 10) returning id",
    )
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query(
        "insert into fabric_bids (sub_order_id, fabric_store_id, price_cents, status) \
         values ($1, 7, 100, 'accepted')",
    )
    .bind(sub_id)
    .execute(&mut *tx)
    .await?;
    let err = sqlx::query(
        "insert into fabric_bids (sub_order_id, fabric_store_id, price_cents, status) \
         values ($1, 8, 90, 'accepted')",
    )
    .bind(sub_id)
    .execute(&mut *tx)
    .await
    .expect_err("second accepted bid must be rejected");
    assert_eq!(sqlstate(&err).as_deref(), Some("23505"), "{err:?}");

    tx.rollback().await?;
    let mut tx = pool.begin().await?;

    // -----------------------------------------------------------------------
    // 4. closed enum text
    // -----------------------------------------------------------------------
    let err = sqlx::query(
        "insert into workshop_requests (workshop_id, order_id, status) values (1, 1, 'maybe')",
    )
    .execute(&mut *tx)
    .await
    .expect_err("unknown request status must be rejected");
    assert_eq!(sqlstate(&err).as_deref(), Some("23514"), "{err:?}");

    tx.rollback().await?;
    Ok(())
}
