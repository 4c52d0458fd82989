//! Postgres-backed [`Ledger`].
//!
//! `transact` opens a transaction, takes `select ... for update` on the scope
//! row (the order, or the sub-order owning a bid), re-reads the children,
//! runs the plan and applies its commands before committing. Concurrent plans
//! on the same scope queue on the row lock.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use sew_schemas::{
    BidFilter, BidId, FabricBid, FabricSubOrder, NewOrder, NewParty, NewSubOrder, Order,
    OrderFilter, OrderId, Party, PartyId, PartyRole, RequestFilter, RequestId, SubOrderFilter,
    SubOrderId, WorkshopRequest,
};
use sew_workflow::ledger::{OrderBook, SubOrderBook};
use sew_workflow::{
    Command, Committed, EntityKind, Ledger, Plan, Scope, Snapshot, Verdict, WorkflowError,
};

use crate::db_error;
use crate::rows::{self, BID_COLS, ORDER_COLS, PARTY_COLS, REQUEST_COLS, SUB_ORDER_COLS};

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn missing(entity: EntityKind, id: i64) -> WorkflowError {
    WorkflowError::not_found(entity, id)
}

fn gone(rows: u64, entity: EntityKind, id: i64) -> Result<(), WorkflowError> {
    if rows == 0 {
        return Err(missing(entity, id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scope loading (inside a transaction)
// ---------------------------------------------------------------------------

async fn lock_order_book(
    conn: &mut PgConnection,
    id: OrderId,
    lock: bool,
) -> Result<OrderBook, WorkflowError> {
    let sql = format!(
        "select {ORDER_COLS} from orders where id = $1{}",
        if lock { " for update" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error(e, "lock order", EntityKind::Order, id.get()))?
        .ok_or_else(|| missing(EntityKind::Order, id.get()))?;
    let order = rows::order(&row)?;

    let sql = format!(
        "select {REQUEST_COLS} from workshop_requests where order_id = $1 \
         order by created_at_utc asc, id asc"
    );
    let requests = sqlx::query(&sql)
        .bind(id.get())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| db_error(e, "load requests", EntityKind::Order, id.get()))?
        .iter()
        .map(rows::request)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OrderBook { order, requests })
}

async fn lock_sub_order_book(
    conn: &mut PgConnection,
    id: SubOrderId,
    lock: bool,
) -> Result<SubOrderBook, WorkflowError> {
    let sql = format!(
        "select {SUB_ORDER_COLS} from fabric_sub_orders where id = $1{}",
        if lock { " for update" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error(e, "lock sub-order", EntityKind::FabricSubOrder, id.get()))?
        .ok_or_else(|| missing(EntityKind::FabricSubOrder, id.get()))?;
    let sub_order = rows::sub_order(&row)?;

    let sql = format!(
        "select {BID_COLS} from fabric_bids where sub_order_id = $1 \
         order by created_at_utc asc, id asc"
    );
    let bids = sqlx::query(&sql)
        .bind(id.get())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| db_error(e, "load bids", EntityKind::FabricSubOrder, id.get()))?
        .iter()
        .map(rows::bid)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SubOrderBook { sub_order, bids })
}

/// The sub-order that owns `bid`.
async fn owner_of_bid(conn: &mut PgConnection, bid: BidId) -> Result<SubOrderId, WorkflowError> {
    let (sub,): (i64,) = sqlx::query_as("select sub_order_id from fabric_bids where id = $1")
        .bind(bid.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error(e, "resolve bid", EntityKind::FabricBid, bid.get()))?
        .ok_or_else(|| missing(EntityKind::FabricBid, bid.get()))?;
    Ok(SubOrderId::new(sub))
}

async fn load(conn: &mut PgConnection, scope: Scope, lock: bool) -> Result<Snapshot, WorkflowError> {
    match scope {
        Scope::Order(id) => lock_order_book(conn, id, lock).await.map(Snapshot::Order),
        Scope::SubOrder(id) => lock_sub_order_book(conn, id, lock)
            .await
            .map(Snapshot::SubOrder),
        Scope::Bid(id) => {
            let sub = owner_of_bid(conn, id).await?;
            lock_sub_order_book(conn, sub, lock)
                .await
                .map(Snapshot::SubOrder)
        }
    }
}

// ---------------------------------------------------------------------------
// Command application
// ---------------------------------------------------------------------------

async fn apply(conn: &mut PgConnection, cmd: Command) -> Result<(), WorkflowError> {
    match cmd {
        Command::PutOrder(o) => {
            let res = sqlx::query(
                r#"
                update orders
                set workshop_id = $2, description = $3, product_id = $4, quantity = $5,
                    status = $6, price_cents = $7, deadline_utc = $8, address = $9
                where id = $1
                "#,
            )
            .bind(o.id.get())
            .bind(o.workshop.map(|w| w.get()))
            .bind(&o.description)
            .bind(o.product.map(|p| p.get()))
            .bind(o.quantity)
            .bind(o.status.as_str())
            .bind(o.price_cents)
            .bind(o.deadline_utc)
            .bind(&o.address)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error(e, "put order", EntityKind::Order, o.id.get()))?;
            gone(res.rows_affected(), EntityKind::Order, o.id.get())
        }
        Command::InsertRequest { workshop, order } => {
            sqlx::query("insert into workshop_requests (workshop_id, order_id) values ($1, $2)")
                .bind(workshop.get())
                .bind(order.get())
                .execute(&mut *conn)
                .await
                .map_err(|e| db_error(e, "insert request", EntityKind::WorkshopRequest, 0))?;
            Ok(())
        }
        Command::PutRequest(r) => {
            let res = sqlx::query("update workshop_requests set status = $2 where id = $1")
                .bind(r.id.get())
                .bind(r.status.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    db_error(e, "put request", EntityKind::WorkshopRequest, r.id.get())
                })?;
            gone(res.rows_affected(), EntityKind::WorkshopRequest, r.id.get())
        }
        Command::DeleteRequestsForOrder(order) => {
            sqlx::query("delete from workshop_requests where order_id = $1")
                .bind(order.get())
                .execute(&mut *conn)
                .await
                .map_err(|e| db_error(e, "delete requests", EntityKind::Order, order.get()))?;
            Ok(())
        }
        Command::PutSubOrder(s) => {
            let res = sqlx::query(
                r#"
                update fabric_sub_orders
                set fabric_store_id = $2, quantity = $3, material = $4, status = $5
                where id = $1
                "#,
            )
            .bind(s.id.get())
            .bind(s.fabric_store.map(|f| f.get()))
            .bind(s.quantity)
            .bind(s.material.as_str())
            .bind(s.status.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error(e, "put sub-order", EntityKind::FabricSubOrder, s.id.get()))?;
            gone(res.rows_affected(), EntityKind::FabricSubOrder, s.id.get())
        }
        Command::InsertBid {
            sub_order,
            fabric_store,
            price_cents,
        } => {
            sqlx::query(
                "insert into fabric_bids (sub_order_id, fabric_store_id, price_cents) \
                 values ($1, $2, $3)",
            )
            .bind(sub_order.get())
            .bind(fabric_store.get())
            .bind(price_cents)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error(e, "insert bid", EntityKind::FabricBid, 0))?;
            Ok(())
        }
        Command::PutBid(b) => {
            let res = sqlx::query("update fabric_bids set price_cents = $2, status = $3 where id = $1")
                .bind(b.id.get())
                .bind(b.price_cents)
                .bind(b.status.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|e| db_error(e, "put bid", EntityKind::FabricBid, b.id.get()))?;
            gone(res.rows_affected(), EntityKind::FabricBid, b.id.get())
        }
    }
}

fn storage(what: &str) -> impl FnOnce(sqlx::Error) -> WorkflowError + '_ {
    move |e| WorkflowError::Storage(format!("{what} failed: {e}"))
}

#[async_trait]
impl Ledger for PgLedger {
    // -- party registry ------------------------------------------------------

    async fn insert_party(&self, new: &NewParty) -> Result<Party, WorkflowError> {
        let sql = format!(
            "insert into parties (role, name, email, phone, address, store_name, notes, capacity) \
             values ($1, $2, $3, $4, $5, $6, $7, $8) returning {PARTY_COLS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.role.as_str())
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.phone)
            .bind(&new.address)
            .bind(&new.store_name)
            .bind(&new.notes)
            .bind(new.capacity)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(e, "insert_party", EntityKind::Party, 0))?;
        rows::party(&row)
    }

    async fn fetch_party(&self, id: PartyId) -> Result<Party, WorkflowError> {
        let sql = format!("select {PARTY_COLS} from parties where id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("fetch_party"))?
            .ok_or_else(|| missing(EntityKind::Party, id.get()))?;
        rows::party(&row)
    }

    async fn list_parties(&self, role: Option<PartyRole>) -> Result<Vec<Party>, WorkflowError> {
        let sql = format!(
            "select {PARTY_COLS} from parties where ($1::text is null or role = $1) order by id"
        );
        sqlx::query(&sql)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(storage("list_parties"))?
            .iter()
            .map(rows::party)
            .collect()
    }

    async fn save_party(&self, p: &Party) -> Result<(), WorkflowError> {
        let res = sqlx::query(
            r#"
            update parties
            set name = $2, email = $3, phone = $4, address = $5, store_name = $6,
                notes = $7, capacity = $8
            where id = $1
            "#,
        )
        .bind(p.id.get())
        .bind(&p.name)
        .bind(&p.email)
        .bind(&p.phone)
        .bind(&p.address)
        .bind(&p.store_name)
        .bind(&p.notes)
        .bind(p.capacity)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error(e, "save_party", EntityKind::Party, p.id.get()))?;
        gone(res.rows_affected(), EntityKind::Party, p.id.get())
    }

    async fn delete_party(&self, id: PartyId) -> Result<(), WorkflowError> {
        let res = sqlx::query("delete from parties where id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(storage("delete_party"))?;
        gone(res.rows_affected(), EntityKind::Party, id.get())
    }

    // -- orders ---------------------------------------------------------------

    async fn insert_order(&self, new: &NewOrder) -> Result<Order, WorkflowError> {
        let sql = format!(
            "insert into orders (client_id, description, product_id, quantity, price_cents, \
             deadline_utc, address) values ($1, $2, $3, $4, $5, $6, $7) returning {ORDER_COLS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.client.get())
            .bind(&new.description)
            .bind(new.product.map(|p| p.get()))
            .bind(new.quantity)
            .bind(new.price_cents)
            .bind(new.deadline_utc)
            .bind(&new.address)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(e, "insert_order", EntityKind::Order, 0))?;
        rows::order(&row)
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Order, WorkflowError> {
        let sql = format!("select {ORDER_COLS} from orders where id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("fetch_order"))?
            .ok_or_else(|| missing(EntityKind::Order, id.get()))?;
        rows::order(&row)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, WorkflowError> {
        let sql = format!(
            r#"
            select {ORDER_COLS} from orders
            where ($1::bigint is null or client_id = $1)
              and ($2::bigint is null or workshop_id = $2)
              and ($3::text is null or status = $3)
            order by id
            "#
        );
        sqlx::query(&sql)
            .bind(filter.client.map(|c| c.get()))
            .bind(filter.workshop.map(|w| w.get()))
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(storage("list_orders"))?
            .iter()
            .map(rows::order)
            .collect()
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), WorkflowError> {
        let res = sqlx::query("delete from orders where id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(storage("delete_order"))?;
        gone(res.rows_affected(), EntityKind::Order, id.get())
    }

    // -- workshop requests ----------------------------------------------------

    async fn fetch_request(&self, id: RequestId) -> Result<WorkshopRequest, WorkflowError> {
        let sql = format!("select {REQUEST_COLS} from workshop_requests where id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("fetch_request"))?
            .ok_or_else(|| missing(EntityKind::WorkshopRequest, id.get()))?;
        rows::request(&row)
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<WorkshopRequest>, WorkflowError> {
        let sql = format!(
            r#"
            select {REQUEST_COLS} from workshop_requests
            where ($1::bigint is null or order_id = $1)
              and ($2::bigint is null or workshop_id = $2)
              and ($3::text is null or status = $3)
            order by created_at_utc asc, id asc
            "#
        );
        sqlx::query(&sql)
            .bind(filter.order.map(|o| o.get()))
            .bind(filter.workshop.map(|w| w.get()))
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(storage("list_requests"))?
            .iter()
            .map(rows::request)
            .collect()
    }

    async fn delete_request(&self, id: RequestId) -> Result<(), WorkflowError> {
        let res = sqlx::query("delete from workshop_requests where id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(storage("delete_request"))?;
        gone(res.rows_affected(), EntityKind::WorkshopRequest, id.get())
    }

    // -- fabric sub-orders ----------------------------------------------------

    async fn insert_sub_order(&self, new: &NewSubOrder) -> Result<FabricSubOrder, WorkflowError> {
        let sql = format!(
            "insert into fabric_sub_orders (workshop_id, quantity, material) \
             values ($1, $2, $3) returning {SUB_ORDER_COLS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.workshop.get())
            .bind(new.quantity)
            .bind(new.material.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(e, "insert_sub_order", EntityKind::FabricSubOrder, 0))?;
        rows::sub_order(&row)
    }

    async fn fetch_sub_order(&self, id: SubOrderId) -> Result<FabricSubOrder, WorkflowError> {
        let sql = format!("select {SUB_ORDER_COLS} from fabric_sub_orders where id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("fetch_sub_order"))?
            .ok_or_else(|| missing(EntityKind::FabricSubOrder, id.get()))?;
        rows::sub_order(&row)
    }

    async fn list_sub_orders(
        &self,
        filter: &SubOrderFilter,
    ) -> Result<Vec<FabricSubOrder>, WorkflowError> {
        let sql = format!(
            r#"
            select {SUB_ORDER_COLS} from fabric_sub_orders
            where ($1::bigint is null or workshop_id = $1)
              and ($2::bigint is null or fabric_store_id = $2)
              and ($3::text is null or status = $3)
            order by id
            "#
        );
        sqlx::query(&sql)
            .bind(filter.workshop.map(|w| w.get()))
            .bind(filter.fabric_store.map(|f| f.get()))
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(storage("list_sub_orders"))?
            .iter()
            .map(rows::sub_order)
            .collect()
    }

    async fn delete_sub_order(&self, id: SubOrderId) -> Result<(), WorkflowError> {
        // fabric_bids.sub_order_id cascades
        let res = sqlx::query("delete from fabric_sub_orders where id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(storage("delete_sub_order"))?;
        gone(res.rows_affected(), EntityKind::FabricSubOrder, id.get())
    }

    // -- fabric bids ----------------------------------------------------------

    async fn fetch_bid(&self, id: BidId) -> Result<FabricBid, WorkflowError> {
        let sql = format!("select {BID_COLS} from fabric_bids where id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("fetch_bid"))?
            .ok_or_else(|| missing(EntityKind::FabricBid, id.get()))?;
        rows::bid(&row)
    }

    async fn list_bids(&self, filter: &BidFilter) -> Result<Vec<FabricBid>, WorkflowError> {
        let sql = format!(
            r#"
            select {BID_COLS} from fabric_bids
            where ($1::bigint is null or sub_order_id = $1)
              and ($2::bigint is null or fabric_store_id = $2)
              and ($3::text is null or status = $3)
            order by created_at_utc asc, id asc
            "#
        );
        sqlx::query(&sql)
            .bind(filter.sub_order.map(|s| s.get()))
            .bind(filter.fabric_store.map(|f| f.get()))
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(storage("list_bids"))?
            .iter()
            .map(rows::bid)
            .collect()
    }

    async fn delete_bid(&self, id: BidId) -> Result<(), WorkflowError> {
        let res = sqlx::query("delete from fabric_bids where id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(storage("delete_bid"))?;
        gone(res.rows_affected(), EntityKind::FabricBid, id.get())
    }

    // -- atomic read-plan-write -----------------------------------------------

    async fn transact<'a>(&self, scope: Scope, plan: Plan<'a>) -> Result<Committed, WorkflowError> {
        let mut tx = self.pool.begin().await.map_err(storage("begin"))?;

        // Dropping `tx` on any early return rolls back.
        let before = load(&mut *tx, scope, true).await?;
        match plan(&before)? {
            Verdict::Refuse(refusal) => {
                tx.rollback().await.map_err(storage("rollback"))?;
                Ok(Committed {
                    refusal: Some(refusal),
                    after: before,
                })
            }
            Verdict::Apply(commands) => {
                let n = commands.len();
                for cmd in commands {
                    apply(&mut *tx, cmd).await?;
                }
                let rescope = match &before {
                    Snapshot::SubOrder(b) => Scope::SubOrder(b.sub_order.id),
                    Snapshot::Order(b) => Scope::Order(b.order.id),
                };
                let after = load(&mut *tx, rescope, false).await?;
                tx.commit().await.map_err(storage("commit"))?;
                debug!(?scope, commands = n, "ledger/commit");
                Ok(Committed {
                    refusal: None,
                    after,
                })
            }
        }
    }
}
