//! Row decoding. Enum columns are stored as their canonical text spelling.

use sqlx::postgres::{PgRow, Postgres};
use sqlx::Row;
use std::str::FromStr;

use sew_schemas::{
    FabricBid, FabricSubOrder, Order, Party, UnknownVariant, WorkshopRequest,
};
use sew_workflow::WorkflowError;

pub(crate) const PARTY_COLS: &str =
    "id, role, name, email, phone, address, store_name, notes, capacity, created_at_utc";
pub(crate) const ORDER_COLS: &str = "id, client_id, workshop_id, description, product_id, \
     quantity, status, price_cents, deadline_utc, address, created_at_utc";
pub(crate) const REQUEST_COLS: &str = "id, workshop_id, order_id, status, created_at_utc";
pub(crate) const SUB_ORDER_COLS: &str =
    "id, workshop_id, fabric_store_id, quantity, material, status, created_at_utc";
pub(crate) const BID_COLS: &str =
    "id, sub_order_id, fabric_store_id, price_cents, status, created_at_utc";

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T, WorkflowError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| WorkflowError::Storage(format!("decode column {name}: {e}")))
}

fn text<T>(row: &PgRow, name: &str) -> Result<T, WorkflowError>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|e: UnknownVariant| WorkflowError::Storage(format!("column {name}: {e}")))
}

pub(crate) fn party(row: &PgRow) -> Result<Party, WorkflowError> {
    Ok(Party {
        id: col::<i64>(row, "id")?.into(),
        role: text(row, "role")?,
        name: col(row, "name")?,
        email: col(row, "email")?,
        phone: col(row, "phone")?,
        address: col(row, "address")?,
        store_name: col(row, "store_name")?,
        notes: col(row, "notes")?,
        capacity: col(row, "capacity")?,
        created_at_utc: col(row, "created_at_utc")?,
    })
}

pub(crate) fn order(row: &PgRow) -> Result<Order, WorkflowError> {
    Ok(Order {
        id: col::<i64>(row, "id")?.into(),
        client: col::<i64>(row, "client_id")?.into(),
        workshop: col::<Option<i64>>(row, "workshop_id")?.map(Into::into),
        description: col(row, "description")?,
        product: col::<Option<i64>>(row, "product_id")?.map(Into::into),
        quantity: col(row, "quantity")?,
        status: text(row, "status")?,
        price_cents: col(row, "price_cents")?,
        deadline_utc: col(row, "deadline_utc")?,
        address: col(row, "address")?,
        created_at_utc: col(row, "created_at_utc")?,
    })
}

pub(crate) fn request(row: &PgRow) -> Result<WorkshopRequest, WorkflowError> {
    Ok(WorkshopRequest {
        id: col::<i64>(row, "id")?.into(),
        workshop: col::<i64>(row, "workshop_id")?.into(),
        order: col::<i64>(row, "order_id")?.into(),
        status: text(row, "status")?,
        created_at_utc: col(row, "created_at_utc")?,
    })
}

pub(crate) fn sub_order(row: &PgRow) -> Result<FabricSubOrder, WorkflowError> {
    Ok(FabricSubOrder {
        id: col::<i64>(row, "id")?.into(),
        workshop: col::<i64>(row, "workshop_id")?.into(),
        fabric_store: col::<Option<i64>>(row, "fabric_store_id")?.map(Into::into),
        quantity: col(row, "quantity")?,
        material: text(row, "material")?,
        status: text(row, "status")?,
        created_at_utc: col(row, "created_at_utc")?,
    })
}

pub(crate) fn bid(row: &PgRow) -> Result<FabricBid, WorkflowError> {
    Ok(FabricBid {
        id: col::<i64>(row, "id")?.into(),
        sub_order: col::<i64>(row, "sub_order_id")?.into(),
        fabric_store: col::<i64>(row, "fabric_store_id")?.into(),
        price_cents: col(row, "price_cents")?,
        status: text(row, "status")?,
        created_at_utc: col(row, "created_at_utc")?,
    })
}
