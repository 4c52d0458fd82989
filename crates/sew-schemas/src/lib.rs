//! Row types shared by the workflow core, the ledgers and the CLI.
//!
//! No business logic lives here beyond small predicates on single values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod ids;
mod status;

pub use ids::{
    BidId, ClientId, FabricStoreId, OrderId, PartyId, ProductId, RequestId, SubOrderId, WorkshopId,
};
pub use status::{MaterialKind, OrderStatus, PartyRole, ProposalStatus, UnknownVariant};

// ---------------------------------------------------------------------------
// Party registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub role: PartyRole,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub store_name: Option<String>,
    /// Free text: business info, workshop specialization or materials on hand.
    pub notes: Option<String>,
    /// Workshops only: how many pieces they can take on at once.
    pub capacity: Option<i32>,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParty {
    pub role: PartyRole,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub store_name: Option<String>,
    pub notes: Option<String>,
    pub capacity: Option<i32>,
}

/// Field-level edit of a registry row. `None` leaves the field untouched;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub store_name: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub capacity: Option<Option<i32>>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client: ClientId,
    pub workshop: Option<WorkshopId>,
    pub description: String,
    pub product: Option<ProductId>,
    pub quantity: i32,
    pub status: OrderStatus,
    pub price_cents: Option<i64>,
    pub deadline_utc: DateTime<Utc>,
    pub address: String,
    pub created_at_utc: DateTime<Utc>,
}

impl Order {
    /// workshop set <=> status in {validated, completed}
    pub fn workshop_matches_status(&self) -> bool {
        self.workshop.is_some() == self.status.requires_workshop()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub client: ClientId,
    pub description: String,
    pub quantity: i32,
    pub deadline_utc: DateTime<Utc>,
    pub address: String,
    pub product: Option<ProductId>,
    pub price_cents: Option<i64>,
}

/// Direct edit of an order row.
///
/// `status` may be set to anything; the edited row must still keep the
/// workshop/status pairing. `workshop: Some(None)` detaches the workshop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub description: Option<String>,
    pub quantity: Option<i32>,
    pub deadline_utc: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub product: Option<Option<ProductId>>,
    pub price_cents: Option<Option<i64>>,
    pub status: Option<OrderStatus>,
    pub workshop: Option<Option<WorkshopId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub client: Option<ClientId>,
    pub workshop: Option<WorkshopId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, o: &Order) -> bool {
        self.client.map_or(true, |c| o.client == c)
            && self.workshop.map_or(true, |w| o.workshop == Some(w))
            && self.status.map_or(true, |s| o.status == s)
    }
}

// ---------------------------------------------------------------------------
// Workshop requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopRequest {
    pub id: RequestId,
    pub workshop: WorkshopId,
    pub order: OrderId,
    pub status: ProposalStatus,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub order: Option<OrderId>,
    pub workshop: Option<WorkshopId>,
    pub status: Option<ProposalStatus>,
}

impl RequestFilter {
    pub fn matches(&self, r: &WorkshopRequest) -> bool {
        self.order.map_or(true, |o| r.order == o)
            && self.workshop.map_or(true, |w| r.workshop == w)
            && self.status.map_or(true, |s| r.status == s)
    }
}

// ---------------------------------------------------------------------------
// Fabric sub-orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricSubOrder {
    pub id: SubOrderId,
    pub workshop: WorkshopId,
    pub fabric_store: Option<FabricStoreId>,
    pub quantity: i32,
    pub material: MaterialKind,
    pub status: ProposalStatus,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubOrder {
    pub workshop: WorkshopId,
    pub quantity: i32,
    #[serde(default)]
    pub material: MaterialKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubOrderPatch {
    pub quantity: Option<i32>,
    pub material: Option<MaterialKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubOrderFilter {
    pub workshop: Option<WorkshopId>,
    pub fabric_store: Option<FabricStoreId>,
    pub status: Option<ProposalStatus>,
}

impl SubOrderFilter {
    pub fn matches(&self, s: &FabricSubOrder) -> bool {
        self.workshop.map_or(true, |w| s.workshop == w)
            && self.fabric_store.map_or(true, |f| s.fabric_store == Some(f))
            && self.status.map_or(true, |st| s.status == st)
    }
}

// ---------------------------------------------------------------------------
// Fabric bids
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricBid {
    pub id: BidId,
    pub sub_order: SubOrderId,
    pub fabric_store: FabricStoreId,
    pub price_cents: i64,
    pub status: ProposalStatus,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBid {
    pub sub_order: SubOrderId,
    pub fabric_store: FabricStoreId,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidFilter {
    pub sub_order: Option<SubOrderId>,
    pub fabric_store: Option<FabricStoreId>,
    pub status: Option<ProposalStatus>,
}

impl BidFilter {
    pub fn matches(&self, b: &FabricBid) -> bool {
        self.sub_order.map_or(true, |s| b.sub_order == s)
            && self.fabric_store.map_or(true, |f| b.fabric_store == f)
            && self.status.map_or(true, |st| b.status == st)
    }
}
