//! Storage seam for the workflow core.
//!
//! Plain reads, inserts and deletes are single-row operations. Anything that
//! reads state and then writes depending on it goes through
//! [`Ledger::transact`]: the backend locks the scope row, hands an immutable
//! [`Snapshot`] to the plan, applies the returned [`Command`]s and commits,
//! all as one unit. Two plans on the same scope never interleave.

use async_trait::async_trait;
use sew_schemas::{
    BidFilter, BidId, FabricBid, FabricStoreId, FabricSubOrder, NewOrder, NewParty, NewSubOrder,
    Order, OrderFilter, OrderId, Party, PartyId, PartyRole, RequestFilter, RequestId,
    SubOrderFilter, SubOrderId, WorkshopId, WorkshopRequest,
};

use crate::{Refusal, WorkflowError};

/// Row that [`Ledger::transact`] locks before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Order(OrderId),
    SubOrder(SubOrderId),
    /// Resolves to the owning sub-order.
    Bid(BidId),
}

/// An order together with every request that references it, oldest first
/// by `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBook {
    pub order: Order,
    pub requests: Vec<WorkshopRequest>,
}

/// A sub-order together with its bids, oldest first by `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubOrderBook {
    pub sub_order: FabricSubOrder,
    pub bids: Vec<FabricBid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Order(OrderBook),
    SubOrder(SubOrderBook),
}

impl Snapshot {
    pub fn order_book(&self) -> Option<&OrderBook> {
        match self {
            Snapshot::Order(b) => Some(b),
            Snapshot::SubOrder(_) => None,
        }
    }

    pub fn sub_order_book(&self) -> Option<&SubOrderBook> {
        match self {
            Snapshot::SubOrder(b) => Some(b),
            Snapshot::Order(_) => None,
        }
    }
}

/// Side effect requested by a transition. `Put*` overwrites the mutable
/// columns of an existing row with the given value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PutOrder(Order),
    InsertRequest {
        workshop: WorkshopId,
        order: OrderId,
    },
    PutRequest(WorkshopRequest),
    DeleteRequestsForOrder(OrderId),
    PutSubOrder(FabricSubOrder),
    InsertBid {
        sub_order: SubOrderId,
        fabric_store: FabricStoreId,
        price_cents: i64,
    },
    PutBid(FabricBid),
}

/// What a plan decided after looking at the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Apply(Vec<Command>),
    Refuse(Refusal),
}

pub type Plan<'a> = Box<dyn FnOnce(&Snapshot) -> Result<Verdict, WorkflowError> + Send + 'a>;

/// Result of a committed [`Ledger::transact`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// `Some` when the plan refused; the ledger was not touched.
    pub refusal: Option<Refusal>,
    /// The scope re-read after the commands were applied.
    pub after: Snapshot,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    // -- party registry ------------------------------------------------------

    async fn insert_party(&self, new: &NewParty) -> Result<Party, WorkflowError>;
    async fn fetch_party(&self, id: PartyId) -> Result<Party, WorkflowError>;
    async fn list_parties(&self, role: Option<PartyRole>) -> Result<Vec<Party>, WorkflowError>;
    async fn save_party(&self, party: &Party) -> Result<(), WorkflowError>;
    async fn delete_party(&self, id: PartyId) -> Result<(), WorkflowError>;

    // -- orders ---------------------------------------------------------------

    /// Inserts in `in_progress` with no workshop.
    async fn insert_order(&self, new: &NewOrder) -> Result<Order, WorkflowError>;
    async fn fetch_order(&self, id: OrderId) -> Result<Order, WorkflowError>;
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, WorkflowError>;
    /// Does not touch requests that reference the order.
    async fn delete_order(&self, id: OrderId) -> Result<(), WorkflowError>;

    // -- workshop requests ----------------------------------------------------

    async fn fetch_request(&self, id: RequestId) -> Result<WorkshopRequest, WorkflowError>;
    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<WorkshopRequest>, WorkflowError>;
    async fn delete_request(&self, id: RequestId) -> Result<(), WorkflowError>;

    // -- fabric sub-orders ----------------------------------------------------

    /// Inserts in `pending` with no fabric store.
    async fn insert_sub_order(&self, new: &NewSubOrder) -> Result<FabricSubOrder, WorkflowError>;
    async fn fetch_sub_order(&self, id: SubOrderId) -> Result<FabricSubOrder, WorkflowError>;
    async fn list_sub_orders(
        &self,
        filter: &SubOrderFilter,
    ) -> Result<Vec<FabricSubOrder>, WorkflowError>;
    /// Cascades to the sub-order's bids.
    async fn delete_sub_order(&self, id: SubOrderId) -> Result<(), WorkflowError>;

    // -- fabric bids ----------------------------------------------------------

    async fn fetch_bid(&self, id: BidId) -> Result<FabricBid, WorkflowError>;
    async fn list_bids(&self, filter: &BidFilter) -> Result<Vec<FabricBid>, WorkflowError>;
    async fn delete_bid(&self, id: BidId) -> Result<(), WorkflowError>;

    // -- atomic read-plan-write -----------------------------------------------

    /// Lock `scope`, run `plan` on its snapshot, apply the verdict, commit.
    ///
    /// A missing scope row is `NotFound`. An `Err` from the plan aborts
    /// without writing anything.
    async fn transact<'a>(&self, scope: Scope, plan: Plan<'a>) -> Result<Committed, WorkflowError>;
}
