//! In-process ledger.
//!
//! Every table lives behind one `tokio::sync::Mutex`, so a `transact` plan
//! sees a consistent snapshot and no other call can run until its commands
//! are applied. Ids are assigned from per-table counters starting at 1.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use sew_schemas::{
    BidFilter, BidId, FabricBid, FabricSubOrder, NewOrder, NewParty, NewSubOrder, Order,
    OrderFilter, OrderId, OrderStatus, Party, PartyId, PartyRole, ProposalStatus, RequestFilter,
    RequestId, SubOrderFilter, SubOrderId, WorkshopRequest,
};

use crate::ledger::{
    Command, Committed, Ledger, OrderBook, Plan, Scope, Snapshot, SubOrderBook, Verdict,
};
use crate::{EntityKind, WorkflowError};

#[derive(Debug, Clone, Default)]
struct Tables {
    parties: BTreeMap<i64, Party>,
    orders: BTreeMap<i64, Order>,
    requests: BTreeMap<i64, WorkshopRequest>,
    sub_orders: BTreeMap<i64, FabricSubOrder>,
    bids: BTreeMap<i64, FabricBid>,
    next_party: i64,
    next_order: i64,
    next_request: i64,
    next_sub_order: i64,
    next_bid: i64,
}

fn bump(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn order_book(&self, id: OrderId) -> Result<OrderBook, WorkflowError> {
        let order = self
            .orders
            .get(&id.get())
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(EntityKind::Order, id.get()))?;
        let mut requests: Vec<_> = self
            .requests
            .values()
            .filter(|r| r.order == id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| (r.created_at_utc, r.id));
        Ok(OrderBook { order, requests })
    }

    fn sub_order_book(&self, id: SubOrderId) -> Result<SubOrderBook, WorkflowError> {
        let sub_order = self
            .sub_orders
            .get(&id.get())
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(EntityKind::FabricSubOrder, id.get()))?;
        let mut bids: Vec<_> = self
            .bids
            .values()
            .filter(|b| b.sub_order == id)
            .cloned()
            .collect();
        bids.sort_by_key(|b| (b.created_at_utc, b.id));
        Ok(SubOrderBook { sub_order, bids })
    }

    fn snapshot(&self, scope: Scope) -> Result<Snapshot, WorkflowError> {
        match scope {
            Scope::Order(id) => self.order_book(id).map(Snapshot::Order),
            Scope::SubOrder(id) => self.sub_order_book(id).map(Snapshot::SubOrder),
            Scope::Bid(id) => {
                let bid = self
                    .bids
                    .get(&id.get())
                    .ok_or_else(|| WorkflowError::not_found(EntityKind::FabricBid, id.get()))?;
                self.sub_order_book(bid.sub_order).map(Snapshot::SubOrder)
            }
        }
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.parties
            .values()
            .any(|p| Some(p.id.get()) != except && p.email.eq_ignore_ascii_case(email))
    }

    fn apply(&mut self, cmd: Command) -> Result<(), WorkflowError> {
        match cmd {
            Command::PutOrder(o) => {
                let slot = self
                    .orders
                    .get_mut(&o.id.get())
                    .ok_or_else(|| WorkflowError::not_found(EntityKind::Order, o.id.get()))?;
                *slot = o;
            }
            Command::InsertRequest { workshop, order } => {
                let id = bump(&mut self.next_request);
                self.requests.insert(
                    id,
                    WorkshopRequest {
                        id: RequestId::new(id),
                        workshop,
                        order,
                        status: ProposalStatus::Pending,
                        created_at_utc: Utc::now(),
                    },
                );
            }
            Command::PutRequest(r) => {
                let slot = self.requests.get_mut(&r.id.get()).ok_or_else(|| {
                    WorkflowError::not_found(EntityKind::WorkshopRequest, r.id.get())
                })?;
                *slot = r;
            }
            Command::DeleteRequestsForOrder(order) => {
                self.requests.retain(|_, r| r.order != order);
            }
            Command::PutSubOrder(s) => {
                let slot = self.sub_orders.get_mut(&s.id.get()).ok_or_else(|| {
                    WorkflowError::not_found(EntityKind::FabricSubOrder, s.id.get())
                })?;
                *slot = s;
            }
            Command::InsertBid {
                sub_order,
                fabric_store,
                price_cents,
            } => {
                let id = bump(&mut self.next_bid);
                self.bids.insert(
                    id,
                    FabricBid {
                        id: BidId::new(id),
                        sub_order,
                        fabric_store,
                        price_cents,
                        status: ProposalStatus::Pending,
                        created_at_utc: Utc::now(),
                    },
                );
            }
            Command::PutBid(b) => {
                let slot = self
                    .bids
                    .get_mut(&b.id.get())
                    .ok_or_else(|| WorkflowError::not_found(EntityKind::FabricBid, b.id.get()))?;
                *slot = b;
            }
        }
        Ok(())
    }
}

/// [`Ledger`] kept entirely in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    tables: Mutex<Tables>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn insert_party(&self, new: &NewParty) -> Result<Party, WorkflowError> {
        let mut t = self.tables.lock().await;
        if t.email_taken(&new.email, None) {
            return Err(WorkflowError::validation(format!(
                "email already registered: {}",
                new.email
            )));
        }
        let id = bump(&mut t.next_party);
        let party = Party {
            id: PartyId::new(id),
            role: new.role,
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            address: new.address.clone(),
            store_name: new.store_name.clone(),
            notes: new.notes.clone(),
            capacity: new.capacity,
            created_at_utc: Utc::now(),
        };
        t.parties.insert(id, party.clone());
        Ok(party)
    }

    async fn fetch_party(&self, id: PartyId) -> Result<Party, WorkflowError> {
        let t = self.tables.lock().await;
        t.parties
            .get(&id.get())
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(EntityKind::Party, id.get()))
    }

    async fn list_parties(&self, role: Option<PartyRole>) -> Result<Vec<Party>, WorkflowError> {
        let t = self.tables.lock().await;
        Ok(t.parties
            .values()
            .filter(|p| role.map_or(true, |r| p.role == r))
            .cloned()
            .collect())
    }

    async fn save_party(&self, party: &Party) -> Result<(), WorkflowError> {
        let mut t = self.tables.lock().await;
        if !t.parties.contains_key(&party.id.get()) {
            return Err(WorkflowError::not_found(EntityKind::Party, party.id.get()));
        }
        if t.email_taken(&party.email, Some(party.id.get())) {
            return Err(WorkflowError::validation(format!(
                "email already registered: {}",
                party.email
            )));
        }
        t.parties.insert(party.id.get(), party.clone());
        Ok(())
    }

    async fn delete_party(&self, id: PartyId) -> Result<(), WorkflowError> {
        let mut t = self.tables.lock().await;
        t.parties
            .remove(&id.get())
            .map(|_| ())
            .ok_or_else(|| WorkflowError::not_found(EntityKind::Party, id.get()))
    }

    async fn insert_order(&self, new: &NewOrder) -> Result<Order, WorkflowError> {
        let mut t = self.tables.lock().await;
        let id = bump(&mut t.next_order);
        let order = Order {
            id: OrderId::new(id),
            client: new.client,
            workshop: None,
            description: new.description.clone(),
            product: new.product,
            quantity: new.quantity,
            status: OrderStatus::InProgress,
            price_cents: new.price_cents,
            deadline_utc: new.deadline_utc,
            address: new.address.clone(),
            created_at_utc: Utc::now(),
        };
        t.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Order, WorkflowError> {
        let t = self.tables.lock().await;
        t.orders
            .get(&id.get())
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(EntityKind::Order, id.get()))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, WorkflowError> {
        let t = self.tables.lock().await;
        Ok(t.orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), WorkflowError> {
        let mut t = self.tables.lock().await;
        t.orders
            .remove(&id.get())
            .map(|_| ())
            .ok_or_else(|| WorkflowError::not_found(EntityKind::Order, id.get()))
    }

    async fn fetch_request(&self, id: RequestId) -> Result<WorkshopRequest, WorkflowError> {
        let t = self.tables.lock().await;
        t.requests
            .get(&id.get())
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(EntityKind::WorkshopRequest, id.get()))
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<WorkshopRequest>, WorkflowError> {
        let t = self.tables.lock().await;
        let mut out: Vec<_> = t
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.created_at_utc, r.id));
        Ok(out)
    }

    async fn delete_request(&self, id: RequestId) -> Result<(), WorkflowError> {
        let mut t = self.tables.lock().await;
        t.requests
            .remove(&id.get())
            .map(|_| ())
            .ok_or_else(|| WorkflowError::not_found(EntityKind::WorkshopRequest, id.get()))
    }

    async fn insert_sub_order(&self, new: &NewSubOrder) -> Result<FabricSubOrder, WorkflowError> {
        let mut t = self.tables.lock().await;
        let id = bump(&mut t.next_sub_order);
        let sub = FabricSubOrder {
            id: SubOrderId::new(id),
            workshop: new.workshop,
            fabric_store: None,
            quantity: new.quantity,
            material: new.material,
            status: ProposalStatus::Pending,
            created_at_utc: Utc::now(),
        };
        t.sub_orders.insert(id, sub.clone());
        Ok(sub)
    }

    async fn fetch_sub_order(&self, id: SubOrderId) -> Result<FabricSubOrder, WorkflowError> {
        let t = self.tables.lock().await;
        t.sub_orders
            .get(&id.get())
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(EntityKind::FabricSubOrder, id.get()))
    }

    async fn list_sub_orders(
        &self,
        filter: &SubOrderFilter,
    ) -> Result<Vec<FabricSubOrder>, WorkflowError> {
        let t = self.tables.lock().await;
        Ok(t.sub_orders
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn delete_sub_order(&self, id: SubOrderId) -> Result<(), WorkflowError> {
        let mut t = self.tables.lock().await;
        if t.sub_orders.remove(&id.get()).is_none() {
            return Err(WorkflowError::not_found(EntityKind::FabricSubOrder, id.get()));
        }
        t.bids.retain(|_, b| b.sub_order != id);
        Ok(())
    }

    async fn fetch_bid(&self, id: BidId) -> Result<FabricBid, WorkflowError> {
        let t = self.tables.lock().await;
        t.bids
            .get(&id.get())
            .cloned()
            .ok_or_else(|| WorkflowError::not_found(EntityKind::FabricBid, id.get()))
    }

    async fn list_bids(&self, filter: &BidFilter) -> Result<Vec<FabricBid>, WorkflowError> {
        let t = self.tables.lock().await;
        let mut out: Vec<_> = t
            .bids
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        out.sort_by_key(|b| (b.created_at_utc, b.id));
        Ok(out)
    }

    async fn delete_bid(&self, id: BidId) -> Result<(), WorkflowError> {
        let mut t = self.tables.lock().await;
        t.bids
            .remove(&id.get())
            .map(|_| ())
            .ok_or_else(|| WorkflowError::not_found(EntityKind::FabricBid, id.get()))
    }

    async fn transact<'a>(&self, scope: Scope, plan: Plan<'a>) -> Result<Committed, WorkflowError> {
        let mut t = self.tables.lock().await;
        let before = t.snapshot(scope)?;

        match plan(&before)? {
            Verdict::Refuse(refusal) => Ok(Committed {
                refusal: Some(refusal),
                after: before,
            }),
            Verdict::Apply(commands) => {
                // Stage on a copy so a failing command leaves nothing behind.
                let mut staged = t.clone();
                for cmd in commands {
                    staged.apply(cmd)?;
                }
                let after = staged.snapshot(resolve(scope, &before))?;
                *t = staged;
                Ok(Committed {
                    refusal: None,
                    after,
                })
            }
        }
    }
}

/// A bid scope may be deleted by its own plan's sibling commands; re-read via
/// the owning sub-order instead.
fn resolve(scope: Scope, before: &Snapshot) -> Scope {
    match (scope, before) {
        (Scope::Bid(_), Snapshot::SubOrder(b)) => Scope::SubOrder(b.sub_order.id),
        _ => scope,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sew_schemas::{ClientId, FabricStoreId, MaterialKind, WorkshopId};

    fn new_order() -> NewOrder {
        NewOrder {
            client: ClientId::new(1),
            description: "aprons".to_string(),
            quantity: 12,
            deadline_utc: Utc::now() + Duration::days(30),
            address: "1 rue Neuve".to_string(),
            product: None,
            price_cents: None,
        }
    }

    fn new_party(email: &str) -> NewParty {
        NewParty {
            role: PartyRole::Workshop,
            name: "Atelier".to_string(),
            email: email.to_string(),
            phone: None,
            address: None,
            store_name: None,
            notes: None,
            capacity: None,
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_per_table() {
        let l = MemoryLedger::new();
        let a = l.insert_order(&new_order()).await.unwrap();
        let b = l.insert_order(&new_order()).await.unwrap();
        assert_eq!(a.id, OrderId::new(1));
        assert_eq!(b.id, OrderId::new(2));
        assert_eq!(a.status, OrderStatus::InProgress);
        assert!(a.workshop.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_validation_error() {
        let l = MemoryLedger::new();
        l.insert_party(&new_party("a@x.io")).await.unwrap();
        let err = l.insert_party(&new_party("A@X.io")).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn deleting_a_sub_order_cascades_to_bids_only() {
        let l = MemoryLedger::new();
        let s = l
            .insert_sub_order(&NewSubOrder {
                workshop: WorkshopId::new(2),
                quantity: 5,
                material: MaterialKind::Silk,
            })
            .await
            .unwrap();
        l.transact(
            Scope::SubOrder(s.id),
            Box::new(move |_: &Snapshot| {
                Ok(Verdict::Apply(vec![Command::InsertBid {
                    sub_order: s.id,
                    fabric_store: FabricStoreId::new(3),
                    price_cents: 400,
                }]))
            }),
        )
        .await
        .unwrap();
        assert_eq!(l.list_bids(&BidFilter::default()).await.unwrap().len(), 1);

        l.delete_sub_order(s.id).await.unwrap();
        assert!(l.list_bids(&BidFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_delete_leaves_requests() {
        let l = MemoryLedger::new();
        let o = l.insert_order(&new_order()).await.unwrap();
        l.transact(
            Scope::Order(o.id),
            Box::new(move |_: &Snapshot| {
                Ok(Verdict::Apply(vec![Command::InsertRequest {
                    workshop: WorkshopId::new(9),
                    order: o.id,
                }]))
            }),
        )
        .await
        .unwrap();
        l.delete_order(o.id).await.unwrap();
        let left = l.list_requests(&RequestFilter::default()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].order, o.id);
    }

    #[tokio::test]
    async fn failing_command_rolls_back_the_whole_plan() {
        let l = MemoryLedger::new();
        let o = l.insert_order(&new_order()).await.unwrap();
        let ghost = WorkshopRequest {
            id: RequestId::new(77),
            workshop: WorkshopId::new(1),
            order: o.id,
            status: ProposalStatus::Accepted,
            created_at_utc: Utc::now(),
        };
        let err = l
            .transact(
                Scope::Order(o.id),
                Box::new(move |_: &Snapshot| {
                    Ok(Verdict::Apply(vec![
                        Command::InsertRequest {
                            workshop: WorkshopId::new(9),
                            order: o.id,
                        },
                        Command::PutRequest(ghost),
                    ]))
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
        assert!(l
            .list_requests(&RequestFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn missing_scope_is_not_found() {
        let l = MemoryLedger::new();
        let err = l
            .transact(
                Scope::Bid(BidId::new(4)),
                Box::new(|_: &Snapshot| Ok(Verdict::Apply(vec![]))),
            )
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::not_found(EntityKind::FabricBid, 4));
    }
}
