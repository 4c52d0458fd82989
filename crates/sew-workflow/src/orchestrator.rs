//! Public operations of the marketplace workflow.
//!
//! The orchestrator holds no state of its own. Single-row reads and writes go
//! straight to the ledger; every read-then-write transition is planned by a
//! pure function from [`crate::transitions`] and executed through
//! [`Ledger::transact`], so the scope row stays locked for the whole step.

use tracing::{info, warn};

use sew_schemas::{
    BidFilter, BidId, ClientId, FabricBid, FabricStoreId, FabricSubOrder, NewBid, NewOrder,
    NewParty, NewSubOrder, Order, OrderFilter, OrderId, OrderPatch, Party, PartyId, PartyPatch,
    PartyRole, ProposalStatus, RequestFilter, RequestId, SubOrderFilter, SubOrderId,
    SubOrderPatch, WorkshopId, WorkshopRequest,
};

use crate::ledger::{Ledger, Scope, Snapshot, Verdict};
use crate::transitions::{self, Transition};
use crate::{
    validate, Assignment, BidAcceptance, EntityKind, Outcome, Reset, SubOrderResolution,
    WorkflowError,
};

fn storage_gap(what: &str) -> WorkflowError {
    WorkflowError::Storage(format!("{what}: committed plan left no trace"))
}

fn order_book(snap: &Snapshot) -> Result<&crate::ledger::OrderBook, WorkflowError> {
    snap.order_book()
        .ok_or_else(|| WorkflowError::Storage("expected an order snapshot".to_string()))
}

fn sub_order_book(snap: &Snapshot) -> Result<&crate::ledger::SubOrderBook, WorkflowError> {
    snap.sub_order_book()
        .ok_or_else(|| WorkflowError::Storage("expected a sub-order snapshot".to_string()))
}

pub struct Orchestrator<L: Ledger> {
    ledger: L,
}

impl<L: Ledger> Orchestrator<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Lock `scope`, run `decide` against it and commit what it asks for.
    ///
    /// Returns the transition value (or the refusal) together with the scope
    /// as re-read after the commit.
    async fn run<T, F>(
        &self,
        scope: Scope,
        decide: F,
    ) -> Result<(Outcome<T>, Snapshot), WorkflowError>
    where
        T: Send,
        F: FnOnce(&Snapshot) -> Result<Outcome<Transition<T>>, WorkflowError> + Send,
    {
        let mut slot: Option<T> = None;
        let out = &mut slot;
        let committed = self
            .ledger
            .transact(
                scope,
                Box::new(move |snap: &Snapshot| match decide(snap)? {
                    Outcome::Applied(tr) => {
                        *out = Some(tr.value);
                        Ok(Verdict::Apply(tr.commands))
                    }
                    Outcome::Refused(r) => Ok(Verdict::Refuse(r)),
                }),
            )
            .await?;

        match (committed.refusal, slot) {
            (Some(r), _) => Ok((Outcome::Refused(r), committed.after)),
            (None, Some(v)) => Ok((Outcome::Applied(v), committed.after)),
            (None, None) => Err(storage_gap("transition")),
        }
    }

    async fn party_as(
        &self,
        id: PartyId,
        role: PartyRole,
        entity: EntityKind,
    ) -> Result<Party, WorkflowError> {
        match self.ledger.fetch_party(id).await {
            Ok(p) if p.role == role => Ok(p),
            Ok(_) | Err(WorkflowError::NotFound { .. }) => {
                Err(WorkflowError::not_found(entity, id.get()))
            }
            Err(e) => Err(e),
        }
    }

    async fn client(&self, id: ClientId) -> Result<Party, WorkflowError> {
        self.party_as(id.into(), PartyRole::Client, EntityKind::Client)
            .await
    }

    async fn workshop(&self, id: WorkshopId) -> Result<Party, WorkflowError> {
        self.party_as(id.into(), PartyRole::Workshop, EntityKind::Workshop)
            .await
    }

    async fn fabric_store(&self, id: FabricStoreId) -> Result<Party, WorkflowError> {
        self.party_as(id.into(), PartyRole::FabricStore, EntityKind::FabricStore)
            .await
    }

    // -----------------------------------------------------------------------
    // Party registry
    // -----------------------------------------------------------------------

    pub async fn register_party(&self, new: NewParty) -> Result<Party, WorkflowError> {
        validate::new_party(&new)?;
        let party = self.ledger.insert_party(&new).await?;
        info!(party = %party.id, role = %party.role, "party/register");
        Ok(party)
    }

    pub async fn party(&self, id: PartyId) -> Result<Party, WorkflowError> {
        self.ledger.fetch_party(id).await
    }

    pub async fn parties(&self, role: Option<PartyRole>) -> Result<Vec<Party>, WorkflowError> {
        self.ledger.list_parties(role).await
    }

    pub async fn update_party(&self, id: PartyId, patch: PartyPatch) -> Result<Party, WorkflowError> {
        let mut p = self.ledger.fetch_party(id).await?;
        if let Some(v) = patch.name {
            p.name = v;
        }
        if let Some(v) = patch.email {
            p.email = v;
        }
        if let Some(v) = patch.phone {
            p.phone = v;
        }
        if let Some(v) = patch.address {
            p.address = v;
        }
        if let Some(v) = patch.store_name {
            p.store_name = v;
        }
        if let Some(v) = patch.notes {
            p.notes = v;
        }
        if let Some(v) = patch.capacity {
            p.capacity = v;
        }
        validate::party(&p)?;
        self.ledger.save_party(&p).await?;
        info!(party = %p.id, "party/update");
        Ok(p)
    }

    /// Rows that still reference the party are left alone.
    pub async fn remove_party(&self, id: PartyId) -> Result<(), WorkflowError> {
        self.ledger.delete_party(id).await?;
        info!(party = %id, "party/remove");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub async fn create_order(&self, new: NewOrder) -> Result<Order, WorkflowError> {
        validate::new_order(&new)?;
        self.client(new.client).await?;
        let order = self.ledger.insert_order(&new).await?;
        info!(order = %order.id, client = %order.client, "order/create");
        Ok(order)
    }

    pub async fn order(&self, id: OrderId) -> Result<Order, WorkflowError> {
        self.ledger.fetch_order(id).await
    }

    pub async fn orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, WorkflowError> {
        self.ledger.list_orders(filter).await
    }

    /// Direct edit. Status may jump anywhere as long as the workshop pairing
    /// still holds afterwards.
    pub async fn update_order(&self, id: OrderId, patch: OrderPatch) -> Result<Order, WorkflowError> {
        if let Some(Some(w)) = patch.workshop {
            self.workshop(w).await?;
        }
        let (out, _) = self
            .run(Scope::Order(id), move |snap| {
                transitions::edit_order(order_book(snap)?, &patch).map(Outcome::Applied)
            })
            .await?;
        let order = out.into_applied().ok_or_else(|| storage_gap("order/update"))?;
        info!(order = %order.id, status = %order.status, "order/update");
        Ok(order)
    }

    pub async fn delete_order(&self, id: OrderId) -> Result<(), WorkflowError> {
        self.ledger.delete_order(id).await?;
        info!(order = %id, "order/delete");
        Ok(())
    }

    /// `validated` → `completed`.
    pub async fn complete_order(&self, id: OrderId) -> Result<Outcome<Order>, WorkflowError> {
        let (out, _) = self
            .run(Scope::Order(id), |snap| Ok(transitions::complete(order_book(snap)?)))
            .await?;
        match &out {
            Outcome::Applied(o) => info!(order = %o.id, "order/complete"),
            Outcome::Refused(r) => warn!(order = %id, reason = %r, "order/complete refused"),
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Workshop requests
    // -----------------------------------------------------------------------

    pub async fn create_workshop_request(
        &self,
        workshop: WorkshopId,
        order: OrderId,
    ) -> Result<Outcome<WorkshopRequest>, WorkflowError> {
        self.workshop(workshop).await?;
        let (out, after) = self
            .run(Scope::Order(order), move |snap| {
                transitions::request_workshop(order_book(snap)?, workshop)
            })
            .await?;

        match out {
            Outcome::Refused(r) => {
                warn!(order = %order, workshop = %workshop, reason = %r, "request/create refused");
                Ok(Outcome::Refused(r))
            }
            Outcome::Applied(()) => {
                let req = order_book(&after)?
                    .requests
                    .iter()
                    .filter(|r| r.workshop == workshop && r.status == ProposalStatus::Pending)
                    .max_by_key(|r| r.id)
                    .cloned()
                    .ok_or_else(|| storage_gap("request/create"))?;
                info!(request = %req.id, order = %order, workshop = %workshop, "request/create");
                Ok(Outcome::Applied(req))
            }
        }
    }

    pub async fn request(&self, id: RequestId) -> Result<WorkshopRequest, WorkflowError> {
        self.ledger.fetch_request(id).await
    }

    pub async fn requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<WorkshopRequest>, WorkflowError> {
        self.ledger.list_requests(filter).await
    }

    pub async fn delete_workshop_request(&self, id: RequestId) -> Result<(), WorkflowError> {
        self.ledger.delete_request(id).await?;
        info!(request = %id, "request/delete");
        Ok(())
    }

    /// First come, first served: the oldest pending request gets the order.
    pub async fn assign_first_pending_workshop(
        &self,
        order: OrderId,
    ) -> Result<Outcome<Assignment>, WorkflowError> {
        let (out, _) = self
            .run(Scope::Order(order), |snap| {
                Ok(transitions::assign_first_pending(order_book(snap)?))
            })
            .await?;
        match &out {
            Outcome::Applied(a) => info!(
                order = %order,
                workshop = %a.request.workshop,
                request = %a.request.id,
                rejected = a.rejected_siblings.len(),
                "order/assign"
            ),
            Outcome::Refused(r) => warn!(order = %order, reason = %r, "order/assign refused"),
        }
        Ok(out)
    }

    /// The assigned workshop declined: wipe every request for the order and
    /// put it back in the pool.
    pub async fn reset_order_on_refusal(&self, order: OrderId) -> Result<Reset, WorkflowError> {
        let (out, _) = self
            .run(Scope::Order(order), |snap| {
                Ok(Outcome::Applied(transitions::reset_on_refusal(order_book(
                    snap,
                )?)))
            })
            .await?;
        let reset = out.into_applied().ok_or_else(|| storage_gap("order/reset"))?;
        info!(
            order = %order,
            deleted = reset.deleted_requests.len(),
            "order/reset"
        );
        Ok(reset)
    }

    // -----------------------------------------------------------------------
    // Fabric sub-orders
    // -----------------------------------------------------------------------

    pub async fn create_fabric_sub_order(
        &self,
        new: NewSubOrder,
    ) -> Result<FabricSubOrder, WorkflowError> {
        validate::new_sub_order(&new)?;
        self.workshop(new.workshop).await?;
        let sub = self.ledger.insert_sub_order(&new).await?;
        info!(sub_order = %sub.id, workshop = %sub.workshop, material = %sub.material, "sub_order/create");
        Ok(sub)
    }

    pub async fn sub_order(&self, id: SubOrderId) -> Result<FabricSubOrder, WorkflowError> {
        self.ledger.fetch_sub_order(id).await
    }

    pub async fn sub_orders(
        &self,
        filter: &SubOrderFilter,
    ) -> Result<Vec<FabricSubOrder>, WorkflowError> {
        self.ledger.list_sub_orders(filter).await
    }

    pub async fn update_sub_order(
        &self,
        id: SubOrderId,
        patch: SubOrderPatch,
    ) -> Result<FabricSubOrder, WorkflowError> {
        let (out, _) = self
            .run(Scope::SubOrder(id), move |snap| {
                transitions::edit_sub_order(sub_order_book(snap)?, &patch).map(Outcome::Applied)
            })
            .await?;
        let sub = out
            .into_applied()
            .ok_or_else(|| storage_gap("sub_order/update"))?;
        info!(sub_order = %sub.id, "sub_order/update");
        Ok(sub)
    }

    /// Removes the sub-order and every bid on it.
    pub async fn delete_sub_order(&self, id: SubOrderId) -> Result<(), WorkflowError> {
        self.ledger.delete_sub_order(id).await?;
        info!(sub_order = %id, "sub_order/delete");
        Ok(())
    }

    pub async fn assign_fabric_store(
        &self,
        id: SubOrderId,
        store: FabricStoreId,
    ) -> Result<Outcome<SubOrderResolution>, WorkflowError> {
        self.fabric_store(store).await?;
        let (out, _) = self
            .run(Scope::SubOrder(id), move |snap| {
                Ok(transitions::assign_store(sub_order_book(snap)?, store))
            })
            .await?;
        match &out {
            Outcome::Applied(res) => info!(
                sub_order = %id,
                fabric_store = %store,
                rejected = res.rejected_bids.len(),
                "sub_order/assign_store"
            ),
            Outcome::Refused(r) => {
                warn!(sub_order = %id, reason = %r, "sub_order/assign_store refused")
            }
        }
        Ok(out)
    }

    /// Always applies; rejecting an already rejected sub-order is a no-op.
    pub async fn reject_fabric_sub_order(
        &self,
        id: SubOrderId,
    ) -> Result<Outcome<SubOrderResolution>, WorkflowError> {
        let (out, _) = self
            .run(Scope::SubOrder(id), |snap| {
                Ok(Outcome::Applied(transitions::reject_sub_order(
                    sub_order_book(snap)?,
                )))
            })
            .await?;
        if let Outcome::Applied(res) = &out {
            info!(sub_order = %id, rejected = res.rejected_bids.len(), "sub_order/reject");
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Fabric bids
    // -----------------------------------------------------------------------

    pub async fn create_fabric_bid(&self, new: NewBid) -> Result<FabricBid, WorkflowError> {
        validate::bid_price(new.price_cents)?;
        self.fabric_store(new.fabric_store).await?;
        let store = new.fabric_store;
        let price = new.price_cents;
        let (out, after) = self
            .run(Scope::SubOrder(new.sub_order), move |snap| {
                transitions::place_bid(sub_order_book(snap)?, store, price).map(Outcome::Applied)
            })
            .await?;
        out.into_applied().ok_or_else(|| storage_gap("bid/create"))?;

        let bid = sub_order_book(&after)?
            .bids
            .iter()
            .filter(|b| b.fabric_store == store && b.status == ProposalStatus::Pending)
            .max_by_key(|b| b.id)
            .cloned()
            .ok_or_else(|| storage_gap("bid/create"))?;
        info!(bid = %bid.id, sub_order = %bid.sub_order, fabric_store = %store, price_cents = price, "bid/create");
        Ok(bid)
    }

    pub async fn bid(&self, id: BidId) -> Result<FabricBid, WorkflowError> {
        self.ledger.fetch_bid(id).await
    }

    pub async fn bids(&self, filter: &BidFilter) -> Result<Vec<FabricBid>, WorkflowError> {
        self.ledger.list_bids(filter).await
    }

    pub async fn update_bid_price(
        &self,
        id: BidId,
        price_cents: i64,
    ) -> Result<FabricBid, WorkflowError> {
        let (out, _) = self
            .run(Scope::Bid(id), move |snap| {
                transitions::reprice_bid(sub_order_book(snap)?, id, price_cents)
                    .map(Outcome::Applied)
            })
            .await?;
        let bid = out.into_applied().ok_or_else(|| storage_gap("bid/update"))?;
        info!(bid = %id, price_cents, "bid/update");
        Ok(bid)
    }

    pub async fn delete_bid(&self, id: BidId) -> Result<(), WorkflowError> {
        self.ledger.delete_bid(id).await?;
        info!(bid = %id, "bid/delete");
        Ok(())
    }

    pub async fn accept_fabric_bid(
        &self,
        id: BidId,
    ) -> Result<Outcome<BidAcceptance>, WorkflowError> {
        let (out, _) = self
            .run(Scope::Bid(id), move |snap| {
                transitions::accept_bid(sub_order_book(snap)?, id)
            })
            .await?;
        match &out {
            Outcome::Applied(acc) => info!(
                bid = %id,
                sub_order = %acc.sub_order.id,
                fabric_store = %acc.bid.fabric_store,
                rejected = acc.rejected_siblings.len(),
                "bid/accept"
            ),
            Outcome::Refused(r) => warn!(bid = %id, reason = %r, "bid/accept refused"),
        }
        Ok(out)
    }

    /// Only the bid changes; the sub-order stays open for other bids.
    pub async fn reject_fabric_bid(&self, id: BidId) -> Result<Outcome<FabricBid>, WorkflowError> {
        let (out, _) = self
            .run(Scope::Bid(id), move |snap| {
                transitions::reject_bid(sub_order_book(snap)?, id)
            })
            .await?;
        match &out {
            Outcome::Applied(_) => info!(bid = %id, "bid/reject"),
            Outcome::Refused(r) => warn!(bid = %id, reason = %r, "bid/reject refused"),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLedger;
    use chrono::{Duration, Utc};
    use sew_schemas::{MaterialKind, OrderStatus};
    use std::sync::Arc;

    fn party(role: PartyRole, email: &str) -> NewParty {
        NewParty {
            role,
            name: email.split('@').next().unwrap_or("x").to_string(),
            email: email.to_string(),
            phone: None,
            address: None,
            store_name: None,
            notes: None,
            capacity: None,
        }
    }

    async fn setup() -> (Orchestrator<MemoryLedger>, ClientId, Vec<WorkshopId>, Order) {
        let o = Orchestrator::new(MemoryLedger::new());
        let client = o
            .register_party(party(PartyRole::Client, "client@example.com"))
            .await
            .unwrap();
        let mut workshops = Vec::new();
        for name in ["a", "b", "c"] {
            let p = o
                .register_party(party(PartyRole::Workshop, &format!("{name}@ateliers.example")))
                .await
                .unwrap();
            workshops.push(WorkshopId::new(p.id.get()));
        }
        let client = ClientId::new(client.id.get());
        let order = o
            .create_order(NewOrder {
                client,
                description: "embroidered caftans".to_string(),
                quantity: 8,
                deadline_utc: Utc::now() + Duration::days(14),
                address: "Derb Sultan, Casablanca".to_string(),
                product: None,
                price_cents: Some(480_000),
            })
            .await
            .unwrap();
        (o, client, workshops, order)
    }

    #[tokio::test]
    async fn first_request_wins_the_order() {
        let (o, _, ws, order) = setup().await;
        let mut reqs = Vec::new();
        for w in &ws {
            reqs.push(
                o.create_workshop_request(*w, order.id)
                    .await
                    .unwrap()
                    .into_applied()
                    .unwrap(),
            );
        }

        let a = o
            .assign_first_pending_workshop(order.id)
            .await
            .unwrap()
            .into_applied()
            .unwrap();
        assert_eq!(a.request.id, reqs[0].id);
        assert_eq!(a.order.workshop, Some(ws[0]));

        let stored = o.order(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Validated);
        for r in &reqs[1..] {
            assert_eq!(
                o.request(r.id).await.unwrap().status,
                ProposalStatus::Rejected
            );
        }
    }

    #[tokio::test]
    async fn wrong_role_reads_as_missing_party() {
        let (o, client, _, order) = setup().await;
        let err = o
            .create_workshop_request(WorkshopId::new(client.get()), order.id)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::not_found(EntityKind::Workshop, client.get())
        );
    }

    #[tokio::test]
    async fn concurrent_assignment_has_one_winner() {
        let (o, _, ws, order) = setup().await;
        for w in &ws {
            o.create_workshop_request(*w, order.id).await.unwrap();
        }
        let o = Arc::new(o);
        let id = order.id;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let o = o.clone();
            handles.push(tokio::spawn(async move {
                o.assign_first_pending_workshop(id).await
            }));
        }
        let mut applied = 0;
        for h in handles {
            match h.await.unwrap().unwrap() {
                Outcome::Applied(_) => applied += 1,
                Outcome::Refused(r) => assert!(matches!(
                    r,
                    crate::Refusal::OrderAlreadyAssigned { .. }
                )),
            }
        }
        assert_eq!(applied, 1);
        let accepted = o
            .requests(&RequestFilter {
                order: Some(order.id),
                status: Some(ProposalStatus::Accepted),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn bid_flow_against_sub_order() {
        let (o, _, ws, _) = setup().await;
        let store = o
            .register_party(party(PartyRole::FabricStore, "tissus@souk.example"))
            .await
            .unwrap();
        let store = FabricStoreId::new(store.id.get());
        let sub = o
            .create_fabric_sub_order(NewSubOrder {
                workshop: ws[1],
                quantity: 40,
                material: MaterialKind::Silk,
            })
            .await
            .unwrap();
        let bid = o
            .create_fabric_bid(NewBid {
                sub_order: sub.id,
                fabric_store: store,
                price_cents: 12_500,
            })
            .await
            .unwrap();
        assert_eq!(bid.status, ProposalStatus::Pending);

        let acc = o
            .accept_fabric_bid(bid.id)
            .await
            .unwrap()
            .into_applied()
            .unwrap();
        assert_eq!(acc.sub_order.fabric_store, Some(store));
        assert_eq!(
            o.sub_order(sub.id).await.unwrap().status,
            ProposalStatus::Accepted
        );

        let err = o
            .create_fabric_bid(NewBid {
                sub_order: sub.id,
                fabric_store: store,
                price_cents: 9_000,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidState);
    }
}
