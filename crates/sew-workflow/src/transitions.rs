//! Pure transition functions.
//!
//! Each function takes an immutable snapshot of one scope (an order with its
//! requests, or a sub-order with its bids) and decides. Nothing here touches
//! storage: the result is the new value plus the [`Command`]s that persist it,
//! or a [`Refusal`] when the current state does not allow the transition.
//!
//! ```text
//!   request:  pending ──assign (oldest)──► accepted
//!                │  └──assign (sibling)──► rejected
//!                └──────reset────────────► (deleted)
//!
//!   order:    in_progress | pending | refused ──assign──► validated ──complete──► completed
//!             any ──reset──► pending
//!
//!   sub-order / bid:  pending ──accept──► accepted
//!                     pending ──reject──► rejected
//! ```

use sew_schemas::{
    BidId, FabricStoreId, Order, OrderPatch, OrderStatus, ProposalStatus, SubOrderPatch,
    WorkshopId,
};

use crate::ledger::{Command, OrderBook, SubOrderBook};
use crate::{
    validate, Assignment, BidAcceptance, EntityKind, Outcome, Refusal, Reset,
    SubOrderResolution, WorkflowError,
};

/// New value plus the commands that persist it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<T> {
    pub value: T,
    pub commands: Vec<Command>,
}

impl<T> Transition<T> {
    fn new(value: T, commands: Vec<Command>) -> Self {
        Self { value, commands }
    }
}

// ---------------------------------------------------------------------------
// Orders and workshop requests
// ---------------------------------------------------------------------------

/// Accept the oldest pending request and attach its workshop to the order.
///
/// Oldest means smallest `(created_at, id)`. Every other pending request on
/// the order is rejected in the same step so at most one request per order is
/// ever `accepted`; a book that already holds an accepted request is refused.
pub fn assign_first_pending(book: &OrderBook) -> Outcome<Transition<Assignment>> {
    let order = &book.order;
    if let Some(workshop) = order.workshop {
        return Outcome::Refused(Refusal::OrderAlreadyAssigned {
            workshop,
            status: order.status,
        });
    }

    if let Some(held) = book
        .requests
        .iter()
        .find(|r| r.status == ProposalStatus::Accepted)
    {
        return Outcome::Refused(Refusal::RequestAlreadyAccepted { existing: held.id });
    }

    let Some(first) = book
        .requests
        .iter()
        .filter(|r| r.status == ProposalStatus::Pending)
        .min_by_key(|r| (r.created_at_utc, r.id))
    else {
        return Outcome::Refused(Refusal::NoPendingRequest);
    };

    let mut new_order = order.clone();
    new_order.workshop = Some(first.workshop);
    new_order.status = OrderStatus::Validated;

    let mut accepted = first.clone();
    accepted.status = ProposalStatus::Accepted;

    let mut commands = vec![
        Command::PutOrder(new_order.clone()),
        Command::PutRequest(accepted.clone()),
    ];
    let mut rejected_siblings = Vec::new();
    for sibling in book
        .requests
        .iter()
        .filter(|r| r.status == ProposalStatus::Pending && r.id != first.id)
    {
        let mut r = sibling.clone();
        r.status = ProposalStatus::Rejected;
        rejected_siblings.push(r.id);
        commands.push(Command::PutRequest(r));
    }

    Outcome::Applied(Transition::new(
        Assignment {
            order: new_order,
            request: accepted,
            rejected_siblings,
        },
        commands,
    ))
}

/// Drop every request on the order and put it back to `pending`.
pub fn reset_on_refusal(book: &OrderBook) -> Transition<Reset> {
    let mut order = book.order.clone();
    order.workshop = None;
    order.status = OrderStatus::Pending;

    let deleted_requests = book.requests.iter().map(|r| r.id).collect();
    Transition::new(
        Reset {
            order: order.clone(),
            deleted_requests,
        },
        vec![
            Command::DeleteRequestsForOrder(order.id),
            Command::PutOrder(order),
        ],
    )
}

/// `validated` → `completed`.
pub fn complete(book: &OrderBook) -> Outcome<Transition<Order>> {
    let order = &book.order;
    if order.status != OrderStatus::Validated {
        return Outcome::Refused(Refusal::OrderNotValidated {
            status: order.status,
        });
    }
    let mut done = order.clone();
    done.status = OrderStatus::Completed;
    Outcome::Applied(Transition::new(
        done.clone(),
        vec![Command::PutOrder(done)],
    ))
}

/// Record a workshop's interest in an order.
///
/// An order that already has a workshop cannot take new requests. A second
/// pending request from the same workshop is refused as a duplicate.
pub fn request_workshop(
    book: &OrderBook,
    workshop: WorkshopId,
) -> Result<Outcome<Transition<()>>, WorkflowError> {
    let order = &book.order;
    if let Some(assigned) = order.workshop {
        return Err(WorkflowError::invalid_state(
            EntityKind::Order,
            order.id.get(),
            format!("already {} with {assigned}", order.status),
        ));
    }
    if let Some(existing) = book
        .requests
        .iter()
        .find(|r| r.workshop == workshop && r.status == ProposalStatus::Pending)
    {
        return Ok(Outcome::Refused(Refusal::DuplicateRequest {
            existing: existing.id,
        }));
    }
    Ok(Outcome::Applied(Transition::new(
        (),
        vec![Command::InsertRequest {
            workshop,
            order: order.id,
        }],
    )))
}

/// Apply a direct edit to an order row.
///
/// Any status may be written, but the edited row must keep the
/// workshop/status pairing. Detaching the workshop also rejects the accepted
/// request, so the order goes back to the pool with no accepted request left.
pub fn edit_order(book: &OrderBook, patch: &OrderPatch) -> Result<Transition<Order>, WorkflowError> {
    let mut o = book.order.clone();
    if let Some(d) = &patch.description {
        validate::description(d)?;
        o.description = d.clone();
    }
    if let Some(q) = patch.quantity {
        validate::quantity(q)?;
        o.quantity = q;
    }
    if let Some(d) = patch.deadline_utc {
        o.deadline_utc = d;
    }
    if let Some(a) = &patch.address {
        if a.trim().is_empty() {
            return Err(WorkflowError::validation("address is required"));
        }
        o.address = a.clone();
    }
    if let Some(p) = patch.product {
        o.product = p;
    }
    if let Some(p) = patch.price_cents {
        validate::order_price(p)?;
        o.price_cents = p;
    }
    if let Some(s) = patch.status {
        o.status = s;
    }
    if let Some(w) = patch.workshop {
        o.workshop = w;
    }

    if !o.workshop_matches_status() {
        return Err(WorkflowError::invalid_state(
            EntityKind::Order,
            o.id.get(),
            format!(
                "status {} {} a workshop",
                o.status,
                if o.status.requires_workshop() {
                    "requires"
                } else {
                    "cannot carry"
                }
            ),
        ));
    }
    let mut commands = vec![Command::PutOrder(o.clone())];
    if o.workshop.is_none() {
        for held in book
            .requests
            .iter()
            .filter(|r| r.status == ProposalStatus::Accepted)
        {
            let mut r = held.clone();
            r.status = ProposalStatus::Rejected;
            commands.push(Command::PutRequest(r));
        }
    }
    Ok(Transition::new(o, commands))
}

// ---------------------------------------------------------------------------
// Fabric sub-orders and bids
// ---------------------------------------------------------------------------

fn reject_pending_bids(book: &SubOrderBook, keep: Option<BidId>) -> (Vec<BidId>, Vec<Command>) {
    let mut ids = Vec::new();
    let mut commands = Vec::new();
    for bid in book
        .bids
        .iter()
        .filter(|b| b.status == ProposalStatus::Pending && Some(b.id) != keep)
    {
        let mut b = bid.clone();
        b.status = ProposalStatus::Rejected;
        ids.push(b.id);
        commands.push(Command::PutBid(b));
    }
    (ids, commands)
}

/// Give a pending sub-order to a fabric store directly.
pub fn assign_store(
    book: &SubOrderBook,
    store: FabricStoreId,
) -> Outcome<Transition<SubOrderResolution>> {
    let sub = &book.sub_order;
    if sub.status != ProposalStatus::Pending {
        return Outcome::Refused(Refusal::SubOrderNotPending { status: sub.status });
    }
    let mut s = sub.clone();
    s.fabric_store = Some(store);
    s.status = ProposalStatus::Accepted;

    let (rejected_bids, mut commands) = reject_pending_bids(book, None);
    commands.insert(0, Command::PutSubOrder(s.clone()));
    Outcome::Applied(Transition::new(
        SubOrderResolution {
            sub_order: s,
            rejected_bids,
        },
        commands,
    ))
}

/// Force a sub-order to `rejected` from any state.
///
/// The fabric store is cleared so that a store reference still implies
/// `accepted`. Pending bids go down with it.
pub fn reject_sub_order(book: &SubOrderBook) -> Transition<SubOrderResolution> {
    let mut s = book.sub_order.clone();
    s.status = ProposalStatus::Rejected;
    s.fabric_store = None;

    let (rejected_bids, mut commands) = reject_pending_bids(book, None);
    commands.insert(0, Command::PutSubOrder(s.clone()));
    Transition::new(
        SubOrderResolution {
            sub_order: s,
            rejected_bids,
        },
        commands,
    )
}

/// Edit quantity or material of a sub-order that is still open.
pub fn edit_sub_order(
    book: &SubOrderBook,
    patch: &SubOrderPatch,
) -> Result<Transition<sew_schemas::FabricSubOrder>, WorkflowError> {
    let sub = &book.sub_order;
    if sub.status != ProposalStatus::Pending {
        return Err(WorkflowError::invalid_state(
            EntityKind::FabricSubOrder,
            sub.id.get(),
            format!("cannot edit a {} sub-order", sub.status),
        ));
    }
    let mut s = sub.clone();
    if let Some(q) = patch.quantity {
        validate::quantity(q)?;
        s.quantity = q;
    }
    if let Some(m) = patch.material {
        s.material = m;
    }
    Ok(Transition::new(s.clone(), vec![Command::PutSubOrder(s)]))
}

/// Place a price bid on an open sub-order.
pub fn place_bid(
    book: &SubOrderBook,
    store: FabricStoreId,
    price_cents: i64,
) -> Result<Transition<()>, WorkflowError> {
    let sub = &book.sub_order;
    validate::bid_price(price_cents)?;
    if sub.status != ProposalStatus::Pending {
        return Err(WorkflowError::invalid_state(
            EntityKind::FabricSubOrder,
            sub.id.get(),
            format!("not taking bids while {}", sub.status),
        ));
    }
    Ok(Transition::new(
        (),
        vec![Command::InsertBid {
            sub_order: sub.id,
            fabric_store: store,
            price_cents,
        }],
    ))
}

fn find_bid(book: &SubOrderBook, bid: BidId) -> Result<&sew_schemas::FabricBid, WorkflowError> {
    book.bids
        .iter()
        .find(|b| b.id == bid)
        .ok_or_else(|| WorkflowError::not_found(EntityKind::FabricBid, bid.get()))
}

/// Accept one bid and hand the sub-order to its fabric store.
pub fn accept_bid(
    book: &SubOrderBook,
    bid: BidId,
) -> Result<Outcome<Transition<BidAcceptance>>, WorkflowError> {
    let target = find_bid(book, bid)?;
    if target.status != ProposalStatus::Pending {
        return Ok(Outcome::Refused(Refusal::BidNotPending {
            status: target.status,
        }));
    }
    let sub = &book.sub_order;
    if sub.status != ProposalStatus::Pending {
        return Ok(Outcome::Refused(Refusal::SubOrderNotPending {
            status: sub.status,
        }));
    }

    let mut accepted = target.clone();
    accepted.status = ProposalStatus::Accepted;

    let mut s = sub.clone();
    s.fabric_store = Some(accepted.fabric_store);
    s.status = ProposalStatus::Accepted;

    let (rejected_siblings, sibling_cmds) = reject_pending_bids(book, Some(bid));
    let mut commands = vec![
        Command::PutBid(accepted.clone()),
        Command::PutSubOrder(s.clone()),
    ];
    commands.extend(sibling_cmds);

    Ok(Outcome::Applied(Transition::new(
        BidAcceptance {
            bid: accepted,
            sub_order: s,
            rejected_siblings,
        },
        commands,
    )))
}

/// Reject one bid. The sub-order is left alone.
pub fn reject_bid(
    book: &SubOrderBook,
    bid: BidId,
) -> Result<Outcome<Transition<sew_schemas::FabricBid>>, WorkflowError> {
    let target = find_bid(book, bid)?;
    if target.status != ProposalStatus::Pending {
        return Ok(Outcome::Refused(Refusal::BidNotPending {
            status: target.status,
        }));
    }
    let mut b = target.clone();
    b.status = ProposalStatus::Rejected;
    Ok(Outcome::Applied(Transition::new(
        b.clone(),
        vec![Command::PutBid(b)],
    )))
}

/// Change the price of a bid that is still pending.
pub fn reprice_bid(
    book: &SubOrderBook,
    bid: BidId,
    price_cents: i64,
) -> Result<Transition<sew_schemas::FabricBid>, WorkflowError> {
    validate::bid_price(price_cents)?;
    let target = find_bid(book, bid)?;
    if target.status != ProposalStatus::Pending {
        return Err(WorkflowError::invalid_state(
            EntityKind::FabricBid,
            bid.get(),
            format!("cannot reprice a {} bid", target.status),
        ));
    }
    let mut b = target.clone();
    b.price_cents = price_cents;
    Ok(Transition::new(b.clone(), vec![Command::PutBid(b)]))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
