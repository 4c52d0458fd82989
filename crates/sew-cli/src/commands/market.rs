//! Marketplace command handlers: party, order, request, sub-order, bid.
//!
//! Every mutating command prints the resulting row and, when the journal is
//! enabled, appends the transition to it.

use anyhow::Result;

use sew_audit::Topic;
use sew_schemas::{
    BidFilter, BidId, ClientId, FabricStoreId, NewBid, NewOrder, NewParty, NewSubOrder, OrderFilter,
    OrderId, OrderPatch, PartyId, PartyPatch, ProductId, RequestFilter, RequestId,
    SubOrderFilter, SubOrderId, SubOrderPatch, WorkshopId,
};
use sew_workflow::Outcome;

use super::{
    print_bid, print_order, print_outcome, print_party, print_request, print_sub_order, Ctx,
    Market,
};
use crate::{BidCmd, OrderCmd, PartyCmd, RequestCmd, SubOrderCmd};

/// `Some(None)` clears, `Some(Some(v))` sets, `None` leaves alone.
fn patch_field<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

// ---------------------------------------------------------------------------
// party
// ---------------------------------------------------------------------------

pub async fn party(m: &Market, ctx: &mut Ctx, cmd: PartyCmd) -> Result<()> {
    match cmd {
        PartyCmd::Register {
            role,
            name,
            email,
            phone,
            address,
            store_name,
            notes,
            capacity,
        } => {
            let p = m
                .register_party(NewParty {
                    role,
                    name,
                    email,
                    phone,
                    address,
                    store_name,
                    notes,
                    capacity,
                })
                .await?;
            ctx.record(Topic::Party, "party/register", p.id, &p)?;
            print_party(&p);
        }

        PartyCmd::Show { id } => print_party(&m.party(PartyId::new(id)).await?),

        PartyCmd::List { role } => {
            for p in m.parties(role).await? {
                println!(
                    "party_id={} role={} name={} email={}",
                    p.id.get(),
                    p.role,
                    p.name,
                    p.email
                );
            }
        }

        PartyCmd::Update {
            id,
            name,
            email,
            phone,
            address,
            store_name,
            notes,
            capacity,
            clear_phone,
            clear_address,
            clear_store_name,
            clear_notes,
            clear_capacity,
        } => {
            let patch = PartyPatch {
                name,
                email,
                phone: patch_field(phone, clear_phone),
                address: patch_field(address, clear_address),
                store_name: patch_field(store_name, clear_store_name),
                notes: patch_field(notes, clear_notes),
                capacity: patch_field(capacity, clear_capacity),
            };
            let p = m.update_party(PartyId::new(id), patch).await?;
            ctx.record(Topic::Party, "party/update", p.id, &p)?;
            print_party(&p);
        }

        PartyCmd::Remove { id } => {
            let id = PartyId::new(id);
            m.remove_party(id).await?;
            ctx.record(Topic::Party, "party/remove", id, &serde_json::json!({}))?;
            println!("removed=true party_id={}", id.get());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// order
// ---------------------------------------------------------------------------

pub async fn order(m: &Market, ctx: &mut Ctx, cmd: OrderCmd) -> Result<()> {
    match cmd {
        OrderCmd::Create {
            client,
            description,
            quantity,
            deadline,
            address,
            product,
            price_cents,
        } => {
            let o = m
                .create_order(NewOrder {
                    client: ClientId::new(client),
                    description,
                    quantity,
                    deadline_utc: deadline,
                    address,
                    product: product.map(ProductId::new),
                    price_cents,
                })
                .await?;
            ctx.record(Topic::Order, "order/create", o.id, &o)?;
            print_order(&o);
        }

        OrderCmd::Show { id } => print_order(&m.order(OrderId::new(id)).await?),

        OrderCmd::List {
            client,
            workshop,
            status,
        } => {
            let filter = OrderFilter {
                client: client.map(ClientId::new),
                workshop: workshop.map(WorkshopId::new),
                status,
            };
            for o in m.orders(&filter).await? {
                println!(
                    "order_id={} client_id={} workshop_id={} status={} quantity={}",
                    o.id.get(),
                    o.client.get(),
                    o.workshop.map(|w| w.get().to_string()).unwrap_or_default(),
                    o.status,
                    o.quantity
                );
            }
        }

        OrderCmd::Update {
            id,
            description,
            quantity,
            deadline,
            address,
            price_cents,
            clear_price,
            status,
            workshop,
            clear_workshop,
        } => {
            let patch = OrderPatch {
                description,
                quantity,
                deadline_utc: deadline,
                address,
                product: None,
                price_cents: patch_field(price_cents, clear_price),
                status,
                workshop: patch_field(workshop.map(WorkshopId::new), clear_workshop),
            };
            let o = m.update_order(OrderId::new(id), patch).await?;
            ctx.record(Topic::Order, "order/update", o.id, &o)?;
            print_order(&o);
        }

        OrderCmd::Delete { id } => {
            let id = OrderId::new(id);
            m.delete_order(id).await?;
            ctx.record(Topic::Order, "order/delete", id, &serde_json::json!({}))?;
            println!("deleted=true order_id={}", id.get());
        }

        OrderCmd::Assign { id } => {
            let id = OrderId::new(id);
            let out = m.assign_first_pending_workshop(id).await?;
            print_outcome(&out);
            if let Outcome::Applied(a) = &out {
                ctx.record(Topic::Order, "order/assign", id, a)?;
                println!(
                    "request_id={} workshop_id={} rejected_requests={}",
                    a.request.id.get(),
                    a.request.workshop.get(),
                    a.rejected_siblings.len()
                );
                print_order(&a.order);
            }
        }

        OrderCmd::Reset { id } => {
            let id = OrderId::new(id);
            let reset = m.reset_order_on_refusal(id).await?;
            ctx.record(Topic::Order, "order/reset", id, &reset)?;
            println!("deleted_requests={}", reset.deleted_requests.len());
            print_order(&reset.order);
        }

        OrderCmd::Complete { id } => {
            let id = OrderId::new(id);
            let out = m.complete_order(id).await?;
            print_outcome(&out);
            if let Outcome::Applied(o) = &out {
                ctx.record(Topic::Order, "order/complete", id, o)?;
                print_order(o);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// request
// ---------------------------------------------------------------------------

pub async fn request(m: &Market, ctx: &mut Ctx, cmd: RequestCmd) -> Result<()> {
    match cmd {
        RequestCmd::Create { workshop, order } => {
            let out = m
                .create_workshop_request(WorkshopId::new(workshop), OrderId::new(order))
                .await?;
            print_outcome(&out);
            if let Outcome::Applied(r) = &out {
                ctx.record(Topic::Request, "request/create", r.id, r)?;
                print_request(r);
            }
        }

        RequestCmd::Show { id } => print_request(&m.request(RequestId::new(id)).await?),

        RequestCmd::List {
            order,
            workshop,
            status,
        } => {
            let filter = RequestFilter {
                order: order.map(OrderId::new),
                workshop: workshop.map(WorkshopId::new),
                status,
            };
            for r in m.requests(&filter).await? {
                print_request(&r);
            }
        }

        RequestCmd::Delete { id } => {
            let id = RequestId::new(id);
            m.delete_workshop_request(id).await?;
            ctx.record(Topic::Request, "request/delete", id, &serde_json::json!({}))?;
            println!("deleted=true request_id={}", id.get());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// sub-order
// ---------------------------------------------------------------------------

pub async fn sub_order(m: &Market, ctx: &mut Ctx, cmd: SubOrderCmd) -> Result<()> {
    match cmd {
        SubOrderCmd::Create {
            workshop,
            quantity,
            material,
        } => {
            let s = m
                .create_fabric_sub_order(NewSubOrder {
                    workshop: WorkshopId::new(workshop),
                    quantity,
                    material,
                })
                .await?;
            ctx.record(Topic::SubOrder, "sub_order/create", s.id, &s)?;
            print_sub_order(&s);
        }

        SubOrderCmd::Show { id } => print_sub_order(&m.sub_order(SubOrderId::new(id)).await?),

        SubOrderCmd::List {
            workshop,
            fabric_store,
            status,
        } => {
            let filter = SubOrderFilter {
                workshop: workshop.map(WorkshopId::new),
                fabric_store: fabric_store.map(FabricStoreId::new),
                status,
            };
            for s in m.sub_orders(&filter).await? {
                print_sub_order(&s);
            }
        }

        SubOrderCmd::Update {
            id,
            quantity,
            material,
        } => {
            let s = m
                .update_sub_order(SubOrderId::new(id), SubOrderPatch { quantity, material })
                .await?;
            ctx.record(Topic::SubOrder, "sub_order/update", s.id, &s)?;
            print_sub_order(&s);
        }

        SubOrderCmd::AssignStore { id, fabric_store } => {
            let id = SubOrderId::new(id);
            let out = m
                .assign_fabric_store(id, FabricStoreId::new(fabric_store))
                .await?;
            print_outcome(&out);
            if let Outcome::Applied(res) = &out {
                ctx.record(Topic::SubOrder, "sub_order/assign_store", id, res)?;
                println!("rejected_bids={}", res.rejected_bids.len());
                print_sub_order(&res.sub_order);
            }
        }

        SubOrderCmd::Reject { id } => {
            let id = SubOrderId::new(id);
            let out = m.reject_fabric_sub_order(id).await?;
            print_outcome(&out);
            if let Outcome::Applied(res) = &out {
                ctx.record(Topic::SubOrder, "sub_order/reject", id, res)?;
                println!("rejected_bids={}", res.rejected_bids.len());
                print_sub_order(&res.sub_order);
            }
        }

        SubOrderCmd::Delete { id } => {
            let id = SubOrderId::new(id);
            m.delete_sub_order(id).await?;
            ctx.record(Topic::SubOrder, "sub_order/delete", id, &serde_json::json!({}))?;
            println!("deleted=true sub_order_id={}", id.get());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// bid
// ---------------------------------------------------------------------------

pub async fn bid(m: &Market, ctx: &mut Ctx, cmd: BidCmd) -> Result<()> {
    match cmd {
        BidCmd::Create {
            sub_order,
            fabric_store,
            price_cents,
        } => {
            let b = m
                .create_fabric_bid(NewBid {
                    sub_order: SubOrderId::new(sub_order),
                    fabric_store: FabricStoreId::new(fabric_store),
                    price_cents,
                })
                .await?;
            ctx.record(Topic::Bid, "bid/create", b.id, &b)?;
            print_bid(&b);
        }

        BidCmd::Show { id } => print_bid(&m.bid(BidId::new(id)).await?),

        BidCmd::List {
            sub_order,
            fabric_store,
            status,
        } => {
            let filter = BidFilter {
                sub_order: sub_order.map(SubOrderId::new),
                fabric_store: fabric_store.map(FabricStoreId::new),
                status,
            };
            for b in m.bids(&filter).await? {
                print_bid(&b);
            }
        }

        BidCmd::Update { id, price_cents } => {
            let b = m.update_bid_price(BidId::new(id), price_cents).await?;
            ctx.record(Topic::Bid, "bid/update", b.id, &b)?;
            print_bid(&b);
        }

        BidCmd::Accept { id } => {
            let id = BidId::new(id);
            let out = m.accept_fabric_bid(id).await?;
            print_outcome(&out);
            if let Outcome::Applied(acc) = &out {
                ctx.record(Topic::Bid, "bid/accept", id, acc)?;
                println!("rejected_bids={}", acc.rejected_siblings.len());
                print_bid(&acc.bid);
                print_sub_order(&acc.sub_order);
            }
        }

        BidCmd::Reject { id } => {
            let id = BidId::new(id);
            let out = m.reject_fabric_bid(id).await?;
            print_outcome(&out);
            if let Outcome::Applied(b) = &out {
                ctx.record(Topic::Bid, "bid/reject", id, b)?;
                print_bid(b);
            }
        }

        BidCmd::Delete { id } => {
            let id = BidId::new(id);
            m.delete_bid(id).await?;
            ctx.record(Topic::Bid, "bid/delete", id, &serde_json::json!({}))?;
            println!("deleted=true bid_id={}", id.get());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::patch_field;

    #[test]
    fn clear_flag_wins_over_absent_value() {
        assert_eq!(patch_field::<i64>(None, true), Some(None));
        assert_eq!(patch_field(Some(5), false), Some(Some(5)));
        assert_eq!(patch_field::<i64>(None, false), None);
    }
}
