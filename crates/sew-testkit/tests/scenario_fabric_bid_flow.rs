//! Scenario: fabric sub-order sourcing through bids.
//!
//! GREEN when:
//! - accepting a bid accepts the sub-order with that bid's store and rejects
//!   the other pending bids
//! - rejecting a bid leaves the sub-order open
//! - rejecting a sub-order twice is a no-op the second time
//! - direct store assignment on a resolved sub-order is refused
//! - deleting a sub-order takes its bids with it

use sew_schemas::{BidFilter, NewBid, ProposalStatus, SubOrderPatch};
use sew_testkit::{market, sample_sub_order, seed_cast};
use sew_workflow::{ErrorKind, Outcome, Refusal};

#[tokio::test]
async fn accepted_bid_decides_the_sub_order() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let sub = m
        .create_fabric_sub_order(sample_sub_order(cast.workshop_a))
        .await?;

    let bx = m
        .create_fabric_bid(NewBid {
            sub_order: sub.id,
            fabric_store: cast.store_x,
            price_cents: 45_000,
        })
        .await?;
    let by = m
        .create_fabric_bid(NewBid {
            sub_order: sub.id,
            fabric_store: cast.store_y,
            price_cents: 39_900,
        })
        .await?;

    let acc = m
        .accept_fabric_bid(by.id)
        .await?
        .into_applied()
        .expect("pending bid is accepted");
    assert_eq!(acc.sub_order.status, ProposalStatus::Accepted);
    assert_eq!(acc.sub_order.fabric_store, Some(cast.store_y));
    assert_eq!(acc.rejected_siblings, vec![bx.id]);
    assert_eq!(m.bid(bx.id).await?.status, ProposalStatus::Rejected);

    // the loser cannot be accepted afterwards
    let late = m.accept_fabric_bid(bx.id).await?;
    assert!(matches!(late, Outcome::Refused(_)));
    assert_eq!(m.sub_order(sub.id).await?.fabric_store, Some(cast.store_y));

    // resolved sub-order takes no new bids
    let err = m
        .create_fabric_bid(NewBid {
            sub_order: sub.id,
            fabric_store: cast.store_x,
            price_cents: 30_000,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    Ok(())
}

#[tokio::test]
async fn rejecting_a_bid_keeps_the_sub_order_open() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let sub = m
        .create_fabric_sub_order(sample_sub_order(cast.workshop_b))
        .await?;
    let bid = m
        .create_fabric_bid(NewBid {
            sub_order: sub.id,
            fabric_store: cast.store_x,
            price_cents: 12_000,
        })
        .await?;

    let rejected = m
        .reject_fabric_bid(bid.id)
        .await?
        .into_applied()
        .expect("pending bid is rejected");
    assert_eq!(rejected.status, ProposalStatus::Rejected);

    let still = m.sub_order(sub.id).await?;
    assert_eq!(still.status, ProposalStatus::Pending);
    assert_eq!(still.fabric_store, None);

    // open sub-order can still be edited and re-bid
    let edited = m
        .update_sub_order(
            sub.id,
            SubOrderPatch {
                quantity: Some(80),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(edited.quantity, 80);
    m.create_fabric_bid(NewBid {
        sub_order: sub.id,
        fabric_store: cast.store_y,
        price_cents: 11_000,
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn sub_order_rejection_is_idempotent() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let sub = m
        .create_fabric_sub_order(sample_sub_order(cast.workshop_a))
        .await?;
    let bid = m
        .create_fabric_bid(NewBid {
            sub_order: sub.id,
            fabric_store: cast.store_x,
            price_cents: 9_000,
        })
        .await?;

    let first = m
        .reject_fabric_sub_order(sub.id)
        .await?
        .into_applied()
        .expect("reject always applies");
    assert_eq!(first.sub_order.status, ProposalStatus::Rejected);
    assert_eq!(first.rejected_bids, vec![bid.id]);

    let second = m
        .reject_fabric_sub_order(sub.id)
        .await?
        .into_applied()
        .expect("reject always applies");
    assert_eq!(second.sub_order, first.sub_order);
    assert!(second.rejected_bids.is_empty());

    let refused = m.assign_fabric_store(sub.id, cast.store_y).await?;
    assert_eq!(
        refused,
        Outcome::Refused(Refusal::SubOrderNotPending {
            status: ProposalStatus::Rejected
        })
    );
    assert_eq!(m.sub_order(sub.id).await?.fabric_store, None);
    Ok(())
}

#[tokio::test]
async fn direct_store_assignment_closes_bidding() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let sub = m
        .create_fabric_sub_order(sample_sub_order(cast.workshop_c))
        .await?;
    let bid = m
        .create_fabric_bid(NewBid {
            sub_order: sub.id,
            fabric_store: cast.store_y,
            price_cents: 20_000,
        })
        .await?;

    let res = m
        .assign_fabric_store(sub.id, cast.store_x)
        .await?
        .into_applied()
        .expect("pending sub-order takes a store");
    assert_eq!(res.sub_order.fabric_store, Some(cast.store_x));
    assert_eq!(res.sub_order.status, ProposalStatus::Accepted);
    assert_eq!(res.rejected_bids, vec![bid.id]);

    // wrong role is a missing fabric store
    let err = m
        .assign_fabric_store(sub.id, sew_schemas::FabricStoreId::new(cast.client.get()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn deleting_a_sub_order_cascades_to_bids() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let sub = m
        .create_fabric_sub_order(sample_sub_order(cast.workshop_a))
        .await?;
    for (store, price) in [(cast.store_x, 1_000), (cast.store_y, 2_000)] {
        m.create_fabric_bid(NewBid {
            sub_order: sub.id,
            fabric_store: store,
            price_cents: price,
        })
        .await?;
    }

    m.delete_sub_order(sub.id).await?;

    assert_eq!(
        m.sub_order(sub.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    let orphans = m
        .bids(&BidFilter {
            sub_order: Some(sub.id),
            ..Default::default()
        })
        .await?;
    assert!(orphans.is_empty());
    Ok(())
}
