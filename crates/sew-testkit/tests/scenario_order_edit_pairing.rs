//! Scenario: direct order edits keep the workshop/status pairing.
//!
//! GREEN when:
//! - `validated` without a workshop is refused and the row is untouched
//! - `validated` with a workshop, then back to `pending` with the workshop
//!   detached, both succeed
//! - plain field edits pass validation rules
//! - editing an assigned order back to `pending` rejects the accepted request,
//!   so a later request/assign round still leaves exactly one accepted request

use sew_schemas::{OrderFilter, OrderPatch, OrderStatus, ProposalStatus, RequestFilter};
use sew_testkit::{market, open_order, seed_cast};
use sew_workflow::ErrorKind;

#[tokio::test]
async fn status_edit_must_carry_the_workshop() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let order = open_order(&m, &cast).await?;

    let err = m
        .update_order(
            order.id,
            OrderPatch {
                status: Some(OrderStatus::Validated),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(m.order(order.id).await?, order);

    let validated = m
        .update_order(
            order.id,
            OrderPatch {
                status: Some(OrderStatus::Validated),
                workshop: Some(Some(cast.workshop_b)),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(validated.workshop, Some(cast.workshop_b));

    let by_b = m
        .orders(&OrderFilter {
            workshop: Some(cast.workshop_b),
            ..Default::default()
        })
        .await?;
    assert_eq!(by_b.len(), 1);

    let reopened = m
        .update_order(
            order.id,
            OrderPatch {
                status: Some(OrderStatus::Pending),
                workshop: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(reopened.status, OrderStatus::Pending);
    assert_eq!(reopened.workshop, None);
    Ok(())
}

#[tokio::test]
async fn field_edits_are_validated() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let order = open_order(&m, &cast).await?;

    let err = m
        .update_order(
            order.id,
            OrderPatch {
                quantity: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let edited = m
        .update_order(
            order.id,
            OrderPatch {
                quantity: Some(55),
                price_cents: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(edited.quantity, 55);
    assert_eq!(edited.price_cents, None);
    assert_eq!(edited.description, order.description);
    Ok(())
}

#[tokio::test]
async fn deleted_order_is_gone() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let order = open_order(&m, &cast).await?;

    m.delete_order(order.id).await?;
    assert_eq!(
        m.order(order.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        m.delete_order(order.id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    Ok(())
}

#[tokio::test]
async fn reopened_order_can_be_assigned_again() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let order = open_order(&m, &cast).await?;

    let first = m
        .create_workshop_request(cast.workshop_a, order.id)
        .await?
        .into_applied()
        .expect("request created");
    m.assign_first_pending_workshop(order.id)
        .await?
        .into_applied()
        .expect("first assignment applies");

    m.update_order(
        order.id,
        OrderPatch {
            status: Some(OrderStatus::Pending),
            workshop: Some(None),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(m.request(first.id).await?.status, ProposalStatus::Rejected);

    let second = m
        .create_workshop_request(cast.workshop_b, order.id)
        .await?
        .into_applied()
        .expect("reopened order takes requests");
    let a = m
        .assign_first_pending_workshop(order.id)
        .await?
        .into_applied()
        .expect("second assignment applies");
    assert_eq!(a.request.id, second.id);
    assert_eq!(a.order.workshop, Some(cast.workshop_b));

    let accepted = m
        .requests(&RequestFilter {
            order: Some(order.id),
            status: Some(ProposalStatus::Accepted),
            ..Default::default()
        })
        .await?;
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, second.id);
    Ok(())
}
