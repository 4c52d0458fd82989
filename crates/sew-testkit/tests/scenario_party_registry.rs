//! Scenario: party registry.
//!
//! GREEN when:
//! - fixture parties load and register with their roles
//! - email is unique regardless of case
//! - a party used in the wrong role reads as missing in that role
//! - updates set and clear optional fields

use sew_schemas::{PartyPatch, PartyRole, WorkshopId};
use sew_testkit::{load_parties_json, market, new_party, open_order, seed_cast};
use sew_workflow::{EntityKind, ErrorKind, WorkflowError};

fn fixture(name: &str) -> String {
    format!("{}/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[tokio::test]
async fn fixture_parties_register_by_role() -> anyhow::Result<()> {
    let m = market();
    let parties = load_parties_json(&fixture("parties.json"))?;
    assert_eq!(parties.len(), 3);
    for p in parties {
        m.register_party(p).await?;
    }

    assert_eq!(m.parties(Some(PartyRole::Workshop)).await?.len(), 1);
    let stores = m.parties(Some(PartyRole::FabricStore)).await?;
    assert_eq!(stores[0].store_name.as_deref(), Some("Tissus Tazi"));
    assert_eq!(m.parties(None).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn email_is_unique_case_insensitively() -> anyhow::Result<()> {
    let m = market();
    m.register_party(new_party(PartyRole::Client, "Nadia")).await?;

    let mut dup = new_party(PartyRole::Workshop, "Nadia");
    dup.email = "NADIA@client.test".to_string();
    let err = m.register_party(dup).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    Ok(())
}

#[tokio::test]
async fn wrong_role_reads_as_missing() -> anyhow::Result<()> {
    let m = market();
    let cast = seed_cast(&m).await?;
    let order = open_order(&m, &cast).await?;

    // the client's id used as a workshop
    let as_workshop = WorkshopId::new(cast.client.get());
    let err = m
        .create_workshop_request(as_workshop, order.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::NotFound {
            entity: EntityKind::Workshop,
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn update_and_remove() -> anyhow::Result<()> {
    let m = market();
    let p = m
        .register_party(new_party(PartyRole::Workshop, "Atelier Fès"))
        .await?;

    let updated = m
        .update_party(
            p.id,
            PartyPatch {
                capacity: Some(Some(250)),
                notes: Some(Some("leather".to_string())),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.capacity, Some(250));
    assert_eq!(m.party(p.id).await?, updated);

    let cleared = m
        .update_party(
            p.id,
            PartyPatch {
                notes: Some(None),
                capacity: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(cleared.notes, None);
    assert_eq!(cleared.capacity, None);
    assert_eq!(cleared.name, updated.name);
    assert_eq!(m.party(p.id).await?, cleared);

    m.remove_party(p.id).await?;
    assert_eq!(m.party(p.id).await.unwrap_err().kind(), ErrorKind::NotFound);
    Ok(())
}
