//! Fixtures for scenario tests: a registered cast of parties and ready-made
//! inputs, all running against the in-process ledger.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::fs;

use sew_schemas::{
    ClientId, FabricStoreId, MaterialKind, NewOrder, NewParty, NewSubOrder, Order, PartyRole,
    WorkshopId,
};
use sew_workflow::{MemoryLedger, Orchestrator};

pub type TestMarket = Orchestrator<MemoryLedger>;

pub fn market() -> TestMarket {
    Orchestrator::new(MemoryLedger::new())
}

/// One client, three workshops (A, B, C) and two fabric stores, registered
/// in that order.
#[derive(Debug, Clone)]
pub struct Cast {
    pub client: ClientId,
    pub workshop_a: WorkshopId,
    pub workshop_b: WorkshopId,
    pub workshop_c: WorkshopId,
    pub store_x: FabricStoreId,
    pub store_y: FabricStoreId,
}

pub fn new_party(role: PartyRole, name: &str) -> NewParty {
    let slug: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    NewParty {
        role,
        name: name.to_string(),
        email: format!("{slug}@{}.test", role.as_str()),
        phone: None,
        address: None,
        store_name: match role {
            PartyRole::FabricStore => Some(format!("{name} Textiles")),
            _ => None,
        },
        notes: None,
        capacity: match role {
            PartyRole::Workshop => Some(100),
            _ => None,
        },
    }
}

pub async fn seed_cast(m: &TestMarket) -> Result<Cast> {
    let client = m
        .register_party(new_party(PartyRole::Client, "Nadia"))
        .await?;
    let a = m
        .register_party(new_party(PartyRole::Workshop, "Atelier A"))
        .await?;
    let b = m
        .register_party(new_party(PartyRole::Workshop, "Atelier B"))
        .await?;
    let c = m
        .register_party(new_party(PartyRole::Workshop, "Atelier C"))
        .await?;
    let x = m
        .register_party(new_party(PartyRole::FabricStore, "Souk X"))
        .await?;
    let y = m
        .register_party(new_party(PartyRole::FabricStore, "Souk Y"))
        .await?;

    Ok(Cast {
        client: ClientId::new(client.id.get()),
        workshop_a: WorkshopId::new(a.id.get()),
        workshop_b: WorkshopId::new(b.id.get()),
        workshop_c: WorkshopId::new(c.id.get()),
        store_x: FabricStoreId::new(x.id.get()),
        store_y: FabricStoreId::new(y.id.get()),
    })
}

pub fn sample_order(client: ClientId) -> NewOrder {
    NewOrder {
        client,
        description: "40 embroidered djellabas".to_string(),
        quantity: 40,
        deadline_utc: Utc::now() + Duration::days(30),
        address: "17 rue des Teinturiers, Fès".to_string(),
        product: None,
        price_cents: Some(1_200_000),
    }
}

pub async fn open_order(m: &TestMarket, cast: &Cast) -> Result<Order> {
    Ok(m.create_order(sample_order(cast.client)).await?)
}

pub fn sample_sub_order(workshop: WorkshopId) -> NewSubOrder {
    NewSubOrder {
        workshop,
        quantity: 120,
        material: MaterialKind::Cotton,
    }
}

#[derive(Debug, Deserialize)]
struct PartyFile {
    parties: Vec<NewParty>,
}

/// Load `{"parties": [...]}` fixture files.
pub fn load_parties_json(path: &str) -> Result<Vec<NewParty>> {
    let s = fs::read_to_string(path).with_context(|| format!("read parties: {path}"))?;
    let f: PartyFile = serde_json::from_str(&s).context("parse parties json")?;
    Ok(f.parties)
}
